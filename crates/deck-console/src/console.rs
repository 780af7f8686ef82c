//! Live terminal console.
//!
//! Two pollers feed the screen: one for the relationship graph, one for
//! the agent/task/memory tables. All screen state lives in [`ConsoleState`],
//! which is driven by poll events and key presses and can be exercised
//! without a terminal.

use std::collections::VecDeque;
use std::io::{self, IsTerminal, Stdout};
use std::time::Duration;

use anyhow::bail;
use chrono::{DateTime, Local};
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use deck_client::{
    ApiClient, DeckConfig, FetchStatus, GraphFeed, PollEvent, Poller, PollerConfig, TablesFeed,
    TablesSnapshot,
};
use deck_graph::{ApplyOutcome, GraphView, LayoutConfig};
use deck_protocol::{AgentStatus, DashboardStats, NodeGroup, TaskStatus};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState},
    Frame, Terminal,
};
use serde_json::Value;

use crate::commands::render_changes;
use crate::graph_canvas::{render_graph, Viewport};

/// Change log entries kept in memory.
pub const LOG_CAPACITY: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    Agents,
    Tasks,
}

/// What the event loop should do after a key press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    None,
    Quit,
    Refresh,
    SetLive(bool),
}

#[derive(Debug, Clone, PartialEq)]
pub struct LogLine {
    pub at: DateTime<Local>,
    pub text: String,
    pub color: Color,
}

pub struct ConsoleState {
    pub server_id: String,
    pub base_url: String,
    pub graph: GraphView,
    pub viewport: Option<Viewport>,
    pub tables: TablesSnapshot,
    pub stats: DashboardStats,
    pub live: bool,
    pub graph_fetch: FetchStatus,
    pub tables_fetch: FetchStatus,
    pub last_refresh: Option<DateTime<Local>>,
    pub focus: Focus,
    pub agent_selected: usize,
    pub task_selected: usize,
    graph_error: Option<String>,
    tables_error: Option<String>,
    log: VecDeque<LogLine>,
}

impl ConsoleState {
    pub fn new(server_id: &str, base_url: &str, layout: LayoutConfig) -> Self {
        Self {
            server_id: server_id.to_string(),
            base_url: base_url.to_string(),
            graph: GraphView::new(layout),
            viewport: None,
            tables: TablesSnapshot::default(),
            stats: DashboardStats::default(),
            live: true,
            graph_fetch: FetchStatus::Idle,
            tables_fetch: FetchStatus::Idle,
            last_refresh: None,
            focus: Focus::Agents,
            agent_selected: 0,
            task_selected: 0,
            graph_error: None,
            tables_error: None,
            log: VecDeque::with_capacity(LOG_CAPACITY),
        }
    }

    pub fn push_log(&mut self, text: impl Into<String>, color: Color) {
        if self.log.len() == LOG_CAPACITY {
            self.log.pop_front();
        }
        self.log.push_back(LogLine {
            at: Local::now(),
            text: text.into(),
            color,
        });
    }

    pub fn log_lines(&self) -> impl DoubleEndedIterator<Item = &LogLine> {
        self.log.iter()
    }

    /// The error to show in the status bar, graph errors first.
    pub fn error_line(&self) -> Option<String> {
        self.graph_error
            .as_ref()
            .or(self.tables_error.as_ref())
            .map(|e| format!("{e} (press r to retry)"))
    }

    pub fn fetch_label(&self) -> &'static str {
        let both = [&self.graph_fetch, &self.tables_fetch];
        if both.iter().any(|s| matches!(s, FetchStatus::Loading)) {
            "loading"
        } else if both.iter().any(|s| matches!(s, FetchStatus::Error(_))) {
            "error"
        } else if both.iter().any(|s| matches!(s, FetchStatus::Success)) {
            "ok"
        } else {
            "idle"
        }
    }

    /// Adopt the pollers' Idle once a finished fetch has lingered. Loading
    /// is only ever set from events, so quiet background fetches stay quiet.
    /// The last error stays in [`error_line`](Self::error_line).
    pub fn sync_fetch_status(&mut self, graph: &FetchStatus, tables: &FetchStatus) {
        for (local, remote) in [
            (&mut self.graph_fetch, graph),
            (&mut self.tables_fetch, tables),
        ] {
            if *remote == FetchStatus::Idle && *local != FetchStatus::Loading {
                *local = FetchStatus::Idle;
            }
        }
    }

    pub fn on_graph_event(&mut self, event: PollEvent<Value>) {
        match event {
            PollEvent::Loading { visible, .. } => {
                if visible {
                    self.graph_fetch = FetchStatus::Loading;
                }
            }
            PollEvent::Snapshot {
                seq,
                data,
                fetched_at,
            } => {
                self.last_refresh = Some(fetched_at.with_timezone(&Local));
                match self.graph.apply_payload(&data) {
                    ApplyOutcome::Applied(changes) => {
                        self.graph_fetch = FetchStatus::Success;
                        self.graph_error = None;
                        if changes.fit_view || self.viewport.is_none() {
                            self.viewport = Viewport::fit(&self.graph);
                        }
                        if changes.is_empty() {
                            return;
                        }
                        tracing::debug!(
                            seq,
                            added = changes.nodes.added.len(),
                            removed = changes.nodes.removed.len(),
                            "Graph updated"
                        );
                        for node in &changes.nodes.added {
                            if node.group == NodeGroup::Agent {
                                self.push_log(
                                    format!("Agent {} joined", node.display_label()),
                                    Color::Green,
                                );
                            }
                        }
                        self.push_log(format!("#{seq} {}", render_changes(&changes)), Color::Gray);
                    }
                    ApplyOutcome::Skipped(e) => {
                        let message = format!("Graph data unusable: {e}");
                        tracing::warn!(seq, error = %e, "Skipping graph payload");
                        self.graph_fetch = FetchStatus::Error(message.clone());
                        self.graph_error = Some(message.clone());
                        self.push_log(message, Color::Yellow);
                    }
                }
            }
            PollEvent::Failed { message, .. } => {
                self.graph_fetch = FetchStatus::Error(message.clone());
                self.push_log(format!("Graph refresh failed: {message}"), Color::Red);
                self.graph_error = Some(message);
            }
        }
    }

    pub fn on_tables_event(&mut self, event: PollEvent<TablesSnapshot>) {
        match event {
            PollEvent::Loading { visible, .. } => {
                if visible {
                    self.tables_fetch = FetchStatus::Loading;
                }
            }
            PollEvent::Snapshot {
                data, fetched_at, ..
            } => {
                self.stats =
                    DashboardStats::from_lists(&data.agents, &data.tasks, &data.memories);
                self.tables = data;
                self.agent_selected = clamp_index(self.agent_selected, self.tables.agents.len());
                self.task_selected = clamp_index(self.task_selected, self.tables.tasks.len());
                self.tables_fetch = FetchStatus::Success;
                self.tables_error = None;
                self.last_refresh = Some(fetched_at.with_timezone(&Local));
            }
            PollEvent::Failed { message, .. } => {
                self.tables_fetch = FetchStatus::Error(message.clone());
                self.push_log(format!("Table refresh failed: {message}"), Color::Red);
                self.tables_error = Some(message);
            }
        }
    }

    pub fn handle_key(&mut self, code: KeyCode, modifiers: KeyModifiers) -> KeyAction {
        match code {
            KeyCode::Char('c') if modifiers.contains(KeyModifiers::CONTROL) => KeyAction::Quit,
            KeyCode::Char('q') | KeyCode::Esc => KeyAction::Quit,
            KeyCode::Char('r') => {
                self.push_log("Manual refresh", Color::Cyan);
                KeyAction::Refresh
            }
            KeyCode::Char('l') => {
                self.live = !self.live;
                let text = if self.live {
                    "Live updates on"
                } else {
                    "Live updates paused"
                };
                self.push_log(text, Color::Cyan);
                KeyAction::SetLive(self.live)
            }
            KeyCode::Char('f') => {
                self.viewport = Viewport::fit(&self.graph);
                KeyAction::None
            }
            KeyCode::Tab => {
                self.focus = match self.focus {
                    Focus::Agents => Focus::Tasks,
                    Focus::Tasks => Focus::Agents,
                };
                KeyAction::None
            }
            KeyCode::Up => {
                let selected = self.selected_mut();
                *selected = selected.saturating_sub(1);
                KeyAction::None
            }
            KeyCode::Down => {
                let len = match self.focus {
                    Focus::Agents => self.tables.agents.len(),
                    Focus::Tasks => self.tables.tasks.len(),
                };
                let selected = self.selected_mut();
                *selected = clamp_index(*selected + 1, len);
                KeyAction::None
            }
            _ => KeyAction::None,
        }
    }

    fn selected_mut(&mut self) -> &mut usize {
        match self.focus {
            Focus::Agents => &mut self.agent_selected,
            Focus::Tasks => &mut self.task_selected,
        }
    }

    pub fn render(&self, frame: &mut Frame) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(4),
                Constraint::Min(10),
                Constraint::Length(8),
            ])
            .split(frame.area());

        self.render_status_bar(frame, chunks[0]);

        let main = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
            .split(chunks[1]);

        let graph_block = Block::default()
            .title(format!(
                " Graph ({} nodes, {} edges) ",
                self.graph.node_count(),
                self.graph.edge_count()
            ))
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan));
        render_graph(frame, main[0], &self.graph, self.viewport.as_ref(), graph_block);

        let side = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Percentage(45), Constraint::Percentage(55)])
            .split(main[1]);
        self.render_agents(frame, side[0]);
        self.render_tasks(frame, side[1]);

        self.render_log(frame, chunks[2]);
    }

    fn render_status_bar(&self, frame: &mut Frame, area: Rect) {
        let refreshed = self
            .last_refresh
            .map(|t| t.format("%H:%M:%S").to_string())
            .unwrap_or_else(|| "never".to_string());
        let fetch = self.fetch_label();
        let fetch_color = match fetch {
            "ok" => Color::Green,
            "loading" => Color::Yellow,
            "error" => Color::Red,
            _ => Color::DarkGray,
        };
        let (live_text, live_color) = if self.live {
            ("LIVE", Color::Green)
        } else {
            ("PAUSED", Color::Yellow)
        };

        let line1 = Line::from(vec![
            Span::styled(" Server: ", Style::default().fg(Color::Gray)),
            Span::styled(
                format!("{} ({})", self.server_id, self.base_url),
                Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
            ),
            Span::styled("  Refreshed: ", Style::default().fg(Color::Gray)),
            Span::styled(refreshed, Style::default().fg(Color::White)),
            Span::styled("  Fetch: ", Style::default().fg(Color::Gray)),
            Span::styled(fetch, Style::default().fg(fetch_color)),
            Span::raw("  "),
            Span::styled(
                live_text,
                Style::default().fg(live_color).add_modifier(Modifier::BOLD),
            ),
        ]);

        let line2 = match self.error_line() {
            Some(error) => Line::from(Span::styled(
                format!(" ⚠ {error}"),
                Style::default().fg(Color::Red),
            )),
            None => Line::from(vec![
                Span::styled(
                    format!(
                        " Agents {}/{} active  Tasks {} pending, {} running, {} done  Memory {}",
                        self.stats.active_agents,
                        self.stats.total_agents,
                        self.stats.pending_tasks,
                        self.stats.in_progress_tasks,
                        self.stats.completed_tasks,
                        self.stats.memory_entries,
                    ),
                    Style::default().fg(Color::White),
                ),
                Span::styled(
                    "   r refresh  l live  f fit  tab focus  q quit",
                    Style::default().fg(Color::DarkGray),
                ),
            ]),
        };

        let status = Paragraph::new(vec![line1, line2]).block(
            Block::default()
                .title(" agentdeck ")
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Cyan)),
        );
        frame.render_widget(status, area);
    }

    fn table_block(&self, title: String, focus: Focus) -> Block<'static> {
        let color = if self.focus == focus {
            Color::Cyan
        } else {
            Color::DarkGray
        };
        Block::default()
            .title(title)
            .borders(Borders::ALL)
            .border_style(Style::default().fg(color))
    }

    fn render_agents(&self, frame: &mut Frame, area: Rect) {
        let block = self.table_block(format!(" Agents ({}) ", self.tables.agents.len()), Focus::Agents);
        let rows: Vec<Row> = self
            .tables
            .agents
            .iter()
            .map(|agent| {
                let color = match agent.status {
                    AgentStatus::Active => Color::Green,
                    AgentStatus::Created => Color::Cyan,
                    AgentStatus::Failed => Color::Red,
                    AgentStatus::Terminated | AgentStatus::Completed => Color::DarkGray,
                    AgentStatus::Unknown => Color::Gray,
                };
                Row::new(vec![
                    Cell::from(agent.agent_id.clone()),
                    Cell::from(Span::styled(agent.status.label(), Style::default().fg(color))),
                    Cell::from(Span::styled(
                        agent.current_task.clone().unwrap_or_else(|| "-".to_string()),
                        Style::default().fg(Color::Gray),
                    )),
                ])
            })
            .collect();

        let table = Table::new(
            rows,
            [
                Constraint::Percentage(40),
                Constraint::Percentage(22),
                Constraint::Percentage(38),
            ],
        )
        .block(block)
        .header(
            Row::new(vec!["Agent", "Status", "Task"])
                .style(Style::default().fg(Color::Gray).add_modifier(Modifier::BOLD)),
        )
        .row_highlight_style(Style::default().add_modifier(Modifier::REVERSED));

        let mut state = TableState::default();
        if self.focus == Focus::Agents && !self.tables.agents.is_empty() {
            state.select(Some(self.agent_selected));
        }
        frame.render_stateful_widget(table, area, &mut state);
    }

    fn render_tasks(&self, frame: &mut Frame, area: Rect) {
        let block = self.table_block(format!(" Tasks ({}) ", self.tables.tasks.len()), Focus::Tasks);
        let rows: Vec<Row> = self
            .tables
            .tasks
            .iter()
            .map(|task| {
                let color = match task.status {
                    TaskStatus::Completed => Color::Green,
                    TaskStatus::InProgress => Color::Yellow,
                    TaskStatus::Failed => Color::Red,
                    TaskStatus::Cancelled => Color::DarkGray,
                    _ => Color::White,
                };
                Row::new(vec![
                    Cell::from(task.title.clone()),
                    Cell::from(Span::styled(task.status.label(), Style::default().fg(color))),
                    Cell::from(Span::styled(
                        task.assigned_to.clone().unwrap_or_else(|| "-".to_string()),
                        Style::default().fg(Color::Gray),
                    )),
                ])
            })
            .collect();

        let table = Table::new(
            rows,
            [
                Constraint::Percentage(50),
                Constraint::Percentage(22),
                Constraint::Percentage(28),
            ],
        )
        .block(block)
        .header(
            Row::new(vec!["Title", "Status", "Assigned"])
                .style(Style::default().fg(Color::Gray).add_modifier(Modifier::BOLD)),
        )
        .row_highlight_style(Style::default().add_modifier(Modifier::REVERSED));

        let mut state = TableState::default();
        if self.focus == Focus::Tasks && !self.tables.tasks.is_empty() {
            state.select(Some(self.task_selected));
        }
        frame.render_stateful_widget(table, area, &mut state);
    }

    fn render_log(&self, frame: &mut Frame, area: Rect) {
        let visible = area.height.saturating_sub(2) as usize;
        let mut lines: Vec<Line> = self
            .log
            .iter()
            .rev()
            .take(visible)
            .map(|entry| {
                Line::from(vec![
                    Span::styled(
                        format!(" {} ", entry.at.format("%H:%M:%S")),
                        Style::default().fg(Color::DarkGray),
                    ),
                    Span::styled(entry.text.clone(), Style::default().fg(entry.color)),
                ])
            })
            .collect();
        lines.reverse();

        let log = Paragraph::new(lines).block(
            Block::default()
                .title(" Changes ")
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::DarkGray)),
        );
        frame.render_widget(log, area);
    }
}

fn clamp_index(index: usize, len: usize) -> usize {
    index.min(len.saturating_sub(1))
}

fn setup_terminal() -> io::Result<Terminal<CrosstermBackend<Stdout>>> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    Terminal::new(CrosstermBackend::new(stdout))
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> io::Result<()> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()
}

/// Run the console until the user quits. Both pollers are shut down and
/// awaited before the terminal is handed back.
pub async fn run_console(config: &DeckConfig, client: ApiClient) -> anyhow::Result<()> {
    if !io::stdin().is_terminal() || !io::stdout().is_terminal() {
        bail!("the console needs an interactive terminal; use a subcommand such as `agentdeck stats`");
    }

    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
        original_hook(panic_info);
    }));

    let (graph_poller, mut graph_events) = Poller::spawn(
        GraphFeed(client.clone()),
        PollerConfig::new("graph", config.poll.graph_interval()),
    );
    let (tables_poller, mut table_events) = Poller::spawn(
        TablesFeed(client.clone()),
        PollerConfig::new("tables", config.poll.tables_interval()),
    );

    let mut state = ConsoleState::new(client.server_id(), client.base_url(), config.layout);
    if !client.has_token() {
        state.push_log("No admin token configured; read-only", Color::Yellow);
    }
    tracing::info!(server = client.server_id(), url = client.base_url(), "Console started");

    let mut terminal = setup_terminal()?;
    let tick_rate = Duration::from_millis(100);

    let outcome: anyhow::Result<()> = loop {
        while let Ok(event) = graph_events.try_recv() {
            state.on_graph_event(event);
        }
        while let Ok(event) = table_events.try_recv() {
            state.on_tables_event(event);
        }
        state.sync_fetch_status(&graph_poller.status(), &tables_poller.status());

        if let Err(e) = terminal.draw(|frame| state.render(frame)) {
            break Err(e.into());
        }

        // crossterm blocks the thread; keep the runtime's other tasks moving.
        match tokio::task::block_in_place(|| event::poll(tick_rate)) {
            Ok(true) => match tokio::task::block_in_place(event::read) {
                Ok(Event::Key(key)) if key.kind == KeyEventKind::Press => {
                    match state.handle_key(key.code, key.modifiers) {
                        KeyAction::Quit => break Ok(()),
                        KeyAction::Refresh => {
                            graph_poller.refresh();
                            tables_poller.refresh();
                        }
                        KeyAction::SetLive(live) => {
                            graph_poller.set_live(live);
                            tables_poller.set_live(live);
                        }
                        KeyAction::None => {}
                    }
                }
                Ok(_) => {}
                Err(e) => break Err(e.into()),
            },
            Ok(false) => {}
            Err(e) => break Err(e.into()),
        }
    };

    // A poller blocked on a full channel sees the closed receiver and exits.
    drop(graph_events);
    drop(table_events);
    graph_poller.join().await;
    tables_poller.join().await;
    restore_terminal(&mut terminal)?;
    tracing::info!("Console stopped");
    outcome
}
