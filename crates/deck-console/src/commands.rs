//! One-shot CLI operations. Tables go to stdout, logs to stderr.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use anyhow::{bail, Context};
use deck_client::{
    ApiClient, DeckConfig, GraphFeed, PollEvent, Poller, PollerConfig, PrefsStore,
};
use deck_graph::{ApplyOutcome, ChangeSet, GraphView};
use deck_protocol::{
    decode_snapshot, Agent, CreateAgentRequest, CreateTaskRequest, DashboardStats, GraphSnapshot,
    MemoryEntry, MemoryWriteRequest, NodeDetail, NodeGroup, Task, TaskStatus,
};
use serde_json::Value;

use crate::cli::*;

pub struct CommandContext {
    pub config: DeckConfig,
    pub client: ApiClient,
    pub json: bool,
}

pub async fn run(command: Command, ctx: &CommandContext) -> anyhow::Result<()> {
    match command {
        Command::Agents(cmd) => agents(cmd, ctx).await,
        Command::Tasks(cmd) => tasks(cmd, ctx).await,
        Command::Memory(cmd) => memory(cmd, ctx).await,
        Command::Graph(GraphCommand::Snapshot) => graph_snapshot(ctx).await,
        Command::Graph(GraphCommand::Watch { interval }) => graph_watch(ctx, interval).await,
        Command::Node { id } => node(ctx, &id).await,
        Command::Stats => stats(ctx).await,
        Command::Prefs(cmd) => prefs(cmd, ctx.json),
        Command::Console => crate::console::run_console(&ctx.config, ctx.client.clone()).await,
    }
}

async fn agents(cmd: AgentsCommand, ctx: &CommandContext) -> anyhow::Result<()> {
    let api = &ctx.client;
    match cmd {
        AgentsCommand::List => {
            let agents = api.list_agents(true).await?;
            emit(ctx.json, &agents, || render_agents(&agents))
        }
        AgentsCommand::Create {
            agent_id,
            capabilities,
            workdir,
        } => {
            let ack = api
                .create_agent(&CreateAgentRequest {
                    agent_id: agent_id.clone(),
                    capabilities,
                    working_directory: workdir,
                })
                .await
                .with_context(|| format!("creating agent {agent_id}"))?;
            println!("{}", ack.message.unwrap_or_else(|| format!("Agent {agent_id} created")));
            Ok(())
        }
        AgentsCommand::Terminate { agent_id } => {
            let ack = api
                .terminate_agent(&agent_id)
                .await
                .with_context(|| format!("terminating agent {agent_id}"))?;
            println!("{}", ack.message.unwrap_or_else(|| format!("Agent {agent_id} terminated")));
            Ok(())
        }
    }
}

async fn tasks(cmd: TasksCommand, ctx: &CommandContext) -> anyhow::Result<()> {
    let api = &ctx.client;
    match cmd {
        TasksCommand::List { status } => {
            let mut tasks = api.list_tasks(true).await?;
            if let Some(wanted) = status.as_deref().map(TaskStatus::parse) {
                tasks.retain(|t| t.status == wanted);
            }
            emit(ctx.json, &tasks, || render_tasks(&tasks))
        }
        TasksCommand::Create(args) => {
            if args.title.trim().is_empty() {
                bail!("task title must not be empty");
            }
            let ack = api
                .create_task(&CreateTaskRequest {
                    title: args.title.clone(),
                    description: args.description,
                    priority: args.priority.as_str().to_string(),
                    assigned_to: args.assign,
                    parent_task: args.parent,
                    depends_on_tasks: args.depends_on,
                })
                .await
                .context("creating task")?;
            let id = ack
                .extra
                .get("task_id")
                .and_then(Value::as_str)
                .map(|id| format!(" ({id})"))
                .unwrap_or_default();
            println!("Task '{}' created{id}", args.title);
            Ok(())
        }
    }
}

async fn memory(cmd: MemoryCommand, ctx: &CommandContext) -> anyhow::Result<()> {
    let api = &ctx.client;
    match cmd {
        MemoryCommand::List => {
            let entries = api.list_memories(true).await?;
            emit(ctx.json, &entries, || render_memories(&entries))
        }
        MemoryCommand::Set {
            key,
            value,
            description,
        } => {
            api.create_memory(&MemoryWriteRequest {
                context_key: key.clone(),
                value: parse_value(&value),
                description,
            })
            .await
            .with_context(|| format!("writing memory '{key}'"))?;
            println!("Memory '{key}' saved");
            Ok(())
        }
        MemoryCommand::Update {
            key,
            value,
            description,
        } => {
            api.update_memory(&MemoryWriteRequest {
                context_key: key.clone(),
                value: parse_value(&value),
                description,
            })
            .await
            .with_context(|| format!("updating memory '{key}'"))?;
            println!("Memory '{key}' updated");
            Ok(())
        }
        MemoryCommand::Delete { key } => {
            api.delete_memory(&key)
                .await
                .with_context(|| format!("deleting memory '{key}'"))?;
            println!("Memory '{key}' deleted");
            Ok(())
        }
    }
}

async fn graph_snapshot(ctx: &CommandContext) -> anyhow::Result<()> {
    let payload = ctx.client.graph_data(true).await?;
    if ctx.json {
        println!("{}", serde_json::to_string_pretty(&payload)?);
        return Ok(());
    }
    let decoded = decode_snapshot(&payload).context("graph payload is unusable")?;
    for rejected in &decoded.rejected {
        tracing::warn!(error = %rejected, "Dropping malformed graph item");
    }
    let mut snapshot = decoded.snapshot;
    let dropped = snapshot.retain_connected_edges();
    print!("{}", render_snapshot_summary(&snapshot, dropped));
    Ok(())
}

async fn graph_watch(ctx: &CommandContext, interval: Option<u64>) -> anyhow::Result<()> {
    let interval = match interval {
        Some(secs) => std::time::Duration::from_secs(secs.clamp(
            deck_client::config::MIN_POLL_SECS,
            deck_client::config::MAX_POLL_SECS,
        )),
        None => ctx.config.poll.graph_interval(),
    };
    let mut view = GraphView::new(ctx.config.layout);
    let (handle, mut events) = Poller::spawn(
        GraphFeed(ctx.client.clone()),
        PollerConfig::new("graph-watch", interval),
    );
    println!(
        "Watching {} every {}s, Ctrl-C to stop",
        ctx.client.base_url(),
        interval.as_secs()
    );

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(PollEvent::Snapshot { seq, data, fetched_at }) => {
                    match view.apply_payload(&data) {
                        ApplyOutcome::Applied(changes) => {
                            let stamp = fetched_at.with_timezone(&chrono::Local).format("%H:%M:%S");
                            println!("[{stamp}] #{seq} {}", render_changes(&changes));
                        }
                        ApplyOutcome::Skipped(e) => println!("#{seq} skipped: {e}"),
                    }
                }
                Some(PollEvent::Failed { seq, message, .. }) => println!("#{seq} failed: {message}"),
                Some(PollEvent::Loading { .. }) => {}
                None => break,
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }
    drop(events);
    handle.join().await;
    Ok(())
}

async fn node(ctx: &CommandContext, id: &str) -> anyhow::Result<()> {
    let detail = ctx
        .client
        .node_details(id)
        .await
        .with_context(|| format!("loading node {id}"))?;
    emit(ctx.json, &detail, || render_node(&detail))
}

async fn stats(ctx: &CommandContext) -> anyhow::Result<()> {
    let stats = ctx.client.stats(true).await?;
    if ctx.json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
    } else {
        print!("{}", render_stats(&stats));
    }
    Ok(())
}

fn prefs(cmd: PrefsCommand, json: bool) -> anyhow::Result<()> {
    let mut store = PrefsStore::open_default()?;
    match cmd {
        PrefsCommand::Get { key: Some(key) } => match store.get(&key) {
            Some(value) => println!("{}", serde_json::to_string_pretty(value)?),
            None => bail!("no preference named '{key}'"),
        },
        PrefsCommand::Get { key: None } => {
            for key in store.keys() {
                let value = store.get(key).cloned().unwrap_or(Value::Null);
                println!("{key} = {value}");
            }
        }
        PrefsCommand::Set { key, value } => {
            store.set(&key, parse_value(&value))?;
            println!("Saved '{key}' to {}", store.path().display());
        }
        PrefsCommand::Templates { render: Some(name), vars } => {
            let template = store
                .template(&name)
                .with_context(|| format!("no template named '{name}'"))?;
            println!("{}", template.render(&parse_vars(&vars)?));
        }
        PrefsCommand::Templates { render: None, .. } => {
            let templates = store.templates();
            if json {
                println!("{}", serde_json::to_string_pretty(&templates)?);
            } else if templates.is_empty() {
                println!("No prompt templates saved");
            } else {
                for t in templates {
                    println!("{:<20} {}", t.name, t.description.unwrap_or_default());
                }
            }
        }
    }
    Ok(())
}

fn emit<T: serde::Serialize>(
    json: bool,
    value: &T,
    table: impl FnOnce() -> String,
) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        print!("{}", table());
    }
    Ok(())
}

/// JSON if it parses, otherwise the raw string.
pub fn parse_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

/// `name=value` pairs.
pub fn parse_vars(pairs: &[String]) -> anyhow::Result<BTreeMap<String, String>> {
    pairs
        .iter()
        .map(|pair| match pair.split_once('=') {
            Some((k, v)) if !k.trim().is_empty() => Ok((k.trim().to_string(), v.to_string())),
            _ => bail!("expected name=value, got '{pair}'"),
        })
        .collect()
}

fn clip(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let mut out: String = text.chars().take(max.saturating_sub(1)).collect();
        out.push('…');
        out
    }
}

pub fn render_agents(agents: &[Agent]) -> String {
    if agents.is_empty() {
        return "No agents\n".to_string();
    }
    let mut out = format!("{:<24} {:<12} {:<20} {}\n", "AGENT", "STATUS", "TASK", "CAPABILITIES");
    for a in agents {
        let _ = writeln!(
            out,
            "{:<24} {:<12} {:<20} {}",
            clip(&a.agent_id, 24),
            a.status.label(),
            clip(a.current_task.as_deref().unwrap_or("-"), 20),
            a.capabilities.join(",")
        );
    }
    out
}

pub fn render_tasks(tasks: &[Task]) -> String {
    if tasks.is_empty() {
        return "No tasks\n".to_string();
    }
    let mut out = format!(
        "{:<16} {:<32} {:<12} {:<8} {}\n",
        "TASK", "TITLE", "STATUS", "PRIO", "ASSIGNED"
    );
    for t in tasks {
        let _ = writeln!(
            out,
            "{:<16} {:<32} {:<12} {:<8} {}",
            clip(&t.task_id, 16),
            clip(&t.title, 32),
            t.status.label(),
            t.priority.as_deref().unwrap_or("-"),
            t.assigned_to.as_deref().unwrap_or("-")
        );
    }
    out
}

pub fn render_memories(entries: &[MemoryEntry]) -> String {
    if entries.is_empty() {
        return "No memory entries\n".to_string();
    }
    let mut out = format!("{:<24} {:<40} {}\n", "KEY", "VALUE", "UPDATED BY");
    for m in entries {
        let value = match m.decoded_value() {
            Value::String(s) => s,
            other => other.to_string(),
        };
        let _ = writeln!(
            out,
            "{:<24} {:<40} {}",
            clip(&m.context_key, 24),
            clip(&value, 40),
            m.updated_by.as_deref().unwrap_or("-")
        );
    }
    out
}

pub fn render_stats(stats: &DashboardStats) -> String {
    format!(
        "Agents   {} total, {} active\n\
         Tasks    {} total: {} pending, {} in progress, {} completed, {} failed, {} cancelled\n\
         Progress {:.0}% complete\n\
         Memory   {} entries\n",
        stats.total_agents,
        stats.active_agents,
        stats.total_tasks,
        stats.pending_tasks,
        stats.in_progress_tasks,
        stats.completed_tasks,
        stats.failed_tasks,
        stats.cancelled_tasks,
        stats.completion_ratio() * 100.0,
        stats.memory_entries,
    )
}

pub fn render_node(detail: &NodeDetail) -> String {
    let mut out = format!(
        "{} ({})\n",
        detail.node_id,
        detail.node_type.as_deref().unwrap_or("unknown")
    );
    if let Value::Object(fields) = &detail.data {
        for (k, v) in fields {
            let shown = match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            let _ = writeln!(out, "  {k:<20} {shown}");
        }
    }
    if !detail.relationships.is_empty() {
        let _ = writeln!(out, "  relationships: {}", detail.relationships.len());
    }
    out
}

pub fn render_snapshot_summary(snapshot: &GraphSnapshot, dropped_edges: usize) -> String {
    let mut groups: BTreeMap<&str, usize> = BTreeMap::new();
    for n in &snapshot.nodes {
        *groups.entry(n.group.as_str()).or_default() += 1;
    }
    let mut kinds: BTreeMap<&str, usize> = BTreeMap::new();
    for e in &snapshot.edges {
        *kinds.entry(e.kind().as_str()).or_default() += 1;
    }

    let mut out = format!("{} nodes, {} edges\n", snapshot.nodes.len(), snapshot.edges.len());
    for (group, count) in &groups {
        let _ = writeln!(out, "  {group:<10} {count}");
    }
    for (kind, count) in &kinds {
        let _ = writeln!(out, "  -> {kind:<14} {count}");
    }
    if dropped_edges > 0 {
        let _ = writeln!(out, "  ({dropped_edges} edges dropped: endpoint missing)");
    }
    let admins = snapshot
        .nodes
        .iter()
        .filter(|n| n.group == NodeGroup::Admin)
        .count();
    if admins == 0 {
        out.push_str("  (no admin root in snapshot)\n");
    }
    out
}

pub fn render_changes(changes: &ChangeSet) -> String {
    if changes.is_empty() {
        return "no changes".to_string();
    }
    let mut out = format!(
        "nodes +{} ~{} -{}, edges +{} ~{} -{}",
        changes.nodes.added.len(),
        changes.nodes.updated.len(),
        changes.nodes.removed.len(),
        changes.edges.added.len(),
        changes.edges.updated.len(),
        changes.edges.removed.len(),
    );
    if changes.dropped_edges > 0 {
        let _ = write!(out, " ({} dangling dropped)", changes.dropped_edges);
    }
    out
}
