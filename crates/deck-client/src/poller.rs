//! Periodic, cancellable snapshot fetching.
//!
//! Every fetch is tagged with an increasing sequence number and runs in
//! its own task. A result older than the newest one already delivered is
//! dropped, so a slow response can never overwrite a newer view.
//! Interval ticks and manual refreshes bypass the response cache, so a
//! cached payload is never reported as a new refresh.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use deck_protocol::{Agent, MemoryEntry, Task};
use serde_json::Value;
use tokio::sync::{mpsc, watch};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{Instant, MissedTickBehavior};

use crate::api::ApiClient;
use crate::error::ClientError;

/// Anything the poller can fetch from.
pub trait SnapshotSource: Send + Sync + 'static {
    type Snapshot: Send + 'static;

    /// `force` asks the source to bypass any response cache.
    fn fetch_snapshot(
        &self,
        force: bool,
    ) -> impl Future<Output = Result<Self::Snapshot, ClientError>> + Send;
}

/// The graph endpoint, raw. Decoding happens in the graph view.
pub struct GraphFeed(pub ApiClient);

impl SnapshotSource for GraphFeed {
    type Snapshot = Value;

    async fn fetch_snapshot(&self, force: bool) -> Result<Value, ClientError> {
        self.0.graph_data(force).await
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TablesSnapshot {
    pub agents: Vec<Agent>,
    pub tasks: Vec<Task>,
    pub memories: Vec<MemoryEntry>,
}

/// Agents, tasks and memories, fetched together.
pub struct TablesFeed(pub ApiClient);

impl SnapshotSource for TablesFeed {
    type Snapshot = TablesSnapshot;

    async fn fetch_snapshot(&self, force: bool) -> Result<TablesSnapshot, ClientError> {
        let (agents, tasks, memories) = futures_util::future::try_join3(
            self.0.list_agents(force),
            self.0.list_tasks(force),
            self.0.list_memories(force),
        )
        .await?;
        Ok(TablesSnapshot {
            agents,
            tasks,
            memories,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchStatus {
    Idle,
    Loading,
    Success,
    Error(String),
}

impl FetchStatus {
    pub fn label(&self) -> &str {
        match self {
            FetchStatus::Idle => "idle",
            FetchStatus::Loading => "loading",
            FetchStatus::Success => "ok",
            FetchStatus::Error(_) => "error",
        }
    }
}

#[derive(Debug)]
pub enum PollEvent<T> {
    /// A fetch started. `visible` is set for the first load and for forced
    /// refreshes; background ticks stay quiet.
    Loading { seq: u64, visible: bool },
    Snapshot {
        seq: u64,
        data: T,
        fetched_at: DateTime<Utc>,
    },
    Failed {
        seq: u64,
        message: String,
        retryable: bool,
    },
}

#[derive(Debug, Clone)]
pub struct PollerConfig {
    pub name: &'static str,
    pub interval: Duration,
    /// Start with periodic refresh on.
    pub live: bool,
    /// How long Success/Error is shown before falling back to Idle.
    pub status_linger: Duration,
    pub channel_capacity: usize,
}

impl PollerConfig {
    pub fn new(name: &'static str, interval: Duration) -> Self {
        Self {
            name,
            interval,
            live: true,
            status_linger: Duration::from_secs(2),
            channel_capacity: 32,
        }
    }
}

#[derive(Debug)]
enum PollCommand {
    Refresh,
    SetLive(bool),
}

/// Control side of a running poller. Dropping it stops the poller.
pub struct PollerHandle {
    commands: mpsc::UnboundedSender<PollCommand>,
    shutdown: watch::Sender<bool>,
    status: watch::Receiver<FetchStatus>,
    task: JoinHandle<()>,
}

impl PollerHandle {
    /// Fetch now, bypassing the cache.
    pub fn refresh(&self) {
        let _ = self.commands.send(PollCommand::Refresh);
    }

    pub fn set_live(&self, live: bool) {
        let _ = self.commands.send(PollCommand::SetLive(live));
    }

    pub fn status(&self) -> FetchStatus {
        self.status.borrow().clone()
    }

    /// Stop the loop and abort in-flight fetches.
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(true);
    }

    /// Shut down and wait for the loop to exit.
    pub async fn join(self) {
        self.shutdown();
        if let Err(e) = self.task.await {
            tracing::warn!(error = %e, "Poller task ended abnormally");
        }
    }
}

pub struct Poller;

impl Poller {
    /// Start polling `source`. The first fetch happens immediately.
    pub fn spawn<S: SnapshotSource>(
        source: S,
        config: PollerConfig,
    ) -> (PollerHandle, mpsc::Receiver<PollEvent<S::Snapshot>>) {
        let (event_tx, event_rx) = mpsc::channel(config.channel_capacity.max(1));
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (status_tx, status_rx) = watch::channel(FetchStatus::Idle);

        let task = tokio::spawn(run(
            Arc::new(source),
            config,
            cmd_rx,
            shutdown_rx,
            status_tx,
            event_tx,
        ));

        (
            PollerHandle {
                commands: cmd_tx,
                shutdown: shutdown_tx,
                status: status_rx,
                task,
            },
            event_rx,
        )
    }
}

struct PollState<S: SnapshotSource> {
    source: Arc<S>,
    in_flight: JoinSet<(u64, Result<S::Snapshot, ClientError>)>,
    next_seq: u64,
    newest_delivered: u64,
    first_load: bool,
}

impl<S: SnapshotSource> PollState<S> {
    /// `fresh` bypasses the response cache; `requested` marks a user action.
    fn start_fetch(&mut self, fresh: bool, requested: bool) -> (u64, bool) {
        self.next_seq += 1;
        let seq = self.next_seq;
        let source = Arc::clone(&self.source);
        self.in_flight
            .spawn(async move { (seq, source.fetch_snapshot(fresh).await) });
        (seq, self.first_load || requested)
    }
}

async fn run<S: SnapshotSource>(
    source: Arc<S>,
    config: PollerConfig,
    mut commands: mpsc::UnboundedReceiver<PollCommand>,
    mut shutdown: watch::Receiver<bool>,
    status: watch::Sender<FetchStatus>,
    events: mpsc::Sender<PollEvent<S::Snapshot>>,
) {
    let name = config.name;
    let mut state = PollState {
        source,
        in_flight: JoinSet::new(),
        next_seq: 0,
        newest_delivered: 0,
        first_load: true,
    };
    let mut live = config.live;
    let period = config.interval.max(Duration::from_millis(10));
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut linger_until: Option<Instant> = None;

    tracing::debug!(poller = name, interval_secs = config.interval.as_secs(), live, "Poller started");

    // The first load may be served from the cache; later ones never are.
    let (seq, visible) = state.start_fetch(false, false);
    status.send_replace(FetchStatus::Loading);
    if events.send(PollEvent::Loading { seq, visible }).await.is_err() {
        return;
    }

    loop {
        let mut started: Option<(u64, bool)> = None;

        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
            cmd = commands.recv() => match cmd {
                Some(PollCommand::Refresh) => {
                    tracing::debug!(poller = name, "Forced refresh");
                    started = Some(state.start_fetch(true, true));
                }
                Some(PollCommand::SetLive(on)) => {
                    if on && !live {
                        ticker.reset();
                    }
                    live = on;
                    tracing::info!(poller = name, live, "Live refresh toggled");
                }
                None => break,
            },
            _ = ticker.tick(), if live => {
                started = Some(state.start_fetch(true, false));
            }
            Some(joined) = state.in_flight.join_next() => {
                let (seq, result) = match joined {
                    Ok(done) => done,
                    Err(e) if e.is_cancelled() => continue,
                    Err(e) => {
                        tracing::warn!(poller = name, error = %e, "Fetch task panicked");
                        continue;
                    }
                };
                if seq <= state.newest_delivered {
                    tracing::debug!(
                        poller = name,
                        seq,
                        newest = state.newest_delivered,
                        "Discarding stale result"
                    );
                    continue;
                }
                state.newest_delivered = seq;

                let event = match result {
                    Ok(data) => {
                        state.first_load = false;
                        status.send_replace(FetchStatus::Success);
                        PollEvent::Snapshot { seq, data, fetched_at: Utc::now() }
                    }
                    Err(e) => {
                        tracing::warn!(poller = name, seq, error = %e, "Fetch failed");
                        let message = e.user_message();
                        status.send_replace(FetchStatus::Error(message.clone()));
                        PollEvent::Failed { seq, message, retryable: e.is_retryable() }
                    }
                };
                linger_until = Some(Instant::now() + config.status_linger);
                if events.send(event).await.is_err() {
                    break;
                }
            }
            _ = tokio::time::sleep_until(linger_until.unwrap_or_else(Instant::now)), if linger_until.is_some() => {
                linger_until = None;
                if state.in_flight.is_empty() {
                    status.send_replace(FetchStatus::Idle);
                }
            }
        }

        if let Some((seq, visible)) = started {
            status.send_replace(FetchStatus::Loading);
            linger_until = None;
            if events.send(PollEvent::Loading { seq, visible }).await.is_err() {
                break;
            }
        }
    }

    let aborted = state.in_flight.len();
    state.in_flight.abort_all();
    status.send_replace(FetchStatus::Idle);
    tracing::debug!(poller = name, aborted, "Poller stopped");
}
