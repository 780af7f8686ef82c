//! Poller behaviour on a paused tokio clock.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use deck_client::*;
use tokio::sync::mpsc::Receiver;

/// Answers with its call number after a scripted delay.
#[derive(Clone, Default)]
struct ScriptedSource {
    delays: Arc<Mutex<VecDeque<Duration>>>,
    fail_calls: Arc<Mutex<Vec<u64>>>,
    calls: Arc<AtomicU64>,
    finished: Arc<AtomicU64>,
    forced: Arc<AtomicU64>,
}

impl ScriptedSource {
    fn with_delays(delays: &[u64]) -> Self {
        let source = Self::default();
        source
            .delays
            .lock()
            .unwrap()
            .extend(delays.iter().map(|s| Duration::from_secs(*s)));
        source
    }

    fn failing_on(self, calls: &[u64]) -> Self {
        self.fail_calls.lock().unwrap().extend_from_slice(calls);
        self
    }
}

impl SnapshotSource for ScriptedSource {
    type Snapshot = u64;

    async fn fetch_snapshot(&self, force: bool) -> Result<u64, ClientError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if force {
            self.forced.fetch_add(1, Ordering::SeqCst);
        }
        let delay = self.delays.lock().unwrap().pop_front().unwrap_or_default();
        tokio::time::sleep(delay).await;
        self.finished.fetch_add(1, Ordering::SeqCst);
        if self.fail_calls.lock().unwrap().contains(&call) {
            return Err(ClientError::Config(format!("call {call} failed")));
        }
        Ok(call)
    }
}

fn config(live: bool) -> PollerConfig {
    PollerConfig {
        live,
        ..PollerConfig::new("test", Duration::from_secs(5))
    }
}

async fn next(rx: &mut Receiver<PollEvent<u64>>) -> PollEvent<u64> {
    rx.recv().await.expect("poller closed its channel")
}

// ─── Sequence guard ──────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_slow_older_response_is_discarded() {
    let source = ScriptedSource::with_delays(&[5, 1]);
    let (handle, mut rx) = Poller::spawn(source.clone(), config(false));

    assert!(matches!(next(&mut rx).await, PollEvent::Loading { seq: 1, visible: true }));
    handle.refresh();
    assert!(matches!(next(&mut rx).await, PollEvent::Loading { seq: 2, visible: true }));
    assert!(matches!(next(&mut rx).await, PollEvent::Snapshot { seq: 2, .. }));

    // seq 1 finishes at t=5s and must not surface.
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(source.finished.load(Ordering::SeqCst), 2);
    assert!(rx.try_recv().is_err());

    handle.join().await;
}

#[tokio::test(start_paused = true)]
async fn test_forced_refresh_bypasses_cache() {
    let source = ScriptedSource::default();
    let (handle, mut rx) = Poller::spawn(source.clone(), config(false));
    next(&mut rx).await;
    next(&mut rx).await;
    assert_eq!(source.forced.load(Ordering::SeqCst), 0);

    handle.refresh();
    next(&mut rx).await;
    next(&mut rx).await;
    assert_eq!(source.forced.load(Ordering::SeqCst), 1);
    handle.join().await;
}

// ─── Live refresh ────────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_interval_ticks_ask_for_fresh_data() {
    let source = ScriptedSource::default();
    let (handle, mut rx) = Poller::spawn(source.clone(), config(true));
    next(&mut rx).await;
    next(&mut rx).await;
    assert_eq!(source.forced.load(Ordering::SeqCst), 0);

    assert!(matches!(next(&mut rx).await, PollEvent::Loading { seq: 2, visible: false }));
    next(&mut rx).await;
    assert!(matches!(next(&mut rx).await, PollEvent::Loading { seq: 3, visible: false }));
    next(&mut rx).await;
    assert_eq!(source.forced.load(Ordering::SeqCst), 2);
    handle.join().await;
}

#[tokio::test(start_paused = true)]
async fn test_background_ticks_are_quiet() {
    let (handle, mut rx) = Poller::spawn(ScriptedSource::default(), config(true));

    assert!(matches!(next(&mut rx).await, PollEvent::Loading { seq: 1, visible: true }));
    assert!(matches!(next(&mut rx).await, PollEvent::Snapshot { seq: 1, data: 1, .. }));
    assert!(matches!(next(&mut rx).await, PollEvent::Loading { seq: 2, visible: false }));
    assert!(matches!(next(&mut rx).await, PollEvent::Snapshot { seq: 2, data: 2, .. }));
    handle.join().await;
}

#[tokio::test(start_paused = true)]
async fn test_disabling_live_stops_ticks() {
    let source = ScriptedSource::default();
    let (handle, mut rx) = Poller::spawn(source.clone(), config(true));
    next(&mut rx).await;
    next(&mut rx).await;

    handle.set_live(false);
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert!(rx.try_recv().is_err());
    assert_eq!(source.calls.load(Ordering::SeqCst), 1);

    handle.set_live(true);
    assert!(matches!(next(&mut rx).await, PollEvent::Loading { seq: 2, .. }));
    handle.join().await;
}

// ─── Errors and status ───────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_failure_is_reported_and_loop_continues() {
    let source = ScriptedSource::default().failing_on(&[1]);
    let (handle, mut rx) = Poller::spawn(source, config(false));

    next(&mut rx).await;
    match next(&mut rx).await {
        PollEvent::Failed { seq, message, retryable } => {
            assert_eq!(seq, 1);
            assert!(message.contains("call 1 failed"));
            assert!(!retryable);
        }
        other => panic!("expected failure, got {other:?}"),
    }
    assert!(matches!(handle.status(), FetchStatus::Error(_)));

    handle.refresh();
    next(&mut rx).await;
    assert!(matches!(next(&mut rx).await, PollEvent::Snapshot { seq: 2, .. }));
    handle.join().await;
}

#[tokio::test(start_paused = true)]
async fn test_status_returns_to_idle_after_linger() {
    let (handle, mut rx) = Poller::spawn(ScriptedSource::default(), config(false));
    next(&mut rx).await;
    next(&mut rx).await;
    assert_eq!(handle.status(), FetchStatus::Success);

    tokio::time::sleep(Duration::from_secs(3)).await;
    assert_eq!(handle.status(), FetchStatus::Idle);
    handle.join().await;
}

// ─── Shutdown ────────────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_shutdown_aborts_in_flight_fetch() {
    let source = ScriptedSource::with_delays(&[60]);
    let (handle, mut rx) = Poller::spawn(source.clone(), config(true));
    next(&mut rx).await;

    handle.join().await;
    assert!(rx.recv().await.is_none(), "event channel closes on shutdown");

    tokio::time::sleep(Duration::from_secs(120)).await;
    assert_eq!(source.finished.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn test_dropping_handle_stops_poller() {
    let (handle, mut rx) = Poller::spawn(ScriptedSource::default(), config(true));
    next(&mut rx).await;
    drop(handle);
    while let Some(_event) = rx.recv().await {}
}
