#![cfg(unix)]

use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use rendervisor::{
    CommandRenderer, Config, ControlError, Event, EventKind, LifecycleController, RenderParams,
    ScoreState, StreamKey, Subscribe, score,
};
use tokio::sync::broadcast;

fn cfg() -> Config {
    Config {
        grace: Duration::from_millis(300),
        debounce: Duration::from_millis(300),
        settle_delay: Duration::from_millis(200),
        ..Config::default()
    }
}

fn controller() -> LifecycleController {
    LifecycleController::builder(cfg())
        .with_renderer(CommandRenderer::new("sleep", ["30"]))
        .build()
}

fn key(s: &str) -> StreamKey {
    StreamKey::new(s).unwrap()
}

fn params(status: &str) -> RenderParams {
    RenderParams::from_state(ScoreState::default().with(score::STATUS, status))
}

fn drain(rx: &mut broadcast::Receiver<Event>) -> Vec<Event> {
    std::iter::from_fn(|| rx.try_recv().ok()).collect()
}

fn count(events: &[Event], kind: EventKind) -> usize {
    events.iter().filter(|e| e.kind == kind).count()
}

#[tokio::test]
async fn concurrent_duplicate_starts_spawn_once() {
    let ctl = controller();
    let mut rx = ctl.subscribe();
    let k = key("test");

    let (a, b) = tokio::join!(ctl.start(&k, params("a")), ctl.start(&k, params("b")));
    assert!(a.unwrap() ^ b.unwrap());
    assert_eq!(ctl.generation(&k).await, 1);
    assert_eq!(ctl.active_keys().await, vec![k.clone()]);

    let events = drain(&mut rx);
    assert_eq!(count(&events, EventKind::Started), 1);
    ctl.shutdown().await;
}

#[tokio::test]
async fn stop_of_absent_key_has_no_side_effects() {
    let ctl = controller();
    let mut rx = ctl.subscribe();
    let k = key("ghost");

    assert!(!ctl.stop(&k).await.unwrap());
    assert_eq!(ctl.generation(&k).await, 0);
    assert!(drain(&mut rx).is_empty());
    ctl.shutdown().await;
}

#[tokio::test]
async fn restart_without_process_is_a_noop() {
    let ctl = controller();
    let k = key("idle");

    assert!(!ctl.restart(&k, params("x"), Duration::from_millis(50)).await.unwrap());
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(ctl.active_keys().await.is_empty());
    assert_eq!(ctl.generation(&k).await, 0);
    ctl.shutdown().await;
}

#[tokio::test]
async fn restart_burst_coalesces_into_one_with_latest_params() {
    let ctl = controller();
    let mut rx = ctl.subscribe();
    let k = key("test");
    let debounce = Duration::from_millis(300);

    ctl.start(&k, params("initial")).await.unwrap();
    assert!(ctl.restart(&k, params("p1"), debounce).await.unwrap());
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(ctl.restart(&k, params("p2"), debounce).await.unwrap());

    tokio::time::sleep(Duration::from_millis(1200)).await;
    assert_eq!(ctl.generation(&k).await, 2);

    let events = drain(&mut rx);
    assert_eq!(count(&events, EventKind::RestartScheduled), 2);
    assert_eq!(count(&events, EventKind::Stopped), 1);

    let started: Vec<_> = events.iter().filter(|e| e.kind == EventKind::Started).collect();
    assert_eq!(started.len(), 2);
    let last = started[1];
    assert_eq!(last.generation, Some(2));
    assert_eq!(
        last.params.as_ref().and_then(|p| p.state.get(score::STATUS)),
        Some("p2")
    );
    ctl.shutdown().await;
}

#[tokio::test]
async fn stop_cancels_pending_restart() {
    let ctl = controller();
    let mut rx = ctl.subscribe();
    let k = key("test");

    ctl.start(&k, params("initial")).await.unwrap();
    ctl.restart(&k, params("next"), Duration::from_millis(300))
        .await
        .unwrap();
    assert!(ctl.stop(&k).await.unwrap());

    tokio::time::sleep(Duration::from_millis(700)).await;
    assert!(ctl.active_keys().await.is_empty());
    assert_eq!(ctl.generation(&k).await, 1);

    let events = drain(&mut rx);
    assert_eq!(count(&events, EventKind::Started), 1);
    let cancelled = events
        .iter()
        .find(|e| e.kind == EventKind::RestartCancelled)
        .expect("restart cancelled");
    assert_eq!(cancelled.reason.as_deref(), Some("stopped"));
    ctl.shutdown().await;
}

#[tokio::test]
async fn stop_cancels_settling_start() {
    let ctl = controller();
    let k = key("test");

    assert!(ctl.start_after(&k, params("x"), Duration::from_millis(300)).await.unwrap());
    assert!(!ctl.stop(&k).await.unwrap());

    tokio::time::sleep(Duration::from_millis(600)).await;
    assert!(ctl.active_keys().await.is_empty());
    assert_eq!(ctl.generation(&k).await, 0);
    ctl.shutdown().await;
}

#[tokio::test]
async fn spawn_failure_leaves_key_absent() {
    let ctl = LifecycleController::builder(cfg())
        .with_renderer(CommandRenderer::new("/nonexistent/renderer-binary", ["x"]))
        .build();
    let mut rx = ctl.subscribe();
    let k = key("test");

    let err = ctl.start(&k, params("x")).await.unwrap_err();
    assert!(matches!(err, ControlError::Spawn(_)));
    assert!(ctl.active_keys().await.is_empty());
    assert!(ctl.last_error(&k).await.is_some());

    let events = drain(&mut rx);
    assert_eq!(count(&events, EventKind::Error), 1);
    assert_eq!(count(&events, EventKind::Started), 0);
    ctl.shutdown().await;
}

#[tokio::test]
async fn restart_all_bursts_restart_each_key_once() {
    let ctl = controller();
    let mut rx = ctl.subscribe();
    let (a, b) = (key("a"), key("b"));

    ctl.start(&a, params("0")).await.unwrap();
    ctl.start(&b, params("0")).await.unwrap();
    for i in 1..=3 {
        let n = ctl
            .restart_all(params(&i.to_string()), Duration::from_millis(300))
            .await
            .unwrap();
        assert_eq!(n, 2);
    }

    tokio::time::sleep(Duration::from_millis(1200)).await;
    assert_eq!(ctl.generation(&a).await, 2);
    assert_eq!(ctl.generation(&b).await, 2);

    let events = drain(&mut rx);
    assert_eq!(count(&events, EventKind::Started), 4);
    assert_eq!(count(&events, EventKind::Stopped), 2);
    ctl.shutdown().await;
}

#[tokio::test]
async fn debounced_restart_keeps_running_style() {
    let ctl = controller();
    let k = key("test");

    ctl.start(&k, params("x").with_style("world_cup")).await.unwrap();
    ctl.restart(&k, params("y"), Duration::from_millis(100))
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(800)).await;
    let snap = ctl.get(&k).await.unwrap();
    assert_eq!(snap.generation, 2);
    assert_eq!(snap.style.as_deref(), Some("world_cup"));
    ctl.shutdown().await;
}

#[tokio::test]
async fn replace_restarts_immediately_with_new_style() {
    let ctl = controller();
    let k = key("test");

    ctl.start(&k, params("x")).await.unwrap();
    assert!(ctl.replace(&k, params("x").with_style("minimal_clean")).await.unwrap());

    let snap = ctl.get(&k).await.unwrap();
    assert_eq!(snap.generation, 2);
    assert_eq!(snap.style.as_deref(), Some("minimal_clean"));
    ctl.shutdown().await;
}

#[tokio::test]
async fn shutdown_stops_everything_and_refuses_commands() {
    let ctl = controller();
    let mut rx = ctl.subscribe();

    ctl.start(&key("a"), params("x")).await.unwrap();
    ctl.start(&key("b"), params("x")).await.unwrap();
    ctl.shutdown().await;

    assert!(ctl.active_keys().await.is_empty());
    let kinds: Vec<_> = drain(&mut rx).into_iter().map(|e| e.kind).collect();
    let requested = kinds.iter().position(|k| *k == EventKind::ShutdownRequested).unwrap();
    let all_stopped = kinds.iter().position(|k| *k == EventKind::AllStopped).unwrap();
    let stopped = kinds[requested..all_stopped]
        .iter()
        .filter(|k| **k == EventKind::Stopped)
        .count();
    assert_eq!(stopped, 2);

    let err = ctl.start(&key("a"), params("x")).await.unwrap_err();
    assert!(matches!(err, ControlError::Closed));
}

struct Counter(Arc<AtomicUsize>);

#[async_trait]
impl Subscribe for Counter {
    async fn on_event(&self, ev: &Event) {
        if ev.is_status() {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn name(&self) -> &'static str {
        "counter"
    }
}

#[tokio::test]
async fn subscribers_see_status_events_before_shutdown_returns() {
    let seen = Arc::new(AtomicUsize::new(0));
    let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(Counter(Arc::clone(&seen)))];
    let ctl = LifecycleController::builder(cfg())
        .with_renderer(CommandRenderer::new("sleep", ["30"]))
        .with_subscribers(subs)
        .build();

    ctl.start(&key("test"), params("x")).await.unwrap();
    ctl.shutdown().await;

    // Started + Stopped
    assert_eq!(seen.load(Ordering::SeqCst), 2);
}
