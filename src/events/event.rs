//! # Lifecycle events emitted by the controller, key actors and subscribers.
//!
//! The [`EventKind`] enum classifies event types across three categories:
//! - **Status events**: what observers of the overlay see (started, stopped, error, status list)
//! - **Scheduling events**: debounced restarts being armed, cancelled or drained
//! - **Runtime events**: shutdown progress and subscriber health
//!
//! The [`Event`] struct carries the metadata relevant to each kind: stream key,
//! generation, params, exit status and so on.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//! Use `seq` to restore the exact order when events are delivered out of order.
//!
//! ## Example
//! ```rust
//! use rendervisor::{Event, EventKind, StreamKey};
//!
//! let key = StreamKey::new("test").unwrap();
//! let ev = Event::new(EventKind::Error)
//!     .with_key(&key)
//!     .with_generation(3)
//!     .with_reason("spawn_launch_failed");
//!
//! assert_eq!(ev.kind, EventKind::Error);
//! assert_eq!(ev.key.as_ref().map(StreamKey::as_str), Some("test"));
//! assert_eq!(ev.generation, Some(3));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime};

use crate::{core::StreamKey, process::ProcessExit, render::RenderParams, state::ScoreState};

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    // === Status events ===
    /// A renderer process is running for the key.
    ///
    /// Sets:
    /// - `key`, `generation`
    /// - `params`: params the process was started with
    Started,

    /// The renderer process for the key is gone and its record removed.
    ///
    /// Emitted once per generation, whether stopped on request or exited on its own.
    ///
    /// Sets:
    /// - `key`, `generation`
    /// - `exit`: how the process ended
    Stopped,

    /// Starting a renderer failed. The key is absent again; no retry.
    ///
    /// Sets:
    /// - `key`, `generation` (the generation that was consumed)
    /// - `reason`: error label and message
    Error,

    /// Active keys and current state, on request.
    ///
    /// Sets:
    /// - `active`: sorted active keys
    /// - `state`: current score record
    StatusList,

    // === Scheduling events ===
    /// A deferred start or restart was armed (or re-armed).
    ///
    /// Sets:
    /// - `key`
    /// - `generation`: generation the restart is bound to (absent for deferred starts)
    /// - `delay_ms`: quiet window
    RestartScheduled,

    /// A pending deferred action was dropped (stopped, superseded or stale).
    ///
    /// Sets:
    /// - `key`, `reason`
    /// - `generation`: bound generation, when there was one
    RestartCancelled,

    /// A queued command was drained during shutdown without running.
    ///
    /// Sets:
    /// - `key`
    CommandCancelled,

    /// The grace period elapsed and the process was killed.
    ///
    /// Sets:
    /// - `key`, `generation`
    ForceKilled,

    // === Runtime events ===
    /// Shutdown requested (OS signal observed or `shutdown()` called).
    ShutdownRequested,

    /// Every renderer process has been stopped during shutdown.
    AllStopped,

    /// Subscriber dropped an event (queue full or worker closed).
    ///
    /// Sets:
    /// - `reason`: `subscriber=<name> reason=<full|closed>`
    SubscriberOverflow,

    /// Subscriber panicked during event processing.
    ///
    /// Sets:
    /// - `reason`: `subscriber=<name> panic=<info>`
    SubscriberPanicked,
}

impl EventKind {
    /// Short stable label (kebab-case) for logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            EventKind::Started => "started",
            EventKind::Stopped => "stopped",
            EventKind::Error => "error",
            EventKind::StatusList => "status-list",
            EventKind::RestartScheduled => "restart-scheduled",
            EventKind::RestartCancelled => "restart-cancelled",
            EventKind::CommandCancelled => "command-cancelled",
            EventKind::ForceKilled => "force-killed",
            EventKind::ShutdownRequested => "shutdown-requested",
            EventKind::AllStopped => "all-stopped",
            EventKind::SubscriberOverflow => "subscriber-overflow",
            EventKind::SubscriberPanicked => "subscriber-panicked",
        }
    }
}

/// Runtime event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,

    /// Stream key, if applicable.
    pub key: Option<StreamKey>,
    /// Process generation, if applicable.
    pub generation: Option<u64>,
    /// Human-readable reason (errors, cancellation causes, overflow details).
    pub reason: Option<Arc<str>>,
    /// Params a process was started with.
    pub params: Option<Arc<RenderParams>>,
    /// How a process ended.
    pub exit: Option<ProcessExit>,
    /// Debounce / settle delay in milliseconds (compact).
    pub delay_ms: Option<u32>,
    /// Active keys (status list).
    pub active: Option<Arc<[StreamKey]>>,
    /// Score record (status list).
    pub state: Option<Arc<ScoreState>>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            key: None,
            generation: None,
            reason: None,
            params: None,
            exit: None,
            delay_ms: None,
            active: None,
            state: None,
        }
    }

    #[inline]
    pub fn with_key(mut self, key: &StreamKey) -> Self {
        self.key = Some(key.clone());
        self
    }

    #[inline]
    pub fn with_generation(mut self, generation: u64) -> Self {
        self.generation = Some(generation);
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    #[inline]
    pub fn with_params(mut self, params: Arc<RenderParams>) -> Self {
        self.params = Some(params);
        self
    }

    #[inline]
    pub fn with_exit(mut self, exit: ProcessExit) -> Self {
        self.exit = Some(exit);
        self
    }

    /// Attaches a delay (stored as milliseconds).
    #[inline]
    pub fn with_delay(mut self, d: Duration) -> Self {
        let ms = u32::try_from(d.as_millis()).unwrap_or(u32::MAX);
        self.delay_ms = Some(ms);
        self
    }

    /// Attaches the status list payload.
    pub fn with_status(mut self, active: Vec<StreamKey>, state: ScoreState) -> Self {
        self.active = Some(active.into());
        self.state = Some(Arc::new(state));
        self
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_reason(format!("subscriber={subscriber} reason={reason}"))
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_reason(format!("subscriber={subscriber} panic={info}"))
    }

    /// True for the four events forwarded to overlay observers.
    #[inline]
    pub fn is_status(&self) -> bool {
        matches!(
            self.kind,
            EventKind::Started | EventKind::Stopped | EventKind::Error | EventKind::StatusList
        )
    }

    #[inline]
    pub fn is_for(&self, key: &StreamKey) -> bool {
        self.key.as_ref() == Some(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seq_is_monotonic() {
        let a = Event::new(EventKind::Started);
        let b = Event::new(EventKind::Stopped);
        assert!(b.seq > a.seq);
    }

    #[test]
    fn status_list_payload() {
        let keys = vec![StreamKey::new("a").unwrap(), StreamKey::new("b").unwrap()];
        let ev = Event::new(EventKind::StatusList).with_status(keys, ScoreState::default());
        assert!(ev.is_status());
        assert_eq!(ev.active.as_deref().map(<[StreamKey]>::len), Some(2));
        assert_eq!(
            ev.state.as_ref().and_then(|s| s.get("team1").map(str::to_owned)),
            Some("India".to_owned())
        );
    }

    #[test]
    fn delay_saturates() {
        let ev = Event::new(EventKind::RestartScheduled).with_delay(Duration::from_secs(u64::MAX));
        assert_eq!(ev.delay_ms, Some(u32::MAX));
    }
}
