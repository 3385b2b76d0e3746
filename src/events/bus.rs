//! # Broadcast bus for lifecycle events.
//!
//! ```text
//! publishers (many)                          receivers (many)
//!   key actors ─────┐                      ┌─► subscriber fan-out (SubscriberSet)
//!   controller ─────┼──► Bus (broadcast) ──┼─► LifecycleController::subscribe()
//!   subscriber set ─┘                      └─► tests / demos
//! ```
//!
//! - `publish` never blocks and never fails; without receivers the event is dropped.
//! - The ring buffer is shared: a receiver that falls more than `capacity`
//!   events behind gets `RecvError::Lagged(n)` and skips the oldest `n`.

use tokio::sync::broadcast;

use super::event::Event;

/// Cloneable handle to the event channel.
#[derive(Clone, Debug)]
pub struct Bus {
    tx: broadcast::Sender<Event>,
}

impl Bus {
    /// Creates a bus holding up to `capacity` undelivered events (min 1).
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Fire-and-forget publish.
    pub fn publish(&self, ev: Event) {
        let _ = self.tx.send(ev);
    }

    /// Receiver for events published after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }
}
