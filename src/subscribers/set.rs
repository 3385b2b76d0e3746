//! # Non-blocking fan-out over subscribers.
//!
//! ```text
//!    emit(Event)
//!        │              (Arc-clone per subscriber)
//!        ├──────► [queue S1] ─► worker S1 ─► on_event()
//!        ├──────► [queue S2] ─► worker S2 ─► on_event()
//!        └──────► [queue SN] ─► worker SN ─► on_event() ── panic ─► SubscriberPanicked
//! ```
//!
//! - `emit` returns immediately; per-subscriber FIFO.
//! - Full or closed queue: the event is dropped for that subscriber and a
//!   `SubscriberOverflow` is published (never for an overflow event itself).
//! - Panics are caught with `catch_unwind` and published as `SubscriberPanicked`.

use std::sync::Arc;

use futures::FutureExt;
use tokio::{sync::mpsc, task::JoinHandle};

use crate::events::{Bus, Event, EventKind};

use super::Subscribe;

struct Channel {
    name: &'static str,
    sender: mpsc::Sender<Arc<Event>>,
}

/// Fan-out coordinator with one queue and worker per subscriber.
pub struct SubscriberSet {
    channels: Vec<Channel>,
    workers: Vec<JoinHandle<()>>,
    bus: Bus,
}

impl SubscriberSet {
    /// Spawns one worker per subscriber. Must be called inside a runtime.
    #[must_use]
    pub fn new(subs: Vec<Arc<dyn Subscribe>>, bus: Bus) -> Self {
        let mut channels = Vec::with_capacity(subs.len());
        let mut workers = Vec::with_capacity(subs.len());

        for sub in subs {
            let name = sub.name();
            let (tx, mut rx) = mpsc::channel::<Arc<Event>>(sub.queue_capacity().max(1));
            let worker_bus = bus.clone();

            workers.push(tokio::spawn(async move {
                while let Some(ev) = rx.recv().await {
                    let fut = sub.on_event(ev.as_ref());
                    if let Err(panic) = std::panic::AssertUnwindSafe(fut).catch_unwind().await {
                        let any = &*panic;
                        let info = any
                            .downcast_ref::<&'static str>()
                            .map(|s| (*s).to_owned())
                            .or_else(|| any.downcast_ref::<String>().cloned())
                            .unwrap_or_else(|| "unknown panic".to_owned());
                        tracing::error!(subscriber = name, %info, "subscriber panicked");
                        worker_bus.publish(Event::subscriber_panicked(name, info));
                    }
                }
            }));
            channels.push(Channel { name, sender: tx });
        }

        Self {
            channels,
            workers,
            bus,
        }
    }

    /// Delivers `event` to every subscriber queue without waiting.
    pub fn emit(&self, event: Event) {
        let event = Arc::new(event);
        let is_overflow = matches!(event.kind, EventKind::SubscriberOverflow);

        for ch in &self.channels {
            let reason = match ch.sender.try_send(Arc::clone(&event)) {
                Ok(()) => continue,
                Err(mpsc::error::TrySendError::Full(_)) => "full",
                Err(mpsc::error::TrySendError::Closed(_)) => "closed",
            };
            tracing::warn!(subscriber = ch.name, reason, kind = event.kind.as_label(), "event dropped");
            if !is_overflow {
                self.bus.publish(Event::subscriber_overflow(ch.name, reason));
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    /// Closes every queue and waits for the workers to drain.
    pub async fn shutdown(self) {
        drop(self.channels);
        for worker in self.workers {
            let _ = worker.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<EventKind>>);

    #[async_trait]
    impl Subscribe for Recorder {
        async fn on_event(&self, ev: &Event) {
            self.0.lock().unwrap().push(ev.kind);
        }
        fn name(&self) -> &'static str {
            "recorder"
        }
    }

    struct Panicker;

    #[async_trait]
    impl Subscribe for Panicker {
        async fn on_event(&self, _ev: &Event) {
            panic!("boom");
        }
        fn name(&self) -> &'static str {
            "panicker"
        }
    }

    #[tokio::test]
    async fn delivers_in_order_and_drains_on_shutdown() {
        let bus = Bus::new(16);
        let rec = Arc::new(Recorder::default());
        let set = SubscriberSet::new(vec![rec.clone() as Arc<dyn Subscribe>], bus);

        set.emit(Event::new(EventKind::Started));
        set.emit(Event::new(EventKind::Stopped));
        set.shutdown().await;

        assert_eq!(
            rec.0.lock().unwrap().as_slice(),
            &[EventKind::Started, EventKind::Stopped]
        );
    }

    #[tokio::test]
    async fn panic_is_isolated_and_reported() {
        let bus = Bus::new(16);
        let mut rx = bus.subscribe();
        let rec = Arc::new(Recorder::default());
        let set = SubscriberSet::new(
            vec![Arc::new(Panicker) as Arc<dyn Subscribe>, rec.clone()],
            bus,
        );

        set.emit(Event::new(EventKind::Started));
        let ev = rx.recv().await.unwrap();
        assert_eq!(ev.kind, EventKind::SubscriberPanicked);
        assert!(ev.reason.as_deref().unwrap().contains("boom"));

        set.shutdown().await;
        assert_eq!(rec.0.lock().unwrap().as_slice(), &[EventKind::Started]);
    }
}
