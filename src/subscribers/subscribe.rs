//! # Subscriber trait
//!
//! `Subscribe` is the extension point for reacting to lifecycle events: an
//! outbound broadcaster that forwards status events to overlay clients, a
//! metrics exporter, an audit trail. Each subscriber gets its own worker and
//! bounded queue inside [`SubscriberSet`](crate::SubscriberSet), so a slow one
//! never delays the key actors or the other subscribers.
//!
//! ## Example
//! ```rust
//! use async_trait::async_trait;
//! use rendervisor::{Event, Subscribe};
//!
//! struct StatusForwarder;
//!
//! #[async_trait]
//! impl Subscribe for StatusForwarder {
//!     async fn on_event(&self, ev: &Event) {
//!         if ev.is_status() {
//!             // push to websocket clients...
//!         }
//!     }
//!     fn name(&self) -> &'static str { "status-forwarder" }
//! }
//! ```

use async_trait::async_trait;

use crate::events::Event;

/// Contract for event subscribers.
///
/// Called from the subscriber's dedicated worker task; may await freely but
/// should not block the runtime thread.
#[async_trait]
pub trait Subscribe: Send + Sync + 'static {
    /// Handles one event.
    async fn on_event(&self, event: &Event);

    /// Human-readable name (for logs).
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Capacity of this subscriber's queue. Overflowing events are dropped
    /// for this subscriber only and reported as `SubscriberOverflow`.
    fn queue_capacity(&self) -> usize {
        1024
    }
}
