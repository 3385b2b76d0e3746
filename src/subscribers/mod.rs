//! # Event subscribers.
//!
//! ```text
//! key actors ── publish(Event) ──► Bus ──► listener ──► SubscriberSet::emit
//!                                                           ├─► LogWriter (tracing)
//!                                                           ├─► status forwarder (user)
//!                                                           └─► ...
//! ```
//!
//! Implement [`Subscribe`] to plug in an outbound broadcaster; pass it to
//! [`ControllerBuilder::with_subscribers`](crate::ControllerBuilder::with_subscribers).

#[cfg(feature = "logging")]
mod log;
mod set;
mod subscribe;

#[cfg(feature = "logging")]
pub use log::LogWriter;
pub use set::SubscriberSet;
pub use subscribe::Subscribe;
