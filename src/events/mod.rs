//! Lifecycle events: types and broadcast bus.
//!
//! - [`EventKind`], [`Event`]: classification and payload
//! - [`Bus`]: thin wrapper over `tokio::sync::broadcast`
//!
//! Publishers are the key actors (every transition of a key), the controller
//! (shutdown, status list) and the subscriber fan-out (overflow/panic).
//! Status events (`Started`, `Stopped`, `Error`, `StatusList`) are what an
//! outbound broadcaster would forward to overlay observers.

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
