//! Runtime core: keyed actors, registry, debouncing and the public controller.
//!
//! ```text
//!            LifecycleController (clone per caller)
//!                     │ call(key, op)
//!        ┌────────────┼────────────┐
//!        ▼            ▼            ▼
//!   KeyActor(a)  KeyActor(b)  KeyActor(c)      one FIFO per key
//!        │            │            │
//!        └──────┬─────┴──────┬─────┘
//!               ▼            ▼
//!       ProcessRegistry  RestartDebouncer ──► Fire{ticket} back into the actor
//!               │
//!               ▼
//!     RendererProcessHandle ── exit ──► Exited{generation} back into the actor
//! ```
//!
//! Internal modules:
//! - [`actor`]: per-key serializer, applies every operation;
//! - [`registry`]: key → record, generations, snapshots;
//! - [`debounce`]: one pending deferred action per key;
//! - [`controller`]: public API and shutdown;
//! - [`shutdown`]: OS termination signals.

mod actor;
mod builder;
mod config;
mod controller;
mod debounce;
mod key;
mod registry;
mod shutdown;

pub use builder::ControllerBuilder;
pub use config::{Config, KeyPolicy};
pub use controller::{Command, LifecycleController};
pub use key::StreamKey;
pub use registry::{ProcessState, RecordSnapshot};
