//! External renderer processes.

mod handle;

pub use handle::{OnExit, ProcessExit, RendererProcessHandle};
