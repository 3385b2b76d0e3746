//! # Renderer abstraction.
//!
//! A [`Renderer`] turns `(key, params)` into the concrete command line of one
//! external rendering process. It is pure: no process is started here, which
//! keeps argument construction testable and lets the controller treat the
//! binary as a black box.
//!
//! ```text
//! LifecycleController::start(key, params)
//!        └─► renderer.command(&key, &params) ─► RenderCommand { program, args }
//!                                                 └─► RendererProcessHandle::spawn
//! ```

use std::{ffi::OsString, sync::Arc};

use crate::{core::StreamKey, error::SpawnError, render::RenderParams};

/// Fully resolved command line for one renderer process.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RenderCommand {
    pub program: OsString,
    pub args: Vec<OsString>,
}

impl RenderCommand {
    pub fn new<I, A>(program: impl Into<OsString>, args: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<OsString>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Program name for logs and errors.
    pub fn program_lossy(&self) -> String {
        self.program.to_string_lossy().into_owned()
    }
}

/// Builds renderer command lines.
pub trait Renderer: Send + Sync + 'static {
    /// Returns the command to launch for `key` with `params`.
    ///
    /// Errors here (e.g. unknown style) are reported exactly like launch
    /// failures: the key returns to the absent state and an `Error` event is
    /// published.
    fn command(&self, key: &StreamKey, params: &RenderParams) -> Result<RenderCommand, SpawnError>;

    /// Human-readable name (for logs).
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// Shared renderer handle.
pub type RendererRef = Arc<dyn Renderer>;

/// Launches the same program for every key, ignoring params.
///
/// Useful for custom render binaries that read their own state, and for
/// exercising the lifecycle with ordinary system processes.
#[derive(Clone, Debug)]
pub struct CommandRenderer {
    command: RenderCommand,
}

impl CommandRenderer {
    pub fn new<I, A>(program: impl Into<OsString>, args: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<OsString>,
    {
        Self {
            command: RenderCommand::new(program, args),
        }
    }
}

impl Renderer for CommandRenderer {
    fn command(&self, _key: &StreamKey, _params: &RenderParams) -> Result<RenderCommand, SpawnError> {
        Ok(self.command.clone())
    }

    fn name(&self) -> &'static str {
        "command"
    }
}
