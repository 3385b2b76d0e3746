//! Error types used by the rendervisor runtime.
//!
//! - [`ControlError`]: errors returned at the controller/router API boundary.
//! - [`SpawnError`]: a renderer process could not be launched.
//! - [`StateError`]: the shared score record could not be persisted or loaded.
//! - [`SettingsError`]: settings file could not be read or parsed.
//! - [`WatchError`]: the score file watcher could not be installed.
//!
//! Every enum exposes `as_label` (stable snake_case label for logs/events).
//! None of these errors is fatal to the orchestrator: a failure on one key
//! never prevents servicing other keys.

use std::{io, path::PathBuf};

use thiserror::Error;

/// # Errors returned by [`LifecycleController`](crate::LifecycleController) and
/// [`EventRouter`](crate::EventRouter).
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ControlError {
    /// Stream key was empty or missing on a command that requires one.
    #[error("stream key must be non-empty")]
    InvalidKey,

    /// Image overlay requested without a template path.
    #[error("template path must be non-empty")]
    MissingTemplate,

    /// The renderer process could not be started.
    #[error(transparent)]
    Spawn(#[from] SpawnError),

    /// The controller has shut down and accepts no more commands.
    #[error("controller closed")]
    Closed,

    /// The command was still queued when its key actor was torn down.
    #[error("command cancelled before execution")]
    Cancelled,
}

impl ControlError {
    /// Returns a short stable label (snake_case) for use in logs/events.
    ///
    /// # Example
    /// ```
    /// use rendervisor::ControlError;
    ///
    /// assert_eq!(ControlError::InvalidKey.as_label(), "invalid_key");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            ControlError::InvalidKey => "invalid_key",
            ControlError::MissingTemplate => "missing_template",
            ControlError::Spawn(e) => e.as_label(),
            ControlError::Closed => "controller_closed",
            ControlError::Cancelled => "command_cancelled",
        }
    }
}

/// # Errors produced while launching a renderer process.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum SpawnError {
    /// Requested style is not known to the renderer.
    #[error("style '{style}' not found")]
    UnknownStyle {
        /// The requested style identifier.
        style: String,
    },

    /// The operating system refused to launch the binary.
    #[error("failed to launch '{program}': {source}")]
    Launch {
        /// Program that was attempted.
        program: String,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// Process started but reported no pid (it already exited).
    #[error("renderer '{program}' exited before reporting a pid")]
    MissingPid {
        /// Program that was attempted.
        program: String,
    },
}

impl SpawnError {
    /// Returns a short stable label (snake_case) for use in logs/events.
    pub fn as_label(&self) -> &'static str {
        match self {
            SpawnError::UnknownStyle { .. } => "spawn_unknown_style",
            SpawnError::Launch { .. } => "spawn_launch_failed",
            SpawnError::MissingPid { .. } => "spawn_missing_pid",
        }
    }
}

/// # Errors produced by the score board persistence layer.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum StateError {
    #[error("score file {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("score file {path:?} is not valid json: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl StateError {
    pub fn as_label(&self) -> &'static str {
        match self {
            StateError::Io { .. } => "state_io",
            StateError::Json { .. } => "state_json",
        }
    }
}

/// # Errors produced while loading [`Settings`](crate::Settings).
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("settings file {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid settings: {0}")]
    Parse(#[from] toml::de::Error),
}

impl SettingsError {
    pub fn as_label(&self) -> &'static str {
        match self {
            SettingsError::Io { .. } => "settings_io",
            SettingsError::Parse(_) => "settings_parse",
        }
    }
}

/// # Errors produced while installing the score file watcher.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum WatchError {
    /// Watched path has no parent directory to subscribe to.
    #[error("cannot watch {path:?}: no parent directory")]
    NoParent { path: PathBuf },

    #[error("file watcher: {0}")]
    Notify(#[from] notify::Error),
}

impl WatchError {
    pub fn as_label(&self) -> &'static str {
        match self {
            WatchError::NoParent { .. } => "watch_no_parent",
            WatchError::Notify(_) => "watch_notify",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spawn_labels_pass_through_control_error() {
        let err = ControlError::from(SpawnError::UnknownStyle {
            style: "neon".into(),
        });
        assert_eq!(err.as_label(), "spawn_unknown_style");
        assert_eq!(err.to_string(), "style 'neon' not found");
    }

    #[test]
    fn launch_error_mentions_program() {
        let err = SpawnError::Launch {
            program: "/no/such/ffmpeg".into(),
            source: io::Error::from(io::ErrorKind::NotFound),
        };
        assert!(err.to_string().contains("/no/such/ffmpeg"));
        assert_eq!(err.as_label(), "spawn_launch_failed");
    }
}
