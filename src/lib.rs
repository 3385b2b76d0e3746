//! # rendervisor
//!
//! **Rendervisor** keeps one external overlay renderer (ffmpeg by default)
//! running per live stream, and restarts it whenever the shared score record
//! changes.
//!
//! Many unordered sources ask for lifecycle transitions at once: relay
//! publish/unpublish notifications, operator commands, score updates, a file
//! watcher and a timer. The runtime turns them into a per-key state machine
//! with one guarantee per race: no duplicate starts, no stale handles, no
//! orphaned processes, no restart storms.
//!
//! ## Architecture
//! ```text
//!  relay    operator    score push    file watcher    tick
//!    │         │            │              │            │
//!    └─────────┴────────────┼──────────────┴────────────┘
//!                           ▼
//!                 ┌──────────────────┐        ┌────────────┐
//!                 │   EventRouter    │ ◄────► │ ScoreBoard │
//!                 └────────┬─────────┘        └────────────┘
//!                          ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  LifecycleController                                              │
//! │  - ProcessRegistry (key → record, generation per key)             │
//! │  - RestartDebouncer (one pending restart/start per key)           │
//! │  - Bus (broadcast events)                                         │
//! └──────┬──────────────────┬──────────────────┬──────────────────────┘
//!        ▼                  ▼                  ▼
//!   ┌──────────┐       ┌──────────┐       ┌──────────┐
//!   │ KeyActor │       │ KeyActor │       │ KeyActor │   FIFO per key
//!   └────┬─────┘       └────┬─────┘       └────┬─────┘
//!        ▼                  ▼                  ▼
//!   RendererProcessHandle (spawn, SIGINT, grace, kill, exit → Exited{gen})
//!        │
//!        │ Started / Stopped / Error / RestartScheduled / ...
//!        ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │                    Bus (broadcast channel)                        │
//! └─────────────────────────────────┬─────────────────────────────────┘
//!                                   ▼
//!                             SubscriberSet
//!                        (per-subscriber queues)
//!                         ┌─────────┼─────────┐
//!                         ▼         ▼         ▼
//!                     LogWriter  forwarder   ...
//! ```
//!
//! ### Key lifecycle
//! ```text
//! Start ──► Starting(gen+1) ──spawn ok──► Running ──Stop──► Stopping ──exit──► (removed)
//!               │                           │
//!               └──spawn failed──► Error    └──exit on its own (live gen)──► Stopped, (removed)
//!
//! Restart(debounce) on Running(gen):
//!   arm pending slot ──► more restarts re-arm it (latest params win)
//!   ──► quiet window elapsed ──► gen still live? ──► stop, start(gen+1)
//!                                         └──no──► RestartCancelled
//! ```
//!
//! ## Features
//! | Area             | Description                                               | Key types                                  |
//! |------------------|-----------------------------------------------------------|--------------------------------------------|
//! | **Controller**   | Start/stop/restart by key, debounced restarts, shutdown.  | [`LifecycleController`], [`Command`]       |
//! | **Routing**      | External triggers to controller calls.                    | [`EventRouter`], [`Trigger`]               |
//! | **Rendering**    | ffmpeg styles and image templates, or any custom binary.  | [`Renderer`], [`FfmpegRenderer`]           |
//! | **Shared state** | Score record, persisted and watched.                      | [`ScoreBoard`], [`ScoreFileWatcher`]       |
//! | **Subscribers**  | Hook into lifecycle events.                               | [`Subscribe`]                              |
//! | **Errors**       | Typed errors with stable labels.                          | [`ControlError`], [`SpawnError`]           |
//! | **Configuration**| Runtime, renderer and file settings from TOML.            | [`Config`], [`Settings`]                   |
//!
//! ## Optional features
//! - `logging`: exports the tracing-backed [`LogWriter`] subscriber.
//!
//! ## Example
//! ```rust,no_run
//! use std::sync::Arc;
//! use rendervisor::{EventRouter, LifecycleController, ScoreBoard, Settings, Trigger};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let settings = Settings::load("rendervisor.toml").await?;
//!     let board = Arc::new(ScoreBoard::load(settings.files.clone()).await?);
//!
//!     #[cfg(feature = "logging")]
//!     let subs: Vec<Arc<dyn rendervisor::Subscribe>> = vec![Arc::new(rendervisor::LogWriter)];
//!     #[cfg(not(feature = "logging"))]
//!     let subs: Vec<Arc<dyn rendervisor::Subscribe>> = Vec::new();
//!
//!     let controller = LifecycleController::builder(settings.orchestrator)
//!         .with_renderer(rendervisor::FfmpegRenderer::new(settings.ffmpeg))
//!         .with_subscribers(subs)
//!         .build();
//!     let router = EventRouter::new(controller.clone(), board);
//!
//!     router.route(Trigger::StreamBegin { path: "/live/main".into() }).await?;
//!     controller.run_until_signal().await?;
//!     Ok(())
//! }
//! ```
mod core;
mod error;
mod events;
mod process;
mod render;
mod router;
mod settings;
mod state;
mod subscribers;
mod watch;

// ---- Public re-exports ----

pub use core::{
    Command, Config, ControllerBuilder, KeyPolicy, LifecycleController, ProcessState,
    RecordSnapshot, StreamKey,
};
pub use error::{ControlError, SettingsError, SpawnError, StateError, WatchError};
pub use events::{Bus, Event, EventKind};
pub use process::{OnExit, ProcessExit, RendererProcessHandle};
pub use render::{
    CommandRenderer, DEFAULT_STYLE, FfmpegConfig, FfmpegRenderer, FontSet, OverlayStyle,
    RenderCommand, RenderParams, Renderer, RendererRef, SIMPLE_STYLE, STYLES, escape_text,
    filter_graph, find_style, template_graph,
};
pub use router::{EventRouter, OUTPUT_SEGMENT, Routed, Trigger};
pub use settings::Settings;
pub use state::{ScoreBoard, ScoreFiles, ScoreState, score};
pub use subscribers::{Subscribe, SubscriberSet};
pub use watch::{ModificationFilter, ScoreFileWatcher, spawn_ticker};

// Optional: expose the built-in tracing subscriber.
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use subscribers::LogWriter;
