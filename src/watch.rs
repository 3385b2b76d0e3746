//! # Background trigger sources: score file watcher and periodic tick.
//!
//! ```text
//! notify (parent dir) ─► modify/create of the file ─► mtime ─► Trigger::FileChanged
//! interval(tick)      ───────────────────────────────────────► Trigger::Tick
//! ```
//!
//! Both loops end once the controller refuses commands (after shutdown).

use std::{
    ffi::OsString,
    path::{Path, PathBuf},
    sync::{Arc, Mutex, PoisonError},
    time::SystemTime,
};

use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use tokio::{sync::mpsc, task::JoinHandle};

use crate::{
    error::{ControlError, WatchError},
    router::{EventRouter, Trigger},
};

/// Passes a modification timestamp only when it differs from the last one seen.
///
/// Editors and `notify` report several events per save; only a new mtime
/// counts as a genuine content modification. The router owns one and applies
/// it to every `FileChanged` trigger.
#[derive(Debug, Default)]
pub struct ModificationFilter {
    last: Mutex<Option<SystemTime>>,
}

impl ModificationFilter {
    pub fn observe(&self, modified: SystemTime) -> bool {
        let mut last = self.last.lock().unwrap_or_else(PoisonError::into_inner);
        if *last == Some(modified) {
            return false;
        }
        *last = Some(modified);
        true
    }
}

/// Watches the score display file and routes its modifications.
///
/// Dropping the watcher stops it.
pub struct ScoreFileWatcher {
    _watcher: RecommendedWatcher,
    task: JoinHandle<()>,
}

impl ScoreFileWatcher {
    /// Starts watching `path`. Must be called within a Tokio runtime.
    pub fn spawn(path: impl Into<PathBuf>, router: Arc<EventRouter>) -> Result<Self, WatchError> {
        let path = path.into();
        let dir = match path.parent() {
            Some(p) if p.as_os_str().is_empty() => PathBuf::from("."),
            Some(p) => p.to_path_buf(),
            None => return Err(WatchError::NoParent { path }),
        };
        let Some(name) = path.file_name().map(OsString::from) else {
            return Err(WatchError::NoParent { path });
        };

        let (tx, mut rx) = mpsc::unbounded_channel::<()>();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
            match res {
                Ok(ev) if touches(&ev, &name) => {
                    let _ = tx.send(());
                }
                Ok(_) => {}
                Err(e) => tracing::warn!(error = %e, "score file watch error"),
            }
        })?;
        watcher.watch(&dir, RecursiveMode::NonRecursive)?;
        tracing::info!(path = %path.display(), "watching score file");

        let task = tokio::spawn(async move {
            while rx.recv().await.is_some() {
                let modified = match modified_at(&path).await {
                    Ok(t) => t,
                    Err(e) => {
                        tracing::debug!(path = %path.display(), error = %e, "score file not readable");
                        continue;
                    }
                };
                if let Err(ControlError::Closed) = router.route(Trigger::FileChanged { modified }).await {
                    break;
                }
            }
        });

        Ok(Self {
            _watcher: watcher,
            task,
        })
    }
}

impl Drop for ScoreFileWatcher {
    fn drop(&mut self) {
        self.task.abort();
    }
}

fn touches(ev: &notify::Event, name: &OsString) -> bool {
    matches!(ev.kind, notify::EventKind::Modify(_) | notify::EventKind::Create(_))
        && ev.paths.iter().any(|p| p.file_name() == Some(name.as_os_str()))
}

async fn modified_at(path: &Path) -> std::io::Result<SystemTime> {
    tokio::fs::metadata(path).await?.modified()
}

/// Routes [`Trigger::Tick`] every `tick_interval` of the controller config.
///
/// Returns `None` when the tick is disabled (`tick_interval = 0`).
pub fn spawn_ticker(router: Arc<EventRouter>) -> Option<JoinHandle<()>> {
    let period = router.controller().config().tick()?;
    Some(tokio::spawn(async move {
        let mut ticks = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        ticks.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticks.tick().await;
            if let Err(ControlError::Closed) = router.route(Trigger::Tick).await {
                break;
            }
        }
    }))
}
