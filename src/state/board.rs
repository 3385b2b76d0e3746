//! # Score board: the live score record shared by every renderer.
//!
//! [`ScoreBoard`] owns the current [`ScoreState`] behind an async lock and
//! optionally mirrors it to disk:
//! - `json`: full record, pretty-printed, reloaded at startup;
//! - `text`: one-line display text (see [`ScoreState::score_line`]).
//!
//! ```text
//! apply(update) ─► merge ─► stamp lastUpdated ─► write json + text ─► snapshot
//! tick()        ─► team1Score += 1..=6         ─► write json + text ─► snapshot
//! ```
//!
//! The board never talks to the controller; routing a changed snapshot into
//! restarts is the router's job.

use std::path::{Path, PathBuf};

use rand::Rng;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::error::StateError;

use super::score::{self, ScoreState};

/// On-disk mirrors of the score record.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreFiles {
    /// Full record as JSON.
    pub json: Option<PathBuf>,
    /// One-line display text, also the file watched for external edits.
    pub text: Option<PathBuf>,
}

/// Async-locked score record with optional persistence.
#[derive(Debug)]
pub struct ScoreBoard {
    state: RwLock<ScoreState>,
    files: ScoreFiles,
}

impl Default for ScoreBoard {
    fn default() -> Self {
        Self::new(ScoreState::default())
    }
}

impl ScoreBoard {
    /// In-memory board, nothing is written to disk.
    pub fn new(initial: ScoreState) -> Self {
        Self {
            state: RwLock::new(initial),
            files: ScoreFiles::default(),
        }
    }

    /// Loads the board from `files`.
    ///
    /// A saved JSON record is merged over the defaults; a missing file keeps
    /// the defaults. Both mirrors are (re)written afterwards so the display
    /// file always exists for the watcher.
    pub async fn load(files: ScoreFiles) -> Result<Self, StateError> {
        let mut state = ScoreState::default();

        if let Some(path) = &files.json {
            match tokio::fs::read_to_string(path).await {
                Ok(raw) => {
                    let saved: ScoreState =
                        serde_json::from_str(&raw).map_err(|source| StateError::Json {
                            path: path.clone(),
                            source,
                        })?;
                    state.merge(&saved);
                    tracing::info!(path = %path.display(), "score record loaded");
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    tracing::info!(path = %path.display(), "no saved score record, using defaults");
                    state.set(score::LAST_UPDATED, now_rfc3339());
                }
                Err(source) => {
                    return Err(StateError::Io {
                        path: path.clone(),
                        source,
                    });
                }
            }
        }

        let board = Self {
            state: RwLock::new(state),
            files,
        };
        let snapshot = board.snapshot().await;
        board.persist(&snapshot).await?;
        Ok(board)
    }

    pub fn files(&self) -> &ScoreFiles {
        &self.files
    }

    /// Copy of the current record.
    pub async fn snapshot(&self) -> ScoreState {
        self.state.read().await.clone()
    }

    /// Merges a partial update, stamps `lastUpdated`, persists, and returns
    /// the new record.
    pub async fn apply(&self, update: &ScoreState) -> Result<ScoreState, StateError> {
        let snapshot = {
            let mut state = self.state.write().await;
            state.merge(update);
            state.set(score::LAST_UPDATED, now_rfc3339());
            state.clone()
        };
        self.persist(&snapshot).await?;
        Ok(snapshot)
    }

    /// Demo auto-update: adds 1..=6 runs to `team1Score`.
    ///
    /// A score that is not of the form `runs/wickets`, or whose runs would
    /// overflow, is left untouched.
    pub async fn tick(&self) -> Result<ScoreState, StateError> {
        let runs = rand::rng().random_range(1..=6);
        let snapshot = {
            let mut state = self.state.write().await;
            match add_runs(state.get_or(score::TEAM1_SCORE, ""), runs) {
                Some(next) => {
                    tracing::debug!(score = %next, runs, "auto update");
                    state.set(score::TEAM1_SCORE, next);
                    state.set(score::LAST_UPDATED, now_rfc3339());
                }
                None => tracing::debug!("auto update skipped: team1Score is not a countable runs/wickets"),
            }
            state.clone()
        };
        self.persist(&snapshot).await?;
        Ok(snapshot)
    }

    async fn persist(&self, state: &ScoreState) -> Result<(), StateError> {
        if let Some(path) = &self.files.json {
            let raw = serde_json::to_string_pretty(state).map_err(|source| StateError::Json {
                path: path.clone(),
                source,
            })?;
            write(path, raw).await?;
        }
        if let Some(path) = &self.files.text {
            write(path, state.score_line()).await?;
        }
        Ok(())
    }
}

async fn write(path: &Path, contents: String) -> Result<(), StateError> {
    tokio::fs::write(path, contents)
        .await
        .map_err(|source| StateError::Io {
            path: path.to_path_buf(),
            source,
        })
}

fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// `"245/4" + 3 -> "248/4"`.
fn add_runs(score: &str, runs: u32) -> Option<String> {
    let (total, wickets) = score.split_once('/')?;
    let total: u32 = total.trim().parse().ok()?;
    Some(format!("{}/{}", total.checked_add(runs)?, wickets))
}
