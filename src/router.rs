//! # EventRouter: external triggers → controller calls.
//!
//! Every external source (relay callbacks, operator commands, score updates,
//! file watcher, timer) is expressed as a [`Trigger`] and translated here into
//! one of the controller's operations. The router keeps no lifecycle state;
//! it only owns the translation rules and the score board they read.
//!
//! | Trigger | Action |
//! |---|---|
//! | `StreamBegin { path }` | `start_after(key, current state, settle_delay)` |
//! | `StreamEnd { path }` | `stop(key)`; no derivable key ⇒ `stop_all()` |
//! | `ManualStart { key, style }` | `start(key, style + current state)`; missing key ⇒ `InvalidKey` |
//! | `ManualImageStart { key, template }` | `start(key, template + current state)`; missing key ⇒ `InvalidKey`, missing template ⇒ `MissingTemplate` |
//! | `ManualStop { key }` | `stop(key)`; missing key ⇒ `InvalidKey` |
//! | `ChangeStyle { key, style }` | `replace(key, style + current state)` |
//! | `StateChanged { update }` | merge into board, `restart_all(new state, debounce)` |
//! | `FileChanged { modified }` | new timestamp only: `restart_all(current state, debounce)` |
//! | `Tick` | `board.tick()`, `restart_all(new state, debounce)` |
//! | `StatusRequest` | publish `StatusList` |
//!
//! Paths containing the output application segment (`/overlay/`) are ignored:
//! the renderer's own output must never start another renderer.

use std::{sync::Arc, time::SystemTime};

use crate::{
    core::{KeyPolicy, LifecycleController, StreamKey},
    error::ControlError,
    render::RenderParams,
    state::{ScoreBoard, ScoreState},
    watch::ModificationFilter,
};

/// Path segment of the renderer's output application.
pub const OUTPUT_SEGMENT: &str = "/overlay/";

/// External trigger, normalized.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Trigger {
    /// Relay reports a stream being published (`/live/<key>`).
    StreamBegin { path: String },
    /// Relay reports a stream going away. `None` means "all streams".
    StreamEnd { path: Option<String> },
    ManualStart {
        key: Option<String>,
        style: Option<String>,
    },
    /// Start a stream with the scores drawn over an image template.
    ManualImageStart {
        key: Option<String>,
        template: Option<String>,
    },
    ManualStop { key: Option<String> },
    /// Switch a stream to another overlay style now.
    ChangeStyle { key: Option<String>, style: String },
    /// Partial score update pushed by an operator.
    StateChanged { update: ScoreState },
    /// The score display file was modified.
    FileChanged { modified: SystemTime },
    /// Periodic auto-update.
    Tick,
    StatusRequest,
}

impl Trigger {
    pub fn as_label(&self) -> &'static str {
        match self {
            Trigger::StreamBegin { .. } => "stream_begin",
            Trigger::StreamEnd { .. } => "stream_end",
            Trigger::ManualStart { .. } => "manual_start",
            Trigger::ManualImageStart { .. } => "manual_image_start",
            Trigger::ManualStop { .. } => "manual_stop",
            Trigger::ChangeStyle { .. } => "change_style",
            Trigger::StateChanged { .. } => "state_changed",
            Trigger::FileChanged { .. } => "file_changed",
            Trigger::Tick => "tick",
            Trigger::StatusRequest => "status_request",
        }
    }
}

/// What routing a trigger did.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Routed {
    /// Nothing to do (output stream, no derivable key, unchanged file).
    Ignored { reason: &'static str },
    /// A single-key operation ran; `false` for idempotent no-ops.
    Applied(bool),
    /// Number of restarts scheduled by a restart-all.
    Restarts(usize),
    /// Number of keys stopped by a stop-all.
    Stopped(usize),
    /// Active keys reported in the published status list.
    Status(Vec<StreamKey>),
}

/// Translates [`Trigger`]s into [`LifecycleController`] calls.
pub struct EventRouter {
    controller: LifecycleController,
    board: Arc<ScoreBoard>,
    policy: KeyPolicy,
    file_changes: ModificationFilter,
}

impl EventRouter {
    /// Router using the controller's configured [`KeyPolicy`].
    pub fn new(controller: LifecycleController, board: Arc<ScoreBoard>) -> Self {
        let policy = controller.config().key_policy.clone();
        Self {
            controller,
            board,
            policy,
            file_changes: ModificationFilter::default(),
        }
    }

    pub fn controller(&self) -> &LifecycleController {
        &self.controller
    }

    pub fn board(&self) -> &Arc<ScoreBoard> {
        &self.board
    }

    /// Derives the key of a relay stream path under the active policy.
    ///
    /// `None` for output streams and paths without a usable segment.
    pub fn key_for_path(&self, path: &str) -> Option<StreamKey> {
        if path.contains(OUTPUT_SEGMENT) {
            return None;
        }
        match &self.policy {
            KeyPolicy::Honor => path
                .rsplit('/')
                .find(|seg| !seg.trim().is_empty())
                .and_then(|seg| StreamKey::new(seg).ok()),
            KeyPolicy::Fixed { key } => Some(key.clone()),
        }
    }

    /// Routes one trigger.
    pub async fn route(&self, trigger: Trigger) -> Result<Routed, ControlError> {
        let label = trigger.as_label();
        let routed = self.dispatch(trigger).await;
        match &routed {
            Ok(r) => tracing::debug!(trigger = label, routed = ?r, "trigger routed"),
            Err(e) => tracing::warn!(trigger = label, error = %e, "trigger failed"),
        }
        routed
    }

    async fn dispatch(&self, trigger: Trigger) -> Result<Routed, ControlError> {
        let cfg = self.controller.config();
        match trigger {
            Trigger::StreamBegin { path } => {
                if path.contains(OUTPUT_SEGMENT) {
                    return Ok(Routed::Ignored { reason: "output stream" });
                }
                let Some(key) = self.key_for_path(&path) else {
                    return Ok(Routed::Ignored { reason: "no stream key" });
                };
                let params = RenderParams::from_state(self.board.snapshot().await);
                self.controller
                    .start_after(&key, params, cfg.settle_delay)
                    .await
                    .map(Routed::Applied)
            }
            Trigger::StreamEnd { path } => {
                if path.as_deref().is_some_and(|p| p.contains(OUTPUT_SEGMENT)) {
                    return Ok(Routed::Ignored { reason: "output stream" });
                }
                match path.as_deref().and_then(|p| self.key_for_path(p)) {
                    Some(key) => self.controller.stop(&key).await.map(Routed::Applied),
                    None => self.controller.stop_all().await.map(Routed::Stopped),
                }
            }
            Trigger::ManualStart { key, style } => {
                let key = StreamKey::required(key.as_deref())?;
                let params = RenderParams::new(style.as_deref(), self.board.snapshot().await);
                self.controller.start(&key, params).await.map(Routed::Applied)
            }
            Trigger::ManualImageStart { key, template } => {
                let key = StreamKey::required(key.as_deref())?;
                let template = template
                    .filter(|t| !t.trim().is_empty())
                    .ok_or(ControlError::MissingTemplate)?;
                let params =
                    RenderParams::from_state(self.board.snapshot().await).with_template(template);
                self.controller.start(&key, params).await.map(Routed::Applied)
            }
            Trigger::ManualStop { key } => {
                let key = StreamKey::required(key.as_deref())?;
                self.controller.stop(&key).await.map(Routed::Applied)
            }
            Trigger::ChangeStyle { key, style } => {
                let key = StreamKey::required(key.as_deref())?;
                let params = RenderParams::new(Some(&style), self.board.snapshot().await);
                self.controller.replace(&key, params).await.map(Routed::Applied)
            }
            Trigger::StateChanged { update } => {
                let state = match self.board.apply(&update).await {
                    Ok(state) => state,
                    Err(e) => {
                        tracing::warn!(error = %e, "score update not persisted");
                        self.board.snapshot().await
                    }
                };
                self.restart_all(state).await
            }
            Trigger::FileChanged { modified } => {
                if !self.file_changes.observe(modified) {
                    return Ok(Routed::Ignored { reason: "unchanged" });
                }
                let state = self.board.snapshot().await;
                self.restart_all(state).await
            }
            Trigger::Tick => {
                let state = match self.board.tick().await {
                    Ok(state) => state,
                    Err(e) => {
                        tracing::warn!(error = %e, "auto update not persisted");
                        self.board.snapshot().await
                    }
                };
                self.restart_all(state).await
            }
            Trigger::StatusRequest => {
                let state = self.board.snapshot().await;
                Ok(Routed::Status(self.controller.status_list(state).await))
            }
        }
    }

    async fn restart_all(&self, state: ScoreState) -> Result<Routed, ControlError> {
        let debounce = self.controller.config().debounce;
        self.controller
            .restart_all(RenderParams::from_state(state), debounce)
            .await
            .map(Routed::Restarts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{core::Config, render::CommandRenderer};

    fn router(policy: KeyPolicy) -> EventRouter {
        let cfg = Config {
            key_policy: policy,
            ..Config::default()
        };
        let ctl = LifecycleController::builder(cfg)
            .with_renderer(CommandRenderer::new("true", Vec::<String>::new()))
            .build();
        EventRouter::new(ctl, Arc::new(ScoreBoard::default()))
    }

    #[test]
    fn honor_policy_uses_last_segment() {
        let r = router(KeyPolicy::Honor);
        assert_eq!(r.key_for_path("/live/cam1").unwrap().as_str(), "cam1");
        assert_eq!(r.key_for_path("/live/cam1/").unwrap().as_str(), "cam1");
        assert!(r.key_for_path("/").is_none());
        assert!(r.key_for_path("/overlay/cam1").is_none());
    }

    #[test]
    fn fixed_policy_ignores_path_but_not_output() {
        let key = StreamKey::new("test").unwrap();
        let r = router(KeyPolicy::Fixed { key: key.clone() });
        assert_eq!(r.key_for_path("/live/anything"), Some(key));
        assert!(r.key_for_path("/overlay/test").is_none());
    }

    #[tokio::test]
    async fn manual_commands_require_a_key() {
        let r = router(KeyPolicy::Honor);
        let err = r
            .route(Trigger::ManualStart {
                key: None,
                style: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ControlError::InvalidKey));

        let err = r
            .route(Trigger::ManualStop {
                key: Some("  ".into()),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ControlError::InvalidKey));
    }

    #[tokio::test]
    async fn image_start_requires_key_and_template() {
        let r = router(KeyPolicy::Honor);
        let err = r
            .route(Trigger::ManualImageStart {
                key: None,
                template: Some("bar.png".into()),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ControlError::InvalidKey));

        for template in [None, Some(" ".to_string())] {
            let err = r
                .route(Trigger::ManualImageStart {
                    key: Some("cam".into()),
                    template,
                })
                .await
                .unwrap_err();
            assert_eq!(err.as_label(), "missing_template");
        }
        assert!(r.controller().active_keys().await.is_empty());
    }

    #[tokio::test]
    async fn output_streams_are_ignored() {
        let r = router(KeyPolicy::Honor);
        let routed = r
            .route(Trigger::StreamBegin {
                path: "/overlay/test".into(),
            })
            .await
            .unwrap();
        assert_eq!(routed, Routed::Ignored { reason: "output stream" });
        assert!(r.controller().active_keys().await.is_empty());
    }

    #[tokio::test]
    async fn repeated_file_timestamp_is_ignored() {
        let r = router(KeyPolicy::Honor);
        let t = SystemTime::UNIX_EPOCH + std::time::Duration::from_secs(1_700_000_000);

        assert_eq!(r.route(Trigger::FileChanged { modified: t }).await.unwrap(), Routed::Restarts(0));
        assert_eq!(
            r.route(Trigger::FileChanged { modified: t }).await.unwrap(),
            Routed::Ignored { reason: "unchanged" }
        );
    }

    #[tokio::test]
    async fn state_change_updates_board() {
        let r = router(KeyPolicy::Honor);
        let update = ScoreState::empty().with(crate::state::score::STATUS, "Drinks");
        r.route(Trigger::StateChanged { update }).await.unwrap();
        assert_eq!(
            r.board().snapshot().await.get(crate::state::score::STATUS),
            Some("Drinks")
        );
    }
}
