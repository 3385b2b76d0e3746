//! # LogWriter: lifecycle events as `tracing` records.
//!
//! Status transitions log at `info`, failures and forced kills at `warn`,
//! scheduling noise at `debug`. Install any `tracing` subscriber to see them:
//!
//! ```text
//! INFO rendervisor::events: started key="test" generation=1 style=Some("custom")
//! DEBUG rendervisor::events: restart-scheduled key="test" generation=1 delay_ms=2000
//! WARN rendervisor::events: force-killed key="test" generation=1
//! INFO rendervisor::events: stopped key="test" generation=2 exit=signal=2
//! ```

use async_trait::async_trait;

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

const TARGET: &str = "rendervisor::events";

/// Event writer subscriber.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogWriter;

impl LogWriter {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let label = e.kind.as_label();
        let key = e.key.as_ref().map(|k| k.as_str()).unwrap_or("-");

        match e.kind {
            EventKind::Started => {
                let style = e.params.as_ref().and_then(|p| p.style.clone());
                tracing::info!(target: TARGET, key, generation = e.generation, ?style, "{label}");
            }
            EventKind::Stopped => {
                let exit = e.exit.map(|x| x.to_string());
                tracing::info!(target: TARGET, key, generation = e.generation, exit = exit.as_deref(), "{label}");
            }
            EventKind::Error => {
                tracing::warn!(target: TARGET, key, generation = e.generation, reason = e.reason.as_deref(), "{label}");
            }
            EventKind::StatusList => {
                let active = e.active.as_deref().map(<[_]>::len).unwrap_or(0);
                tracing::info!(target: TARGET, active, "{label}");
            }
            EventKind::RestartScheduled => {
                tracing::debug!(target: TARGET, key, generation = e.generation, delay_ms = e.delay_ms, "{label}");
            }
            EventKind::RestartCancelled | EventKind::CommandCancelled => {
                tracing::debug!(target: TARGET, key, generation = e.generation, reason = e.reason.as_deref(), "{label}");
            }
            EventKind::ForceKilled => {
                tracing::warn!(target: TARGET, key, generation = e.generation, "{label}");
            }
            EventKind::ShutdownRequested | EventKind::AllStopped => {
                tracing::info!(target: TARGET, "{label}");
            }
            EventKind::SubscriberOverflow | EventKind::SubscriberPanicked => {
                tracing::warn!(target: TARGET, reason = e.reason.as_deref(), "{label}");
            }
        }
    }

    fn name(&self) -> &'static str {
        "log-writer"
    }
}
