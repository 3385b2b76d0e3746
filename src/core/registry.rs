//! # Process registry: the single source of truth for "is a renderer running for K".
//!
//! One [`KeySlot`] per key ever seen. The slot outlives its record so the
//! generation counter keeps increasing across stop/start cycles.
//!
//! ```text
//!              begin_start            mark_running
//!   (absent) ───────────────► Starting ───────────► Running
//!      ▲  ▲                      │                     │ begin_stop
//!      │  └──── fail_start ──────┘                     ▼
//!      └──────────── finish_stop / on_exit(gen) ─── Stopping
//! ```
//!
//! ## Rules
//! - Only the key's actor mutates the key's slot; the lock only guards the map.
//! - The lock is never held across a spawn or a kill: the handle is taken out
//!   of the record (`begin_stop`) before it is terminated.
//! - `on_exit` applies only when the callback's generation is the record's.

use std::{
    collections::HashMap,
    path::PathBuf,
    sync::Arc,
    time::SystemTime,
};

use serde::Serialize;
use tokio::sync::RwLock;

use crate::{process::RendererProcessHandle, render::RenderParams};

use super::key::StreamKey;

/// Lifecycle state of a live record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessState {
    Starting,
    Running,
    Stopping,
}

struct ProcessRecord {
    generation: u64,
    state: ProcessState,
    handle: Option<RendererProcessHandle>,
    style: Option<Arc<str>>,
    template: Option<PathBuf>,
    started_at: SystemTime,
}

#[derive(Default)]
struct KeySlot {
    generation: u64,
    record: Option<ProcessRecord>,
    last_error: Option<Arc<str>>,
}

/// By-value copy of a record for status reporting.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RecordSnapshot {
    pub key: StreamKey,
    pub generation: u64,
    pub state: ProcessState,
    pub pid: Option<u32>,
    pub style: Option<Arc<str>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template: Option<PathBuf>,
    pub started_at: SystemTime,
    /// Last start failure for this key, kept across records.
    pub last_error: Option<Arc<str>>,
}

/// Style and template a record was started with.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct Look {
    pub style: Option<Arc<str>>,
    pub template: Option<PathBuf>,
}

impl From<&RenderParams> for Look {
    fn from(params: &RenderParams) -> Self {
        Self {
            style: params.style.clone(),
            template: params.template.clone(),
        }
    }
}

/// What `begin_stop` took out of the record.
pub(crate) struct Stopping {
    pub generation: u64,
    pub handle: Option<RendererProcessHandle>,
}

/// Map of stream key → slot.
#[derive(Default)]
pub(crate) struct ProcessRegistry {
    slots: RwLock<HashMap<StreamKey, KeySlot>>,
}

impl ProcessRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a `Starting` record with the next generation.
    ///
    /// Returns `None` if a live record exists (duplicate start).
    pub async fn begin_start(&self, key: &StreamKey, look: Look) -> Option<u64> {
        let mut slots = self.slots.write().await;
        let slot = slots.entry(key.clone()).or_default();
        if slot.record.is_some() {
            return None;
        }
        slot.generation += 1;
        slot.record = Some(ProcessRecord {
            generation: slot.generation,
            state: ProcessState::Starting,
            handle: None,
            style: look.style,
            template: look.template,
            started_at: SystemTime::now(),
        });
        Some(slot.generation)
    }

    /// `Starting` → `Running`, storing the handle.
    ///
    /// Returns the handle back if the record is gone or belongs to another
    /// generation (the process exited before confirmation).
    pub async fn mark_running(
        &self,
        key: &StreamKey,
        generation: u64,
        handle: RendererProcessHandle,
    ) -> Result<(), RendererProcessHandle> {
        let mut slots = self.slots.write().await;
        match slots.get_mut(key).and_then(|s| s.record.as_mut()) {
            Some(rec) if rec.generation == generation && rec.state == ProcessState::Starting => {
                rec.state = ProcessState::Running;
                rec.handle = Some(handle);
                Ok(())
            }
            _ => Err(handle),
        }
    }

    /// Drops a `Starting` record after a failed launch.
    pub async fn fail_start(&self, key: &StreamKey, generation: u64, error: Arc<str>) {
        let mut slots = self.slots.write().await;
        if let Some(slot) = slots.get_mut(key) {
            if slot.record.as_ref().is_some_and(|r| r.generation == generation) {
                slot.record = None;
            }
            slot.last_error = Some(error);
        }
    }

    /// Marks the live record `Stopping` and takes its handle.
    pub async fn begin_stop(&self, key: &StreamKey) -> Option<Stopping> {
        let mut slots = self.slots.write().await;
        let rec = slots.get_mut(key)?.record.as_mut()?;
        rec.state = ProcessState::Stopping;
        Some(Stopping {
            generation: rec.generation,
            handle: rec.handle.take(),
        })
    }

    /// Removes the record if it still belongs to `generation`.
    pub async fn finish_stop(&self, key: &StreamKey, generation: u64) -> bool {
        self.remove_if(key, generation).await
    }

    /// Applies an exit callback: removes the record only for a matching
    /// generation. Returns false for stale callbacks.
    pub async fn on_exit(&self, key: &StreamKey, generation: u64) -> bool {
        self.remove_if(key, generation).await
    }

    async fn remove_if(&self, key: &StreamKey, generation: u64) -> bool {
        let mut slots = self.slots.write().await;
        match slots.get_mut(key) {
            Some(slot) if slot.record.as_ref().is_some_and(|r| r.generation == generation) => {
                slot.record = None;
                true
            }
            _ => false,
        }
    }

    /// Generation of the live record, if any.
    pub async fn live_generation(&self, key: &StreamKey) -> Option<u64> {
        let slots = self.slots.read().await;
        slots.get(key)?.record.as_ref().map(|r| r.generation)
    }

    /// Look the live record was started with.
    pub async fn live_look(&self, key: &StreamKey) -> Option<Look> {
        let slots = self.slots.read().await;
        let rec = slots.get(key)?.record.as_ref()?;
        Some(Look {
            style: rec.style.clone(),
            template: rec.template.clone(),
        })
    }

    /// Latest generation handed out for `key` (0 if never started).
    pub async fn generation(&self, key: &StreamKey) -> u64 {
        self.slots.read().await.get(key).map_or(0, |s| s.generation)
    }

    pub async fn last_error(&self, key: &StreamKey) -> Option<Arc<str>> {
        self.slots.read().await.get(key)?.last_error.clone()
    }

    /// Snapshot of one key.
    pub async fn get(&self, key: &StreamKey) -> Option<RecordSnapshot> {
        let slots = self.slots.read().await;
        let slot = slots.get(key)?;
        snapshot_of(key, slot)
    }

    /// Snapshots of every live record, sorted by key.
    pub async fn snapshot(&self) -> Vec<RecordSnapshot> {
        let slots = self.slots.read().await;
        let mut out: Vec<_> = slots.iter().filter_map(|(k, s)| snapshot_of(k, s)).collect();
        out.sort_unstable_by(|a, b| a.key.cmp(&b.key));
        out
    }

    /// Keys with a live record, sorted.
    pub async fn active_keys(&self) -> Vec<StreamKey> {
        let slots = self.slots.read().await;
        let mut keys: Vec<_> = slots
            .iter()
            .filter(|(_, s)| s.record.is_some())
            .map(|(k, _)| k.clone())
            .collect();
        keys.sort_unstable();
        keys
    }
}

fn snapshot_of(key: &StreamKey, slot: &KeySlot) -> Option<RecordSnapshot> {
    let rec = slot.record.as_ref()?;
    Some(RecordSnapshot {
        key: key.clone(),
        generation: rec.generation,
        state: rec.state,
        pid: rec.handle.as_ref().map(RendererProcessHandle::pid),
        style: rec.style.clone(),
        template: rec.template.clone(),
        started_at: rec.started_at,
        last_error: slot.last_error.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(s: &str) -> StreamKey {
        StreamKey::new(s).unwrap()
    }

    #[tokio::test]
    async fn duplicate_start_is_refused() {
        let reg = ProcessRegistry::new();
        assert_eq!(reg.begin_start(&key("a"), Look::default()).await, Some(1));
        assert_eq!(reg.begin_start(&key("a"), Look::default()).await, None);
        assert_eq!(reg.begin_start(&key("b"), Look::default()).await, Some(1));
    }

    #[tokio::test]
    async fn generation_survives_record_removal() {
        let reg = ProcessRegistry::new();
        let k = key("a");
        let g1 = reg.begin_start(&k, Look::default()).await.unwrap();
        assert!(reg.begin_stop(&k).await.is_some());
        assert!(reg.finish_stop(&k, g1).await);

        let g2 = reg.begin_start(&k, Look::default()).await.unwrap();
        assert!(g2 > g1);
        assert_eq!(reg.generation(&k).await, g2);
    }

    #[tokio::test]
    async fn stale_exit_does_not_touch_newer_record() {
        let reg = ProcessRegistry::new();
        let k = key("a");
        let g1 = reg.begin_start(&k, Look::default()).await.unwrap();
        reg.begin_stop(&k).await;
        reg.finish_stop(&k, g1).await;
        let g2 = reg.begin_start(&k, Look::default()).await.unwrap();

        assert!(!reg.on_exit(&k, g1).await);
        assert_eq!(reg.live_generation(&k).await, Some(g2));
    }

    #[tokio::test]
    async fn failed_start_returns_key_to_absent() {
        let reg = ProcessRegistry::new();
        let k = key("a");
        let look = Look {
            style: Some(Arc::from("neon")),
            template: None,
        };
        let g = reg.begin_start(&k, look).await.unwrap();
        reg.fail_start(&k, g, Arc::from("spawn_unknown_style")).await;

        assert!(reg.active_keys().await.is_empty());
        assert_eq!(reg.last_error(&k).await.as_deref(), Some("spawn_unknown_style"));
        assert_eq!(reg.begin_start(&k, Look::default()).await, Some(g + 1));
    }

    #[tokio::test]
    async fn snapshot_reports_state_and_look() {
        let reg = ProcessRegistry::new();
        let look = Look {
            style: Some(Arc::from("simple")),
            template: Some(PathBuf::from("/srv/overlay/bar.png")),
        };
        reg.begin_start(&key("b"), look.clone()).await;
        reg.begin_start(&key("a"), Look::default()).await;
        reg.begin_stop(&key("a")).await;

        let snap = reg.snapshot().await;
        assert_eq!(snap.len(), 2);
        assert_eq!(snap[0].key.as_str(), "a");
        assert_eq!(snap[0].state, ProcessState::Stopping);
        assert_eq!(snap[1].state, ProcessState::Starting);
        assert_eq!(snap[1].style.as_deref(), Some("simple"));
        assert_eq!(snap[1].template, look.template);
        assert_eq!(snap[1].pid, None);
        assert_eq!(reg.live_look(&key("b")).await, Some(look));
        assert_eq!(reg.live_look(&key("c")).await, None);
    }
}
