//! # Restart debouncer: one pending deferred action per key.
//!
//! Arming a key replaces whatever was pending for it (the old timer is
//! cancelled), so a burst of requests collapses into a single action fired
//! `delay` after the last one. Each arm gets a fresh ticket; the timer does
//! not act itself, it only enqueues `Fire { ticket }` into the key's actor,
//! which then claims the entry with [`RestartDebouncer::take`]. A ticket that
//! no longer matches (re-armed or cancelled meanwhile) claims nothing.
//!
//! ```text
//! arm(k, Restart{g}, p1) ── cancel ──┐
//! arm(k, Restart{g}, p2) ─────────── ┴─► timer(delay) ─► actor(k) ◄─ Fire{t2}
//!                                                        └─► take(k, t2) = (Restart{g}, p2)
//! ```

use std::{
    collections::HashMap,
    sync::{
        Mutex, MutexGuard,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::render::RenderParams;

use super::{
    actor::{Job, Op},
    key::StreamKey,
};

/// What a pending entry does when it fires.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Deferred {
    /// Start the key (settle delay after a stream-begin).
    Start,
    /// Stop then start, valid only while `generation` is still live.
    Restart { generation: u64 },
}

struct Pending {
    ticket: u64,
    deferred: Deferred,
    params: RenderParams,
    timer: CancellationToken,
}

/// Per-key pending-action table.
pub(crate) struct RestartDebouncer {
    pending: Mutex<HashMap<StreamKey, Pending>>,
    tickets: AtomicU64,
    runtime: CancellationToken,
}

impl RestartDebouncer {
    pub fn new(runtime: CancellationToken) -> Self {
        Self {
            pending: Mutex::new(HashMap::new()),
            tickets: AtomicU64::new(1),
            runtime,
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<StreamKey, Pending>> {
        // Entries are plain data; a poisoned lock still holds a usable map.
        self.pending.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Replaces the key's pending action and (re)starts its timer.
    ///
    /// Returns the replaced action, if any.
    pub fn arm(
        &self,
        key: &StreamKey,
        deferred: Deferred,
        params: RenderParams,
        delay: Duration,
        actor: mpsc::Sender<Job>,
    ) -> Option<Deferred> {
        let ticket = self.tickets.fetch_add(1, Ordering::Relaxed);
        let timer = self.runtime.child_token();

        let replaced = self
            .lock()
            .insert(
                key.clone(),
                Pending {
                    ticket,
                    deferred,
                    params,
                    timer: timer.clone(),
                },
            )
            .map(|old| {
                old.timer.cancel();
                old.deferred
            });

        tokio::spawn(async move {
            tokio::select! {
                _ = timer.cancelled() => {}
                _ = tokio::time::sleep(delay) => {
                    let _ = actor.send(Job::detached(Op::Fire { ticket })).await;
                }
            }
        });
        replaced
    }

    /// Drops the key's pending action.
    pub fn cancel(&self, key: &StreamKey) -> Option<Deferred> {
        self.lock().remove(key).map(|p| {
            p.timer.cancel();
            p.deferred
        })
    }

    /// Claims the pending action if `ticket` is still the current one.
    pub fn take(&self, key: &StreamKey, ticket: u64) -> Option<(Deferred, RenderParams)> {
        let mut pending = self.lock();
        if pending.get(key).is_none_or(|p| p.ticket != ticket) {
            return None;
        }
        pending.remove(key).map(|p| (p.deferred, p.params))
    }

    /// Replaces the params of every pending deferred start, so a start still
    /// settling picks up the latest state.
    pub fn refresh_starts(&self, params: &RenderParams) -> usize {
        let mut refreshed = 0;
        for p in self.lock().values_mut() {
            if p.deferred == Deferred::Start {
                p.params.state = params.state.clone();
                refreshed += 1;
            }
        }
        refreshed
    }

    /// Keys with a pending deferred start.
    pub fn pending_starts(&self) -> Vec<StreamKey> {
        self.lock()
            .iter()
            .filter(|(_, p)| p.deferred == Deferred::Start)
            .map(|(k, _)| k.clone())
            .collect()
    }

    pub fn is_pending(&self, key: &StreamKey) -> bool {
        self.lock().contains_key(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{ScoreState, score};

    fn key() -> StreamKey {
        StreamKey::new("test").unwrap()
    }

    fn params(score_value: &str) -> RenderParams {
        RenderParams::from_state(ScoreState::empty().with(score::TEAM1_SCORE, score_value))
    }

    async fn next_ticket(rx: &mut mpsc::Receiver<Job>) -> u64 {
        match rx.recv().await.map(|j| j.op) {
            Some(Op::Fire { ticket }) => ticket,
            other => panic!("unexpected job: {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn rearm_replaces_pending_and_fires_once() {
        let deb = RestartDebouncer::new(CancellationToken::new());
        let (tx, mut rx) = mpsc::channel(8);
        let d = Deferred::Restart { generation: 1 };

        assert_eq!(deb.arm(&key(), d, params("1/0"), Duration::from_millis(500), tx.clone()), None);
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(deb.arm(&key(), d, params("2/0"), Duration::from_millis(500), tx), Some(d));

        let ticket = next_ticket(&mut rx).await;
        let (deferred, p) = deb.take(&key(), ticket).unwrap();
        assert_eq!(deferred, d);
        assert_eq!(p.state.get(score::TEAM1_SCORE), Some("2/0"));

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_entry_never_fires() {
        let deb = RestartDebouncer::new(CancellationToken::new());
        let (tx, mut rx) = mpsc::channel(8);

        deb.arm(&key(), Deferred::Start, params("1/0"), Duration::from_millis(500), tx);
        assert_eq!(deb.cancel(&key()), Some(Deferred::Start));

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(rx.try_recv().is_err());
        assert!(!deb.is_pending(&key()));
    }

    #[tokio::test(start_paused = true)]
    async fn outdated_ticket_claims_nothing() {
        let deb = RestartDebouncer::new(CancellationToken::new());
        let (tx, _rx) = mpsc::channel(8);

        deb.arm(&key(), Deferred::Start, params("1/0"), Duration::from_secs(5), tx.clone());
        deb.arm(&key(), Deferred::Start, params("2/0"), Duration::from_secs(5), tx);
        assert!(deb.take(&key(), 1).is_none());
        assert!(deb.is_pending(&key()));
    }

    #[tokio::test(start_paused = true)]
    async fn refresh_updates_only_deferred_starts() {
        let deb = RestartDebouncer::new(CancellationToken::new());
        let (tx, mut rx) = mpsc::channel(8);
        let other = StreamKey::new("other").unwrap();

        deb.arm(&key(), Deferred::Start, params("1/0"), Duration::from_millis(10), tx.clone());
        deb.arm(&other, Deferred::Restart { generation: 3 }, params("1/0"), Duration::from_secs(60), tx);
        assert_eq!(deb.refresh_starts(&params("9/9")), 1);
        assert_eq!(deb.pending_starts(), vec![key()]);

        let ticket = next_ticket(&mut rx).await;
        let (_, p) = deb.take(&key(), ticket).unwrap();
        assert_eq!(p.state.get(score::TEAM1_SCORE), Some("9/9"));
    }
}
