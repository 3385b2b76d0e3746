//! # LifecycleController: public API over the key actors.
//!
//! ```text
//! start/stop/restart/... ─► Core::call(key, op) ─► [queue k] ─► KeyActor(k)
//!                                                       │
//!                ProcessRegistry ◄── RestartDebouncer ◄─┤
//!                                                       └─► Bus ─► listener ─► SubscriberSet
//! ```
//!
//! Every per-key operation goes through that key's actor, so operations on one
//! key never interleave while different keys proceed in parallel. Calls resolve
//! once the actor has run the operation; [`LifecycleController::submit`]
//! returns as soon as the command is queued.
//!
//! ## Outcomes
//! - `Ok(true)`: the operation took effect.
//! - `Ok(false)`: idempotent no-op (duplicate start, stop of an absent key,
//!   restart of a key with no process). Stops and restarts of a key that has
//!   no actor are answered without spawning one.
//! - `Err(ControlError::Spawn)`: the renderer could not be started; the key is
//!   absent again and an `Error` event was published.
//! - `Err(ControlError::Closed | Cancelled)`: the controller is shutting down.

use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex, PoisonError,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::Duration,
};

use futures::future::join_all;
use tokio::{
    sync::{broadcast, mpsc},
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;

use crate::{
    error::ControlError,
    events::{Bus, Event, EventKind},
    render::{RenderParams, RendererRef},
    state::ScoreState,
    subscribers::SubscriberSet,
};

use super::{
    Config,
    actor::{Admission, Job, KeyActor, Op},
    builder::ControllerBuilder,
    debounce::RestartDebouncer,
    key::StreamKey,
    registry::{ProcessRegistry, RecordSnapshot},
    shutdown,
};

/// Lifecycle command, see [`LifecycleController::execute`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    Start {
        key: StreamKey,
        params: RenderParams,
    },
    Stop {
        key: StreamKey,
    },
    Restart {
        key: StreamKey,
        params: RenderParams,
        debounce: Duration,
    },
}

impl Command {
    pub fn key(&self) -> &StreamKey {
        match self {
            Command::Start { key, .. } | Command::Stop { key } | Command::Restart { key, .. } => key,
        }
    }

    fn into_op(self) -> (StreamKey, Op) {
        match self {
            Command::Start { key, params } => (key, Op::Start { params }),
            Command::Stop { key } => (key, Op::Stop),
            Command::Restart {
                key,
                params,
                debounce,
            } => (key, Op::Restart { params, debounce }),
        }
    }
}

/// Registered actor of one key.
struct ActorSlot {
    tx: mpsc::Sender<Job>,
    admitted: Arc<AtomicUsize>,
}

/// Shared runtime state behind every controller clone and key actor.
pub(crate) struct Core {
    pub cfg: Config,
    pub bus: Bus,
    pub registry: ProcessRegistry,
    pub debouncer: RestartDebouncer,
    pub renderer: RendererRef,
    /// Cancelled at the end of shutdown; stops actors and timers.
    pub token: CancellationToken,
    /// Set at the start of shutdown; new caller commands are refused.
    closing: AtomicBool,
    /// Actors of keys that are not idle. An actor removes itself on retiring.
    actors: Mutex<HashMap<StreamKey, ActorSlot>>,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl Core {
    pub fn new(cfg: Config, bus: Bus, renderer: RendererRef) -> Self {
        let token = CancellationToken::new();
        Self {
            cfg,
            bus,
            registry: ProcessRegistry::new(),
            debouncer: RestartDebouncer::new(token.clone()),
            renderer,
            token,
            closing: AtomicBool::new(false),
            actors: Mutex::new(HashMap::new()),
            listener: Mutex::new(None),
        }
    }

    /// Forwards bus events to `set` until the runtime is cancelled.
    pub fn attach_listener(&self, set: SubscriberSet) {
        let mut rx = self.bus.subscribe();
        let token = self.token.clone();

        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    msg = rx.recv() => match msg {
                        Ok(ev) => set.emit(ev),
                        Err(broadcast::error::RecvError::Lagged(n)) => {
                            tracing::warn!(skipped = n, "subscriber listener lagged");
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    },
                    _ = token.cancelled() => break,
                }
            }
            while let Ok(ev) = rx.try_recv() {
                set.emit(ev);
            }
            set.shutdown().await;
        });

        *self.listener.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);
    }

    fn ensure_open(&self) -> Result<(), ControlError> {
        if self.closing.load(Ordering::Acquire) || self.token.is_cancelled() {
            Err(ControlError::Closed)
        } else {
            Ok(())
        }
    }

    /// Queue of `key`'s actor plus an admission for one job, spawning the
    /// actor on first use.
    ///
    /// Returns `None` for an op that would be a no-op: a key without actor has
    /// no record and nothing pending, since only its actor creates either.
    fn admit(
        self: &Arc<Self>,
        key: &StreamKey,
        op: &Op,
    ) -> Result<Option<(mpsc::Sender<Job>, Admission)>, ControlError> {
        if self.token.is_cancelled() {
            return Err(ControlError::Closed);
        }
        let mut actors = self.actors.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(slot) = actors.get(key) {
            return Ok(Some((slot.tx.clone(), Admission::new(&slot.admitted))));
        }
        if op.skips_idle_key() {
            tracing::trace!(key = %key, "idle key, nothing to do");
            return Ok(None);
        }

        let (tx, rx) = mpsc::channel(self.cfg.actor_queue_clamped());
        let admitted = Arc::new(AtomicUsize::new(0));
        let admission = Admission::new(&admitted);
        let actor = KeyActor::new(
            key.clone(),
            Arc::clone(self),
            tx.downgrade(),
            rx,
            Arc::clone(&admitted),
        );
        tokio::spawn(actor.run());
        actors.insert(
            key.clone(),
            ActorSlot {
                tx: tx.clone(),
                admitted,
            },
        );
        Ok(Some((tx, admission)))
    }

    /// Unregisters `key`'s actor if it is still the registered one, has no
    /// admitted job and an empty queue. The actor exits when this returns true.
    pub fn retire(
        &self,
        key: &StreamKey,
        admitted: &Arc<AtomicUsize>,
        rx: &mpsc::Receiver<Job>,
    ) -> bool {
        let mut actors = self.actors.lock().unwrap_or_else(PoisonError::into_inner);
        let registered = actors
            .get(key)
            .is_some_and(|slot| Arc::ptr_eq(&slot.admitted, admitted));
        if !registered || admitted.load(Ordering::Acquire) != 0 || !rx.is_empty() {
            return false;
        }
        actors.remove(key);
        true
    }

    /// Runs `op` on `key`'s actor and waits for the outcome.
    pub async fn call(self: &Arc<Self>, key: &StreamKey, op: Op) -> Result<bool, ControlError> {
        let Some((tx, admission)) = self.admit(key, &op)? else {
            return Ok(false);
        };
        let (job, rx) = Job::with_reply(op, admission);
        tx.send(job).await.map_err(|_| ControlError::Closed)?;
        rx.await.map_err(|_| ControlError::Cancelled)?
    }

    /// Queues `op` on `key`'s actor without waiting for it to run.
    async fn send(self: &Arc<Self>, key: &StreamKey, op: Op) -> Result<(), ControlError> {
        let Some((tx, admission)) = self.admit(key, &op)? else {
            return Ok(());
        };
        tx.send(Job::queued(op, admission))
            .await
            .map_err(|_| ControlError::Closed)
    }

    /// Stops every active or settling key concurrently.
    async fn stop_all(self: &Arc<Self>) -> usize {
        let mut keys = self.registry.active_keys().await;
        for key in self.debouncer.pending_starts() {
            if !keys.contains(&key) {
                keys.push(key);
            }
        }

        let stops = keys.iter().map(|key| self.call(key, Op::Stop));
        join_all(stops)
            .await
            .into_iter()
            .filter(|r| matches!(r, Ok(true)))
            .count()
    }
}

/// Per-key renderer lifecycle controller.
///
/// Cheap to clone; all clones drive the same registry and actors.
#[derive(Clone)]
pub struct LifecycleController {
    core: Arc<Core>,
}

impl LifecycleController {
    /// Starts building a controller.
    pub fn builder(cfg: Config) -> ControllerBuilder {
        ControllerBuilder::new(cfg)
    }

    pub(crate) fn from_core(core: Arc<Core>) -> Self {
        Self { core }
    }

    pub fn config(&self) -> &Config {
        &self.core.cfg
    }

    pub fn bus(&self) -> &Bus {
        &self.core.bus
    }

    /// Receiver for events published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.core.bus.subscribe()
    }

    /// Runs `cmd` and waits for its outcome.
    pub async fn execute(&self, cmd: Command) -> Result<bool, ControlError> {
        self.core.ensure_open()?;
        let (key, op) = cmd.into_op();
        self.core.call(&key, op).await
    }

    /// Queues `cmd` and returns once it is enqueued.
    ///
    /// Waits only if the key's queue is full.
    pub async fn submit(&self, cmd: Command) -> Result<(), ControlError> {
        self.core.ensure_open()?;
        let (key, op) = cmd.into_op();
        self.core.send(&key, op).await
    }

    /// Starts a renderer for `key` unless one exists.
    pub async fn start(&self, key: &StreamKey, params: RenderParams) -> Result<bool, ControlError> {
        self.core.ensure_open()?;
        self.core.call(key, Op::Start { params }).await
    }

    /// Stops the renderer for `key` and cancels its pending deferred action.
    pub async fn stop(&self, key: &StreamKey) -> Result<bool, ControlError> {
        self.core.ensure_open()?;
        self.core.call(key, Op::Stop).await
    }

    /// Schedules a debounced stop-then-start bound to the live generation.
    ///
    /// Replaces a restart already pending for `key`. Returns `false` when no
    /// process is live.
    pub async fn restart(
        &self,
        key: &StreamKey,
        params: RenderParams,
        debounce: Duration,
    ) -> Result<bool, ControlError> {
        self.core.ensure_open()?;
        self.core.call(key, Op::Restart { params, debounce }).await
    }

    /// [`restart`](Self::restart) for every key live at call time.
    ///
    /// Deferred starts still settling pick up `params.state` as well.
    /// Returns how many restarts were scheduled.
    pub async fn restart_all(
        &self,
        params: RenderParams,
        debounce: Duration,
    ) -> Result<usize, ControlError> {
        self.core.ensure_open()?;
        let keys = self.core.registry.active_keys().await;
        self.core.debouncer.refresh_starts(&params);

        let restarts = keys.iter().map(|key| {
            self.core.call(
                key,
                Op::Restart {
                    params: params.clone(),
                    debounce,
                },
            )
        });
        let mut scheduled = 0;
        for result in join_all(restarts).await {
            match result {
                Ok(true) => scheduled += 1,
                Ok(false) => {}
                Err(ControlError::Closed | ControlError::Cancelled) => return Err(ControlError::Closed),
                Err(e) => tracing::warn!(error = %e, "restart not scheduled"),
            }
        }
        Ok(scheduled)
    }

    /// Starts `key` after `delay`, unless stopped or started meanwhile.
    ///
    /// Occupies the key's single pending slot.
    pub async fn start_after(
        &self,
        key: &StreamKey,
        params: RenderParams,
        delay: Duration,
    ) -> Result<bool, ControlError> {
        self.core.ensure_open()?;
        self.core.call(key, Op::StartAfter { params, delay }).await
    }

    /// Stops whatever runs for `key` and starts it with `params` right away.
    pub async fn replace(&self, key: &StreamKey, params: RenderParams) -> Result<bool, ControlError> {
        self.core.ensure_open()?;
        self.core.call(key, Op::Replace { params }).await
    }

    /// Stops every key concurrently. Returns how many were running.
    pub async fn stop_all(&self) -> Result<usize, ControlError> {
        self.core.ensure_open()?;
        Ok(self.core.stop_all().await)
    }

    /// Snapshot of one key's live record.
    pub async fn get(&self, key: &StreamKey) -> Option<RecordSnapshot> {
        self.core.registry.get(key).await
    }

    /// Snapshots of every live record, sorted by key.
    pub async fn snapshot(&self) -> Vec<RecordSnapshot> {
        self.core.registry.snapshot().await
    }

    /// Keys with a live record, sorted.
    pub async fn active_keys(&self) -> Vec<StreamKey> {
        self.core.registry.active_keys().await
    }

    /// Latest generation handed out for `key` (0 if never started).
    pub async fn generation(&self, key: &StreamKey) -> u64 {
        self.core.registry.generation(key).await
    }

    /// Last start failure recorded for `key`.
    pub async fn last_error(&self, key: &StreamKey) -> Option<Arc<str>> {
        self.core.registry.last_error(key).await
    }

    /// Publishes a `StatusList` event and returns the active keys.
    pub async fn status_list(&self, state: ScoreState) -> Vec<StreamKey> {
        let active = self.active_keys().await;
        self.core
            .bus
            .publish(Event::new(EventKind::StatusList).with_status(active.clone(), state));
        active
    }

    /// Stops every renderer, then tears the actors down.
    ///
    /// New commands are refused from the first step; commands still queued
    /// when the actors are cancelled resolve with [`ControlError::Cancelled`].
    /// Idempotent.
    pub async fn shutdown(&self) {
        if self.core.closing.swap(true, Ordering::AcqRel) {
            return;
        }
        self.core.bus.publish(Event::new(EventKind::ShutdownRequested));

        let stopped = self.core.stop_all().await;
        tracing::info!(stopped, "all renderers stopped");
        self.core.bus.publish(Event::new(EventKind::AllStopped));

        self.core.token.cancel();
        let listener = self
            .core
            .listener
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(listener) = listener {
            let _ = listener.await;
        }
    }

    /// Waits for SIGINT/SIGTERM/SIGQUIT (Ctrl-C elsewhere), then shuts down.
    pub async fn run_until_signal(&self) -> std::io::Result<()> {
        let signal = shutdown::termination_signal().await?;
        tracing::info!(signal, "termination signal received");
        self.shutdown().await;
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn actor_count(&self) -> usize {
        self.core
            .actors
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    #[cfg(test)]
    pub(crate) async fn inject_exit(
        &self,
        key: &StreamKey,
        generation: u64,
    ) -> Result<bool, ControlError> {
        let exit = crate::process::ProcessExit::default();
        self.core.call(key, Op::Exited { generation, exit }).await
    }
}
