//! # KeyActor: serializes every operation on one stream key.
//!
//! Each key gets one actor: a task draining a bounded FIFO of [`Job`]s, one at
//! a time, to completion. Different keys run fully in parallel; nothing
//! orders them against each other.
//!
//! ```text
//! controller ─┐                          ┌─► registry (read-modify-write)
//! debouncer ──┼─► [queue k] ─► KeyActor ─┼─► RendererProcessHandle spawn/terminate
//! exit cb ────┘    (FIFO)                └─► Bus (status events)
//! ```
//!
//! ## Operations
//! - `Start`: no-op if a record exists; else generation+1, spawn, `Started` / `Error`.
//! - `Stop`: cancel the pending deferred action, then terminate (SIGINT, grace, kill), `Stopped`.
//! - `Restart`: (re)arm the key's pending slot with `Restart { generation }`.
//! - `StartAfter`: arm the pending slot with a deferred `Start`.
//! - `Replace`: validate new params, stop whatever runs, start with them now.
//! - `Fire`: a debounce timer elapsed; validate ticket and generation, then act.
//! - `Exited`: exit callback of a handle; applied only for the live generation.
//!
//! ## Retirement
//! After each job the actor checks whether its key went idle: no record, no
//! pending deferred action, nothing queued and no caller holding an
//! [`Admission`]. An idle actor unregisters itself and exits; the next
//! operation on the key spawns a fresh one. The key's generation lives in the
//! registry, not in the actor, so it keeps counting across actors.
//!
//! ## Shutdown
//! On runtime cancellation the queue is closed and drained: every queued job
//! resolves with [`ControlError::Cancelled`] and queued commands are reported
//! as `CommandCancelled`. A job already running is never interrupted.

use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use tokio::sync::{mpsc, oneshot};

use crate::{
    error::ControlError,
    events::{Event, EventKind},
    process::{OnExit, ProcessExit, RendererProcessHandle},
    render::RenderParams,
};

use super::{controller::Core, debounce::Deferred, key::StreamKey, registry::Look};

pub(crate) type Reply = oneshot::Sender<Result<bool, ControlError>>;

/// One queued operation.
#[derive(Debug)]
pub(crate) enum Op {
    Start { params: RenderParams },
    Stop,
    Restart { params: RenderParams, debounce: Duration },
    StartAfter { params: RenderParams, delay: Duration },
    Replace { params: RenderParams },
    Fire { ticket: u64 },
    Exited { generation: u64, exit: ProcessExit },
}

impl Op {
    /// Caller-issued operations (as opposed to timer and exit notifications).
    fn is_command(&self) -> bool {
        !matches!(self, Op::Fire { .. } | Op::Exited { .. })
    }

    /// Operations that do nothing on a key without record or pending action.
    pub fn skips_idle_key(&self) -> bool {
        matches!(self, Op::Stop | Op::Restart { .. })
    }

    fn as_label(&self) -> &'static str {
        match self {
            Op::Start { .. } => "start",
            Op::Stop => "stop",
            Op::Restart { .. } => "restart",
            Op::StartAfter { .. } => "start_after",
            Op::Replace { .. } => "replace",
            Op::Fire { .. } => "fire",
            Op::Exited { .. } => "exited",
        }
    }
}

/// Marks a caller job on its way through an actor's queue.
///
/// Taken under the actor map lock; an actor with outstanding admissions is
/// never retired.
pub(crate) struct Admission(Arc<AtomicUsize>);

impl Admission {
    pub fn new(count: &Arc<AtomicUsize>) -> Self {
        count.fetch_add(1, Ordering::AcqRel);
        Self(Arc::clone(count))
    }
}

impl Drop for Admission {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

pub(crate) struct Job {
    pub op: Op,
    pub reply: Option<Reply>,
    admission: Option<Admission>,
}

impl Job {
    /// Timer or exit notification.
    pub fn detached(op: Op) -> Self {
        Self {
            op,
            reply: None,
            admission: None,
        }
    }

    /// Caller job nobody waits for.
    pub fn queued(op: Op, admission: Admission) -> Self {
        Self {
            op,
            reply: None,
            admission: Some(admission),
        }
    }

    /// Caller job whose result is delivered on the returned receiver.
    pub fn with_reply(
        op: Op,
        admission: Admission,
    ) -> (Self, oneshot::Receiver<Result<bool, ControlError>>) {
        let (tx, rx) = oneshot::channel();
        let job = Self {
            op,
            reply: Some(tx),
            admission: Some(admission),
        };
        (job, rx)
    }
}

pub(crate) struct KeyActor {
    key: StreamKey,
    core: Arc<Core>,
    /// Own queue, for exit callbacks and debounce timers.
    me: mpsc::WeakSender<Job>,
    rx: mpsc::Receiver<Job>,
    /// Caller jobs admitted to this actor and not yet finished.
    admitted: Arc<AtomicUsize>,
}

impl KeyActor {
    pub fn new(
        key: StreamKey,
        core: Arc<Core>,
        me: mpsc::WeakSender<Job>,
        rx: mpsc::Receiver<Job>,
        admitted: Arc<AtomicUsize>,
    ) -> Self {
        Self {
            key,
            core,
            me,
            rx,
            admitted,
        }
    }

    pub async fn run(mut self) {
        let token = self.core.token.clone();
        let retired = loop {
            let job = tokio::select! {
                biased;
                _ = token.cancelled() => break false,
                job = self.rx.recv() => match job {
                    Some(job) => job,
                    None => return,
                },
            };

            let Job {
                op,
                reply,
                admission,
            } = job;
            let result = self.apply(op).await;
            if let Some(reply) = reply {
                let _ = reply.send(result);
            }
            drop(admission);

            if self.is_idle().await && self.core.retire(&self.key, &self.admitted, &self.rx) {
                break true;
            }
        };

        // Once retired only detached notifications can still arrive; they
        // concern a key with nothing left to act on.
        self.rx.close();
        while let Some(job) = self.rx.recv().await {
            if job.op.is_command() {
                self.publish(EventKind::CommandCancelled, |ev| ev.with_reason(job.op.as_label()));
            }
            if let Some(reply) = job.reply {
                let _ = reply.send(Err(ControlError::Cancelled));
            }
        }
        if retired {
            tracing::trace!(key = %self.key, "key actor retired");
        } else {
            tracing::trace!(key = %self.key, "key actor stopped");
        }
    }

    async fn is_idle(&self) -> bool {
        !self.core.debouncer.is_pending(&self.key)
            && self.core.registry.live_generation(&self.key).await.is_none()
    }

    async fn apply(&self, op: Op) -> Result<bool, ControlError> {
        match op {
            Op::Start { params } => self.start(params).await,
            Op::Stop => Ok(self.stop().await),
            Op::Restart { params, debounce } => Ok(self.schedule_restart(params, debounce).await),
            Op::StartAfter { params, delay } => Ok(self.schedule_start(params, delay).await),
            Op::Replace { params } => self.replace(params).await,
            Op::Fire { ticket } => self.fire(ticket).await,
            Op::Exited { generation, exit } => Ok(self.exited(generation, exit).await),
        }
    }

    async fn start(&self, params: RenderParams) -> Result<bool, ControlError> {
        let registry = &self.core.registry;
        let Some(generation) = registry.begin_start(&self.key, Look::from(&params)).await else {
            tracing::debug!(key = %self.key, "start ignored: already running");
            return Ok(false);
        };

        let spawned = self
            .core
            .renderer
            .command(&self.key, &params)
            .and_then(|cmd| {
                RendererProcessHandle::spawn(
                    self.key.clone(),
                    generation,
                    &cmd,
                    self.exit_callback(generation),
                )
            });

        match spawned {
            Ok(handle) => {
                if let Err(handle) = registry.mark_running(&self.key, generation, handle).await {
                    handle.force_kill();
                    return Ok(false);
                }
                let params = Arc::new(params);
                self.publish(EventKind::Started, |ev| {
                    ev.with_generation(generation).with_params(params)
                });
                Ok(true)
            }
            Err(e) => {
                let reason: Arc<str> = Arc::from(format!("{}: {e}", e.as_label()));
                registry.fail_start(&self.key, generation, Arc::clone(&reason)).await;
                self.publish(EventKind::Error, |ev| {
                    ev.with_generation(generation).with_reason(reason)
                });
                Err(ControlError::Spawn(e))
            }
        }
    }

    async fn stop(&self) -> bool {
        self.cancel_pending("stopped");
        self.terminate().await.is_some()
    }

    async fn schedule_restart(&self, params: RenderParams, debounce: Duration) -> bool {
        let Some(generation) = self.core.registry.live_generation(&self.key).await else {
            return false;
        };
        if !self.arm(Deferred::Restart { generation }, params, debounce) {
            return false;
        }
        self.publish(EventKind::RestartScheduled, |ev| {
            ev.with_generation(generation).with_delay(debounce)
        });
        true
    }

    async fn schedule_start(&self, params: RenderParams, delay: Duration) -> bool {
        if self.core.registry.live_generation(&self.key).await.is_some() {
            return false;
        }
        if !self.arm(Deferred::Start, params, delay) {
            return false;
        }
        self.publish(EventKind::RestartScheduled, |ev| {
            ev.with_delay(delay).with_reason("start")
        });
        true
    }

    async fn replace(&self, params: RenderParams) -> Result<bool, ControlError> {
        // Rejected params leave the running renderer alone.
        if let Err(e) = self.core.renderer.command(&self.key, &params) {
            let reason = format!("{}: {e}", e.as_label());
            self.publish(EventKind::Error, |ev| ev.with_reason(reason));
            return Err(ControlError::Spawn(e));
        }
        self.cancel_pending("replaced");
        self.terminate().await;
        self.start(params).await
    }

    async fn fire(&self, ticket: u64) -> Result<bool, ControlError> {
        let Some((deferred, params)) = self.core.debouncer.take(&self.key, ticket) else {
            return Ok(false);
        };

        match deferred {
            Deferred::Start => self.start(params).await,
            Deferred::Restart { generation } => {
                let registry = &self.core.registry;
                if registry.live_generation(&self.key).await != Some(generation) {
                    self.publish(EventKind::RestartCancelled, |ev| {
                        ev.with_generation(generation).with_reason("superseded")
                    });
                    return Ok(false);
                }
                let inherited = registry.live_look(&self.key).await.unwrap_or_default();
                let params = params
                    .or_style(inherited.style.as_ref())
                    .or_template(inherited.template.as_deref());
                self.terminate().await;
                self.start(params).await
            }
        }
    }

    async fn exited(&self, generation: u64, exit: ProcessExit) -> bool {
        if !self.core.registry.on_exit(&self.key, generation).await {
            tracing::trace!(key = %self.key, generation, "stale exit discarded");
            return false;
        }
        tracing::info!(key = %self.key, generation, %exit, "renderer exited on its own");
        self.publish(EventKind::Stopped, |ev| ev.with_generation(generation).with_exit(exit));
        true
    }

    /// Stops the live process, if any: SIGINT, grace, kill. Publishes `Stopped`.
    async fn terminate(&self) -> Option<u64> {
        let stopping = self.core.registry.begin_stop(&self.key).await?;
        let generation = stopping.generation;

        let exit = match stopping.handle {
            Some(handle) => {
                let exit = handle.terminate(self.core.cfg.grace).await;
                if exit.forced {
                    self.publish(EventKind::ForceKilled, |ev| ev.with_generation(generation));
                }
                Some(exit)
            }
            None => None,
        };

        self.core.registry.finish_stop(&self.key, generation).await;
        self.publish(EventKind::Stopped, |ev| {
            let ev = ev.with_generation(generation);
            match exit {
                Some(exit) => ev.with_exit(exit),
                None => ev,
            }
        });
        Some(generation)
    }

    fn arm(&self, deferred: Deferred, params: RenderParams, delay: Duration) -> bool {
        let Some(tx) = self.me.upgrade() else {
            return false;
        };
        if let Some(replaced) = self.core.debouncer.arm(&self.key, deferred, params, delay, tx) {
            tracing::trace!(key = %self.key, ?replaced, "pending action re-armed");
        }
        true
    }

    fn cancel_pending(&self, reason: &'static str) {
        if let Some(deferred) = self.core.debouncer.cancel(&self.key) {
            self.publish(EventKind::RestartCancelled, |ev| {
                let ev = ev.with_reason(reason);
                match deferred {
                    Deferred::Restart { generation } => ev.with_generation(generation),
                    Deferred::Start => ev,
                }
            });
        }
    }

    fn exit_callback(&self, generation: u64) -> OnExit {
        let me = self.me.clone();
        Box::new(move |exit| {
            Box::pin(async move {
                if let Some(tx) = me.upgrade() {
                    let _ = tx.send(Job::detached(Op::Exited { generation, exit })).await;
                }
            })
        })
    }

    fn publish(&self, kind: EventKind, build: impl FnOnce(Event) -> Event) {
        self.core.bus.publish(build(Event::new(kind).with_key(&self.key)));
    }
}
