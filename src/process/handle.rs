//! # Handle to one running renderer process.
//!
//! [`RendererProcessHandle`] owns exactly one child process. A watcher task
//! awaits the child and is the only place that observes its exit:
//!
//! ```text
//! spawn(cmd) ─► child ─┬─► stdout/stderr lines ─► tracing (target rendervisor::renderer)
//!                      └─► watcher: wait() | kill token
//!                              ├─► exit slot (watch) ─► wait() / terminate()
//!                              └─► on_exit(ProcessExit)   (exactly once)
//! ```
//!
//! ## Termination
//! [`terminate`](RendererProcessHandle::terminate) sends SIGINT (graceful:
//! ffmpeg finalizes its output), waits up to `grace`, then force-kills.
//! On non-unix targets there is no interrupt primitive and the stop is forced
//! immediately.

use std::{
    fmt,
    process::{ExitStatus, Stdio},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use futures::future::BoxFuture;
use tokio::{
    io::{AsyncBufReadExt, AsyncRead, BufReader},
    process::Command,
    sync::watch,
};
use tokio_util::sync::CancellationToken;

use crate::{core::StreamKey, error::SpawnError, render::RenderCommand};

/// How a renderer process ended.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ProcessExit {
    /// Exit code, if the process exited normally.
    pub code: Option<i32>,
    /// Terminating signal (unix only).
    pub signal: Option<i32>,
    /// True if the process was force-killed.
    pub forced: bool,
}

impl ProcessExit {
    fn from_status(status: ExitStatus, forced: bool) -> Self {
        #[cfg(unix)]
        let signal = std::os::unix::process::ExitStatusExt::signal(&status);
        #[cfg(not(unix))]
        let signal = None;

        Self {
            code: status.code(),
            signal,
            forced,
        }
    }

    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

impl fmt::Display for ProcessExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.code, self.signal) {
            (Some(code), _) => write!(f, "code={code}")?,
            (None, Some(sig)) => write!(f, "signal={sig}")?,
            (None, None) => f.write_str("unknown")?,
        }
        if self.forced {
            f.write_str(" forced")?;
        }
        Ok(())
    }
}

/// Callback fired once when the process has exited.
pub type OnExit = Box<dyn FnOnce(ProcessExit) -> BoxFuture<'static, ()> + Send>;

/// Exclusive handle to one spawned renderer process.
#[derive(Debug)]
pub struct RendererProcessHandle {
    key: StreamKey,
    generation: u64,
    pid: u32,
    kill: CancellationToken,
    forced: Arc<AtomicBool>,
    exit: watch::Receiver<Option<ProcessExit>>,
}

impl RendererProcessHandle {
    /// Launches `cmd` for `key` and returns once the OS reports a pid.
    ///
    /// `on_exit` runs on the watcher task after the exit has been recorded,
    /// tagged implicitly with `generation` by the caller's closure.
    pub fn spawn(
        key: StreamKey,
        generation: u64,
        cmd: &RenderCommand,
        on_exit: OnExit,
    ) -> Result<Self, SpawnError> {
        let program = cmd.program_lossy();
        let mut child = Command::new(&cmd.program)
            .args(&cmd.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| SpawnError::Launch {
                program: program.clone(),
                source,
            })?;

        let Some(pid) = child.id() else {
            return Err(SpawnError::MissingPid { program });
        };

        if let Some(out) = child.stdout.take() {
            forward_lines(out, key.clone(), generation, "stdout");
        }
        if let Some(err) = child.stderr.take() {
            forward_lines(err, key.clone(), generation, "stderr");
        }

        let kill = CancellationToken::new();
        let forced = Arc::new(AtomicBool::new(false));
        let (tx, rx) = watch::channel(None);

        let watcher_kill = kill.clone();
        let watcher_forced = Arc::clone(&forced);
        let watcher_key = key.clone();
        tokio::spawn(async move {
            let finished = tokio::select! {
                status = child.wait() => Some(status),
                _ = watcher_kill.cancelled() => None,
            };
            let status = match finished {
                Some(status) => status,
                None => {
                    if let Err(e) = child.start_kill() {
                        tracing::warn!(key = %watcher_key, generation, error = %e, "kill failed");
                    }
                    child.wait().await
                }
            };

            let forced = watcher_forced.load(Ordering::Acquire);
            let exit = match status {
                Ok(status) => ProcessExit::from_status(status, forced),
                Err(e) => {
                    tracing::warn!(key = %watcher_key, generation, error = %e, "wait failed");
                    ProcessExit {
                        forced,
                        ..ProcessExit::default()
                    }
                }
            };
            tracing::debug!(key = %watcher_key, generation, %exit, "renderer exited");

            let _ = tx.send(Some(exit));
            on_exit(exit).await;
        });

        tracing::debug!(key = %key, generation, pid, program = %program, "renderer spawned");
        Ok(Self {
            key,
            generation,
            pid,
            kill,
            forced,
            exit: rx,
        })
    }

    pub fn key(&self) -> &StreamKey {
        &self.key
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// True until the watcher has observed the exit.
    pub fn is_alive(&self) -> bool {
        self.exit.borrow().is_none()
    }

    /// Exit, if already observed.
    pub fn exit_status(&self) -> Option<ProcessExit> {
        *self.exit.borrow()
    }

    /// Sends the interrupt signal (graceful stop request).
    #[cfg(unix)]
    pub fn signal_stop(&self) {
        use nix::sys::signal::{Signal, kill};
        use nix::unistd::Pid;

        if !self.is_alive() {
            return;
        }
        let Ok(raw) = i32::try_from(self.pid) else {
            self.force_kill();
            return;
        };
        if let Err(e) = kill(Pid::from_raw(raw), Signal::SIGINT) {
            tracing::debug!(key = %self.key, generation = self.generation, error = %e, "SIGINT not delivered");
        }
    }

    /// Sends the interrupt signal (graceful stop request).
    #[cfg(not(unix))]
    pub fn signal_stop(&self) {
        self.force_kill();
    }

    /// Kills the process unconditionally.
    pub fn force_kill(&self) {
        self.forced.store(true, Ordering::Release);
        self.kill.cancel();
    }

    /// Waits until the process has exited.
    pub async fn wait(&self) -> ProcessExit {
        let mut rx = self.exit.clone();
        match rx.wait_for(Option::is_some).await {
            Ok(exit) => (*exit).unwrap_or_default(),
            // Watcher gone without reporting: treat as exited.
            Err(_) => ProcessExit::default(),
        }
    }

    /// Interrupt, wait up to `grace`, then force-kill.
    pub async fn terminate(&self, grace: Duration) -> ProcessExit {
        if let Some(exit) = self.exit_status() {
            return exit;
        }
        self.signal_stop();

        match tokio::time::timeout(grace, self.wait()).await {
            Ok(exit) => exit,
            Err(_) => {
                tracing::warn!(
                    key = %self.key,
                    generation = self.generation,
                    pid = self.pid,
                    grace_ms = u64::try_from(grace.as_millis()).unwrap_or(u64::MAX),
                    "renderer ignored interrupt, killing"
                );
                self.force_kill();
                self.wait().await
            }
        }
    }
}

impl Drop for RendererProcessHandle {
    fn drop(&mut self) {
        // A handle is only dropped once its record is gone; never leave the
        // child running behind it.
        if self.is_alive() {
            self.kill.cancel();
        }
    }
}

fn forward_lines<R>(reader: R, key: StreamKey, generation: u64, stream: &'static str)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            tracing::debug!(target: "rendervisor::renderer", key = %key, generation, stream, "{line}");
        }
    });
}
