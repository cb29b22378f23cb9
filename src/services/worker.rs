use camino::Utf8PathBuf;
use serde_json::Value;
use std::process::Stdio;
use std::sync::{Arc, Mutex as StdMutex, RwLock};
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::Mutex;
use tokio::time::timeout;

use crate::protocol::{self, CommandMessage, ProtocolError, cmd};

/// Default wall-clock deadline for the readiness handshake.
pub const DEFAULT_STARTUP_DEADLINE: Duration = Duration::from_secs(60);

/// Lifecycle state of the supervised worker process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    NotStarted,
    Starting,
    Ready,
    Calling,
    Stopping,
    Stopped,
    Failed,
}

/// Errors surfaced by the worker supervisor.
#[derive(Error, Debug)]
pub enum SupervisorError {
    #[error("worker readiness not received within {0:?}")]
    StartupTimeout(Duration),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error("worker reported startup failure: {payload}")]
    WorkerStartup { payload: Value },

    #[error("worker error: {message}")]
    Worker { message: String },

    #[error("pipe I/O error while {context}")]
    PipeIo {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("worker is not ready for calls (state: {0:?})")]
    NotReady(WorkerState),

    #[error("worker already started (state: {0:?})")]
    AlreadyStarted(WorkerState),

    #[error("failed to spawn worker process")]
    Spawn(#[source] std::io::Error),
}

/// The stdin/stdout pair of one logical exchange.
///
/// Lives inside the call lock: holding the lock while both writing the
/// request and reading the response is what keeps concurrent callers'
/// bytes from interleaving on either stream.
struct WorkerIo {
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
}

/// Supervisor for the chat engine worker process.
///
/// Spawns the worker with captured pipes, performs the one-time readiness
/// handshake, and serializes all steady-state request/response exchanges
/// over the shared stdin/stdout pair. The supervisor never restarts the
/// worker on its own: after a failure, the orchestrator decides whether to
/// run a full `stop()` + `start()` cycle.
pub struct WorkerSupervisor {
    executable: Utf8PathBuf,
    script: Utf8PathBuf,
    startup_deadline: Duration,

    state: RwLock<WorkerState>,

    /// The call lock. Held across the request write and the paired
    /// response read; callers queue here in FIFO order.
    io: Mutex<Option<WorkerIo>>,

    /// Process handle for stop/terminate. A std mutex so the signal-handler
    /// path can reach it synchronously; never held across an await.
    child: Arc<StdMutex<Option<Child>>>,
}

impl WorkerSupervisor {
    /// Create a supervisor for the given worker invocation. No process is
    /// spawned until [`start`](Self::start).
    pub fn new(executable: Utf8PathBuf, script: Utf8PathBuf, startup_deadline: Duration) -> Self {
        Self {
            executable,
            script,
            startup_deadline,
            state: RwLock::new(WorkerState::NotStarted),
            io: Mutex::new(None),
            child: Arc::new(StdMutex::new(None)),
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> WorkerState {
        *self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn set_state(&self, state: WorkerState) {
        *self.state.write().unwrap_or_else(|e| e.into_inner()) = state;
    }

    /// Mark the in-flight exchange failed, unless a stop is already underway.
    ///
    /// `stop()` kills the process to unblock a pending response read; the
    /// EOF that caller then sees must not overwrite `Stopping`/`Stopped`.
    fn fail_exchange(&self) {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        if *state == WorkerState::Calling {
            *state = WorkerState::Failed;
        }
    }

    /// Return to `Ready` after an exchange, unless a stop raced it.
    fn finish_exchange(&self) {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        if *state == WorkerState::Calling {
            *state = WorkerState::Ready;
        }
    }

    /// Spawn the worker and wait for its readiness handshake.
    ///
    /// Suspends the calling task (never other tasks) on a single line read
    /// from the child's stdout, bounded by the configured deadline. On any
    /// failure the supervisor lands in `Failed` and the error is surfaced
    /// to the orchestrator; there is no internal retry.
    pub async fn start(&self) -> Result<(), SupervisorError> {
        match self.state() {
            WorkerState::NotStarted | WorkerState::Stopped | WorkerState::Failed => {}
            other => return Err(SupervisorError::AlreadyStarted(other)),
        }
        self.set_state(WorkerState::Starting);

        tracing::info!(
            "Starting worker process: {} {}",
            self.executable,
            self.script
        );
        let spawn_started = Instant::now();

        let mut command = Command::new(self.executable.as_std_path());
        command
            .arg(self.script.as_std_path())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // Backstop cleanup: if the host exits without stop(), the OS
            // reaps the worker with it.
            .kill_on_drop(true);

        #[cfg(windows)]
        command.creation_flags(0x0800_0000); // CREATE_NO_WINDOW

        let mut child = command.spawn().map_err(|e| {
            self.set_state(WorkerState::Failed);
            SupervisorError::Spawn(e)
        })?;

        let stdin = child.stdin.take().ok_or_else(|| {
            self.set_state(WorkerState::Failed);
            SupervisorError::Spawn(std::io::Error::other("worker stdin was not captured"))
        })?;
        let stdout = child.stdout.take().ok_or_else(|| {
            self.set_state(WorkerState::Failed);
            SupervisorError::Spawn(std::io::Error::other("worker stdout was not captured"))
        })?;

        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(drain_stderr(stderr));
        }

        let pid = child.id();
        tracing::info!(
            "Worker process spawned in {:.0}ms (pid {:?})",
            spawn_started.elapsed().as_secs_f64() * 1000.0,
            pid
        );

        {
            let mut guard = self.child.lock().unwrap_or_else(|e| e.into_inner());
            *guard = Some(child);
        }

        // Readiness handshake: exactly one line, within the deadline.
        let mut reader = BufReader::new(stdout);
        let mut line = String::new();
        let handshake_started = Instant::now();

        let read = timeout(self.startup_deadline, reader.read_line(&mut line)).await;
        let bytes = match read {
            Err(_) => {
                tracing::error!(
                    "Worker readiness timed out after {:?}",
                    self.startup_deadline
                );
                self.set_state(WorkerState::Failed);
                return Err(SupervisorError::StartupTimeout(self.startup_deadline));
            }
            Ok(Err(e)) => {
                self.set_state(WorkerState::Failed);
                return Err(SupervisorError::PipeIo {
                    context: "reading readiness message",
                    source: e,
                });
            }
            Ok(Ok(n)) => n,
        };

        if bytes == 0 {
            self.set_state(WorkerState::Failed);
            return Err(SupervisorError::PipeIo {
                context: "reading readiness message",
                source: std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "worker closed stdout before readiness",
                ),
            });
        }

        let raw = line.trim().to_string();
        let payload: Value = serde_json::from_str(&raw).map_err(|source| {
            self.set_state(WorkerState::Failed);
            SupervisorError::Protocol(ProtocolError::InvalidJson { raw: raw.clone(), source })
        })?;

        let status = payload.get("status").and_then(Value::as_str).ok_or_else(|| {
            self.set_state(WorkerState::Failed);
            SupervisorError::Protocol(ProtocolError::MissingStatus { raw: raw.clone() })
        })?;

        if status != "success" {
            tracing::error!("Worker reported startup failure: {}", payload);
            self.set_state(WorkerState::Failed);
            return Err(SupervisorError::WorkerStartup { payload });
        }

        {
            let mut io = self.io.lock().await;
            *io = Some(WorkerIo {
                stdin,
                stdout: reader,
            });
        }
        self.set_state(WorkerState::Ready);

        tracing::info!(
            "Worker ready in {:.0}ms",
            handshake_started.elapsed().as_secs_f64() * 1000.0
        );
        Ok(())
    }

    /// Send one request and read its paired response.
    ///
    /// The call lock is held from the request write through the response
    /// read, so concurrent callers queue and the pipe never carries two
    /// exchanges at once. A worker-side error response is raised as
    /// [`SupervisorError::Worker`] and leaves the worker `Ready`.
    pub async fn call(&self, request: CommandMessage) -> Result<CommandMessage, SupervisorError> {
        match self.state() {
            // Calling means another exchange is in flight; queue on the lock.
            WorkerState::Ready | WorkerState::Calling => {}
            other => return Err(SupervisorError::NotReady(other)),
        }

        let mut guard = self.io.lock().await;

        // Re-check now that any previous exchange has settled; it may have
        // failed the pipe while we were queued.
        if self.state() != WorkerState::Ready {
            return Err(SupervisorError::NotReady(self.state()));
        }
        let io = guard
            .as_mut()
            .ok_or_else(|| SupervisorError::NotReady(self.state()))?;

        self.set_state(WorkerState::Calling);

        let bytes = match protocol::encode(&request) {
            Ok(bytes) => bytes,
            Err(e) => {
                self.finish_exchange();
                return Err(e.into());
            }
        };

        tracing::debug!("worker call: {}", request.cmd);

        if let Err(e) = write_request(&mut io.stdin, &bytes).await {
            // Broken pipe mid-exchange: the caller reconciles via
            // stop() + start().
            self.fail_exchange();
            return Err(SupervisorError::PipeIo {
                context: "writing request",
                source: e,
            });
        }

        let mut line = String::new();
        match io.stdout.read_line(&mut line).await {
            Err(e) => {
                self.fail_exchange();
                return Err(SupervisorError::PipeIo {
                    context: "reading response",
                    source: e,
                });
            }
            Ok(0) => {
                self.fail_exchange();
                return Err(SupervisorError::PipeIo {
                    context: "reading response",
                    source: std::io::Error::new(
                        std::io::ErrorKind::UnexpectedEof,
                        "worker closed stdout mid-session",
                    ),
                });
            }
            Ok(_) => {}
        }

        // The exchange completed on the wire; the worker stays usable even
        // if this particular payload is bad.
        self.finish_exchange();

        let response = protocol::decode(&line)?;

        if response.cmd == cmd::SUBMODULE_ERROR {
            let message = response
                .data_str("error")
                .unwrap_or("worker reported an unspecified error")
                .to_string();
            return Err(SupervisorError::Worker { message });
        }

        Ok(response)
    }

    /// Terminate the worker and wait for it to exit.
    ///
    /// Idempotent and infallible: calling it twice, or before any process
    /// exists, is a no-op. Safe while a call is in flight: killing the
    /// process first unblocks the pending response read with EOF, and that
    /// caller's error path leaves the `Stopping`/`Stopped` state alone.
    pub async fn stop(&self) {
        let child = {
            let mut guard = self.child.lock().unwrap_or_else(|e| e.into_inner());
            guard.take()
        };

        let Some(mut child) = child else {
            if self.state() != WorkerState::NotStarted {
                self.set_state(WorkerState::Stopped);
            }
            return;
        };

        self.set_state(WorkerState::Stopping);

        // Kill before touching the io lock: a call blocked on its response
        // read holds that lock until the process dies and the read sees EOF.
        if let Err(e) = child.start_kill() {
            tracing::warn!("error terminating worker process: {}", e);
        }

        {
            let mut io = self.io.lock().await;
            *io = None;
        }

        if let Err(e) = child.wait().await {
            tracing::warn!("error waiting for worker exit: {}", e);
        }

        self.set_state(WorkerState::Stopped);
        tracing::info!("Worker process stopped");
    }

    /// Best-effort synchronous kill for signal-handler contexts.
    ///
    /// Does not await the exit and does not touch tracked state; the
    /// process may be going down around us.
    pub fn terminate_now(&self) {
        let mut guard = self.child.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(child) = guard.as_mut() {
            tracing::warn!("terminating worker process immediately");
            let _ = child.start_kill();
        }
    }
}

async fn write_request(stdin: &mut ChildStdin, bytes: &[u8]) -> std::io::Result<()> {
    stdin.write_all(bytes).await?;
    stdin.flush().await
}

/// Forward worker stderr lines into the host log.
async fn drain_stderr(stderr: tokio::process::ChildStderr) {
    let mut lines = BufReader::new(stderr).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => tracing::warn!("worker stderr: {}", line),
            Ok(None) => break,
            Err(e) => {
                tracing::debug!("worker stderr closed: {}", e);
                break;
            }
        }
    }
}
