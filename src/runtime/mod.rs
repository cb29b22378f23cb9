// Background loop runner
//
// Owns a current-thread tokio runtime running on a dedicated OS thread for
// the lifetime of the host session. The host (UI) thread never blocks on
// I/O; it schedules futures here and receives results back through the
// cross-thread dispatcher.

use anyhow::{Context, Result};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::AbortHandle;

/// How long the runtime gets to wind down blocking resources on shutdown.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// A dedicated single-threaded event loop for all async work.
///
/// There is exactly one `LoopRunner` per host session: it is constructed in
/// `main` alongside the dispatcher and state manager and handed to whatever
/// needs to schedule background work. All scheduled futures execute on the
/// loop's own thread; scheduling is thread-safe and non-blocking.
pub struct LoopRunner {
    handle: tokio::runtime::Handle,
    tasks: Arc<Mutex<Vec<AbortHandle>>>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl LoopRunner {
    /// Build the runtime and start its thread. Returns immediately; the loop
    /// runs until [`shutdown`](Self::shutdown).
    pub fn start() -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .context("Failed to build background runtime")?;

        let handle = runtime.handle().clone();
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        let thread = std::thread::Builder::new()
            .name("chathost-loop".to_string())
            .spawn(move || {
                tracing::debug!("background loop thread started");
                // block_on drives every task spawned onto this runtime; it
                // returns when the shutdown signal arrives (or its sender is
                // dropped).
                runtime.block_on(async {
                    let _ = shutdown_rx.await;
                });
                runtime.shutdown_timeout(SHUTDOWN_TIMEOUT);
                tracing::debug!("background loop thread terminated");
            })
            .context("Failed to spawn background loop thread")?;

        tracing::info!("Background loop runner started");

        Ok(Self {
            handle,
            tasks: Arc::new(Mutex::new(Vec::new())),
            shutdown_tx: Some(shutdown_tx),
            thread: Some(thread),
        })
    }

    /// Schedule a future onto the loop from any thread.
    ///
    /// The future runs on the loop thread. An `Err` result is logged on the
    /// loop thread and never crosses back over the thread boundary. The
    /// returned handle can cancel the task; cancellation is observed at the
    /// task's next await point.
    pub fn schedule<F>(&self, name: &str, future: F) -> AbortHandle
    where
        F: Future<Output = Result<()>> + Send + 'static,
    {
        let task_name = name.to_string();
        let join = self.handle.spawn(async move {
            if let Err(e) = future.await {
                tracing::error!("background task '{}' failed: {:#}", task_name, e);
            }
        });

        let abort = join.abort_handle();

        let mut tasks = self.tasks.lock().unwrap_or_else(|e| e.into_inner());
        tasks.retain(|t| !t.is_finished());
        tasks.push(abort.clone());

        abort
    }

    /// Cancel all pending tasks and stop the loop.
    ///
    /// Cancellation is cooperative: tasks are aborted at their next
    /// suspension point, then the loop thread is joined. Safe to call with
    /// tasks mid-flight.
    pub fn shutdown(mut self) {
        let tasks = self.tasks.lock().unwrap_or_else(|e| e.into_inner());
        let pending = tasks.iter().filter(|t| !t.is_finished()).count();
        if pending > 0 {
            tracing::info!("Cancelling {} pending background task(s)", pending);
        }
        for task in tasks.iter() {
            task.abort();
        }
        drop(tasks);

        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }

        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                tracing::error!("background loop thread panicked during shutdown");
            }
        }

        tracing::info!("Background loop runner stopped");
    }
}

impl Drop for LoopRunner {
    fn drop(&mut self) {
        // Dropping the sender stops block_on; detach the thread rather than
        // joining in drop.
        self.shutdown_tx.take();
    }
}
