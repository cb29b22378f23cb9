//! chathost - console host for the chat worker
//!
//! Main entry point for the host application.
//!
//! # Overview
//!
//! This binary crate wires the library's pieces into a running host. It
//! initializes:
//! - Logging infrastructure (file rotation + console output)
//! - The background loop runner ([`LoopRunner`] - dedicated async thread)
//! - State management ([`StateManager`])
//! - Configuration loading ([`SettingsManager`])
//! - The worker supervisor and startup orchestrator
//!
//! The application uses a hybrid threading model:
//! - **Main thread**: acts as the UI thread; drains the dispatcher queue
//! - **Background loop**: one current-thread tokio runtime for all async
//!   work (worker pipes, startup sequence, signal handling)
//!
//! # Execution Flow
//!
//! 1. Initialize logging → logs/chathost_<date>.log
//! 2. Load YAML configuration from chathost Data/
//!    - Settings.yaml → user preferences, pushed to the surface at startup
//!    - Tuning.yaml → startup poll interval and warning thresholds
//! 3. Start the background loop and schedule the startup sequence
//! 4. Drain UI signals on the main thread until Ctrl-C
//! 5. Stop the worker and shut the loop down
//!
//! # Platform
//!
//! Cross-platform via tokio and rfd; the worker process is spawned with no
//! console window on Windows.

use anyhow::Result;
use camino::Utf8PathBuf;
use chathost::services::EnvCredentialStore;
use chathost::ui::UiSurface;
use chathost::{
    APP_NAME, LoopRunner, SettingsManager, StartupOrchestrator, StateManager, VERSION, ui_channel,
};
use serde_json::Value;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// UI surface for the console host.
///
/// There is no embedded webview here: forwarded payloads go to the log,
/// notices and the file picker use native dialogs via `rfd`.
struct ConsoleSurface;

impl UiSurface for ConsoleSurface {
    fn reset_ui(&mut self) {
        tracing::info!("UI reset requested");
    }

    fn pick_files(&mut self) -> Vec<Utf8PathBuf> {
        let picked = rfd::FileDialog::new()
            .set_title("Select documents")
            .pick_files()
            .unwrap_or_default();

        picked
            .into_iter()
            .filter_map(|p| match Utf8PathBuf::try_from(p) {
                Ok(path) => Some(path),
                Err(e) => {
                    tracing::warn!("skipping non-UTF-8 selection: {}", e);
                    None
                }
            })
            .collect()
    }

    fn show_notice(&mut self, message: &str) {
        rfd::MessageDialog::new()
            .set_level(rfd::MessageLevel::Info)
            .set_title(APP_NAME)
            .set_description(message)
            .show();
    }

    fn send_to_surface(&mut self, payload: Value) {
        tracing::info!("surface <- {}", payload);
    }
}

/// Main entry point for the chathost application
///
/// # Errors
///
/// This function can fail if:
/// - Logging initialization fails (disk space, permissions)
/// - The background runtime cannot be built
/// - Configuration files contain invalid YAML
fn main() -> Result<()> {
    // Setup logging with both file and console output
    let _log_guard = chathost::logging::setup_logging_with_console("logs", "chathost", false, true)?;

    tracing::info!("Starting {} v{}", APP_NAME, VERSION);

    // Worker invocation: interpreter and script, overridable on the command
    // line for development setups.
    let mut args = std::env::args().skip(1);
    let executable = Utf8PathBuf::from(args.next().unwrap_or_else(|| "python3".to_string()));
    let script = Utf8PathBuf::from(args.next().unwrap_or_else(|| "worker/main.py".to_string()));

    let settings_manager = SettingsManager::new("chathost Data")?;
    let settings = settings_manager.load_settings()?;
    let tuning = settings_manager.load_tuning()?;

    let state_manager = StateManager::new();
    if let Some(mode) = settings.user_mode {
        state_manager.set_user_mode(mode);
    }
    tracing::info!(
        "Operating mode: {:?}, model: {}",
        state_manager.read(|s| s.user_mode),
        settings.llm_model
    );

    let runner = LoopRunner::start()?;
    let (dispatcher, mut queue) = ui_channel();

    let supervisor = Arc::new(chathost::WorkerSupervisor::new(
        executable,
        script,
        tuning.startup_deadline(),
    ));

    let orchestrator = Arc::new(StartupOrchestrator::new(
        Arc::clone(&supervisor),
        dispatcher.clone(),
        state_manager.clone(),
        Arc::new(settings_manager),
        Arc::new(EnvCredentialStore::default()),
        tuning,
    ));

    {
        let orchestrator = Arc::clone(&orchestrator);
        runner.schedule("startup-sequence", async move { orchestrator.run().await });
    }

    // Ctrl-C lands on the background loop: stop the worker gracefully, then
    // flag the main thread out of its drain loop.
    let shutting_down = Arc::new(AtomicBool::new(false));
    {
        let supervisor = Arc::clone(&supervisor);
        let flag = Arc::clone(&shutting_down);
        runner.schedule("signal-watcher", async move {
            tokio::signal::ctrl_c()
                .await
                .map_err(|e| anyhow::anyhow!("failed to listen for Ctrl-C: {}", e))?;
            tracing::info!("Ctrl-C received, shutting down");
            supervisor.stop().await;
            flag.store(true, Ordering::SeqCst);
            Ok(())
        });
    }

    // The console surface has no load phase; report it ready immediately so
    // the startup sequence can proceed.
    state_manager.mark_surface_ready();

    let mut surface = ConsoleSurface;
    while !shutting_down.load(Ordering::SeqCst) {
        queue.process_pending(&mut surface);
        std::thread::sleep(Duration::from_millis(50));
    }
    queue.process_pending(&mut surface);

    // Backstop in case the graceful stop raced the flag.
    supervisor.terminate_now();
    runner.shutdown();

    tracing::info!("Application shutdown complete");
    Ok(())
}
