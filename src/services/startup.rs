// Startup orchestrator
//
// Drives the boot sequence after the host's UI surface construction has been
// kicked off: poll-wait for the surface, start the worker (local mode only),
// push settings, signal completion, then check credentials. Runs on the
// background loop; everything UI-bound goes through the dispatcher.

use crate::models::{StartupTuning, UserSettings};
use crate::protocol::cmd;
use crate::services::worker::WorkerSupervisor;
use crate::state::StateManager;
use crate::timing::StartupPhases;
use crate::ui::UiDispatcher;
use anyhow::Context;
use serde_json::json;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Instant;
use tokio::sync::Mutex;

/// Source of the user settings pushed to the UI surface during startup.
pub trait SettingsProvider: Send + Sync {
    fn load_settings(&self) -> anyhow::Result<UserSettings>;
}

impl SettingsProvider for crate::config::SettingsManager {
    fn load_settings(&self) -> anyhow::Result<UserSettings> {
        crate::config::SettingsManager::load_settings(self)
    }
}

/// Source of the inference API key, checked at the end of startup.
pub trait CredentialStore: Send + Sync {
    fn api_key(&self) -> Option<String>;
}

/// Reads the API key from an environment variable.
pub struct EnvCredentialStore {
    var: String,
}

impl EnvCredentialStore {
    pub fn new(var: &str) -> Self {
        Self {
            var: var.to_string(),
        }
    }
}

impl Default for EnvCredentialStore {
    fn default() -> Self {
        Self::new("OPENAI_API_KEY")
    }
}

impl CredentialStore for EnvCredentialStore {
    fn api_key(&self) -> Option<String> {
        std::env::var(&self.var).ok().filter(|key| !key.is_empty())
    }
}

/// Runs the startup sequence and the stop/start restart cycle.
pub struct StartupOrchestrator {
    supervisor: Arc<WorkerSupervisor>,
    dispatcher: UiDispatcher,
    state: StateManager,
    settings: Arc<dyn SettingsProvider>,
    credentials: Arc<dyn CredentialStore>,
    tuning: StartupTuning,

    /// Phase timings for the most recent run.
    phases: StdMutex<Arc<StartupPhases>>,

    /// Serializes restart cycles; a second restart request queues behind the
    /// one in flight instead of interleaving stop/start steps.
    restart_lock: Mutex<()>,
}

impl StartupOrchestrator {
    pub fn new(
        supervisor: Arc<WorkerSupervisor>,
        dispatcher: UiDispatcher,
        state: StateManager,
        settings: Arc<dyn SettingsProvider>,
        credentials: Arc<dyn CredentialStore>,
        tuning: StartupTuning,
    ) -> Self {
        Self {
            supervisor,
            dispatcher,
            state,
            settings,
            credentials,
            tuning,
            phases: StdMutex::new(Arc::new(StartupPhases::new())),
            restart_lock: Mutex::new(()),
        }
    }

    /// Phase timings recorded by the most recent run.
    pub fn phases(&self) -> Arc<StartupPhases> {
        Arc::clone(&self.phases.lock().unwrap_or_else(|e| e.into_inner()))
    }

    /// Run the full startup sequence once.
    ///
    /// On failure the loading text is replaced with a restart hint before
    /// the error propagates to the background loop's logger.
    pub async fn run(&self) -> anyhow::Result<()> {
        let result = self.start_members().await;

        if let Err(ref e) = result {
            tracing::error!("startup sequence failed: {:#}", e);
            self.dispatcher.send_cmd(
                cmd::SET_WEBAPP_LOADING_TEXT,
                Some(json!({
                    "text": "The AI engine failed to start. Use Restart AI from the menu to try again."
                })),
            );
        }

        result
    }

    /// Stop the worker and run the startup sequence again.
    ///
    /// Invoked from the host's menu and after settings changes that require
    /// a fresh worker (mode switches, model downloads).
    pub async fn restart(&self) -> anyhow::Result<()> {
        let _guard = self.restart_lock.lock().await;
        tracing::info!("Restarting chat members");

        self.state.set_webapp_loading(true);
        self.dispatcher
            .send_cmd(cmd::SET_WEBAPP_LOADING, Some(json!({ "loading": true })));

        self.stop_members().await;
        let result = self.run().await;

        self.state.set_webapp_loading(false);
        self.dispatcher
            .send_cmd(cmd::SET_WEBAPP_LOADING, Some(json!({ "loading": false })));
        self.dispatcher.send_cmd(cmd::STOP_LOADERS, None);

        result
    }

    /// Stop whatever startup brought up. Safe to call when nothing runs.
    pub async fn stop_members(&self) {
        if self.state.read(|s| s.user_mode).owns_worker() {
            self.supervisor.stop().await;
            self.state.set_chat_ready(false);
        }
    }

    async fn start_members(&self) -> anyhow::Result<()> {
        let phases = Arc::new(StartupPhases::new());
        *self.phases.lock().unwrap_or_else(|e| e.into_inner()) = Arc::clone(&phases);

        self.wait_for_surface(&phases).await;

        let mode = self.state.read(|s| s.user_mode);

        if mode.owns_worker() {
            let _timer = phases.phase("start_worker", self.tuning.worker_start_warn());
            self.dispatcher.send_cmd(
                cmd::SET_WEBAPP_LOADING_TEXT,
                Some(json!({ "text": "Starting AI engine..." })),
            );

            self.supervisor
                .start()
                .await
                .context("worker failed its readiness handshake")?;
            self.state.set_chat_ready(true);
        } else {
            tracing::info!("server mode: skipping local worker startup");
        }

        {
            let _timer = phases.phase("load_settings", self.tuning.settings_load_warn());
            self.dispatcher.send_cmd(
                cmd::SET_WEBAPP_LOADING_TEXT,
                Some(json!({ "text": "Loading your settings..." })),
            );

            let settings = self.settings.load_settings().context("loading settings")?;
            self.dispatcher.send_cmd(
                cmd::DID_LOAD_SETTINGS,
                Some(serde_json::to_value(&settings).context("serializing settings")?),
            );
        }

        self.dispatcher.send_cmd(cmd::DID_FINISH_STARTUP, None);
        self.state.mark_startup_finished();

        if mode.owns_worker() && self.credentials.api_key().is_none() {
            tracing::warn!("no API key configured; prompting the user");
            self.dispatcher.no_credential_notice();
        }

        phases.warn_if_total_exceeds(self.tuning.total_budget_warn());
        tracing::info!(
            "Startup sequence finished in {:.0}ms",
            phases.total_elapsed().as_secs_f64() * 1000.0
        );
        Ok(())
    }

    /// Poll until the embedded UI surface reports ready.
    ///
    /// The surface loads on its own schedule inside the host; there is no
    /// completion callback to await, so the orchestrator polls at the tuned
    /// interval and escalates a warning periodically while it waits.
    async fn wait_for_surface(&self, phases: &StartupPhases) {
        let _timer = phases.phase("wait_for_ui_surface", self.tuning.surface_wait_warn());
        let wait_started = Instant::now();
        let mut last_warn = Instant::now();

        while !self.state.read(|s| s.ui_surface_ready) {
            tokio::time::sleep(self.tuning.ui_poll_interval()).await;

            if last_warn.elapsed() >= self.tuning.ui_wait_warn_every() {
                tracing::warn!(
                    "still waiting for the UI surface after {:.0}ms",
                    wait_started.elapsed().as_secs_f64() * 1000.0
                );
                last_warn = Instant::now();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UserMode;
    use crate::protocol::CommandMessage;
    use crate::services::worker::DEFAULT_STARTUP_DEADLINE;
    use crate::ui::ui_channel;
    use camino::Utf8PathBuf;
    use std::time::Duration;

    struct StubSettings(UserSettings);

    impl SettingsProvider for StubSettings {
        fn load_settings(&self) -> anyhow::Result<UserSettings> {
            Ok(self.0.clone())
        }
    }

    struct StubCredentials(Option<String>);

    impl CredentialStore for StubCredentials {
        fn api_key(&self) -> Option<String> {
            self.0.clone()
        }
    }

    fn server_mode_orchestrator(
        credentials: Option<String>,
    ) -> (StartupOrchestrator, crate::ui::UiEventQueue, StateManager) {
        let supervisor = Arc::new(WorkerSupervisor::new(
            Utf8PathBuf::from("/usr/bin/env"),
            Utf8PathBuf::from("worker.py"),
            DEFAULT_STARTUP_DEADLINE,
        ));
        let (dispatcher, queue) = ui_channel();
        let state = StateManager::new();
        state.set_user_mode(UserMode::Server);

        let mut tuning = StartupTuning::default();
        tuning.ui_poll_interval_ms = 5;

        let orchestrator = StartupOrchestrator::new(
            supervisor,
            dispatcher,
            state.clone(),
            Arc::new(StubSettings(UserSettings::default())),
            Arc::new(StubCredentials(credentials)),
            tuning,
        );
        (orchestrator, queue, state)
    }

    fn drain_cmds(queue: &mut crate::ui::UiEventQueue) -> Vec<String> {
        let mut surface = Recorder::default();
        queue.process_pending(&mut surface);
        surface
            .sent
            .iter()
            .filter_map(|v| v.get("cmd").and_then(|c| c.as_str()).map(String::from))
            .collect()
    }

    #[derive(Default)]
    struct Recorder {
        sent: Vec<serde_json::Value>,
        notices: Vec<String>,
    }

    impl crate::ui::UiSurface for Recorder {
        fn reset_ui(&mut self) {}

        fn pick_files(&mut self) -> Vec<Utf8PathBuf> {
            Vec::new()
        }

        fn show_notice(&mut self, message: &str) {
            self.notices.push(message.to_string());
        }

        fn send_to_surface(&mut self, payload: serde_json::Value) {
            self.sent.push(payload);
        }
    }

    #[tokio::test]
    async fn test_server_mode_skips_worker_and_finishes() {
        let (orchestrator, mut queue, state) = server_mode_orchestrator(Some("sk-test".into()));
        state.mark_surface_ready();

        orchestrator.run().await.unwrap();

        let cmds = drain_cmds(&mut queue);
        assert_eq!(
            cmds,
            vec![
                cmd::SET_WEBAPP_LOADING_TEXT.to_string(),
                cmd::DID_LOAD_SETTINGS.to_string(),
                cmd::DID_FINISH_STARTUP.to_string(),
            ]
        );
        assert!(state.read(|s| s.startup_finished));
        assert!(!state.read(|s| s.webapp_loading));
    }

    #[tokio::test]
    async fn test_waits_for_surface_before_proceeding() {
        let (orchestrator, _queue, state) = server_mode_orchestrator(Some("sk-test".into()));

        let flipper = {
            let state = state.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(30)).await;
                state.mark_surface_ready();
            })
        };

        orchestrator.run().await.unwrap();
        flipper.await.unwrap();

        let phases = orchestrator.phases();
        let records = phases.records();
        assert_eq!(records[0].name, "wait_for_ui_surface");
        assert!(records[0].duration >= Duration::from_millis(25));
    }

    #[tokio::test]
    async fn test_surface_wait_phase_has_its_own_threshold() {
        let supervisor = Arc::new(WorkerSupervisor::new(
            Utf8PathBuf::from("/usr/bin/env"),
            Utf8PathBuf::from("worker.py"),
            DEFAULT_STARTUP_DEADLINE,
        ));
        let (dispatcher, _queue) = ui_channel();
        let state = StateManager::new();
        state.set_user_mode(UserMode::Server);

        // The bottleneck threshold is a separate knob from the in-wait
        // escalation cadence.
        let tuning = StartupTuning {
            ui_poll_interval_ms: 5,
            surface_wait_warn_ms: 1,
            ..Default::default()
        };
        let orchestrator = StartupOrchestrator::new(
            supervisor,
            dispatcher,
            state.clone(),
            Arc::new(StubSettings(UserSettings::default())),
            Arc::new(StubCredentials(Some("sk-test".into()))),
            tuning,
        );

        let flipper = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            state.mark_surface_ready();
        });

        orchestrator.run().await.unwrap();
        flipper.await.unwrap();

        let phases = orchestrator.phases();
        let records = phases.records();
        assert_eq!(records[0].name, "wait_for_ui_surface");
        assert_eq!(records[0].threshold, Duration::from_millis(1));
        assert!(records[0].exceeded_threshold());
    }

    #[tokio::test]
    async fn test_missing_credentials_in_server_mode_skips_notice() {
        // The key lives on the server in server mode; no local notice.
        let (orchestrator, mut queue, state) = server_mode_orchestrator(None);
        state.mark_surface_ready();

        orchestrator.run().await.unwrap();

        let mut surface = Recorder::default();
        queue.process_pending(&mut surface);
        assert!(surface.notices.is_empty());
    }

    #[tokio::test]
    async fn test_local_mode_worker_failure_pushes_restart_hint() {
        let supervisor = Arc::new(WorkerSupervisor::new(
            Utf8PathBuf::from("/nonexistent/interpreter"),
            Utf8PathBuf::from("worker.py"),
            DEFAULT_STARTUP_DEADLINE,
        ));
        let (dispatcher, mut queue) = ui_channel();
        let state = StateManager::new();
        state.mark_surface_ready();

        let orchestrator = StartupOrchestrator::new(
            supervisor,
            dispatcher,
            state.clone(),
            Arc::new(StubSettings(UserSettings::default())),
            Arc::new(StubCredentials(None)),
            StartupTuning::default(),
        );

        // Local mode with an unspawnable worker: run fails before the
        // credential check and pushes the restart hint instead.
        let result = orchestrator.run().await;
        assert!(result.is_err());

        let mut surface = Recorder::default();
        queue.process_pending(&mut surface);
        let texts: Vec<_> = surface
            .sent
            .iter()
            .filter(|v| v["cmd"] == cmd::SET_WEBAPP_LOADING_TEXT)
            .collect();
        assert!(texts.last().unwrap()["data"]["text"]
            .as_str()
            .unwrap()
            .contains("Restart AI"));
        assert!(!state.read(|s| s.chat_ready));
    }

    #[tokio::test]
    async fn test_restart_in_server_mode_round_trips() {
        let (orchestrator, mut queue, state) = server_mode_orchestrator(Some("sk-test".into()));
        state.mark_surface_ready();

        orchestrator.run().await.unwrap();
        drain_cmds(&mut queue);

        orchestrator.restart().await.unwrap();

        let cmds = drain_cmds(&mut queue);
        assert_eq!(cmds.first().map(String::as_str), Some(cmd::SET_WEBAPP_LOADING));
        assert_eq!(cmds.last().map(String::as_str), Some(cmd::STOP_LOADERS));
        assert!(cmds.contains(&cmd::DID_FINISH_STARTUP.to_string()));
        assert!(!state.read(|s| s.webapp_loading));
    }

    #[test]
    fn test_env_credential_store_empty_is_none() {
        let store = EnvCredentialStore::new("CHATHOST_TEST_MISSING_KEY_VAR");
        assert!(store.api_key().is_none());
    }

    #[test]
    fn test_settings_push_uses_camel_case() {
        // DID_LOAD_SETTINGS payload shape is part of the surface contract.
        let value = serde_json::to_value(UserSettings::default()).unwrap();
        assert!(value.get("llmModel").is_some());
        let _ = CommandMessage::with_data(cmd::DID_LOAD_SETTINGS, value);
    }
}
