//! Integration tests for the startup sequence
//!
//! These tests run the orchestrator against a real stub worker process and
//! verify:
//! - Signal ordering on the UI queue across the whole boot sequence
//! - Worker lifecycle wiring (chat_ready, restart cycle)
//! - Settings flowing from disk to the DID_LOAD_SETTINGS push
//! - The credential notice and the typed chat adapter
#![cfg(unix)]

use camino::Utf8PathBuf;
use chathost::models::{StartupTuning, UserSettings};
use chathost::protocol::cmd;
use chathost::services::{
    ChatAdapter, CredentialStore, SettingsProvider, StartupOrchestrator, WorkerState,
    WorkerSupervisor,
};
use chathost::ui::{UiEventQueue, UiSurface, ui_channel};
use chathost::{SettingsManager, StateManager};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// Announces readiness, then echoes every request line back verbatim.
const ECHO_WORKER: &str = "#!/bin/sh
echo '{\"status\":\"success\"}'
while IFS= read -r line; do
  printf '%s\\n' \"$line\"
done
";

fn echo_supervisor(dir: &TempDir) -> Arc<WorkerSupervisor> {
    let script_path = dir.path().join("worker.sh");
    std::fs::write(&script_path, ECHO_WORKER).unwrap();
    Arc::new(WorkerSupervisor::new(
        Utf8PathBuf::from("/bin/sh"),
        Utf8PathBuf::try_from(script_path).unwrap(),
        Duration::from_secs(10),
    ))
}

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

#[derive(Default)]
struct RecordingSurface {
    sent: Vec<Value>,
    notices: Vec<String>,
}

impl UiSurface for RecordingSurface {
    fn reset_ui(&mut self) {}

    fn pick_files(&mut self) -> Vec<Utf8PathBuf> {
        Vec::new()
    }

    fn show_notice(&mut self, message: &str) {
        self.notices.push(message.to_string());
    }

    fn send_to_surface(&mut self, payload: Value) {
        self.sent.push(payload);
    }
}

fn drain(queue: &mut UiEventQueue) -> RecordingSurface {
    let mut surface = RecordingSurface::default();
    queue.process_pending(&mut surface);
    surface
}

fn cmds(surface: &RecordingSurface) -> Vec<&str> {
    surface
        .sent
        .iter()
        .filter_map(|v| v.get("cmd").and_then(Value::as_str))
        .collect()
}

fn orchestrator_with(
    supervisor: Arc<WorkerSupervisor>,
    settings: UserSettings,
    api_key: Option<String>,
) -> (StartupOrchestrator, UiEventQueue, StateManager) {
    let (dispatcher, queue) = ui_channel();
    let state = StateManager::new();

    let orchestrator = StartupOrchestrator::new(
        supervisor,
        dispatcher,
        state.clone(),
        Arc::new(StubSettings(settings)),
        Arc::new(StubCredentials(api_key)),
        StartupTuning::default(),
    );
    (orchestrator, queue, state)
}

#[tokio::test]
async fn test_full_startup_signal_order() {
    let dir = TempDir::new().unwrap();
    let supervisor = echo_supervisor(&dir);
    let (orchestrator, mut queue, state) = orchestrator_with(
        Arc::clone(&supervisor),
        UserSettings::default(),
        Some("sk-test".to_string()),
    );
    state.mark_surface_ready();

    orchestrator.run().await.unwrap();

    let surface = drain(&mut queue);
    assert_eq!(
        cmds(&surface),
        vec![
            cmd::SET_WEBAPP_LOADING_TEXT, // "Starting AI engine..."
            cmd::SET_WEBAPP_LOADING_TEXT, // "Loading your settings..."
            cmd::DID_LOAD_SETTINGS,
            cmd::DID_FINISH_STARTUP,
        ]
    );
    assert!(surface.notices.is_empty());

    assert_eq!(supervisor.state(), WorkerState::Ready);
    assert!(state.read(|s| s.chat_ready));
    assert!(state.read(|s| s.startup_finished));
    assert!(!state.read(|s| s.webapp_loading));

    supervisor.stop().await;
}

#[tokio::test]
async fn test_missing_api_key_emits_notice() {
    let dir = TempDir::new().unwrap();
    let supervisor = echo_supervisor(&dir);
    let (orchestrator, mut queue, state) =
        orchestrator_with(Arc::clone(&supervisor), UserSettings::default(), None);
    state.mark_surface_ready();

    orchestrator.run().await.unwrap();

    let surface = drain(&mut queue);
    assert_eq!(surface.notices.len(), 1);
    assert!(surface.notices[0].contains("no API key"));

    supervisor.stop().await;
}

#[tokio::test]
async fn test_settings_loaded_from_disk_reach_the_surface() {
    let dir = TempDir::new().unwrap();
    let supervisor = echo_supervisor(&dir);

    let config_dir = Utf8PathBuf::try_from(dir.path().join("config")).unwrap();
    let manager = SettingsManager::new(&config_dir).unwrap();
    let mut settings = UserSettings::default();
    settings.llm_model = "gpt-4".to_string();
    manager.save_settings(&settings).unwrap();

    let (dispatcher, mut queue) = ui_channel();
    let state = StateManager::new();
    state.mark_surface_ready();

    let orchestrator = StartupOrchestrator::new(
        Arc::clone(&supervisor),
        dispatcher,
        state,
        Arc::new(manager),
        Arc::new(StubCredentials(Some("sk-test".to_string()))),
        StartupTuning::default(),
    );

    orchestrator.run().await.unwrap();

    let surface = drain(&mut queue);
    let pushed = surface
        .sent
        .iter()
        .find(|v| v["cmd"] == cmd::DID_LOAD_SETTINGS)
        .unwrap();
    assert_eq!(pushed["data"]["llmModel"], "gpt-4");

    supervisor.stop().await;
}

#[tokio::test]
async fn test_restart_cycles_the_worker() {
    let dir = TempDir::new().unwrap();
    let supervisor = echo_supervisor(&dir);
    let (orchestrator, mut queue, state) = orchestrator_with(
        Arc::clone(&supervisor),
        UserSettings::default(),
        Some("sk-test".to_string()),
    );
    state.mark_surface_ready();

    orchestrator.run().await.unwrap();
    drain(&mut queue);

    orchestrator.restart().await.unwrap();

    let surface = drain(&mut queue);
    let signals = cmds(&surface);
    assert_eq!(signals.first(), Some(&cmd::SET_WEBAPP_LOADING));
    assert_eq!(signals.last(), Some(&cmd::STOP_LOADERS));
    assert!(signals.contains(&cmd::DID_FINISH_STARTUP));

    // The restarted worker is a fresh process that serves calls again.
    assert_eq!(supervisor.state(), WorkerState::Ready);
    assert!(state.read(|s| s.chat_ready));

    supervisor.stop().await;
}

#[tokio::test]
async fn test_chat_adapter_round_trips_through_worker() {
    let dir = TempDir::new().unwrap();
    let supervisor = echo_supervisor(&dir);
    supervisor.start().await.unwrap();

    let adapter = ChatAdapter::new(Arc::clone(&supervisor));

    // The echo worker returns the request payload, exposing what the
    // adapter put on the wire.
    let data = adapter.ask("what is a monad?").await.unwrap();
    assert_eq!(data["query"], "what is a monad?");

    // set_model resolves unsupported names before they hit the wire.
    let data = adapter.set_model("gpt-5").await.unwrap();
    assert_eq!(data["model"], "gpt-4");

    supervisor.stop().await;
}
