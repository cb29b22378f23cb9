// chathost - host-embedded chat worker supervisor
//
// This is the library crate containing the protocol codec, worker supervisor,
// startup orchestrator, cross-thread dispatcher, and background loop runner.
// The binary crate (main.rs) provides a console host entry point.

pub mod config;
pub mod logging;
pub mod models;
pub mod protocol;
pub mod runtime;
pub mod services;
pub mod state;
pub mod timing;
pub mod ui;

// Re-export commonly used types for convenience
pub use config::SettingsManager;
pub use models::{AppState, StartupTuning, UserMode, UserSettings};
pub use protocol::CommandMessage;
pub use runtime::LoopRunner;
pub use services::{ChatAdapter, StartupOrchestrator, WorkerSupervisor};
pub use state::{StateChange, StateManager};
pub use ui::{UiDispatcher, UiEventQueue, ui_channel};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
