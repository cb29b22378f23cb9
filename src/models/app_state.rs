use serde::{Deserialize, Serialize};

/// Operating mode of the host.
///
/// Local mode owns and supervises a worker subprocess for inference; Server
/// mode delegates inference elsewhere and never spawns a worker, so the
/// orchestrator skips the worker-start and credential-check steps.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum UserMode {
    #[default]
    Local,
    Server,
}

impl UserMode {
    /// Whether this mode owns a worker process.
    pub fn owns_worker(&self) -> bool {
        matches!(self, UserMode::Local)
    }
}

/// Single source of truth for host runtime state.
///
/// # Thread Safety
///
/// `AppState` is wrapped in `Arc<RwLock<AppState>>` by [`crate::state::StateManager`]
/// to provide thread-safe access across the application. Never access `AppState`
/// directly - always use [`StateManager`](crate::state::StateManager) methods:
/// - [`read()`](crate::state::StateManager::read) for read-only access
/// - [`update()`](crate::state::StateManager::update) for mutations with automatic change events
#[derive(Clone, Debug)]
pub struct AppState {
    /// Operating mode for this session.
    pub user_mode: UserMode,

    /// Flipped by the host when the embedded UI surface has finished loading.
    /// The startup orchestrator poll-waits on this flag.
    pub ui_surface_ready: bool,

    /// Set once the worker process has completed its readiness handshake.
    pub chat_ready: bool,

    /// Whether the UI surface is showing its loading screen.
    pub webapp_loading: bool,

    /// Set after the orchestrator has pushed the startup-finished signal.
    pub startup_finished: bool,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            user_mode: UserMode::Local,
            ui_surface_ready: false,
            chat_ready: false,
            webapp_loading: true,
            startup_finished: false,
        }
    }
}
