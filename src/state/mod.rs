// State management module
//
// This module provides the StateManager which wraps AppState with thread-safe access
// using Arc<RwLock<T>> and emits change events for the UI and tests.

use crate::models::{AppState, UserMode};
use std::sync::{Arc, RwLock};
use tokio::sync::broadcast;

/// Change events emitted when state is modified
///
/// These events are emitted to notify interested parties (primarily the host
/// UI) about state changes without requiring them to poll the state.
#[derive(Clone, Debug, PartialEq)]
pub enum StateChange {
    /// The embedded UI surface finished (or un-finished) loading
    SurfaceReadyChanged { ready: bool },

    /// The worker process became ready or was stopped
    ChatReadyChanged { ready: bool },

    /// The UI surface loading screen was toggled
    LoadingChanged { loading: bool },

    /// The user switched operating modes
    ModeChanged { mode: UserMode },

    /// The startup sequence pushed its finished signal
    StartupFinished,
}

/// Thread-safe state manager with event emission
///
/// This is the central state management component that:
/// - Provides thread-safe access to [`AppState`] via `Arc<RwLock<T>>`
/// - Detects state changes and emits [`StateChange`] events
/// - Supports subscribing to state changes via tokio broadcast channels
pub struct StateManager {
    /// The application state protected by RwLock for thread-safe access
    state: Arc<RwLock<AppState>>,

    /// Broadcast channel for emitting state change events
    state_tx: broadcast::Sender<StateChange>,
}

impl StateManager {
    /// Create a new StateManager with default state
    pub fn new() -> Self {
        let (state_tx, _) = broadcast::channel(100);
        Self {
            state: Arc::new(RwLock::new(AppState::default())),
            state_tx,
        }
    }

    /// Get a read-only snapshot of the current state
    pub fn snapshot(&self) -> AppState {
        self.state.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Execute a function with read access to the state
    ///
    /// # Example
    /// ```ignore
    /// let ready = state_manager.read(|state| state.ui_surface_ready);
    /// ```
    pub fn read<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&AppState) -> R,
    {
        let state = self.state.read().unwrap_or_else(|e| e.into_inner());
        f(&state)
    }

    /// Update the state and emit change events
    ///
    /// This is the primary way to modify state. It:
    /// 1. Captures the old state
    /// 2. Applies the update function
    /// 3. Detects what changed
    /// 4. Emits appropriate events
    pub fn update<F>(&self, update_fn: F) -> Vec<StateChange>
    where
        F: FnOnce(&mut AppState),
    {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        let old_state = state.clone();

        update_fn(&mut state);

        let changes = detect_changes(&old_state, &state);
        for change in &changes {
            // Ignore send errors - it's OK if no one is listening
            let _ = self.state_tx.send(change.clone());
        }

        changes
    }

    /// Subscribe to state change events
    pub fn subscribe(&self) -> broadcast::Receiver<StateChange> {
        self.state_tx.subscribe()
    }

    // Convenience methods for common state updates

    /// Mark the embedded UI surface as loaded; ends the orchestrator's poll-wait
    pub fn mark_surface_ready(&self) -> Vec<StateChange> {
        self.update(|state| {
            state.ui_surface_ready = true;
        })
    }

    /// Record whether the worker process is ready for calls
    pub fn set_chat_ready(&self, ready: bool) -> Vec<StateChange> {
        self.update(|state| {
            state.chat_ready = ready;
        })
    }

    /// Toggle the UI surface loading screen flag
    pub fn set_webapp_loading(&self, loading: bool) -> Vec<StateChange> {
        self.update(|state| {
            state.webapp_loading = loading;
        })
    }

    /// Switch operating modes
    pub fn set_user_mode(&self, mode: UserMode) -> Vec<StateChange> {
        self.update(|state| {
            state.user_mode = mode;
        })
    }

    /// Record that the startup sequence completed
    pub fn mark_startup_finished(&self) -> Vec<StateChange> {
        self.update(|state| {
            state.startup_finished = true;
            state.webapp_loading = false;
        })
    }
}

/// Detect what changed between two states and generate events
fn detect_changes(old: &AppState, new: &AppState) -> Vec<StateChange> {
    let mut changes = Vec::new();

    if old.ui_surface_ready != new.ui_surface_ready {
        changes.push(StateChange::SurfaceReadyChanged {
            ready: new.ui_surface_ready,
        });
    }

    if old.chat_ready != new.chat_ready {
        changes.push(StateChange::ChatReadyChanged {
            ready: new.chat_ready,
        });
    }

    if old.webapp_loading != new.webapp_loading {
        changes.push(StateChange::LoadingChanged {
            loading: new.webapp_loading,
        });
    }

    if old.user_mode != new.user_mode {
        changes.push(StateChange::ModeChanged {
            mode: new.user_mode,
        });
    }

    if !old.startup_finished && new.startup_finished {
        changes.push(StateChange::StartupFinished);
    }

    changes
}

impl Default for StateManager {
    fn default() -> Self {
        Self::new()
    }
}

// Make StateManager cloneable for sharing across threads
impl Clone for StateManager {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            state_tx: self.state_tx.clone(),
        }
    }
}
