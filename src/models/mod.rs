//! Data models for the chathost application.
//!
//! This module contains the core data structures used throughout the application:
//! - [`AppState`]: The central state container holding runtime flags for the boot sequence
//! - [`UserMode`]: Whether this host owns a local worker process or talks to a server
//! - [`UserSettings`]: User preferences loaded from `Settings.yaml` and pushed to the UI surface
//! - [`StartupTuning`]: Poll intervals and bottleneck thresholds loaded from `Tuning.yaml`
//!
//! # Architecture Note
//!
//! The models are designed to be:
//! - **Serializable**: Config structs derive `Serialize`/`Deserialize` for YAML persistence
//! - **Cloneable**: AppState is wrapped in `Arc<RwLock<>>` by [`StateManager`](crate::state::StateManager) for thread-safe access
//! - **Immutable**: State updates go through StateManager's `update()` method to ensure consistency

pub mod app_state;
pub mod settings;

pub use app_state::{AppState, UserMode};
pub use settings::{StartupTuning, UserSettings};
