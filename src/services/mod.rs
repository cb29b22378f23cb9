//! Services module - worker lifecycle and the startup sequence.
//!
//! This module contains the process-facing logic of the host. The services
//! are **framework-agnostic** and have no dependencies on the UI layer beyond
//! the dispatcher handle, making them testable and reusable.
//!
//! # Components
//!
//! - [`WorkerSupervisor`]: Spawns the chat worker process, runs the readiness
//!   handshake, and serializes request/response exchanges over its pipes
//! - [`ChatAdapter`]: Typed facade over the worker's chat commands
//! - [`StartupOrchestrator`]: Drives the boot sequence (surface wait, worker
//!   start, settings push, completion signal, credential check) and restarts
//! - [`compat`]: Model-name compatibility mapping for [`ChatAdapter::set_model`]

pub mod chat;
pub mod compat;
pub mod startup;
pub mod worker;

pub use chat::{CardType, ChatAdapter};
pub use startup::{CredentialStore, EnvCredentialStore, SettingsProvider, StartupOrchestrator};
pub use worker::{SupervisorError, WorkerState, WorkerSupervisor};
