use serde::{Deserialize, Serialize};
use std::time::Duration;

/// User settings from `Settings.yaml`.
///
/// Pushed verbatim to the UI surface during startup under the
/// `DID_LOAD_SETTINGS` tag, so the field names use the camelCase keys the
/// web app expects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSettings {
    #[serde(default = "default_show_side_panel")]
    pub show_side_panel: bool,

    #[serde(default = "default_model")]
    pub llm_model: String,

    #[serde(default = "default_language")]
    pub language: String,

    #[serde(default)]
    pub custom_card_prompt: String,

    /// Mode selected on first run; `None` until the user chooses.
    #[serde(default)]
    pub user_mode: Option<super::UserMode>,
}

impl Default for UserSettings {
    fn default() -> Self {
        Self {
            show_side_panel: default_show_side_panel(),
            llm_model: default_model(),
            language: default_language(),
            custom_card_prompt: String::new(),
            user_mode: None,
        }
    }
}

fn default_show_side_panel() -> bool {
    true
}

fn default_model() -> String {
    "gpt-3.5-turbo".to_string()
}

fn default_language() -> String {
    "English".to_string()
}

/// Startup tuning knobs from `Tuning.yaml`.
///
/// These exist as configuration rather than inline constants so the poll
/// interval and warning thresholds stay observable in tests and adjustable
/// in the field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StartupTuning {
    /// Interval between UI-surface readiness polls.
    #[serde(rename = "UI Poll Interval MS", default = "default_ui_poll_interval")]
    pub ui_poll_interval_ms: u64,

    /// Escalating warning cadence while still waiting for the UI surface.
    #[serde(rename = "UI Wait Warn Every MS", default = "default_ui_wait_warn_every")]
    pub ui_wait_warn_every_ms: u64,

    /// Warn when the whole surface wait exceeds this. Distinct from the
    /// in-wait cadence above: this one flags the completed wait as a
    /// bottleneck in the phase record.
    #[serde(rename = "Surface Wait Warn MS", default = "default_surface_wait_warn")]
    pub surface_wait_warn_ms: u64,

    /// Warn when the worker-start step exceeds this.
    #[serde(rename = "Worker Start Warn MS", default = "default_worker_start_warn")]
    pub worker_start_warn_ms: u64,

    /// Warn when the settings-load step exceeds this.
    #[serde(rename = "Settings Load Warn MS", default = "default_settings_load_warn")]
    pub settings_load_warn_ms: u64,

    /// Escalated warning when the whole startup sequence exceeds this.
    #[serde(rename = "Total Budget Warn MS", default = "default_total_budget_warn")]
    pub total_budget_warn_ms: u64,

    /// Hard deadline for the worker's readiness handshake.
    #[serde(rename = "Startup Deadline Secs", default = "default_startup_deadline")]
    pub startup_deadline_secs: u64,
}

impl StartupTuning {
    pub fn ui_poll_interval(&self) -> Duration {
        Duration::from_millis(self.ui_poll_interval_ms)
    }

    pub fn ui_wait_warn_every(&self) -> Duration {
        Duration::from_millis(self.ui_wait_warn_every_ms)
    }

    pub fn surface_wait_warn(&self) -> Duration {
        Duration::from_millis(self.surface_wait_warn_ms)
    }

    pub fn worker_start_warn(&self) -> Duration {
        Duration::from_millis(self.worker_start_warn_ms)
    }

    pub fn settings_load_warn(&self) -> Duration {
        Duration::from_millis(self.settings_load_warn_ms)
    }

    pub fn total_budget_warn(&self) -> Duration {
        Duration::from_millis(self.total_budget_warn_ms)
    }

    pub fn startup_deadline(&self) -> Duration {
        Duration::from_secs(self.startup_deadline_secs)
    }
}

impl Default for StartupTuning {
    fn default() -> Self {
        Self {
            ui_poll_interval_ms: default_ui_poll_interval(),
            ui_wait_warn_every_ms: default_ui_wait_warn_every(),
            surface_wait_warn_ms: default_surface_wait_warn(),
            worker_start_warn_ms: default_worker_start_warn(),
            settings_load_warn_ms: default_settings_load_warn(),
            total_budget_warn_ms: default_total_budget_warn(),
            startup_deadline_secs: default_startup_deadline(),
        }
    }
}

fn default_ui_poll_interval() -> u64 {
    100
}

fn default_ui_wait_warn_every() -> u64 {
    5000
}

fn default_surface_wait_warn() -> u64 {
    10_000
}

fn default_worker_start_warn() -> u64 {
    5000
}

fn default_settings_load_warn() -> u64 {
    5000
}

fn default_total_budget_warn() -> u64 {
    10_000
}

fn default_startup_deadline() -> u64 {
    60
}
