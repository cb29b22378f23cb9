use crate::models::{StartupTuning, UserSettings};
use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use std::fs;

/// Settings manager for loading and saving YAML configuration files.
///
/// Manages two files inside the configuration directory:
/// - `Settings.yaml`: user preferences, pushed to the UI surface at startup
/// - `Tuning.yaml`: startup poll interval and bottleneck thresholds
#[derive(Debug, Clone)]
pub struct SettingsManager {
    config_dir: Utf8PathBuf,
    settings_path: Utf8PathBuf,
    tuning_path: Utf8PathBuf,
}

impl SettingsManager {
    /// Create a new SettingsManager rooted at the given configuration directory.
    ///
    /// The directory is created if it does not exist.
    pub fn new<P: AsRef<Utf8Path>>(config_dir: P) -> Result<Self> {
        let config_dir = config_dir.as_ref().to_path_buf();

        if !config_dir.exists() {
            fs::create_dir_all(&config_dir)
                .with_context(|| format!("Failed to create config directory: {}", config_dir))?;
        }

        Ok(Self {
            settings_path: config_dir.join("Settings.yaml"),
            tuning_path: config_dir.join("Tuning.yaml"),
            config_dir,
        })
    }

    /// Load the user settings file.
    ///
    /// # Returns
    /// The loaded UserSettings, or defaults if the file doesn't exist
    pub fn load_settings(&self) -> Result<UserSettings> {
        if !self.settings_path.exists() {
            tracing::warn!(
                "Settings file not found at {}, using defaults",
                self.settings_path
            );
            return Ok(UserSettings::default());
        }

        let file_contents = fs::read_to_string(&self.settings_path)
            .with_context(|| format!("Failed to read settings: {}", self.settings_path))?;

        let settings: UserSettings = serde_yaml_ng::from_str(&file_contents)
            .with_context(|| format!("Failed to parse settings: {}", self.settings_path))?;

        tracing::info!("Loaded settings from {}", self.settings_path);
        Ok(settings)
    }

    /// Save the user settings file.
    pub fn save_settings(&self, settings: &UserSettings) -> Result<()> {
        let yaml_string =
            serde_yaml_ng::to_string(settings).context("Failed to serialize settings to YAML")?;

        fs::write(&self.settings_path, yaml_string)
            .with_context(|| format!("Failed to write settings: {}", self.settings_path))?;

        tracing::info!("Saved settings to {}", self.settings_path);
        Ok(())
    }

    /// Load, mutate, and persist the settings in one step.
    ///
    /// # Example
    /// ```ignore
    /// settings_manager.edit(|s| s.show_side_panel = false)?;
    /// ```
    pub fn edit<F>(&self, mutate: F) -> Result<UserSettings>
    where
        F: FnOnce(&mut UserSettings),
    {
        let mut settings = self.load_settings()?;
        mutate(&mut settings);
        self.save_settings(&settings)?;
        Ok(settings)
    }

    /// Load the startup tuning file.
    ///
    /// # Returns
    /// The loaded StartupTuning, or defaults if the file doesn't exist
    pub fn load_tuning(&self) -> Result<StartupTuning> {
        if !self.tuning_path.exists() {
            tracing::debug!(
                "Tuning file not found at {}, using defaults",
                self.tuning_path
            );
            return Ok(StartupTuning::default());
        }

        let file_contents = fs::read_to_string(&self.tuning_path)
            .with_context(|| format!("Failed to read tuning: {}", self.tuning_path))?;

        let tuning: StartupTuning = serde_yaml_ng::from_str(&file_contents)
            .with_context(|| format!("Failed to parse tuning: {}", self.tuning_path))?;

        tracing::info!("Loaded startup tuning from {}", self.tuning_path);
        Ok(tuning)
    }

    /// Save the startup tuning file.
    pub fn save_tuning(&self, tuning: &StartupTuning) -> Result<()> {
        let yaml_string =
            serde_yaml_ng::to_string(tuning).context("Failed to serialize tuning to YAML")?;

        fs::write(&self.tuning_path, yaml_string)
            .with_context(|| format!("Failed to write tuning: {}", self.tuning_path))?;

        tracing::info!("Saved startup tuning to {}", self.tuning_path);
        Ok(())
    }

    /// Get the configuration directory path.
    pub fn config_dir(&self) -> &Utf8Path {
        &self.config_dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_settings_manager() -> (SettingsManager, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let config_path = Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).unwrap();
        let manager = SettingsManager::new(&config_path).unwrap();
        (manager, temp_dir)
    }

    #[test]
    fn test_create_settings_manager() {
        let (_manager, _temp_dir) = create_test_settings_manager();
    }

    #[test]
    fn test_missing_files_fall_back_to_defaults() {
        let (manager, _temp_dir) = create_test_settings_manager();

        let settings = manager.load_settings().unwrap();
        assert_eq!(settings, UserSettings::default());

        let tuning = manager.load_tuning().unwrap();
        assert_eq!(tuning, StartupTuning::default());
    }

    #[test]
    fn test_load_save_settings() {
        let (manager, _temp_dir) = create_test_settings_manager();

        let mut settings = UserSettings::default();
        settings.llm_model = "gpt-4".to_string();
        manager.save_settings(&settings).unwrap();

        let loaded = manager.load_settings().unwrap();
        assert_eq!(loaded.llm_model, "gpt-4");
    }

    #[test]
    fn test_edit_persists_mutation() {
        let (manager, _temp_dir) = create_test_settings_manager();

        manager.edit(|s| s.show_side_panel = false).unwrap();

        let loaded = manager.load_settings().unwrap();
        assert!(!loaded.show_side_panel);
    }

    #[test]
    fn test_load_save_tuning() {
        let (manager, _temp_dir) = create_test_settings_manager();

        let mut tuning = StartupTuning::default();
        tuning.startup_deadline_secs = 1;
        manager.save_tuning(&tuning).unwrap();

        let loaded = manager.load_tuning().unwrap();
        assert_eq!(loaded.startup_deadline_secs, 1);
    }
}
