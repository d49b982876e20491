// PromptTrail Settings Engine
// Loads, saves and updates the engine's tunables (debounce windows, host
// attribute names, storage namespace). Settings live as a JSON file at the
// platform-specific config path.

use std::fs;
use std::path::Path;

use log::{debug, info};

use crate::platform;
use crate::types::errors::SettingsError;
use crate::types::settings::TrailSettings;

/// Trait defining the settings engine interface.
pub trait SettingsEngineTrait {
    fn load(&mut self) -> Result<TrailSettings, SettingsError>;
    fn save(&self) -> Result<(), SettingsError>;
    fn get_settings(&self) -> &TrailSettings;
    fn set_value(&mut self, key: &str, value: serde_json::Value) -> Result<(), SettingsError>;
    fn reset(&mut self) -> Result<(), SettingsError>;
    fn get_config_path(&self) -> &str;
}

/// Settings engine implementation that persists settings as JSON on disk.
pub struct SettingsEngine {
    config_path: String,
    settings: TrailSettings,
}

impl SettingsEngine {
    /// Creates a new SettingsEngine.
    ///
    /// If `path_override` is `Some`, uses that path for the config file.
    /// Otherwise, uses the platform-specific config directory with `settings.json`.
    pub fn new(path_override: Option<String>) -> Self {
        let config_path = match path_override {
            Some(p) => p,
            None => platform::get_config_dir()
                .join("settings.json")
                .to_string_lossy()
                .to_string(),
        };

        Self {
            config_path,
            settings: TrailSettings::default(),
        }
    }
}

impl SettingsEngineTrait for SettingsEngine {
    /// Loads settings from the JSON config file.
    ///
    /// A missing file yields defaults. Sections absent from the file fall back
    /// to their defaults; a malformed file is a serialization error.
    fn load(&mut self) -> Result<TrailSettings, SettingsError> {
        let path = Path::new(&self.config_path);

        if !path.exists() {
            debug!("no settings file at {}, using defaults", self.config_path);
            self.settings = TrailSettings::default();
            return Ok(self.settings.clone());
        }

        let content = fs::read_to_string(path)
            .map_err(|e| SettingsError::IoError(format!("Failed to read config file: {}", e)))?;

        let settings: TrailSettings = serde_json::from_str(&content).map_err(|e| {
            SettingsError::SerializationError(format!("Failed to parse config file: {}", e))
        })?;

        info!("loaded settings from {}", self.config_path);
        self.settings = settings;
        Ok(self.settings.clone())
    }

    /// Saves the current settings, creating parent directories as needed.
    fn save(&self) -> Result<(), SettingsError> {
        let path = Path::new(&self.config_path);

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                SettingsError::IoError(format!("Failed to create config directory: {}", e))
            })?;
        }

        let json = serde_json::to_string_pretty(&self.settings).map_err(|e| {
            SettingsError::SerializationError(format!("Failed to serialize settings: {}", e))
        })?;

        fs::write(path, json)
            .map_err(|e| SettingsError::IoError(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }

    fn get_settings(&self) -> &TrailSettings {
        &self.settings
    }

    /// Updates an individual setting by dot-notation key path and saves.
    ///
    /// # Examples
    /// - `"timing.render_debounce_ms"` → updates `settings.timing.render_debounce_ms`
    /// - `"host.message_id_attribute"` → updates `settings.host.message_id_attribute`
    fn set_value(&mut self, key: &str, value: serde_json::Value) -> Result<(), SettingsError> {
        let pointer = key_to_pointer(key)?;
        let mut tree = serde_json::to_value(&self.settings).map_err(|e| {
            SettingsError::SerializationError(format!("Failed to serialize settings: {}", e))
        })?;

        let slot = tree
            .pointer_mut(&pointer)
            .ok_or_else(|| SettingsError::InvalidKey(format!("Key '{}' not found in settings", key)))?;
        *slot = value;

        self.settings = serde_json::from_value(tree).map_err(|e| {
            SettingsError::InvalidValue(format!("Invalid value for key '{}': {}", key, e))
        })?;
        debug!("setting {} updated", key);
        self.save()
    }

    /// Resets all settings to defaults and saves to disk.
    fn reset(&mut self) -> Result<(), SettingsError> {
        self.settings = TrailSettings::default();
        self.save()?;
        Ok(())
    }

    fn get_config_path(&self) -> &str {
        &self.config_path
    }
}

/// `"timing.render_debounce_ms"` becomes `"/timing/render_debounce_ms"`.
fn key_to_pointer(key: &str) -> Result<String, SettingsError> {
    if key.is_empty() {
        return Err(SettingsError::InvalidKey("Key cannot be empty".to_string()));
    }
    let mut pointer = String::with_capacity(key.len() + 1);
    for part in key.split('.') {
        if part.is_empty() || part.contains('/') || part.contains('~') {
            return Err(SettingsError::InvalidKey(format!("Malformed key '{}'", key)));
        }
        pointer.push('/');
        pointer.push_str(part);
    }
    Ok(pointer)
}
