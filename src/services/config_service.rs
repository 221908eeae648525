// Shell Config Service
// Owns the live configuration handle and its JSON file: loading, saving,
// dot-notation updates, deep-merge updates and resetting to defaults.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use serde_json::Value;

use crate::platform;
use crate::types::errors::ConfigError;
use crate::types::settings::ShellConfig;

/// Cloneable live view of the configuration.
///
/// Core components keep one of these and re-read it at point of use, so
/// changes made through [`ConfigService`] apply on the next operation.
#[derive(Debug, Clone, Default)]
pub struct SharedConfig {
    inner: Arc<RwLock<ShellConfig>>,
}

impl SharedConfig {
    pub fn new(config: ShellConfig) -> Self {
        Self {
            inner: Arc::new(RwLock::new(config)),
        }
    }

    /// Returns a copy of the current configuration.
    pub fn get(&self) -> ShellConfig {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn replace(&self, config: ShellConfig) {
        *self.inner.write().unwrap_or_else(PoisonError::into_inner) = config;
    }

    /// Applies an in-place edit.
    pub fn update(&self, edit: impl FnOnce(&mut ShellConfig)) {
        edit(&mut self.inner.write().unwrap_or_else(PoisonError::into_inner));
    }
}

/// File-backed owner of the [`SharedConfig`].
pub struct ConfigService {
    config_path: PathBuf,
    shared: SharedConfig,
}

impl ConfigService {
    /// Creates a service holding default values.
    ///
    /// If `path_override` is `None`, the file is `config.json` in the
    /// platform config directory.
    pub fn new(path_override: Option<PathBuf>) -> Self {
        let config_path =
            path_override.unwrap_or_else(|| platform::get_config_dir().join("config.json"));
        Self {
            config_path,
            shared: SharedConfig::default(),
        }
    }

    /// Live handle to hand to core components.
    pub fn shared(&self) -> SharedConfig {
        self.shared.clone()
    }

    pub fn get(&self) -> ShellConfig {
        self.shared.get()
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Loads the config file into the live handle.
    ///
    /// A missing file yields defaults; a malformed file is an error and leaves
    /// the live values untouched.
    pub fn load(&self) -> Result<ShellConfig, ConfigError> {
        if !self.config_path.exists() {
            self.shared.replace(ShellConfig::default());
            return Ok(ShellConfig::default());
        }

        let content = fs::read_to_string(&self.config_path)
            .map_err(|e| ConfigError::Io(format!("Failed to read config file: {}", e)))?;

        let config: ShellConfig = serde_json::from_str(&content).map_err(|e| {
            ConfigError::Serialization(format!("Failed to parse config file: {}", e))
        })?;

        self.shared.replace(config.clone());
        Ok(config)
    }

    /// Writes the live values to disk, creating parent directories as needed.
    pub fn save(&self) -> Result<(), ConfigError> {
        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                ConfigError::Io(format!("Failed to create config directory: {}", e))
            })?;
        }

        let json = serde_json::to_string_pretty(&self.shared.get()).map_err(|e| {
            ConfigError::Serialization(format!("Failed to serialize config: {}", e))
        })?;

        fs::write(&self.config_path, json)
            .map_err(|e| ConfigError::Io(format!("Failed to write config file: {}", e)))
    }

    /// Updates one value by dot-notation path, e.g. `resourceLimits.maxMemoryMB`.
    ///
    /// The edited document is deserialized back into [`ShellConfig`] so a value
    /// of the wrong type is rejected. Saves on success.
    pub fn set_value(&self, key: &str, value: Value) -> Result<ShellConfig, ConfigError> {
        if key.is_empty() {
            return Err(ConfigError::InvalidKey("Key cannot be empty".to_string()));
        }

        let mut document = self.to_value()?;
        let parts: Vec<&str> = key.split('.').collect();
        let (last, parents) = parts
            .split_last()
            .ok_or_else(|| ConfigError::InvalidKey("Key cannot be empty".to_string()))?;

        let mut current = &mut document;
        for part in parents {
            current = current
                .get_mut(*part)
                .ok_or_else(|| ConfigError::InvalidKey(format!("Key '{}' not found in config", key)))?;
        }

        match current {
            Value::Object(map) if map.contains_key(*last) => {
                map.insert(last.to_string(), value);
            }
            Value::Object(_) => {
                return Err(ConfigError::InvalidKey(format!(
                    "Key '{}' not found in config",
                    key
                )));
            }
            _ => {
                return Err(ConfigError::InvalidKey(format!(
                    "Cannot navigate to key '{}': intermediate value is not an object",
                    key
                )));
            }
        }

        self.commit(document, key)
    }

    /// Deep-merges a partial document into the config and saves.
    ///
    /// Objects merge recursively, everything else replaces, `null` is ignored.
    pub fn update(&self, partial: &Value) -> Result<ShellConfig, ConfigError> {
        if !partial.is_object() {
            return Err(ConfigError::InvalidValue(
                "Config update must be a JSON object".to_string(),
            ));
        }
        let mut document = self.to_value()?;
        merge_deep(&mut document, partial);
        self.commit(document, "<update>")
    }

    /// Restores factory defaults and saves.
    pub fn reset(&self) -> Result<ShellConfig, ConfigError> {
        self.shared.replace(ShellConfig::default());
        self.save()?;
        Ok(ShellConfig::default())
    }

    fn to_value(&self) -> Result<Value, ConfigError> {
        serde_json::to_value(self.shared.get()).map_err(|e| {
            ConfigError::Serialization(format!("Failed to serialize config: {}", e))
        })
    }

    fn commit(&self, document: Value, key: &str) -> Result<ShellConfig, ConfigError> {
        let config: ShellConfig = serde_json::from_value(document).map_err(|e| {
            ConfigError::InvalidValue(format!("Invalid value for key '{}': {}", key, e))
        })?;
        self.shared.replace(config.clone());
        self.save()?;
        Ok(config)
    }
}

fn merge_deep(target: &mut Value, source: &Value) {
    match (target, source) {
        (Value::Object(target_map), Value::Object(source_map)) => {
            for (key, value) in source_map {
                if value.is_null() {
                    continue;
                }
                let nested = value.is_object() && target_map.get(key).is_some_and(Value::is_object);
                if !nested {
                    target_map.insert(key.clone(), value.clone());
                } else if let Some(existing) = target_map.get_mut(key) {
                    merge_deep(existing, value);
                }
            }
        }
        (target, source) => {
            if !source.is_null() {
                *target = source.clone();
            }
        }
    }
}
