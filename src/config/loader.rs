//! Configuration Loader
//!
//! Loads the optional configuration resource once and keeps both the typed
//! [`BatchConfig`] and the flattened `key -> value` property map that
//! artifacts and embedders can query directly.

use super::error::{ConfigResult, ConfigurationError};
use super::BatchConfig;
use crate::constants::{CONFIG_FILE_NAME, ENV_PREFIX, ENV_SEPARATOR};
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Loaded process-wide configuration
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config: BatchConfig,
    properties: HashMap<String, String>,
    source: Option<PathBuf>,
}

impl ConfigManager {
    /// Load from `batch-config.toml` in the working directory, if present
    pub fn load() -> ConfigResult<Arc<ConfigManager>> {
        Self::load_from(None)
    }

    /// Load from an explicit resource path; a missing file is not an error
    pub fn load_from(path: Option<&Path>) -> ConfigResult<Arc<ConfigManager>> {
        let path = path
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(CONFIG_FILE_NAME));
        let found = path.is_file();

        if !found {
            debug!(
                path = %path.display(),
                "No batch configuration resource found, using built-in defaults"
            );
        }

        let settings = config::Config::builder()
            .add_source(config::File::from(path.as_path()).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator(ENV_SEPARATOR)
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| ConfigurationError::load_failed(path.display().to_string(), e))?;

        let raw: Value = settings
            .clone()
            .try_deserialize()
            .map_err(|e| ConfigurationError::Deserialize(e.to_string()))?;
        let config: BatchConfig = settings
            .try_deserialize()
            .map_err(|e| ConfigurationError::Deserialize(e.to_string()))?;

        let manager = Self::build(config, &raw, found.then_some(path))?;
        info!(
            source = ?manager.source,
            properties = manager.properties.len(),
            commit_interval = manager.config.engine.default_commit_interval,
            "Batch configuration loaded"
        );
        Ok(Arc::new(manager))
    }

    /// Build from an already constructed configuration
    pub fn from_config(config: BatchConfig) -> ConfigResult<Arc<ConfigManager>> {
        let raw = serde_json::to_value(&config)
            .map_err(|e| ConfigurationError::Deserialize(e.to_string()))?;
        Ok(Arc::new(Self::build(config, &raw, None)?))
    }

    fn build(config: BatchConfig, raw: &Value, source: Option<PathBuf>) -> ConfigResult<Self> {
        config.validate()?;

        let mut properties = HashMap::new();
        flatten_properties("", raw, &mut properties);

        Ok(Self {
            config,
            properties,
            source,
        })
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    /// Flattened `section.key -> value` view of everything that was loaded
    pub fn properties(&self) -> &HashMap<String, String> {
        &self.properties
    }

    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    /// The resource the configuration was read from, if one existed
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }
}

fn flatten_properties(prefix: &str, value: &Value, out: &mut HashMap<String, String>) {
    match value {
        Value::Object(map) => {
            for (key, nested) in map {
                let key = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{prefix}.{key}")
                };
                flatten_properties(&key, nested, out);
            }
        }
        Value::Null => {}
        Value::String(s) => {
            out.insert(prefix.to_string(), s.clone());
        }
        other => {
            out.insert(prefix.to_string(), other.to_string());
        }
    }
}
