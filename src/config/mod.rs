//! # Engine Configuration
//!
//! Process-wide configuration for the batch engine. Values come from an
//! optional `batch-config.toml` resource layered under `BATCH__*` environment
//! variables; anything left unset falls back to the built-in defaults in
//! [`crate::constants::defaults`].
//!
//! ## Usage
//!
//! ```rust,no_run
//! use batch_core::config::ConfigManager;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = ConfigManager::load()?;
//! let interval = manager.config().engine.default_commit_interval;
//! let raw = manager.property("engine.default_commit_interval");
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod loader;

use crate::constants::{checkpoint_stores, defaults};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub use error::{ConfigResult, ConfigurationError};
pub use loader::ConfigManager;

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Chunk engine defaults applied when a step leaves them unset
    pub engine: EngineConfig,

    /// Shared worker pool settings
    pub worker_pool: WorkerPoolConfig,

    /// Checkpoint store selection
    pub checkpoint: CheckpointConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EngineConfig {
    pub default_commit_interval: usize,
    pub default_retry_limit: u32,
    /// Unset means skips are unlimited
    pub default_skip_limit: Option<u32>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_commit_interval: defaults::COMMIT_INTERVAL,
            default_retry_limit: defaults::RETRY_LIMIT,
            default_skip_limit: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WorkerPoolConfig {
    pub thread_name_prefix: String,
    /// Unset lets the runtime size itself to the available parallelism
    pub worker_threads: Option<usize>,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            thread_name_prefix: defaults::THREAD_NAME_PREFIX.to_string(),
            worker_threads: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CheckpointConfig {
    /// One of `memory` or `file`
    pub store: String,
    /// Root directory for the `file` store
    pub directory: PathBuf,
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        Self {
            store: defaults::CHECKPOINT_STORE.to_string(),
            directory: PathBuf::from(defaults::CHECKPOINT_DIRECTORY),
        }
    }
}

impl BatchConfig {
    /// Validate cross-field constraints that serde cannot express
    pub fn validate(&self) -> ConfigResult<()> {
        if self.engine.default_commit_interval == 0 {
            return Err(ConfigurationError::invalid_value(
                "engine.default_commit_interval",
                self.engine.default_commit_interval,
                "commit interval must be at least 1",
            ));
        }

        if self.worker_pool.thread_name_prefix.trim().is_empty() {
            return Err(ConfigurationError::invalid_value(
                "worker_pool.thread_name_prefix",
                &self.worker_pool.thread_name_prefix,
                "thread name prefix must not be empty",
            ));
        }

        if self.worker_pool.worker_threads == Some(0) {
            return Err(ConfigurationError::invalid_value(
                "worker_pool.worker_threads",
                0,
                "worker pool needs at least one thread",
            ));
        }

        if !checkpoint_stores::ALL.contains(&self.checkpoint.store.as_str()) {
            return Err(ConfigurationError::invalid_value(
                "checkpoint.store",
                &self.checkpoint.store,
                format!("expected one of {:?}", checkpoint_stores::ALL),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = BatchConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.engine.default_commit_interval, 10);
        assert_eq!(config.engine.default_retry_limit, 3);
        assert_eq!(config.engine.default_skip_limit, None);
        assert_eq!(config.checkpoint.store, "memory");
    }

    #[test]
    fn test_zero_commit_interval_rejected() {
        let mut config = BatchConfig::default();
        config.engine.default_commit_interval = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigurationError::InvalidValue { field, .. }) if field == "engine.default_commit_interval"
        ));
    }

    #[test]
    fn test_unknown_store_rejected() {
        let mut config = BatchConfig::default();
        config.checkpoint.store = "redis".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_document_uses_defaults() {
        let config: BatchConfig =
            serde_json::from_str(r#"{"engine": {"default_commit_interval": 25}}"#).unwrap();
        assert_eq!(config.engine.default_commit_interval, 25);
        assert_eq!(config.engine.default_retry_limit, 3);
        assert_eq!(config.worker_pool.thread_name_prefix, "batch-worker");
    }
}
