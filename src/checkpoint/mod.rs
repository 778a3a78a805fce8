//! # Checkpoint Store
//!
//! Persists the last committed position of a chunk step, keyed by
//! `(job name, step name, lineage id)`. A restarted step reuses the lineage id
//! of the execution it restarts so it resumes instead of starting over.
//!
//! A `save` must be atomic with respect to `load` for the same key, and saves
//! for one key are serialized. Saves for different keys proceed independently.

mod file;
mod memory;
#[cfg(feature = "postgres")]
mod postgres;

pub use file::FileCheckpointStore;
pub use memory::InMemoryCheckpointStore;
#[cfg(feature = "postgres")]
pub use postgres::PgCheckpointStore;

use crate::config::BatchConfig;
use crate::constants::checkpoint_stores;
use crate::error::{BatchError, BatchResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CheckpointKey {
    pub job_name: String,
    pub step_name: String,
    pub lineage_id: Uuid,
}

impl CheckpointKey {
    pub fn new(job_name: impl Into<String>, step_name: impl Into<String>, lineage_id: Uuid) -> Self {
        Self {
            job_name: job_name.into(),
            step_name: step_name.into(),
            lineage_id,
        }
    }
}

impl fmt::Display for CheckpointKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.job_name, self.step_name, self.lineage_id)
    }
}

/// Reader and writer positions after the last committed chunk.
///
/// Both halves are opaque to the engine and handed back verbatim on restart.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointMarker {
    pub reader: Option<Value>,
    pub writer: Option<Value>,
}

impl CheckpointMarker {
    pub fn new(reader: Option<Value>, writer: Option<Value>) -> Self {
        Self { reader, writer }
    }
}

#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("Checkpoint I/O failed for {key}: {reason}")]
    Io { key: String, reason: String },

    #[error("Checkpoint serialization failed: {0}")]
    Serialization(String),

    #[error("Checkpoint database error: {0}")]
    Database(String),

    #[error("Checkpoint store unavailable: {0}")]
    Unavailable(String),
}

impl CheckpointError {
    pub fn io(key: &CheckpointKey, reason: impl ToString) -> Self {
        Self::Io {
            key: key.to_string(),
            reason: reason.to_string(),
        }
    }
}

impl From<serde_json::Error> for CheckpointError {
    fn from(error: serde_json::Error) -> Self {
        Self::Serialization(error.to_string())
    }
}

pub type CheckpointResult<T> = Result<T, CheckpointError>;

#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Most recent committed marker for the key, `None` on a fresh lineage
    async fn load(&self, key: &CheckpointKey) -> CheckpointResult<Option<CheckpointMarker>>;

    /// Durably replace the marker for the key
    async fn save(&self, key: &CheckpointKey, marker: &CheckpointMarker) -> CheckpointResult<()>;

    fn name(&self) -> &'static str;
}

/// Build the store named by `checkpoint.store`
pub fn store_from_config(config: &BatchConfig) -> BatchResult<Arc<dyn CheckpointStore>> {
    match config.checkpoint.store.as_str() {
        checkpoint_stores::MEMORY => Ok(Arc::new(InMemoryCheckpointStore::new())),
        checkpoint_stores::FILE => Ok(Arc::new(FileCheckpointStore::new(
            config.checkpoint.directory.clone(),
        ))),
        other => Err(BatchError::Configuration(format!(
            "unknown checkpoint store '{other}'"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_display() {
        let lineage = Uuid::new_v4();
        let key = CheckpointKey::new("payroll", "load", lineage);
        assert_eq!(key.to_string(), format!("payroll/load/{lineage}"));
    }

    #[test]
    fn test_store_selection() {
        let mut config = BatchConfig::default();
        assert_eq!(store_from_config(&config).unwrap().name(), "memory");

        config.checkpoint.store = "file".to_string();
        assert_eq!(store_from_config(&config).unwrap().name(), "file");

        config.checkpoint.store = "tape".to_string();
        assert!(matches!(
            store_from_config(&config),
            Err(ref error) if error.is_configuration()
        ));
    }
}
