//! Error types for the batch engine.
//!
//! Everything surfaced to callers funnels into [`BatchError`]. Subsystems keep
//! their own narrower error enums (configuration, state machine, checkpoint
//! store) and convert into it with `From`.

use crate::artifacts::{ArtifactKind, ItemError};
use crate::checkpoint::CheckpointError;
use crate::chunk::ChunkPhase;
use crate::config::ConfigurationError;
use crate::state_machine::{BatchStatus, StateMachineError};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BatchError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error(transparent)]
    Config(#[from] ConfigurationError),

    #[error("No {kind} artifact registered under '{name}'")]
    ArtifactNotFound { kind: ArtifactKind, name: String },

    #[error("Invalid reader or writer property value {value} for key {key}: {reason}")]
    InvalidProperty {
        key: String,
        value: String,
        reason: String,
    },

    #[error("Invalid job definition '{job}': {reason}")]
    InvalidDefinition { job: String, reason: String },

    #[error("No job named '{0}' is registered")]
    NoSuchJob(String),

    #[error("Job execution {0} not found")]
    NoSuchJobExecution(u64),

    #[error("Job execution {execution_id} is not running (status {status})")]
    JobNotRunning {
        execution_id: u64,
        status: BatchStatus,
    },

    #[error("Job execution {execution_id} cannot be restarted: {reason}")]
    JobRestart { execution_id: u64, reason: String },

    #[error(transparent)]
    StateMachine(#[from] StateMachineError),

    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),

    #[error("Transaction error: {0}")]
    Transaction(String),

    #[error("{phase} failed: {error}")]
    ItemFailed { phase: ChunkPhase, error: ItemError },

    #[error("Retry limit of {limit} exceeded while {phase}: {error}")]
    RetryLimitExceeded {
        limit: u32,
        phase: ChunkPhase,
        error: ItemError,
    },

    #[error("Skip limit of {limit} exceeded: {error}")]
    SkipLimitExceeded { limit: u32, error: ItemError },

    #[error("{failed} of {total} partitions of step '{step}' failed")]
    PartitionsFailed {
        step: String,
        failed: usize,
        total: usize,
    },

    #[error("Timed out after {timeout:?} waiting for job execution {execution_id}")]
    AwaitTimeout {
        execution_id: u64,
        timeout: Duration,
    },

    #[error("Worker pool error: {0}")]
    WorkerPool(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl BatchError {
    /// Create an invalid property error
    pub fn invalid_property(
        key: impl Into<String>,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidProperty {
            key: key.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }

    /// Errors that make a step fail before any chunk is attempted
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::Configuration(_)
                | Self::Config(_)
                | Self::ArtifactNotFound { .. }
                | Self::InvalidProperty { .. }
                | Self::InvalidDefinition { .. }
        )
    }

    /// Checkpoint persistence failures are always fatal to the step
    pub fn is_checkpoint(&self) -> bool {
        matches!(self, Self::Checkpoint(_))
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::AwaitTimeout { .. })
    }
}

pub type BatchResult<T> = std::result::Result<T, BatchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_taxonomy() {
        let not_found = BatchError::ArtifactNotFound {
            kind: ArtifactKind::Reader,
            name: "csvReader".to_string(),
        };
        assert!(not_found.is_configuration());
        assert!(!not_found.is_checkpoint());

        let timeout = BatchError::AwaitTimeout {
            execution_id: 7,
            timeout: Duration::from_millis(10),
        };
        assert!(timeout.is_timeout());
        assert!(!timeout.is_configuration());

        let checkpoint = BatchError::from(CheckpointError::Unavailable("down".to_string()));
        assert!(checkpoint.is_checkpoint());
    }

    #[test]
    fn test_invalid_property_message() {
        let error = BatchError::invalid_property("start", "abc", "not a number");
        assert_eq!(
            error.to_string(),
            "Invalid reader or writer property value abc for key start: not a number"
        );
    }
}
