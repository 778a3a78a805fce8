//! # Engine Constants
//!
//! Built-in defaults and well-known names that define the operational
//! boundaries of the batch engine when no configuration overrides them.

/// Process-wide configuration resource looked up at first access
pub const CONFIG_FILE_NAME: &str = "batch-config.toml";

/// Prefix for environment variable overrides (`BATCH__ENGINE__DEFAULT_COMMIT_INTERVAL=50`)
pub const ENV_PREFIX: &str = "BATCH";

/// Separator between nested configuration keys in environment variables
pub const ENV_SEPARATOR: &str = "__";

/// Environment variable selecting the logging profile
pub const ENVIRONMENT_VAR: &str = "BATCH_ENV";

/// Environment variable switching console logs to JSON
pub const LOG_FORMAT_VAR: &str = "BATCH_LOG_FORMAT";

pub mod defaults {
    /// Items read per chunk when a step does not set its own commit interval
    pub const COMMIT_INTERVAL: usize = 10;

    /// Retry attempts per chunk before a retryable error becomes fatal
    pub const RETRY_LIMIT: u32 = 3;

    pub const THREAD_NAME_PREFIX: &str = "batch-worker";

    pub const CHECKPOINT_STORE: &str = "memory";

    pub const CHECKPOINT_DIRECTORY: &str = "checkpoints";
}

/// Checkpoint store kinds understood by `checkpoint::store_from_config`
pub mod checkpoint_stores {
    pub const MEMORY: &str = "memory";
    pub const FILE: &str = "file";

    pub const ALL: &[&str] = &[MEMORY, FILE];
}

/// Operation names used in structured log records
pub mod operations {
    pub const JOB_TRANSITION: &str = "job.transition";
    pub const STEP_TRANSITION: &str = "step.transition";
    pub const CHUNK_COMMIT: &str = "chunk.commit";
    pub const CHUNK_ROLLBACK: &str = "chunk.rollback";
    pub const ARTIFACT_REGISTER: &str = "artifact.register";
}
