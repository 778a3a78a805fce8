//! Configuration Error Types
//!
//! Errors raised while loading or validating the process-wide configuration.
//! A missing configuration source is not an error; a present but unreadable or
//! malformed one is.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigurationError {
    /// The configuration resource exists but could not be loaded
    #[error("Failed to load configuration from '{source_name}': {reason}")]
    LoadFailed { source_name: String, reason: String },

    /// The loaded values do not fit the configuration schema
    #[error("Failed to deserialize configuration: {0}")]
    Deserialize(String),

    /// Invalid configuration value
    #[error("Invalid value '{value}' for field '{field}': {context}")]
    InvalidValue {
        field: String,
        value: String,
        context: String,
    },
}

impl ConfigurationError {
    pub fn load_failed(source_name: impl Into<String>, reason: impl ToString) -> Self {
        Self::LoadFailed {
            source_name: source_name.into(),
            reason: reason.to_string(),
        }
    }

    pub fn invalid_value(
        field: impl Into<String>,
        value: impl ToString,
        context: impl Into<String>,
    ) -> Self {
        Self::InvalidValue {
            field: field.into(),
            value: value.to_string(),
            context: context.into(),
        }
    }
}

pub type ConfigResult<T> = Result<T, ConfigurationError>;
