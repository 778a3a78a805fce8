use crate::error::{BatchError, BatchResult};
use crate::models::JobParameters;
use std::collections::HashMap;
use std::fmt::Display;
use std::str::FromStr;

/// Everything an artifact factory gets to see when building an instance
#[derive(Debug, Clone, Default)]
pub struct ArtifactContext {
    pub job_name: String,
    pub step_name: String,
    pub partition: Option<usize>,
    /// Artifact properties, with partition properties layered on top
    pub properties: HashMap<String, String>,
    pub job_parameters: JobParameters,
}

impl ArtifactContext {
    pub fn new(job_name: impl Into<String>, step_name: impl Into<String>) -> Self {
        Self {
            job_name: job_name.into(),
            step_name: step_name.into(),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_properties(mut self, properties: HashMap<String, String>) -> Self {
        self.properties.extend(properties);
        self
    }

    #[must_use]
    pub fn with_partition(mut self, partition: usize, overrides: &HashMap<String, String>) -> Self {
        self.partition = Some(partition);
        self.properties
            .extend(overrides.iter().map(|(k, v)| (k.clone(), v.clone())));
        self
    }

    #[must_use]
    pub fn with_job_parameters(mut self, parameters: JobParameters) -> Self {
        self.job_parameters = parameters;
        self
    }

    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    pub fn require_property(&self, key: &str) -> BatchResult<&str> {
        self.property(key)
            .ok_or_else(|| BatchError::invalid_property(key, "", "required property is missing"))
    }

    /// Parse an optional property, rejecting values that do not parse
    pub fn parse_property<T>(&self, key: &str) -> BatchResult<Option<T>>
    where
        T: FromStr,
        T::Err: Display,
    {
        match self.property(key) {
            None => Ok(None),
            Some(raw) => raw
                .trim()
                .parse::<T>()
                .map(Some)
                .map_err(|e| BatchError::invalid_property(key, raw, e.to_string())),
        }
    }
}
