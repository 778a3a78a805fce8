//! # Artifact Contracts
//!
//! The traits job authors implement to plug readers, processors, writers,
//! task steps and listeners into the engine. The engine never looks inside
//! items or checkpoint markers; both are plain JSON values owned by the
//! artifact that produced them.

mod context;

pub use context::ArtifactContext;

use crate::models::StepExecution;
use crate::orchestration::StopSignal;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use thiserror::Error;

/// A unit of data moving through a chunk step
pub type Item = Value;

/// Failure reported by an artifact.
///
/// `category` is the key retry/skip policies classify on, playing the part an
/// exception type name plays in other engines.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{category}: {message}")]
pub struct ItemError {
    pub category: String,
    pub message: String,
    /// Position of the offending item inside the chunk handed to a writer
    pub item_index: Option<usize>,
}

impl ItemError {
    pub fn new(category: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            message: message.into(),
            item_index: None,
        }
    }

    /// Attribute a writer failure to one item of the chunk
    #[must_use]
    pub fn at_item(mut self, index: usize) -> Self {
        self.item_index = Some(index);
        self
    }
}

pub type ArtifactResult<T> = Result<T, ItemError>;

/// Outcome of processing one item
#[derive(Debug, Clone, PartialEq)]
pub enum ProcessResult {
    Processed(Item),
    /// Drop the item from the chunk without counting it as an error
    Filtered,
}

#[async_trait]
pub trait ItemReader: Send {
    /// Position at `checkpoint`, or at the reader's own start when it is `None`
    async fn open(&mut self, checkpoint: Option<Value>) -> ArtifactResult<()>;

    /// Next item, or `None` once the data is exhausted
    async fn read_item(&mut self) -> ArtifactResult<Option<Item>>;

    /// Position to resume after everything read so far
    async fn checkpoint_info(&mut self) -> ArtifactResult<Option<Value>>;

    async fn close(&mut self) -> ArtifactResult<()> {
        Ok(())
    }
}

#[async_trait]
pub trait ItemProcessor: Send {
    async fn process_item(&mut self, item: Item) -> ArtifactResult<ProcessResult>;
}

#[async_trait]
pub trait ItemWriter: Send {
    async fn open(&mut self, checkpoint: Option<Value>) -> ArtifactResult<()>;

    /// Write one chunk; never called with an empty slice
    async fn write_items(&mut self, items: &[Item]) -> ArtifactResult<()>;

    async fn checkpoint_info(&mut self) -> ArtifactResult<Option<Value>>;

    async fn close(&mut self) -> ArtifactResult<()> {
        Ok(())
    }
}

/// Single-task step
#[async_trait]
pub trait Batchlet: Send {
    /// Run to completion, checking `stop` where the task can stop early.
    /// The returned value becomes the step's exit status.
    async fn process(&mut self, stop: &StopSignal) -> ArtifactResult<Option<String>>;
}

#[async_trait]
pub trait StepListener: Send {
    async fn before_step(&mut self, _step: &StepExecution) -> ArtifactResult<()> {
        Ok(())
    }

    async fn after_step(&mut self, _step: &StepExecution) -> ArtifactResult<()> {
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactKind {
    Reader,
    Processor,
    Writer,
    Batchlet,
    Listener,
    Classifier,
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Reader => "reader",
            Self::Processor => "processor",
            Self::Writer => "writer",
            Self::Batchlet => "batchlet",
            Self::Listener => "listener",
            Self::Classifier => "classifier",
        };
        f.write_str(name)
    }
}

/// Instance sharing requested by an artifact reference
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactScope {
    /// A new instance for every resolution
    #[default]
    Fresh,
    /// One instance per scope name, shared until the scope is released
    Shared(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_error_display_and_index() {
        let error = ItemError::new("io", "connection reset").at_item(2);
        assert_eq!(error.to_string(), "io: connection reset");
        assert_eq!(error.item_index, Some(2));
    }

    #[test]
    fn test_scope_default_is_fresh() {
        assert_eq!(ArtifactScope::default(), ArtifactScope::Fresh);
        assert_eq!(ArtifactKind::Writer.to_string(), "writer");
    }
}
