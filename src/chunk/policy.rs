//! # Retry/Skip Policy
//!
//! Decides what happens to an [`ItemError`] raised while reading, processing
//! or writing. A named [`ErrorClassifier`] artifact is consulted first; when
//! it has no opinion the category sets of the [`ErrorPolicy`] apply. An error
//! nobody classifies is fatal.

use super::ChunkPhase;
use crate::artifacts::ItemError;
use crate::config::EngineConfig;
use crate::error::BatchResult;
use crate::registry::ArtifactRegistry;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorAction {
    /// Roll back and replay the whole chunk from the last committed marker
    Retry,
    /// Drop the offending item and keep filling the same chunk
    Skip,
    /// Fail the step
    Fail,
}

/// Strategy for classifying artifact errors
pub trait ErrorClassifier: Send + Sync {
    /// `None` defers to the category sets of the step's policy
    fn classify(&self, error: &ItemError, phase: ChunkPhase) -> Option<ErrorAction>;

    fn classifier_name(&self) -> &'static str;
}

/// Retry/skip configuration of one chunk step
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPolicy {
    /// Error categories that trigger a chunk retry
    #[serde(default)]
    pub retryable: BTreeSet<String>,
    /// Error categories whose items are skipped
    #[serde(default)]
    pub skippable: BTreeSet<String>,
    /// Retry attempts per chunk; falls back to `engine.default_retry_limit`
    #[serde(default)]
    pub retry_limit: Option<u32>,
    /// Total skips per step; falls back to `engine.default_skip_limit`
    #[serde(default)]
    pub skip_limit: Option<u32>,
    /// Registered classifier consulted before the category sets
    #[serde(default)]
    pub classifier: Option<String>,
}

impl ErrorPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn retry_on(mut self, category: impl Into<String>) -> Self {
        self.retryable.insert(category.into());
        self
    }

    #[must_use]
    pub fn skip_on(mut self, category: impl Into<String>) -> Self {
        self.skippable.insert(category.into());
        self
    }

    #[must_use]
    pub fn with_retry_limit(mut self, limit: u32) -> Self {
        self.retry_limit = Some(limit);
        self
    }

    #[must_use]
    pub fn with_skip_limit(mut self, limit: u32) -> Self {
        self.skip_limit = Some(limit);
        self
    }

    #[must_use]
    pub fn with_classifier(mut self, name: impl Into<String>) -> Self {
        self.classifier = Some(name.into());
        self
    }

    /// Fill in engine defaults and look up the named classifier
    pub fn resolve(
        &self,
        engine: &EngineConfig,
        artifacts: &ArtifactRegistry,
    ) -> BatchResult<ResolvedPolicy> {
        let custom = self
            .classifier
            .as_deref()
            .map(|name| artifacts.resolve_classifier(name))
            .transpose()?;

        Ok(ResolvedPolicy {
            categories: CategoryClassifier {
                retryable: self.retryable.clone(),
                skippable: self.skippable.clone(),
            },
            custom,
            retry_limit: self.retry_limit.unwrap_or(engine.default_retry_limit),
            skip_limit: self.skip_limit.or(engine.default_skip_limit),
        })
    }
}

/// Classifies by [`ItemError::category`]; retry wins when a category is in both sets
#[derive(Debug, Clone, Default)]
pub struct CategoryClassifier {
    retryable: BTreeSet<String>,
    skippable: BTreeSet<String>,
}

impl ErrorClassifier for CategoryClassifier {
    fn classify(&self, error: &ItemError, _phase: ChunkPhase) -> Option<ErrorAction> {
        if self.retryable.contains(&error.category) {
            Some(ErrorAction::Retry)
        } else if self.skippable.contains(&error.category) {
            Some(ErrorAction::Skip)
        } else {
            None
        }
    }

    fn classifier_name(&self) -> &'static str {
        "category"
    }
}

/// Policy with defaults applied, ready for the chunk engine
#[derive(Clone)]
pub struct ResolvedPolicy {
    categories: CategoryClassifier,
    custom: Option<Arc<dyn ErrorClassifier>>,
    pub retry_limit: u32,
    pub skip_limit: Option<u32>,
}

impl ResolvedPolicy {
    pub fn decide(&self, error: &ItemError, phase: ChunkPhase) -> ErrorAction {
        self.custom
            .as_ref()
            .and_then(|classifier| classifier.classify(error, phase))
            .or_else(|| self.categories.classify(error, phase))
            .unwrap_or(ErrorAction::Fail)
    }
}

impl Default for ResolvedPolicy {
    /// Every error fails the step
    fn default() -> Self {
        Self {
            categories: CategoryClassifier::default(),
            custom: None,
            retry_limit: 0,
            skip_limit: None,
        }
    }
}

impl fmt::Debug for ResolvedPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedPolicy")
            .field("categories", &self.categories)
            .field(
                "custom",
                &self.custom.as_ref().map(|c| c.classifier_name()),
            )
            .field("retry_limit", &self.retry_limit)
            .field("skip_limit", &self.skip_limit)
            .finish()
    }
}
