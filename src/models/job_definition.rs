//! # Job Definitions
//!
//! The in-memory job graph the engine executes. Producing these from XML or a
//! DSL is the job of an external parser; the engine only requires that a
//! definition validates.
//!
//! ```rust
//! use batch_core::models::{ArtifactRef, ChunkDefinition, JobDefinition, StepDefinition};
//!
//! let job = JobDefinition::new("import-trades").with_step(StepDefinition::chunk(
//!     "load",
//!     ChunkDefinition::new(
//!         ArtifactRef::new("csvReader").with_property("resource", "trades.csv"),
//!         ArtifactRef::new("jdbcWriter"),
//!     )
//!     .with_commit_interval(100),
//! ));
//! assert!(job.validate().is_ok());
//! ```

use crate::artifacts::ArtifactScope;
use crate::chunk::ErrorPolicy;
use crate::error::{BatchError, BatchResult};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Reference to a named artifact plus the properties handed to its factory
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactRef {
    pub name: String,
    #[serde(default)]
    pub properties: HashMap<String, String>,
    #[serde(default)]
    pub scope: ArtifactScope,
}

impl ArtifactRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Share one instance among every resolution that names the same scope
    #[must_use]
    pub fn shared(mut self, scope: impl Into<String>) -> Self {
        self.scope = ArtifactScope::Shared(scope.into());
        self
    }
}

/// Partitioned execution of a chunk step
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionPlan {
    /// Per-partition properties, overriding the artifact properties
    pub partitions: Vec<HashMap<String, String>>,
    /// Ask sibling partitions to stop as soon as one fails
    #[serde(default)]
    pub fail_fast: bool,
}

impl PartitionPlan {
    pub fn new(partitions: Vec<HashMap<String, String>>) -> Self {
        Self {
            partitions,
            fail_fast: false,
        }
    }

    #[must_use]
    pub fn fail_fast(mut self) -> Self {
        self.fail_fast = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkDefinition {
    pub reader: ArtifactRef,
    #[serde(default)]
    pub processor: Option<ArtifactRef>,
    pub writer: ArtifactRef,
    /// Falls back to `engine.default_commit_interval`
    #[serde(default)]
    pub commit_interval: Option<usize>,
    #[serde(default)]
    pub policy: ErrorPolicy,
    #[serde(default)]
    pub partitions: Option<PartitionPlan>,
}

impl ChunkDefinition {
    pub fn new(reader: ArtifactRef, writer: ArtifactRef) -> Self {
        Self {
            reader,
            processor: None,
            writer,
            commit_interval: None,
            policy: ErrorPolicy::default(),
            partitions: None,
        }
    }

    #[must_use]
    pub fn with_processor(mut self, processor: ArtifactRef) -> Self {
        self.processor = Some(processor);
        self
    }

    #[must_use]
    pub fn with_commit_interval(mut self, commit_interval: usize) -> Self {
        self.commit_interval = Some(commit_interval);
        self
    }

    #[must_use]
    pub fn with_policy(mut self, policy: ErrorPolicy) -> Self {
        self.policy = policy;
        self
    }

    #[must_use]
    pub fn with_partitions(mut self, plan: PartitionPlan) -> Self {
        self.partitions = Some(plan);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "definition", rename_all = "snake_case")]
pub enum StepKind {
    /// Read, optionally process, and write in committed chunks
    Chunk(ChunkDefinition),
    /// Run a single task to completion
    Batchlet(ArtifactRef),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepDefinition {
    pub name: String,
    pub kind: StepKind,
    /// Step to run after this one completes; defaults to the next declared step
    #[serde(default)]
    pub next: Option<String>,
    /// Step to run when this one fails; unset fails the job
    #[serde(default)]
    pub on_failure: Option<String>,
    #[serde(default)]
    pub listeners: Vec<ArtifactRef>,
    /// Re-run on restart even if the previous execution completed this step
    #[serde(default)]
    pub allow_start_if_complete: bool,
}

impl StepDefinition {
    pub fn chunk(name: impl Into<String>, chunk: ChunkDefinition) -> Self {
        Self::with_kind(name, StepKind::Chunk(chunk))
    }

    pub fn batchlet(name: impl Into<String>, batchlet: ArtifactRef) -> Self {
        Self::with_kind(name, StepKind::Batchlet(batchlet))
    }

    fn with_kind(name: impl Into<String>, kind: StepKind) -> Self {
        Self {
            name: name.into(),
            kind,
            next: None,
            on_failure: None,
            listeners: Vec::new(),
            allow_start_if_complete: false,
        }
    }

    #[must_use]
    pub fn with_next(mut self, next: impl Into<String>) -> Self {
        self.next = Some(next.into());
        self
    }

    #[must_use]
    pub fn with_on_failure(mut self, step: impl Into<String>) -> Self {
        self.on_failure = Some(step.into());
        self
    }

    #[must_use]
    pub fn with_listener(mut self, listener: ArtifactRef) -> Self {
        self.listeners.push(listener);
        self
    }

    #[must_use]
    pub fn allow_start_if_complete(mut self) -> Self {
        self.allow_start_if_complete = true;
        self
    }

    pub fn is_partitioned(&self) -> bool {
        matches!(&self.kind, StepKind::Chunk(chunk) if chunk.partitions.is_some())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobDefinition {
    pub name: String,
    pub steps: Vec<StepDefinition>,
    #[serde(default = "default_restartable")]
    pub restartable: bool,
}

fn default_restartable() -> bool {
    true
}

impl JobDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            steps: Vec::new(),
            restartable: true,
        }
    }

    #[must_use]
    pub fn with_step(mut self, step: StepDefinition) -> Self {
        self.steps.push(step);
        self
    }

    #[must_use]
    pub fn not_restartable(mut self) -> Self {
        self.restartable = false;
        self
    }

    pub fn step(&self, name: &str) -> Option<&StepDefinition> {
        self.steps.iter().find(|step| step.name == name)
    }

    pub fn first_step(&self) -> Option<&StepDefinition> {
        self.steps.first()
    }

    /// Resolve the step that follows `current` for the given outcome
    pub fn next_step(&self, current: &StepDefinition, succeeded: bool) -> Option<&StepDefinition> {
        if !succeeded {
            return current.on_failure.as_deref().and_then(|name| self.step(name));
        }

        match current.next.as_deref() {
            Some(name) => self.step(name),
            None => {
                let position = self.steps.iter().position(|s| s.name == current.name)?;
                self.steps.get(position + 1)
            }
        }
    }

    /// Structural checks performed when a job is registered
    pub fn validate(&self) -> BatchResult<()> {
        let invalid = |reason: String| BatchError::InvalidDefinition {
            job: self.name.clone(),
            reason,
        };

        if self.name.trim().is_empty() {
            return Err(invalid("job name must not be empty".to_string()));
        }
        if self.steps.is_empty() {
            return Err(invalid("a job needs at least one step".to_string()));
        }

        let mut names = HashSet::new();
        for step in &self.steps {
            if !names.insert(step.name.as_str()) {
                return Err(invalid(format!("duplicate step name '{}'", step.name)));
            }
        }

        for step in &self.steps {
            for target in step.next.iter().chain(step.on_failure.iter()) {
                if !names.contains(target.as_str()) {
                    return Err(invalid(format!(
                        "step '{}' transitions to unknown step '{target}'",
                        step.name
                    )));
                }
            }

            if let StepKind::Chunk(chunk) = &step.kind {
                if chunk.commit_interval == Some(0) {
                    return Err(invalid(format!(
                        "step '{}' has a commit interval of 0",
                        step.name
                    )));
                }
                if chunk
                    .partitions
                    .as_ref()
                    .is_some_and(|plan| plan.partitions.is_empty())
                {
                    return Err(invalid(format!(
                        "step '{}' declares a partition plan without partitions",
                        step.name
                    )));
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk_step(name: &str) -> StepDefinition {
        StepDefinition::chunk(
            name,
            ChunkDefinition::new(ArtifactRef::new("reader"), ArtifactRef::new("writer")),
        )
    }

    #[test]
    fn test_sequential_next_step() {
        let job = JobDefinition::new("job")
            .with_step(chunk_step("a"))
            .with_step(chunk_step("b"));

        let a = job.step("a").unwrap();
        let b = job.step("b").unwrap();
        assert_eq!(job.next_step(a, true).map(|s| s.name.as_str()), Some("b"));
        assert!(job.next_step(b, true).is_none());
        assert!(job.next_step(a, false).is_none());
    }

    #[test]
    fn test_explicit_transitions() {
        let job = JobDefinition::new("job")
            .with_step(chunk_step("a").with_next("c").with_on_failure("b"))
            .with_step(chunk_step("b"))
            .with_step(chunk_step("c"));

        let a = job.step("a").unwrap();
        assert_eq!(job.next_step(a, true).map(|s| s.name.as_str()), Some("c"));
        assert_eq!(job.next_step(a, false).map(|s| s.name.as_str()), Some("b"));
    }

    #[test]
    fn test_validation_failures() {
        assert!(JobDefinition::new("empty").validate().is_err());

        let duplicate = JobDefinition::new("dup")
            .with_step(chunk_step("a"))
            .with_step(chunk_step("a"));
        assert!(duplicate.validate().is_err());

        let dangling = JobDefinition::new("dangling").with_step(chunk_step("a").with_next("zzz"));
        assert!(dangling.validate().is_err());

        let zero_interval = JobDefinition::new("zero").with_step(StepDefinition::chunk(
            "a",
            ChunkDefinition::new(ArtifactRef::new("r"), ArtifactRef::new("w")).with_commit_interval(0),
        ));
        assert!(zero_interval.validate().is_err());

        let no_partitions = JobDefinition::new("parts").with_step(StepDefinition::chunk(
            "a",
            ChunkDefinition::new(ArtifactRef::new("r"), ArtifactRef::new("w"))
                .with_partitions(PartitionPlan::new(Vec::new())),
        ));
        assert!(no_partitions.validate().is_err());
    }

    #[test]
    fn test_artifact_ref_builder() {
        let reader = ArtifactRef::new("listReader")
            .with_property("start", "2")
            .shared("lookup");
        assert_eq!(reader.properties.get("start").map(String::as_str), Some("2"));
        assert_eq!(reader.scope, ArtifactScope::Shared("lookup".to_string()));
    }
}
