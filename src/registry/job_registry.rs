use crate::error::{BatchError, BatchResult};
use crate::models::JobDefinition;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::{info, warn};

/// Job graphs known to an operator, by name
#[derive(Debug, Default)]
pub struct JobRegistry {
    jobs: DashMap<String, Arc<JobDefinition>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and register a job, replacing any job with the same name
    pub fn register(&self, job: JobDefinition) -> BatchResult<Arc<JobDefinition>> {
        job.validate()?;

        let name = job.name.clone();
        let steps = job.steps.len();
        let job = Arc::new(job);
        if self.jobs.insert(name.clone(), job.clone()).is_some() {
            warn!(job_name = %name, "Replaced previously registered job definition");
        } else {
            info!(job_name = %name, steps = steps, "Job definition registered");
        }
        Ok(job)
    }

    pub fn get(&self, name: &str) -> BatchResult<Arc<JobDefinition>> {
        self.jobs
            .get(name)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| BatchError::NoSuchJob(name.to_string()))
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.jobs.iter().map(|entry| entry.key().clone()).collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ArtifactRef, StepDefinition};

    #[test]
    fn test_register_and_lookup() {
        let registry = JobRegistry::new();
        registry
            .register(
                JobDefinition::new("zeta")
                    .with_step(StepDefinition::batchlet("only", ArtifactRef::new("noop"))),
            )
            .unwrap();
        registry
            .register(
                JobDefinition::new("alpha")
                    .with_step(StepDefinition::batchlet("only", ArtifactRef::new("noop"))),
            )
            .unwrap();

        assert_eq!(registry.names(), vec!["alpha".to_string(), "zeta".to_string()]);
        assert_eq!(registry.get("alpha").unwrap().steps.len(), 1);
        assert!(matches!(registry.get("beta"), Err(BatchError::NoSuchJob(_))));
    }

    #[test]
    fn test_invalid_definition_is_rejected() {
        let registry = JobRegistry::new();
        let error = registry.register(JobDefinition::new("empty")).unwrap_err();
        assert!(matches!(error, BatchError::InvalidDefinition { .. }));
        assert!(registry.names().is_empty());
    }
}
