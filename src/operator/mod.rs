//! # Job Operator
//!
//! The caller-facing surface: register jobs, start, stop, restart and abandon
//! executions, and query or await them. `start` and `restart` return as soon
//! as the execution is submitted to the worker pool.
//!
//! ```rust,no_run
//! use batch_core::environment::DefaultBatchEnvironment;
//! use batch_core::models::JobParameters;
//! use batch_core::operator::JobOperator;
//! use std::time::Duration;
//!
//! # async fn example(job: batch_core::models::JobDefinition) -> Result<(), batch_core::BatchError> {
//! let operator = JobOperator::from_environment(DefaultBatchEnvironment::shared())?;
//! operator.register_job(job)?;
//!
//! let execution_id = operator.start("import-trades", JobParameters::new())?;
//! let status = operator
//!     .await_termination(execution_id, Duration::from_secs(30))
//!     .await?;
//! println!("finished with {status}");
//! # Ok(())
//! # }
//! ```

use crate::checkpoint::{store_from_config, CheckpointStore};
use crate::environment::BatchEnvironment;
use crate::error::{BatchError, BatchResult};
use crate::models::{JobDefinition, JobExecution, JobParameters};
use crate::orchestration::job_runner::JobRunner;
use crate::orchestration::step_runner::StepRunner;
use crate::orchestration::{JobExecutionCell, JobRepository};
use crate::registry::JobRegistry;
use crate::state_machine::{BatchStatus, JobEvent, JobStateMachine, StateMachineError};
use futures::FutureExt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

pub struct JobOperator {
    environment: Arc<dyn BatchEnvironment>,
    checkpoints: Arc<dyn CheckpointStore>,
    jobs: JobRegistry,
    repository: JobRepository,
}

impl JobOperator {
    pub fn new(environment: Arc<dyn BatchEnvironment>, checkpoints: Arc<dyn CheckpointStore>) -> Self {
        info!(
            checkpoint_store = checkpoints.name(),
            transactions = environment.transaction_manager().name(),
            "Job operator created"
        );
        Self {
            environment,
            checkpoints,
            jobs: JobRegistry::new(),
            repository: JobRepository::new(),
        }
    }

    /// Build an operator whose checkpoint store is selected by configuration
    pub fn from_environment<E>(environment: Arc<E>) -> BatchResult<Self>
    where
        E: BatchEnvironment + 'static,
    {
        let config = environment.configuration()?;
        let checkpoints = store_from_config(config.config())?;
        Ok(Self::new(environment, checkpoints))
    }

    pub fn environment(&self) -> &Arc<dyn BatchEnvironment> {
        &self.environment
    }

    pub fn register_job(&self, job: JobDefinition) -> BatchResult<()> {
        self.jobs.register(job).map(|_| ())
    }

    pub fn job_names(&self) -> Vec<String> {
        self.jobs.names()
    }

    /// Create an execution in STARTING and submit it to the worker pool
    pub fn start(&self, job_name: &str, parameters: JobParameters) -> BatchResult<u64> {
        let job = self.jobs.get(job_name)?;
        let cell = self.repository.create(job_name, parameters);
        info!(
            execution_id = cell.execution_id(),
            job_name = %job_name,
            "Starting job execution"
        );
        self.dispatch(cell, job, None)
    }

    /// Start a new execution of a STOPPED or FAILED one, resuming its checkpoints.
    ///
    /// `None` parameters reuse those of the restarted execution.
    pub fn restart(&self, execution_id: u64, parameters: Option<JobParameters>) -> BatchResult<u64> {
        let previous_cell = self.repository.get(execution_id)?;
        let job = self.jobs.get(previous_cell.job_name())?;
        if !job.restartable {
            return Err(BatchError::JobRestart {
                execution_id,
                reason: format!("job '{}' is not restartable", job.name),
            });
        }

        // Claim the previous execution and create its successor under one lock
        let (cell, previous) = previous_cell.update(|previous| {
            if !previous.status().is_restartable() {
                return Err(BatchError::JobRestart {
                    execution_id,
                    reason: format!("status {} is not restartable", previous.status()),
                });
            }
            if let Some(successor) = previous.restarted_by {
                return Err(BatchError::JobRestart {
                    execution_id,
                    reason: format!("already restarted by execution {successor}"),
                });
            }

            let parameters = parameters.unwrap_or_else(|| previous.parameters.clone());
            let cell = self.repository.create(&previous.job_name, parameters);
            cell.update(|next| next.restart_of = Some(execution_id));
            previous.restarted_by = Some(cell.execution_id());
            Ok((cell, previous.clone()))
        })?;

        info!(
            execution_id = cell.execution_id(),
            restart_of = execution_id,
            job_name = %job.name,
            "Restarting job execution"
        );
        self.dispatch(cell, job, Some(previous))
    }

    fn dispatch(
        &self,
        cell: Arc<JobExecutionCell>,
        job: Arc<JobDefinition>,
        previous: Option<JobExecution>,
    ) -> BatchResult<u64> {
        let execution_id = cell.execution_id();
        let prepared = self.environment.configuration().map(|config| {
            let steps = StepRunner::new(
                self.environment.clone(),
                self.checkpoints.clone(),
                config.config().engine.clone(),
            );
            JobRunner::new(steps, job, previous)
        });

        let submitted =
            prepared.and_then(|runner| self.environment.submit(runner.run(cell.clone()).boxed()));

        if let Err(error) = submitted {
            warn!(execution_id = execution_id, error = %error, "Job execution could not be submitted");
            let _ = JobStateMachine::new(cell).transition(JobEvent::fail_with_error(error.to_string()));
            return Err(error);
        }
        Ok(execution_id)
    }

    /// Ask a running execution to stop at its next chunk boundary
    pub fn stop(&self, execution_id: u64) -> BatchResult<()> {
        let cell = self.repository.get(execution_id)?;
        let machine = JobStateMachine::new(cell.clone());

        let status = machine.current_state();
        if status == BatchStatus::Stopping {
            return Ok(());
        }
        if status.is_finished() {
            return Err(BatchError::JobNotRunning {
                execution_id,
                status,
            });
        }

        cell.stop_signal().request_stop();
        match machine.transition(JobEvent::Stop) {
            Ok(_) => {
                info!(execution_id = execution_id, "Stop requested");
                Ok(())
            }
            Err(error) => stop_conflict(execution_id, machine.current_state(), error),
        }
    }

    /// Mark an execution ABANDONED; a running one is also asked to stop
    pub fn abandon(&self, execution_id: u64) -> BatchResult<()> {
        let cell = self.repository.get(execution_id)?;
        cell.stop_signal().request_stop();
        JobStateMachine::new(cell).transition(JobEvent::Abandon)?;
        info!(execution_id = execution_id, "Job execution abandoned");
        Ok(())
    }

    /// Point-in-time copy of an execution and its step executions
    pub fn get_job_execution(&self, execution_id: u64) -> BatchResult<JobExecution> {
        Ok(self.repository.get(execution_id)?.snapshot())
    }

    /// Ids of executions of `job_name` that have not finished
    pub fn running_executions(&self, job_name: &str) -> BatchResult<Vec<u64>> {
        self.jobs.get(job_name)?;
        Ok(self
            .repository
            .executions_of(job_name)
            .iter()
            .filter(|cell| cell.status().is_running())
            .map(|cell| cell.execution_id())
            .collect())
    }

    /// Wait until the execution finishes or `timeout` elapses.
    ///
    /// Returns COMPLETED, FAILED, STOPPED or ABANDONED. A timeout is reported
    /// as [`BatchError::AwaitTimeout`] and leaves the execution untouched.
    pub async fn await_termination(
        &self,
        execution_id: u64,
        timeout: Duration,
    ) -> BatchResult<BatchStatus> {
        let cell = self.repository.get(execution_id)?;
        let mut status = cell.subscribe();

        let waited = match tokio::time::timeout(timeout, status.wait_for(|s| s.is_finished())).await {
            Ok(Ok(finished)) => Ok(*finished),
            Ok(Err(_)) => Err(BatchError::Internal(format!(
                "status channel of job execution {execution_id} closed"
            ))),
            Err(_) => Err(BatchError::AwaitTimeout {
                execution_id,
                timeout,
            }),
        };
        waited
    }
}

/// Outcome of a stop whose transition lost a race with the job task.
///
/// The job task settles a requested stop on its own, so STOPPING and STOPPED
/// both mean the request took effect.
fn stop_conflict(
    execution_id: u64,
    status: BatchStatus,
    error: StateMachineError,
) -> BatchResult<()> {
    match status {
        BatchStatus::Stopping | BatchStatus::Stopped => Ok(()),
        status if status.is_finished() => Err(BatchError::JobNotRunning {
            execution_id,
            status,
        }),
        _ => Err(error.into()),
    }
}

impl std::fmt::Debug for JobOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobOperator")
            .field("checkpoints", &self.checkpoints.name())
            .field("jobs", &self.jobs)
            .field("executions", &self.repository.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lost_race() -> StateMachineError {
        StateMachineError::InvalidTransition {
            from: Some(BatchStatus::Stopped.to_string()),
            event: "stop".to_string(),
        }
    }

    #[test]
    fn test_stop_settled_by_job_task_counts_as_stopped() {
        assert!(stop_conflict(7, BatchStatus::Stopped, lost_race()).is_ok());
        assert!(stop_conflict(7, BatchStatus::Stopping, lost_race()).is_ok());
    }

    #[test]
    fn test_stop_after_completion_is_rejected() {
        assert!(matches!(
            stop_conflict(7, BatchStatus::Completed, lost_race()),
            Err(BatchError::JobNotRunning {
                execution_id: 7,
                status: BatchStatus::Completed
            })
        ));
    }
}
