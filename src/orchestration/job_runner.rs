//! Drives one job execution through its step graph on a worker pool task.

use super::repository::JobExecutionCell;
use super::step_runner::{StepLineage, StepRunner};
use crate::logging::log_error;
use crate::models::{JobDefinition, JobExecution, StepExecution};
use crate::state_machine::{BatchStatus, JobEvent, JobStateMachine};
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
enum JobOutcome {
    Completed,
    Stopped,
    Failed(String),
}

pub(crate) struct JobRunner {
    steps: StepRunner,
    job: Arc<JobDefinition>,
    /// Execution being restarted, if any
    previous: Option<JobExecution>,
}

impl JobRunner {
    pub fn new(steps: StepRunner, job: Arc<JobDefinition>, previous: Option<JobExecution>) -> Self {
        Self {
            steps,
            job,
            previous,
        }
    }

    #[instrument(skip(self, cell), fields(execution_id = cell.execution_id(), job_name = %self.job.name))]
    pub async fn run(self, cell: Arc<JobExecutionCell>) {
        let machine = JobStateMachine::new(cell.clone());

        if let Err(error) = machine.transition(JobEvent::Start) {
            // Stopped or abandoned before the task got to run
            if machine.current_state() == BatchStatus::Stopping {
                let _ = machine.transition(JobEvent::Stopped);
            }
            debug!(error = %error, status = %machine.current_state(), "Job not started");
            return;
        }

        let outcome = match AssertUnwindSafe(self.run_steps(&cell)).catch_unwind().await {
            Ok(outcome) => outcome,
            Err(_) => {
                log_error(
                    "job_runner",
                    "job.run",
                    "job task panicked",
                    Some(&cell.execution_id().to_string()),
                );
                JobOutcome::Failed("job task panicked".to_string())
            }
        };

        let result = match &outcome {
            JobOutcome::Completed => machine.transition(JobEvent::Complete),
            JobOutcome::Failed(reason) => machine.transition(JobEvent::fail_with_error(reason.clone())),
            JobOutcome::Stopped => {
                if machine.current_state() == BatchStatus::Started {
                    let _ = machine.transition(JobEvent::Stop);
                }
                machine.transition(JobEvent::Stopped)
            }
        };

        match result {
            Ok(status) => info!(status = %status, "Job execution finished"),
            Err(_) if machine.current_state() == BatchStatus::Abandoned => {
                info!("Job execution was abandoned while running");
            }
            Err(error) => {
                log_error(
                    "job_runner",
                    "job.finish",
                    &error.to_string(),
                    Some(&cell.execution_id().to_string()),
                );
                if !machine.current_state().is_finished() {
                    let _ = machine.transition(JobEvent::fail_with_error(error.to_string()));
                }
            }
        }
    }

    async fn run_steps(&self, cell: &Arc<JobExecutionCell>) -> JobOutcome {
        let mut current = self.job.first_step();

        while let Some(step) = current {
            if cell.stop_signal().is_stop_requested() {
                info!(step_name = %step.name, "Stop requested before step");
                return JobOutcome::Stopped;
            }

            let prior = self
                .previous
                .as_ref()
                .and_then(|previous| previous.step_execution(&step.name));

            if let Some(prior) = prior {
                if prior.lifecycle.status == BatchStatus::Completed && !step.allow_start_if_complete
                {
                    info!(step_name = %step.name, "Step completed in a previous execution, skipping");
                    // Carried over so a later restart of this execution still sees it
                    let carried = prior.clone();
                    cell.update(|execution| {
                        execution.step_executions.push(StepExecution {
                            job_execution_id: execution.execution_id,
                            ..carried
                        });
                    });
                    current = self.job.next_step(step, true);
                    continue;
                }
            }

            // A completed step that runs again starts over instead of resuming at its end
            let lineage = match prior {
                Some(prior) if prior.lifecycle.status != BatchStatus::Completed => {
                    StepLineage::resume(prior)
                }
                _ => StepLineage::fresh(),
            };
            let status = self.steps.run(cell, &self.job, step, lineage).await;

            current = match status {
                BatchStatus::Completed => self.job.next_step(step, true),
                BatchStatus::Stopped => return JobOutcome::Stopped,
                BatchStatus::Failed if step.on_failure.is_some() => {
                    warn!(
                        step_name = %step.name,
                        on_failure = ?step.on_failure,
                        "Step failed, following failure transition"
                    );
                    self.job.next_step(step, false)
                }
                other => {
                    let reason = cell
                        .read(|execution| {
                            execution
                                .step_execution(&step.name)
                                .and_then(|s| s.lifecycle.last_error.clone())
                        })
                        .unwrap_or_else(|| format!("status {other}"));
                    return JobOutcome::Failed(format!("step '{}' failed: {reason}", step.name));
                }
            };
        }

        JobOutcome::Completed
    }
}
