use super::{
    errors::{StateMachineError, StateMachineResult},
    events::JobEvent,
    guards::{AllStepsSettledGuard, StateGuard},
    states::BatchStatus,
};
use crate::constants::operations;
use crate::logging::log_job_operation;
use crate::models::JobExecution;
use crate::orchestration::JobExecutionCell;
use std::sync::Arc;
use tracing::debug;

/// Drives the status of one job execution
#[derive(Debug, Clone)]
pub struct JobStateMachine {
    cell: Arc<JobExecutionCell>,
}

impl JobStateMachine {
    pub fn new(cell: Arc<JobExecutionCell>) -> Self {
        Self { cell }
    }

    pub fn current_state(&self) -> BatchStatus {
        self.cell.status()
    }

    /// Apply an event, publishing the new status to waiters
    pub fn transition(&self, event: JobEvent) -> StateMachineResult<BatchStatus> {
        let (from, to) = {
            let mut job = self.cell.write();
            let from = job.status();
            let to = Self::determine_target_state(from, &event)?;

            Self::check_guards(&job, to, &event)?;

            if let Some(message) = event.error_message() {
                job.lifecycle.last_error = Some(message.to_string());
            }
            job.lifecycle.apply(to);
            self.cell.publish(to);
            (from, to)
        };

        debug!(
            execution_id = self.cell.execution_id(),
            event = event.event_type(),
            from = %from,
            to = %to,
            "Job transition applied"
        );
        log_job_operation(
            operations::JOB_TRANSITION,
            self.cell.execution_id(),
            self.cell.job_name(),
            &to.to_string(),
            event.error_message(),
        );

        Ok(to)
    }

    /// Determine the target state based on current state and event
    pub fn determine_target_state(
        current_state: BatchStatus,
        event: &JobEvent,
    ) -> StateMachineResult<BatchStatus> {
        use BatchStatus::*;

        let target = match (current_state, event) {
            (Starting, JobEvent::Start) => Started,

            (Started | Stopping, JobEvent::Complete) => Completed,

            (Starting | Started | Stopping, JobEvent::Fail(_)) => Failed,

            (Starting | Started, JobEvent::Stop) => Stopping,
            (Stopping, JobEvent::Stopped) => Stopped,

            (Starting | Started | Stopping | Stopped, JobEvent::Abandon) => Abandoned,

            (from_state, _) => {
                return Err(StateMachineError::InvalidTransition {
                    from: Some(from_state.to_string()),
                    event: event.event_type().to_string(),
                })
            }
        };

        Ok(target)
    }

    fn check_guards(
        job: &JobExecution,
        target_state: BatchStatus,
        event: &JobEvent,
    ) -> StateMachineResult<()> {
        match (target_state, event) {
            (BatchStatus::Completed, JobEvent::Complete)
            | (BatchStatus::Stopped, JobEvent::Stopped) => {
                AllStepsSettledGuard.check(job)?;
            }
            _ => {}
        }

        Ok(())
    }

    pub fn is_terminal(&self) -> bool {
        self.current_state().is_terminal()
    }

    pub fn execution_id(&self) -> u64 {
        self.cell.execution_id()
    }
}
