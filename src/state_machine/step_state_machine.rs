use super::{
    errors::{StateMachineError, StateMachineResult},
    events::StepEvent,
    guards::{PartitionsSettledGuard, StateGuard},
    states::BatchStatus,
};
use crate::constants::operations;
use crate::logging::log_step_operation;
use crate::models::Lifecycle;
use crate::orchestration::JobExecutionCell;
use std::sync::Arc;

/// Drives the status of one step execution, or of one of its partitions
#[derive(Debug, Clone)]
pub struct StepStateMachine {
    cell: Arc<JobExecutionCell>,
    step_index: usize,
    partition: Option<usize>,
}

impl StepStateMachine {
    pub fn new(cell: Arc<JobExecutionCell>, step_index: usize) -> Self {
        Self {
            cell,
            step_index,
            partition: None,
        }
    }

    pub fn for_partition(cell: Arc<JobExecutionCell>, step_index: usize, partition: usize) -> Self {
        Self {
            cell,
            step_index,
            partition: Some(partition),
        }
    }

    pub fn current_state(&self) -> StateMachineResult<BatchStatus> {
        self.cell.read(|job| {
            let step = job
                .step_executions
                .get(self.step_index)
                .ok_or_else(|| self.missing())?;
            match self.partition {
                None => Ok(step.lifecycle.status),
                Some(partition) => step
                    .partition(partition)
                    .map(|p| p.lifecycle.status)
                    .ok_or_else(|| self.missing()),
            }
        })
    }

    pub fn transition(&self, event: StepEvent) -> StateMachineResult<BatchStatus> {
        let (step_name, to) = {
            let mut job = self.cell.write();
            let step = job
                .step_executions
                .get_mut(self.step_index)
                .ok_or_else(|| self.missing())?;

            if self.partition.is_none() {
                let target = Self::determine_target_state(step.lifecycle.status, &event)?;
                if matches!(target, BatchStatus::Completed | BatchStatus::Stopped) {
                    PartitionsSettledGuard.check(step)?;
                }
            }

            let step_name = step.step_name.clone();
            let lifecycle: &mut Lifecycle = match self.partition {
                None => &mut step.lifecycle,
                Some(partition) => {
                    &mut step
                        .partitions
                        .iter_mut()
                        .find(|p| p.partition == partition)
                        .ok_or_else(|| self.missing())?
                        .lifecycle
                }
            };

            let to = Self::determine_target_state(lifecycle.status, &event)?;
            if let Some(message) = event.error_message() {
                lifecycle.last_error = Some(message.to_string());
            }
            if let Some(exit_status) = event.exit_status() {
                lifecycle.exit_status = Some(exit_status.to_string());
            }
            lifecycle.apply(to);
            (step_name, to)
        };

        log_step_operation(
            operations::STEP_TRANSITION,
            self.cell.execution_id(),
            &step_name,
            self.partition,
            &to.to_string(),
            event.error_message(),
        );

        Ok(to)
    }

    /// Determine the target state based on current state and event
    pub fn determine_target_state(
        current_state: BatchStatus,
        event: &StepEvent,
    ) -> StateMachineResult<BatchStatus> {
        use BatchStatus::*;

        let target = match (current_state, event) {
            (Starting, StepEvent::Start) => Started,
            (Started | Stopping, StepEvent::Complete(_)) => Completed,
            (Starting | Started | Stopping, StepEvent::Fail(_)) => Failed,
            (Starting | Started, StepEvent::Stop) => Stopping,
            (Stopping, StepEvent::Stopped) => Stopped,
            (from_state, _) => {
                return Err(StateMachineError::InvalidTransition {
                    from: Some(from_state.to_string()),
                    event: event.event_type().to_string(),
                })
            }
        };

        Ok(target)
    }

    fn missing(&self) -> StateMachineError {
        StateMachineError::Internal(format!(
            "job execution {} has no step at index {} (partition {:?})",
            self.cell.execution_id(),
            self.step_index,
            self.partition
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{JobExecution, JobParameters, PartitionExecution, StepExecution};
    use uuid::Uuid;

    fn cell_with_step(partitions: usize) -> Arc<JobExecutionCell> {
        let mut job = JobExecution::new(1, "job", JobParameters::new());
        let mut step = StepExecution::new(1, "load", Uuid::new_v4());
        for partition in 0..partitions {
            step.partitions
                .push(PartitionExecution::new(partition, Uuid::new_v4()));
        }
        job.step_executions.push(step);
        Arc::new(JobExecutionCell::new(job))
    }

    #[test]
    fn test_step_lifecycle() {
        let cell = cell_with_step(0);
        let machine = StepStateMachine::new(cell.clone(), 0);

        assert_eq!(machine.transition(StepEvent::Start).unwrap(), BatchStatus::Started);
        assert_eq!(
            machine
                .transition(StepEvent::Complete(Some("DONE".to_string())))
                .unwrap(),
            BatchStatus::Completed
        );
        assert!(machine.transition(StepEvent::Start).is_err());

        let step = cell.snapshot().step_executions[0].clone();
        assert_eq!(step.lifecycle.exit_status.as_deref(), Some("DONE"));
        assert!(step.lifecycle.start_time.is_some());
    }

    #[test]
    fn test_stop_path() {
        let cell = cell_with_step(0);
        let machine = StepStateMachine::new(cell, 0);

        machine.transition(StepEvent::Start).unwrap();
        assert_eq!(machine.transition(StepEvent::Stop).unwrap(), BatchStatus::Stopping);
        assert_eq!(machine.transition(StepEvent::Stopped).unwrap(), BatchStatus::Stopped);
        assert!(machine.transition(StepEvent::Complete(None)).is_err());
    }

    #[test]
    fn test_partitioned_step_waits_for_partitions() {
        let cell = cell_with_step(2);
        let step = StepStateMachine::new(cell.clone(), 0);
        let first = StepStateMachine::for_partition(cell.clone(), 0, 0);
        let second = StepStateMachine::for_partition(cell, 0, 1);

        step.transition(StepEvent::Start).unwrap();
        first.transition(StepEvent::Start).unwrap();
        second.transition(StepEvent::Start).unwrap();
        first.transition(StepEvent::complete_simple()).unwrap();

        assert!(matches!(
            step.transition(StepEvent::complete_simple()),
            Err(StateMachineError::GuardFailed(_))
        ));

        second.transition(StepEvent::complete_simple()).unwrap();
        assert_eq!(
            step.transition(StepEvent::complete_simple()).unwrap(),
            BatchStatus::Completed
        );
        assert_eq!(first.current_state().unwrap(), BatchStatus::Completed);
    }

    #[test]
    fn test_missing_step_is_internal_error() {
        let cell = cell_with_step(0);
        let machine = StepStateMachine::for_partition(cell, 0, 5);
        assert!(matches!(
            machine.transition(StepEvent::Start),
            Err(StateMachineError::Internal(_))
        ));
    }
}
