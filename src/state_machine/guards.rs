use super::errors::{business_rule_violation, GuardResult};
use crate::models::{JobExecution, StepExecution};

/// Trait for implementing state transition guards.
///
/// Guards run while the execution record is locked for the transition, so
/// they see exactly the state the transition will be applied to.
pub trait StateGuard<T> {
    /// Check if a transition is allowed
    fn check(&self, entity: &T) -> GuardResult<()>;

    /// Get a description of this guard for logging
    fn description(&self) -> &'static str;
}

/// A job may only finish once none of its steps is still running
pub struct AllStepsSettledGuard;

impl StateGuard<JobExecution> for AllStepsSettledGuard {
    fn check(&self, job: &JobExecution) -> GuardResult<()> {
        let running: Vec<&str> = job
            .step_executions
            .iter()
            .filter(|step| step.lifecycle.status.is_running())
            .map(|step| step.step_name.as_str())
            .collect();

        if running.is_empty() {
            Ok(())
        } else {
            Err(business_rule_violation(format!(
                "Job execution {} still has running steps: {}",
                job.execution_id,
                running.join(", ")
            )))
        }
    }

    fn description(&self) -> &'static str {
        "All step executions must be settled"
    }
}

/// A partitioned step may only finish once every partition has finished
pub struct PartitionsSettledGuard;

impl StateGuard<StepExecution> for PartitionsSettledGuard {
    fn check(&self, step: &StepExecution) -> GuardResult<()> {
        match step
            .partitions
            .iter()
            .find(|partition| !partition.lifecycle.status.is_finished())
        {
            None => Ok(()),
            Some(partition) => Err(business_rule_violation(format!(
                "Partition {} of step '{}' is still {}",
                partition.partition, step.step_name, partition.lifecycle.status
            ))),
        }
    }

    fn description(&self) -> &'static str {
        "All partitions must be finished"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{JobParameters, PartitionExecution};
    use crate::state_machine::BatchStatus;
    use uuid::Uuid;

    #[test]
    fn test_all_steps_settled() {
        let mut job = JobExecution::new(1, "job", JobParameters::new());
        assert!(AllStepsSettledGuard.check(&job).is_ok());

        let mut step = StepExecution::new(1, "load", Uuid::new_v4());
        step.lifecycle.apply(BatchStatus::Started);
        job.step_executions.push(step);
        assert!(AllStepsSettledGuard.check(&job).is_err());

        job.step_executions[0].lifecycle.apply(BatchStatus::Completed);
        assert!(AllStepsSettledGuard.check(&job).is_ok());
    }

    #[test]
    fn test_partitions_settled() {
        let mut step = StepExecution::new(1, "load", Uuid::new_v4());
        step.partitions.push(PartitionExecution::new(0, Uuid::new_v4()));
        assert!(PartitionsSettledGuard.check(&step).is_err());

        step.partitions[0].lifecycle.apply(BatchStatus::Stopped);
        assert!(PartitionsSettledGuard.check(&step).is_ok());
    }
}
