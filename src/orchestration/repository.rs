//! In-process job execution records.
//!
//! Each execution lives in a [`JobExecutionCell`]: the record behind a lock,
//! a `watch` channel publishing its status to waiters, and the stop signal
//! shared with the task running it.

use super::control::StopSignal;
use crate::error::{BatchError, BatchResult};
use crate::models::{JobExecution, JobParameters};
use crate::state_machine::BatchStatus;
use dashmap::DashMap;
use parking_lot::{RwLock, RwLockWriteGuard};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;

pub struct JobExecutionCell {
    execution_id: u64,
    job_name: String,
    execution: RwLock<JobExecution>,
    status: watch::Sender<BatchStatus>,
    stop: StopSignal,
}

impl JobExecutionCell {
    pub fn new(execution: JobExecution) -> Self {
        let (status, _) = watch::channel(execution.status());
        Self {
            execution_id: execution.execution_id,
            job_name: execution.job_name.clone(),
            execution: RwLock::new(execution),
            status,
            stop: StopSignal::new(),
        }
    }

    pub fn execution_id(&self) -> u64 {
        self.execution_id
    }

    pub fn job_name(&self) -> &str {
        &self.job_name
    }

    /// Point-in-time copy of the record
    pub fn snapshot(&self) -> JobExecution {
        self.execution.read().clone()
    }

    pub fn read<R>(&self, f: impl FnOnce(&JobExecution) -> R) -> R {
        f(&self.execution.read())
    }

    /// Mutate fields other than status; status changes go through the state machines
    pub fn update<R>(&self, f: impl FnOnce(&mut JobExecution) -> R) -> R {
        f(&mut self.execution.write())
    }

    pub(crate) fn write(&self) -> RwLockWriteGuard<'_, JobExecution> {
        self.execution.write()
    }

    /// Publish a job status change; called with the record still locked
    pub(crate) fn publish(&self, status: BatchStatus) {
        self.status.send_replace(status);
    }

    pub fn status(&self) -> BatchStatus {
        *self.status.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<BatchStatus> {
        self.status.subscribe()
    }

    pub fn stop_signal(&self) -> &StopSignal {
        &self.stop
    }
}

impl std::fmt::Debug for JobExecutionCell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobExecutionCell")
            .field("execution_id", &self.execution_id)
            .field("job_name", &self.job_name)
            .field("status", &self.status())
            .finish()
    }
}

/// All job executions created by one operator.
///
/// Records are kept for the operator's lifetime so finished executions stay
/// queryable and restartable; drop the operator to release them.
#[derive(Debug)]
pub struct JobRepository {
    executions: DashMap<u64, Arc<JobExecutionCell>>,
    next_id: AtomicU64,
}

impl Default for JobRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl JobRepository {
    pub fn new() -> Self {
        Self {
            executions: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    /// Create and store a new execution in STARTING
    pub fn create(&self, job_name: &str, parameters: JobParameters) -> Arc<JobExecutionCell> {
        let execution_id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let cell = Arc::new(JobExecutionCell::new(JobExecution::new(
            execution_id,
            job_name,
            parameters,
        )));
        self.executions.insert(execution_id, cell.clone());
        cell
    }

    pub fn get(&self, execution_id: u64) -> BatchResult<Arc<JobExecutionCell>> {
        self.executions
            .get(&execution_id)
            .map(|entry| entry.value().clone())
            .ok_or(BatchError::NoSuchJobExecution(execution_id))
    }

    pub fn executions_of(&self, job_name: &str) -> Vec<Arc<JobExecutionCell>> {
        let mut cells: Vec<_> = self
            .executions
            .iter()
            .filter(|entry| entry.value().job_name() == job_name)
            .map(|entry| entry.value().clone())
            .collect();
        cells.sort_by_key(|cell| cell.execution_id());
        cells
    }

    pub fn len(&self) -> usize {
        self.executions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.executions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_sequential_and_lookup_works() {
        let repository = JobRepository::new();
        let first = repository.create("a", JobParameters::new());
        let second = repository.create("b", JobParameters::new());
        let third = repository.create("a", JobParameters::new());

        assert_eq!(first.execution_id() + 1, second.execution_id());
        assert_eq!(repository.get(second.execution_id()).unwrap().job_name(), "b");
        assert!(matches!(
            repository.get(999),
            Err(BatchError::NoSuchJobExecution(999))
        ));

        let ids: Vec<u64> = repository
            .executions_of("a")
            .iter()
            .map(|cell| cell.execution_id())
            .collect();
        assert_eq!(ids, vec![first.execution_id(), third.execution_id()]);
    }

    #[test]
    fn test_new_cell_publishes_starting() {
        let repository = JobRepository::new();
        let cell = repository.create("a", JobParameters::new());
        assert_eq!(cell.status(), BatchStatus::Starting);
        assert_eq!(*cell.subscribe().borrow(), BatchStatus::Starting);
    }
}
