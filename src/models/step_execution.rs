use super::job_execution::Lifecycle;
use crate::checkpoint::CheckpointMarker;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Item counters for a step or partition
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepMetrics {
    pub read_count: u64,
    pub write_count: u64,
    pub filter_count: u64,
    pub read_skip_count: u64,
    pub process_skip_count: u64,
    pub write_skip_count: u64,
    pub commit_count: u64,
    pub rollback_count: u64,
    pub retry_count: u64,
}

impl StepMetrics {
    pub fn skip_count(&self) -> u64 {
        self.read_skip_count + self.process_skip_count + self.write_skip_count
    }

    pub fn merge(&mut self, other: &StepMetrics) {
        self.read_count += other.read_count;
        self.write_count += other.write_count;
        self.filter_count += other.filter_count;
        self.read_skip_count += other.read_skip_count;
        self.process_skip_count += other.process_skip_count;
        self.write_skip_count += other.write_skip_count;
        self.commit_count += other.commit_count;
        self.rollback_count += other.rollback_count;
        self.retry_count += other.retry_count;
    }
}

/// One partition of a partitioned chunk step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartitionExecution {
    pub partition: usize,
    pub lineage_id: Uuid,
    #[serde(flatten)]
    pub lifecycle: Lifecycle,
    pub metrics: StepMetrics,
    pub checkpoint: Option<CheckpointMarker>,
}

impl PartitionExecution {
    pub fn new(partition: usize, lineage_id: Uuid) -> Self {
        Self {
            partition,
            lineage_id,
            lifecycle: Lifecycle::default(),
            metrics: StepMetrics::default(),
            checkpoint: None,
        }
    }
}

/// One run of a step inside a job execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepExecution {
    pub step_execution_id: Uuid,
    /// Owning job execution
    pub job_execution_id: u64,
    pub step_name: String,
    /// Shared with the step executions this one restarts
    pub lineage_id: Uuid,
    #[serde(flatten)]
    pub lifecycle: Lifecycle,
    pub metrics: StepMetrics,
    /// Last committed marker, chunk steps only
    pub checkpoint: Option<CheckpointMarker>,
    pub partitions: Vec<PartitionExecution>,
}

impl StepExecution {
    pub fn new(job_execution_id: u64, step_name: impl Into<String>, lineage_id: Uuid) -> Self {
        Self {
            step_execution_id: Uuid::new_v4(),
            job_execution_id,
            step_name: step_name.into(),
            lineage_id,
            lifecycle: Lifecycle::default(),
            metrics: StepMetrics::default(),
            checkpoint: None,
            partitions: Vec::new(),
        }
    }

    pub fn partition(&self, partition: usize) -> Option<&PartitionExecution> {
        self.partitions.iter().find(|p| p.partition == partition)
    }
}
