//! In-memory job graph definitions and execution records.
//!
//! Definitions describe what a job is made of; executions record one run of
//! it. Snapshots handed to callers are plain clones of the execution records.

pub mod job_definition;
pub mod job_execution;
pub mod step_execution;

pub use job_definition::{
    ArtifactRef, ChunkDefinition, JobDefinition, PartitionPlan, StepDefinition, StepKind,
};
pub use job_execution::{JobExecution, JobParameters, Lifecycle};
pub use step_execution::{PartitionExecution, StepExecution, StepMetrics};
