//! # Orchestration
//!
//! Runs job executions on the worker pool.
//!
//! ## Core Components
//!
//! - **JobRepository**: in-process execution records, one [`JobExecutionCell`] per run
//! - **JobRunner**: walks the step graph, following `next` and `on_failure`
//!   transitions and skipping steps a restarted execution already completed
//! - **StepRunner**: listeners, batchlets, chunk steps and partition fan-out
//! - **StopSignal**: cooperative stop flags, observed only at chunk boundaries
//!
//! ```text
//! JobOperator::start
//!   └── BatchEnvironment::submit ──▶ JobRunner
//!                                     └── StepRunner ──▶ ChunkStepEngine
//!                                          └── submit per partition ──▶ ChunkStepEngine
//! ```

pub mod control;
pub(crate) mod job_runner;
pub mod repository;
pub(crate) mod step_runner;

pub use control::StopSignal;
pub use repository::{JobExecutionCell, JobRepository};
