#![allow(clippy::doc_markdown)] // Allow technical terms like PostgreSQL, SQLx in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Batch Core
//!
//! Chunk-oriented batch job execution engine with checkpoint/restart.
//!
//! ## Overview
//!
//! A job is a graph of steps. A step either runs a single task (a batchlet)
//! or performs chunk-oriented ETL: items are read, optionally processed and
//! written in chunks of `commit_interval` items, and after every committed
//! chunk the reader and writer positions are saved to a checkpoint store. A
//! stopped or failed execution can be restarted and resumes from the last
//! committed chunk with no duplicate and no missing items.
//!
//! Readers, processors and writers are artifacts: named factories registered
//! with the execution environment, so the engine never knows whether it is
//! talking to a CSV file, a database or a queue.
//!
//! ## Module Organization
//!
//! - [`artifacts`] - Reader, processor, writer, batchlet and listener contracts
//! - [`checkpoint`] - Checkpoint store contract plus memory, file and Postgres stores
//! - [`chunk`] - The chunk step engine and its retry/skip policy
//! - [`config`] - Process-wide configuration
//! - [`environment`] - Worker pool, transaction boundary, thread context
//! - [`models`] - Job definitions and execution records
//! - [`operator`] - Start, stop, restart, query and await job executions
//! - [`orchestration`] - Job and step runners
//! - [`registry`] - Artifact and job registries
//! - [`state_machine`] - Job and step status transitions
//! - [`support`] - In-memory reference reader and writer
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use batch_core::environment::{BatchEnvironment, DefaultBatchEnvironment};
//! use batch_core::models::{ArtifactRef, ChunkDefinition, JobDefinition, JobParameters, StepDefinition};
//! use batch_core::operator::JobOperator;
//! use batch_core::support::{CollectingItemWriter, ItemSink, ListItemReader};
//! use serde_json::json;
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), batch_core::BatchError> {
//! let environment = DefaultBatchEnvironment::shared();
//! let sink = ItemSink::new();
//! environment
//!     .artifacts()
//!     .register_reader("numbers", ListItemReader::factory((0..25).map(|n| json!(n)).collect()));
//! environment
//!     .artifacts()
//!     .register_writer("collect", CollectingItemWriter::factory(sink.clone()));
//!
//! let operator = JobOperator::from_environment(environment)?;
//! operator.register_job(JobDefinition::new("copy").with_step(StepDefinition::chunk(
//!     "copy",
//!     ChunkDefinition::new(ArtifactRef::new("numbers"), ArtifactRef::new("collect"))
//!         .with_commit_interval(10),
//! )))?;
//!
//! let execution_id = operator.start("copy", JobParameters::new())?;
//! let status = operator.await_termination(execution_id, Duration::from_secs(5)).await?;
//! println!("{status}: {} items written", sink.len());
//! # Ok(())
//! # }
//! ```

pub mod artifacts;
pub mod checkpoint;
pub mod chunk;
pub mod config;
pub mod constants;
pub mod environment;
pub mod error;
pub mod logging;
pub mod models;
pub mod operator;
pub mod orchestration;
pub mod registry;
pub mod state_machine;
pub mod support;

pub use artifacts::{ArtifactContext, Item, ItemError, ItemProcessor, ItemReader, ItemWriter};
pub use checkpoint::{CheckpointKey, CheckpointMarker, CheckpointStore};
pub use chunk::{ChunkPhase, ErrorPolicy};
pub use config::{BatchConfig, ConfigManager};
pub use environment::{BatchEnvironment, DefaultBatchEnvironment};
pub use error::{BatchError, BatchResult};
pub use operator::JobOperator;
pub use state_machine::BatchStatus;
