//! # Step Runner
//!
//! Runs one step of a job execution: records the step execution, resolves its
//! listeners and artifacts, drives the chunk engine (once, or once per
//! partition on the worker pool) or the batchlet, and settles the step status.
//!
//! Configuration errors (unknown artifact, bad property, unknown classifier)
//! fail the step before any chunk is attempted.

use super::control::StopSignal;
use super::repository::JobExecutionCell;
use crate::artifacts::{ArtifactContext, StepListener};
use crate::checkpoint::{CheckpointKey, CheckpointStore};
use crate::chunk::{ChunkArtifacts, ChunkSettings, ChunkStepEngine, ProgressSink, StepOutcome};
use crate::config::EngineConfig;
use crate::environment::BatchEnvironment;
use crate::error::{BatchError, BatchResult};
use crate::logging::log_error;
use crate::models::{
    ArtifactRef, ChunkDefinition, JobDefinition, PartitionExecution, PartitionPlan, StepDefinition,
    StepExecution, StepKind, StepMetrics,
};
use crate::state_machine::{BatchStatus, StepEvent, StepStateMachine};
use futures::future::{join_all, FutureExt};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Partition index and the properties it overrides
type PartitionRef<'a> = (usize, &'a HashMap<String, String>);

/// Checkpoint lineage of a step and its partitions
#[derive(Debug, Clone)]
pub(crate) struct StepLineage {
    pub lineage_id: Uuid,
    pub partitions: HashMap<usize, Uuid>,
}

impl StepLineage {
    pub fn fresh() -> Self {
        Self {
            lineage_id: Uuid::new_v4(),
            partitions: HashMap::new(),
        }
    }

    /// Continue the lineage of a step execution from an earlier job execution
    pub fn resume(previous: &StepExecution) -> Self {
        Self {
            lineage_id: previous.lineage_id,
            partitions: previous
                .partitions
                .iter()
                .map(|p| (p.partition, p.lineage_id))
                .collect(),
        }
    }

    fn partition(&self, partition: usize) -> Uuid {
        self.partitions
            .get(&partition)
            .copied()
            .unwrap_or_else(Uuid::new_v4)
    }
}

/// Everything a step needs from the operator that started the job
#[derive(Clone)]
pub(crate) struct StepRunner {
    environment: Arc<dyn BatchEnvironment>,
    checkpoints: Arc<dyn CheckpointStore>,
    engine: EngineConfig,
}

impl StepRunner {
    pub fn new(
        environment: Arc<dyn BatchEnvironment>,
        checkpoints: Arc<dyn CheckpointStore>,
        engine: EngineConfig,
    ) -> Self {
        Self {
            environment,
            checkpoints,
            engine,
        }
    }

    /// Run `step` to a finished status
    pub async fn run(
        &self,
        cell: &Arc<JobExecutionCell>,
        job: &JobDefinition,
        step: &StepDefinition,
        lineage: StepLineage,
    ) -> BatchStatus {
        let step_index = Self::record_step(cell, step, &lineage);
        let machine = StepStateMachine::new(cell.clone(), step_index);

        if let Err(error) = machine.transition(StepEvent::Start) {
            log_error(
                "step_runner",
                "step.start",
                &error.to_string(),
                Some(&step.name),
            );
            return BatchStatus::Failed;
        }

        info!(
            execution_id = cell.execution_id(),
            step_name = %step.name,
            lineage_id = %lineage.lineage_id,
            "Step started"
        );

        let context = ArtifactContext::new(job.name.clone(), step.name.clone())
            .with_job_parameters(cell.read(|execution| execution.parameters.clone()));

        let (outcome, exit_status) = match self.resolve_listeners(step, &context) {
            Err(error) => (StepOutcome::Failed(error), None),
            Ok(mut listeners) => {
                let (outcome, exit_status) =
                    match Self::notify(cell, step_index, &mut listeners, true).await {
                        Err(error) => (StepOutcome::Failed(error), None),
                        Ok(()) => self.execute(cell, step, step_index, &lineage, &context).await,
                    };

                match Self::notify(cell, step_index, &mut listeners, false).await {
                    Err(error) if matches!(outcome, StepOutcome::Completed) => {
                        (StepOutcome::Failed(error), None)
                    }
                    Err(error) => {
                        warn!(step_name = %step.name, error = %error, "after_step listener failed");
                        (outcome, exit_status)
                    }
                    Ok(()) => (outcome, exit_status),
                }
            }
        };

        settle(&machine, &step.name, outcome, exit_status)
    }

    fn record_step(cell: &JobExecutionCell, step: &StepDefinition, lineage: &StepLineage) -> usize {
        cell.update(|job| {
            let mut execution =
                StepExecution::new(job.execution_id, step.name.clone(), lineage.lineage_id);
            if let StepKind::Chunk(ChunkDefinition {
                partitions: Some(plan),
                ..
            }) = &step.kind
            {
                execution.partitions = (0..plan.partitions.len())
                    .map(|partition| PartitionExecution::new(partition, lineage.partition(partition)))
                    .collect();
            }
            job.step_executions.push(execution);
            job.step_executions.len() - 1
        })
    }

    fn resolve_listeners(
        &self,
        step: &StepDefinition,
        context: &ArtifactContext,
    ) -> BatchResult<Vec<Box<dyn StepListener>>> {
        step.listeners
            .iter()
            .map(|reference| {
                self.environment.artifacts().resolve_listener(
                    reference,
                    &context.clone().with_properties(reference.properties.clone()),
                )
            })
            .collect()
    }

    async fn notify(
        cell: &JobExecutionCell,
        step_index: usize,
        listeners: &mut [Box<dyn StepListener>],
        before: bool,
    ) -> BatchResult<()> {
        if listeners.is_empty() {
            return Ok(());
        }

        let snapshot = cell
            .read(|job| job.step_executions.get(step_index).cloned())
            .ok_or_else(|| BatchError::Internal(format!("no step execution at {step_index}")))?;

        for listener in listeners.iter_mut() {
            let result = if before {
                listener.before_step(&snapshot).await
            } else {
                listener.after_step(&snapshot).await
            };
            result.map_err(|error| BatchError::Internal(format!("step listener failed: {error}")))?;
        }
        Ok(())
    }

    async fn execute(
        &self,
        cell: &Arc<JobExecutionCell>,
        step: &StepDefinition,
        step_index: usize,
        lineage: &StepLineage,
        context: &ArtifactContext,
    ) -> (StepOutcome, Option<String>) {
        match &step.kind {
            StepKind::Batchlet(reference) => self.run_batchlet(cell, reference, context).await,
            StepKind::Chunk(chunk) => {
                let outcome = match &chunk.partitions {
                    None => {
                        let key = CheckpointKey::new(
                            context.job_name.clone(),
                            step.name.clone(),
                            lineage.lineage_id,
                        );
                        let stop = cell.stop_signal().clone();
                        self.run_chunk(cell, chunk, key, context, step_index, None, stop)
                            .await
                    }
                    Some(plan) => {
                        self.run_partitions(cell, step, chunk, plan, step_index, context)
                            .await
                    }
                };
                (outcome, None)
            }
        }
    }

    async fn run_batchlet(
        &self,
        cell: &JobExecutionCell,
        reference: &ArtifactRef,
        context: &ArtifactContext,
    ) -> (StepOutcome, Option<String>) {
        let context = context.clone().with_properties(reference.properties.clone());
        let mut batchlet = match self.environment.artifacts().resolve_batchlet(reference, &context) {
            Ok(batchlet) => batchlet,
            Err(error) => return (StepOutcome::Failed(error), None),
        };

        let stop = cell.stop_signal();
        match batchlet.process(stop).await {
            Ok(_) if stop.is_stop_requested() => (StepOutcome::Stopped, None),
            Ok(exit_status) => (StepOutcome::Completed, exit_status),
            Err(error) => (
                StepOutcome::Failed(BatchError::Internal(format!("batchlet failed: {error}"))),
                None,
            ),
        }
    }

    fn build_engine(
        &self,
        chunk: &ChunkDefinition,
        key: CheckpointKey,
        context: &ArtifactContext,
        partition: Option<PartitionRef<'_>>,
    ) -> BatchResult<ChunkStepEngine> {
        let artifacts = self.environment.artifacts();
        // Partition properties override artifact properties
        let context_for = |reference: &ArtifactRef| {
            let context = context.clone().with_properties(reference.properties.clone());
            match partition {
                Some((index, overrides)) => context.with_partition(index, overrides),
                None => context,
            }
        };

        let reader = artifacts.resolve_reader(&chunk.reader, &context_for(&chunk.reader))?;
        let processor = chunk
            .processor
            .as_ref()
            .map(|reference| artifacts.resolve_processor(reference, &context_for(reference)))
            .transpose()?;
        let writer = artifacts.resolve_writer(&chunk.writer, &context_for(&chunk.writer))?;

        let settings = ChunkSettings {
            commit_interval: chunk
                .commit_interval
                .unwrap_or(self.engine.default_commit_interval),
            policy: chunk.policy.resolve(&self.engine, artifacts)?,
        };

        Ok(ChunkStepEngine::new(
            key,
            ChunkArtifacts {
                reader,
                processor,
                writer,
            },
            settings,
            self.checkpoints.clone(),
            self.environment.transaction_manager(),
        ))
    }

    #[allow(clippy::too_many_arguments)]
    async fn run_chunk(
        &self,
        cell: &Arc<JobExecutionCell>,
        chunk: &ChunkDefinition,
        key: CheckpointKey,
        context: &ArtifactContext,
        step_index: usize,
        partition: Option<PartitionRef<'_>>,
        stop: StopSignal,
    ) -> StepOutcome {
        let engine = match self.build_engine(chunk, key, context, partition) {
            Ok(engine) => engine,
            Err(error) => return StepOutcome::Failed(error),
        };

        let partition = partition.map(|(index, _)| index);
        let sink_cell = cell.clone();
        let progress: ProgressSink = Arc::new(move |metrics, marker| {
            sink_cell.update(|job| {
                let Some(step) = job.step_executions.get_mut(step_index) else {
                    return;
                };
                match partition {
                    None => {
                        step.metrics = *metrics;
                        step.checkpoint = marker.cloned();
                    }
                    Some(partition) => {
                        if let Some(p) = step.partitions.iter_mut().find(|p| p.partition == partition)
                        {
                            p.metrics = *metrics;
                            p.checkpoint = marker.cloned();
                        }
                    }
                }
            });
        });

        let report = engine
            .with_stop_signal(stop)
            .with_progress(progress.clone())
            .execute()
            .await;
        progress(&report.metrics, report.last_committed.as_ref());
        report.outcome
    }

    /// Run each partition as its own pool task and fold the results into the step
    async fn run_partitions(
        &self,
        cell: &Arc<JobExecutionCell>,
        step: &StepDefinition,
        chunk: &ChunkDefinition,
        plan: &PartitionPlan,
        step_index: usize,
        context: &ArtifactContext,
    ) -> StepOutcome {
        let group = cell.stop_signal().child();
        let lineages: Vec<Uuid> = cell.read(|job| {
            job.step_executions[step_index]
                .partitions
                .iter()
                .map(|p| p.lineage_id)
                .collect()
        });

        let mut handles = Vec::with_capacity(plan.partitions.len());
        for (partition, overrides) in plan.partitions.iter().enumerate() {
            let machine = StepStateMachine::for_partition(cell.clone(), step_index, partition);
            let key = CheckpointKey::new(
                context.job_name.clone(),
                step.name.clone(),
                lineages[partition],
            );
            let task = run_partition(
                self.clone(),
                cell.clone(),
                machine.clone(),
                chunk.clone(),
                key,
                context.clone(),
                (step_index, partition, overrides.clone()),
                group.clone(),
                plan.fail_fast,
            );

            match self.environment.submit(task.boxed()) {
                Ok(handle) => handles.push((machine, handle)),
                Err(error) => {
                    settle(&machine, &step.name, StepOutcome::Failed(error), None);
                    if plan.fail_fast {
                        group.request_stop();
                    }
                }
            }
        }

        let (machines, joins): (Vec<_>, Vec<_>) = handles.into_iter().unzip();
        for (machine, joined) in machines.iter().zip(join_all(joins).await) {
            if let Err(error) = joined {
                warn!(step_name = %step.name, error = %error, "Partition task aborted");
                settle(
                    machine,
                    &step.name,
                    StepOutcome::Failed(BatchError::Internal(error.to_string())),
                    None,
                );
            }
        }

        let (metrics, statuses) = cell.update(|job| {
            let execution = &mut job.step_executions[step_index];
            let mut metrics = StepMetrics::default();
            for partition in &execution.partitions {
                metrics.merge(&partition.metrics);
            }
            execution.metrics = metrics;
            let statuses: Vec<BatchStatus> = execution
                .partitions
                .iter()
                .map(|p| p.lifecycle.status)
                .collect();
            (metrics, statuses)
        });

        let total = statuses.len();
        let failed = statuses
            .iter()
            .filter(|status| **status != BatchStatus::Completed && **status != BatchStatus::Stopped)
            .count();
        debug!(
            step_name = %step.name,
            partitions = total,
            failed = failed,
            write_count = metrics.write_count,
            "Partitions settled"
        );

        if failed > 0 {
            StepOutcome::Failed(BatchError::PartitionsFailed {
                step: step.name.clone(),
                failed,
                total,
            })
        } else if statuses.contains(&BatchStatus::Stopped) {
            StepOutcome::Stopped
        } else {
            StepOutcome::Completed
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_partition(
    runner: StepRunner,
    cell: Arc<JobExecutionCell>,
    machine: StepStateMachine,
    chunk: ChunkDefinition,
    key: CheckpointKey,
    context: ArtifactContext,
    (step_index, partition, overrides): (usize, usize, HashMap<String, String>),
    group: StopSignal,
    fail_fast: bool,
) {
    let step_name = context.step_name.clone();

    if let Err(error) = machine.transition(StepEvent::Start) {
        warn!(step_name = %step_name, partition = partition, error = %error, "Partition could not start");
        return;
    }

    let outcome = runner
        .run_chunk(
            &cell,
            &chunk,
            key,
            &context,
            step_index,
            Some((partition, &overrides)),
            group.clone(),
        )
        .await;

    if settle(&machine, &step_name, outcome, None) == BatchStatus::Failed && fail_fast {
        info!(step_name = %step_name, partition = partition, "Partition failed, stopping its siblings");
        group.request_stop();
    }
}

/// Apply the final transition for an outcome, returning the status reached
fn settle(
    machine: &StepStateMachine,
    step_name: &str,
    outcome: StepOutcome,
    exit_status: Option<String>,
) -> BatchStatus {
    let result = match &outcome {
        StepOutcome::Completed => machine.transition(StepEvent::Complete(exit_status)),
        StepOutcome::Failed(error) => machine.transition(StepEvent::fail_with_error(error.to_string())),
        StepOutcome::Stopped => machine
            .transition(StepEvent::Stop)
            .and_then(|_| machine.transition(StepEvent::Stopped)),
    };

    match result {
        Ok(status) => status,
        Err(error) => {
            log_error(
                "step_runner",
                "step.settle",
                &error.to_string(),
                Some(step_name),
            );
            machine
                .transition(StepEvent::fail_with_error(error.to_string()))
                .unwrap_or(BatchStatus::Failed)
        }
    }
}
