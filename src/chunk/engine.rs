use super::policy::{ErrorAction, ResolvedPolicy};
use super::ChunkPhase;
use crate::artifacts::{Item, ItemError, ItemProcessor, ItemReader, ItemWriter, ProcessResult};
use crate::checkpoint::{CheckpointKey, CheckpointMarker, CheckpointStore};
use crate::constants::operations;
use crate::environment::{Transaction, TransactionManager};
use crate::error::{BatchError, BatchResult};
use crate::logging::{log_chunk_operation, log_error};
use crate::models::StepMetrics;
use crate::orchestration::StopSignal;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// The artifacts one chunk step (or partition) runs with
pub struct ChunkArtifacts {
    pub reader: Box<dyn ItemReader>,
    pub processor: Option<Box<dyn ItemProcessor>>,
    pub writer: Box<dyn ItemWriter>,
}

#[derive(Debug, Clone)]
pub struct ChunkSettings {
    /// Items read per chunk, at least 1
    pub commit_interval: usize,
    pub policy: ResolvedPolicy,
}

/// Called after every commit and rollback with the step totals so far
pub type ProgressSink = Arc<dyn Fn(&StepMetrics, Option<&CheckpointMarker>) + Send + Sync>;

#[derive(Debug)]
pub enum StepOutcome {
    Completed,
    /// A stop request was observed at a chunk boundary
    Stopped,
    Failed(BatchError),
}

#[derive(Debug)]
pub struct ChunkStepReport {
    pub outcome: StepOutcome,
    pub metrics: StepMetrics,
    /// Marker of the last committed chunk, including one from an earlier execution
    pub last_committed: Option<CheckpointMarker>,
}

/// Reason a chunk cycle stopped filling or writing its chunk
enum Interrupt {
    Retry { phase: ChunkPhase, error: ItemError },
    Fatal(BatchError),
}

/// Why a write attempt left the chunk unwritten
enum WriteFailure {
    /// An item was skipped; roll back and write the survivors again
    Rewrite { isolate: bool },
    Interrupt(Interrupt),
}

impl From<Interrupt> for WriteFailure {
    fn from(interrupt: Interrupt) -> Self {
        Self::Interrupt(interrupt)
    }
}

enum CycleResult {
    Committed { end_of_data: bool },
    /// End of data before anything was read
    Exhausted,
    RolledBack,
}

/// Items and counts of the in-flight chunk; applied to the step only on commit
#[derive(Default)]
struct Chunk {
    items: Vec<Item>,
    reads: usize,
    end_of_data: bool,
    metrics: StepMetrics,
}

impl Chunk {
    fn is_idle(&self) -> bool {
        self.reads == 0 && self.metrics.skip_count() == 0
    }
}

pub struct ChunkStepEngine {
    key: CheckpointKey,
    artifacts: ChunkArtifacts,
    settings: ChunkSettings,
    checkpoints: Arc<dyn CheckpointStore>,
    transactions: Arc<dyn TransactionManager>,
    stop: StopSignal,
    progress: Option<ProgressSink>,
    metrics: StepMetrics,
    last_committed: Option<CheckpointMarker>,
    /// Writer position right after its first open, used until a marker exists
    writer_origin: Option<serde_json::Value>,
    phase: ChunkPhase,
    chunk_attempts: u32,
    reader_open: bool,
    writer_open: bool,
}

impl ChunkStepEngine {
    pub fn new(
        key: CheckpointKey,
        artifacts: ChunkArtifacts,
        settings: ChunkSettings,
        checkpoints: Arc<dyn CheckpointStore>,
        transactions: Arc<dyn TransactionManager>,
    ) -> Self {
        Self {
            key,
            artifacts,
            settings,
            checkpoints,
            transactions,
            stop: StopSignal::new(),
            progress: None,
            metrics: StepMetrics::default(),
            last_committed: None,
            writer_origin: None,
            phase: ChunkPhase::NotStarted,
            chunk_attempts: 0,
            reader_open: false,
            writer_open: false,
        }
    }

    #[must_use]
    pub fn with_stop_signal(mut self, stop: StopSignal) -> Self {
        self.stop = stop;
        self
    }

    #[must_use]
    pub fn with_progress(mut self, progress: ProgressSink) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Run chunk cycles until the data is exhausted, a stop is observed or the step fails
    pub async fn execute(mut self) -> ChunkStepReport {
        info!(
            checkpoint_key = %self.key,
            commit_interval = self.settings.commit_interval,
            "Chunk step starting"
        );

        let mut outcome = match self.run().await {
            Ok(outcome) => outcome,
            Err(error) => StepOutcome::Failed(error),
        };

        if let Err(error) = self.close_artifacts().await {
            match outcome {
                StepOutcome::Completed => outcome = StepOutcome::Failed(error),
                _ => warn!(
                    checkpoint_key = %self.key,
                    error = %error,
                    "Failed to close artifacts after step ended"
                ),
            }
        }

        self.phase = match outcome {
            StepOutcome::Failed(_) => ChunkPhase::Failed,
            _ => ChunkPhase::Completed,
        };

        info!(
            checkpoint_key = %self.key,
            outcome = ?outcome,
            read_count = self.metrics.read_count,
            write_count = self.metrics.write_count,
            commit_count = self.metrics.commit_count,
            "Chunk step finished"
        );

        ChunkStepReport {
            outcome,
            metrics: self.metrics,
            last_committed: self.last_committed,
        }
    }

    async fn run(&mut self) -> BatchResult<StepOutcome> {
        let marker = self.checkpoints.load(&self.key).await?;
        if marker.is_some() {
            info!(checkpoint_key = %self.key, "Resuming from committed checkpoint");
        }
        self.last_committed = marker;
        self.open_artifacts().await?;

        loop {
            if self.stop.is_stop_requested() {
                info!(checkpoint_key = %self.key, "Stop observed at chunk boundary");
                return Ok(StepOutcome::Stopped);
            }

            match self.run_cycle().await? {
                CycleResult::Committed { end_of_data: false } => {}
                CycleResult::Committed { end_of_data: true } | CycleResult::Exhausted => {
                    return Ok(StepOutcome::Completed)
                }
                CycleResult::RolledBack => self.reposition().await?,
            }
        }
    }

    async fn run_cycle(&mut self) -> BatchResult<CycleResult> {
        let mut transaction = self.transactions.begin().await?;
        let mut chunk = Chunk::default();

        match self.fill_chunk(&mut chunk).await {
            Ok(()) => {}
            Err(interrupt) => return self.interrupted(transaction, interrupt).await,
        }

        if chunk.end_of_data && chunk.is_idle() {
            transaction.commit().await?;
            debug!(checkpoint_key = %self.key, "End of data, nothing left to commit");
            return Ok(CycleResult::Exhausted);
        }

        let mut isolate = false;
        while !chunk.items.is_empty() {
            let written = if isolate {
                self.write_isolated(&mut chunk).await
            } else {
                self.write_chunk(&mut chunk).await
            };

            match written {
                Ok(()) => break,
                Err(WriteFailure::Rewrite { isolate: one_by_one }) => {
                    isolate |= one_by_one;
                    transaction = self.restart_write(transaction).await?;
                }
                Err(WriteFailure::Interrupt(interrupt)) => {
                    return self.interrupted(transaction, interrupt).await
                }
            }
        }

        self.checkpoint(transaction).await?;
        self.apply_commit(&chunk);

        Ok(CycleResult::Committed {
            end_of_data: chunk.end_of_data,
        })
    }

    async fn fill_chunk(&mut self, chunk: &mut Chunk) -> Result<(), Interrupt> {
        while chunk.reads < self.settings.commit_interval {
            self.phase = ChunkPhase::Reading;
            let item = match self.artifacts.reader.read_item().await {
                Ok(Some(item)) => item,
                Ok(None) => {
                    chunk.end_of_data = true;
                    break;
                }
                Err(error) => {
                    self.handle_item_error(chunk, ChunkPhase::Reading, error)?;
                    continue;
                }
            };
            chunk.reads += 1;
            chunk.metrics.read_count += 1;

            let item = match self.artifacts.processor.as_mut() {
                None => item,
                Some(processor) => {
                    self.phase = ChunkPhase::Processing;
                    match processor.process_item(item).await {
                        Ok(ProcessResult::Processed(item)) => item,
                        Ok(ProcessResult::Filtered) => {
                            chunk.metrics.filter_count += 1;
                            continue;
                        }
                        Err(error) => {
                            self.handle_item_error(chunk, ChunkPhase::Processing, error)?;
                            continue;
                        }
                    }
                }
            };

            chunk.items.push(item);
        }

        Ok(())
    }

    /// Write the whole chunk in one call
    async fn write_chunk(&mut self, chunk: &mut Chunk) -> Result<(), WriteFailure> {
        self.phase = ChunkPhase::Writing;

        let error = match self.artifacts.writer.write_items(&chunk.items).await {
            Ok(()) => {
                chunk.metrics.write_count += chunk.items.len() as u64;
                return Ok(());
            }
            Err(error) => error,
        };

        let action = self.settings.policy.decide(&error, ChunkPhase::Writing);
        let offending = error.item_index.filter(|index| *index < chunk.items.len());
        match (action, offending) {
            (ErrorAction::Skip, Some(index)) => {
                self.apply_action(chunk, ChunkPhase::Writing, action, error)?;
                chunk.items.remove(index);
                Err(WriteFailure::Rewrite { isolate: false })
            }
            (ErrorAction::Skip, None) => {
                debug!(
                    checkpoint_key = %self.key,
                    items = chunk.items.len(),
                    "Writer failure without item position, isolating items"
                );
                Err(WriteFailure::Rewrite { isolate: true })
            }
            (ErrorAction::Retry, _) => Err(Interrupt::Retry {
                phase: ChunkPhase::Writing,
                error,
            }
            .into()),
            (ErrorAction::Fail, _) => Err(Interrupt::Fatal(BatchError::ItemFailed {
                phase: ChunkPhase::Writing,
                error,
            })
            .into()),
        }
    }

    /// Write the chunk one item at a time so only the offending items are skipped
    async fn write_isolated(&mut self, chunk: &mut Chunk) -> Result<(), WriteFailure> {
        self.phase = ChunkPhase::Writing;

        for index in 0..chunk.items.len() {
            let item = std::slice::from_ref(&chunk.items[index]);
            if let Err(error) = self.artifacts.writer.write_items(item).await {
                self.handle_item_error(chunk, ChunkPhase::Writing, error)?;
                chunk.items.remove(index);
                return Err(WriteFailure::Rewrite { isolate: true });
            }
        }

        chunk.metrics.write_count += chunk.items.len() as u64;
        Ok(())
    }

    /// Discard a partly written chunk and reopen the writer at the last committed position
    async fn restart_write(
        &mut self,
        transaction: Box<dyn Transaction>,
    ) -> BatchResult<Box<dyn Transaction>> {
        self.rollback(transaction).await?;

        if self.writer_open {
            self.writer_open = false;
            if let Err(error) = self.artifacts.writer.close().await {
                warn!(
                    checkpoint_key = %self.key,
                    error = %error,
                    "Close before rewrite failed, reopening anyway"
                );
            }
        }
        self.open_writer().await?;

        self.transactions.begin().await
    }

    fn handle_item_error(
        &self,
        chunk: &mut Chunk,
        phase: ChunkPhase,
        error: ItemError,
    ) -> Result<(), Interrupt> {
        let action = self.settings.policy.decide(&error, phase);
        self.apply_action(chunk, phase, action, error)
    }

    fn apply_action(
        &self,
        chunk: &mut Chunk,
        phase: ChunkPhase,
        action: ErrorAction,
        error: ItemError,
    ) -> Result<(), Interrupt> {
        match action {
            ErrorAction::Retry => Err(Interrupt::Retry { phase, error }),
            ErrorAction::Fail => Err(Interrupt::Fatal(BatchError::ItemFailed { phase, error })),
            ErrorAction::Skip => {
                if let Some(limit) = self.settings.policy.skip_limit {
                    let skips = self.metrics.skip_count() + chunk.metrics.skip_count();
                    if skips >= u64::from(limit) {
                        return Err(Interrupt::Fatal(BatchError::SkipLimitExceeded {
                            limit,
                            error,
                        }));
                    }
                }

                match phase {
                    ChunkPhase::Reading => chunk.metrics.read_skip_count += 1,
                    ChunkPhase::Processing => chunk.metrics.process_skip_count += 1,
                    _ => chunk.metrics.write_skip_count += 1,
                }
                warn!(
                    checkpoint_key = %self.key,
                    phase = %phase,
                    category = %error.category,
                    error = %error.message,
                    "Skipping item"
                );
                Ok(())
            }
        }
    }

    async fn interrupted(
        &mut self,
        transaction: Box<dyn Transaction>,
        interrupt: Interrupt,
    ) -> BatchResult<CycleResult> {
        match interrupt {
            Interrupt::Fatal(error) => {
                self.rollback_after_failure(transaction).await;
                Err(error)
            }
            Interrupt::Retry { phase, error } => {
                self.rollback(transaction).await?;
                self.chunk_attempts += 1;

                let limit = self.settings.policy.retry_limit;
                if self.chunk_attempts > limit {
                    return Err(BatchError::RetryLimitExceeded { limit, phase, error });
                }

                self.metrics.retry_count += 1;
                warn!(
                    checkpoint_key = %self.key,
                    phase = %phase,
                    attempt = self.chunk_attempts,
                    limit = limit,
                    error = %error,
                    "Retrying chunk from last committed checkpoint"
                );
                Ok(CycleResult::RolledBack)
            }
        }
    }

    /// Save reader and writer positions, then commit the transaction
    async fn checkpoint(&mut self, transaction: Box<dyn Transaction>) -> BatchResult<()> {
        self.phase = ChunkPhase::Checkpointing;

        let reader = match self.artifacts.reader.checkpoint_info().await {
            Ok(position) => position,
            Err(error) => {
                self.rollback_after_failure(transaction).await;
                return Err(BatchError::ItemFailed {
                    phase: ChunkPhase::Checkpointing,
                    error,
                });
            }
        };
        let writer = match self.artifacts.writer.checkpoint_info().await {
            Ok(position) => position,
            Err(error) => {
                self.rollback_after_failure(transaction).await;
                return Err(BatchError::ItemFailed {
                    phase: ChunkPhase::Checkpointing,
                    error,
                });
            }
        };

        let marker = CheckpointMarker::new(reader, writer);
        if let Err(error) = self.checkpoints.save(&self.key, &marker).await {
            self.rollback_after_failure(transaction).await;
            return Err(error.into());
        }

        if let Err(error) = transaction.commit().await {
            // The saved marker now points past data that was never committed
            let previous = self.last_committed.clone().unwrap_or_default();
            if let Err(restore) = self.checkpoints.save(&self.key, &previous).await {
                log_error(
                    "chunk_engine",
                    operations::CHUNK_COMMIT,
                    &restore.to_string(),
                    Some(&self.key.to_string()),
                );
            }
            return Err(error);
        }

        self.last_committed = Some(marker);
        Ok(())
    }

    fn apply_commit(&mut self, chunk: &Chunk) {
        self.metrics.merge(&chunk.metrics);
        self.metrics.commit_count += 1;
        self.chunk_attempts = 0;

        log_chunk_operation(
            operations::CHUNK_COMMIT,
            &self.key.to_string(),
            self.metrics.commit_count,
            chunk.items.len(),
            None,
        );
        self.report_progress();
    }

    async fn rollback(&mut self, transaction: Box<dyn Transaction>) -> BatchResult<()> {
        self.metrics.rollback_count += 1;
        log_chunk_operation(
            operations::CHUNK_ROLLBACK,
            &self.key.to_string(),
            self.metrics.commit_count + 1,
            0,
            Some(&self.phase.to_string()),
        );
        let result = transaction.rollback().await;
        self.report_progress();
        result
    }

    /// Roll back on the way to failing the step; the original error wins
    async fn rollback_after_failure(&mut self, transaction: Box<dyn Transaction>) {
        if let Err(error) = self.rollback(transaction).await {
            log_error(
                "chunk_engine",
                operations::CHUNK_ROLLBACK,
                &error.to_string(),
                Some(&self.key.to_string()),
            );
        }
    }

    fn report_progress(&self) {
        if let Some(progress) = &self.progress {
            progress(&self.metrics, self.last_committed.as_ref());
        }
    }

    async fn open_artifacts(&mut self) -> BatchResult<()> {
        self.phase = ChunkPhase::Opening;
        let reader = self
            .last_committed
            .as_ref()
            .and_then(|marker| marker.reader.clone());

        self.artifacts
            .reader
            .open(reader)
            .await
            .map_err(|error| BatchError::ItemFailed {
                phase: ChunkPhase::Opening,
                error,
            })?;
        self.reader_open = true;

        self.open_writer().await
    }

    /// Open the writer at the last committed position, or where it first opened
    async fn open_writer(&mut self) -> BatchResult<()> {
        self.phase = ChunkPhase::Opening;
        let opening = |error| BatchError::ItemFailed {
            phase: ChunkPhase::Opening,
            error,
        };

        let position = match &self.last_committed {
            Some(marker) => marker.writer.clone(),
            None => self.writer_origin.clone(),
        };
        let first_open = self.last_committed.is_none() && self.writer_origin.is_none();

        self.artifacts.writer.open(position).await.map_err(opening)?;
        self.writer_open = true;

        if first_open {
            self.writer_origin = self
                .artifacts
                .writer
                .checkpoint_info()
                .await
                .map_err(opening)?;
        }
        Ok(())
    }

    /// Close and reopen both ends at the last committed marker before a retry
    async fn reposition(&mut self) -> BatchResult<()> {
        if let Err(error) = self.close_artifacts().await {
            warn!(
                checkpoint_key = %self.key,
                error = %error,
                "Close before retry failed, reopening anyway"
            );
        }
        self.open_artifacts().await
    }

    async fn close_artifacts(&mut self) -> BatchResult<()> {
        self.phase = ChunkPhase::Closing;
        let mut first_error = None;

        if self.reader_open {
            self.reader_open = false;
            if let Err(error) = self.artifacts.reader.close().await {
                first_error.get_or_insert(error);
            }
        }
        if self.writer_open {
            self.writer_open = false;
            if let Err(error) = self.artifacts.writer.close().await {
                first_error.get_or_insert(error);
            }
        }

        match first_error {
            None => Ok(()),
            Some(error) => Err(BatchError::ItemFailed {
                phase: ChunkPhase::Closing,
                error,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::ArtifactResult;
    use crate::checkpoint::InMemoryCheckpointStore;
    use crate::chunk::ErrorPolicy;
    use crate::config::EngineConfig;
    use crate::environment::NoOpTransactionManager;
    use crate::registry::ArtifactRegistry;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use serde_json::{json, Value};
    use uuid::Uuid;

    struct VecReader {
        items: Vec<Item>,
        position: usize,
    }

    #[async_trait]
    impl ItemReader for VecReader {
        async fn open(&mut self, checkpoint: Option<Value>) -> ArtifactResult<()> {
            self.position = checkpoint
                .and_then(|v| v.as_u64())
                .map(|p| p as usize)
                .unwrap_or(0);
            Ok(())
        }

        async fn read_item(&mut self) -> ArtifactResult<Option<Item>> {
            let item = self.items.get(self.position).cloned();
            if item.is_some() {
                self.position += 1;
            }
            Ok(item)
        }

        async fn checkpoint_info(&mut self) -> ArtifactResult<Option<Value>> {
            Ok(Some(json!(self.position)))
        }
    }

    #[derive(Clone, Default)]
    struct RecordingWriter {
        calls: Arc<Mutex<Vec<Vec<Item>>>>,
    }

    #[async_trait]
    impl ItemWriter for RecordingWriter {
        async fn open(&mut self, _checkpoint: Option<Value>) -> ArtifactResult<()> {
            Ok(())
        }

        async fn write_items(&mut self, items: &[Item]) -> ArtifactResult<()> {
            self.calls.lock().push(items.to_vec());
            Ok(())
        }

        async fn checkpoint_info(&mut self) -> ArtifactResult<Option<Value>> {
            Ok(None)
        }
    }

    struct OddFilter;

    #[async_trait]
    impl ItemProcessor for OddFilter {
        async fn process_item(&mut self, item: Item) -> ArtifactResult<ProcessResult> {
            match item.as_u64() {
                Some(n) if n % 2 == 1 => Ok(ProcessResult::Filtered),
                Some(n) if n == 4 => Err(ItemError::new("bad", "four")),
                _ => Ok(ProcessResult::Processed(item)),
            }
        }
    }

    fn engine(
        count: u64,
        interval: usize,
        processor: Option<Box<dyn ItemProcessor>>,
        policy: ErrorPolicy,
        writer: RecordingWriter,
    ) -> (ChunkStepEngine, Arc<InMemoryCheckpointStore>) {
        let store = Arc::new(InMemoryCheckpointStore::new());
        let engine = ChunkStepEngine::new(
            CheckpointKey::new("job", "step", Uuid::new_v4()),
            ChunkArtifacts {
                reader: Box::new(VecReader {
                    items: (0..count).map(|n| json!(n)).collect(),
                    position: 0,
                }),
                processor,
                writer: Box::new(writer),
            },
            ChunkSettings {
                commit_interval: interval,
                policy: policy
                    .resolve(&EngineConfig::default(), &ArtifactRegistry::new())
                    .unwrap(),
            },
            store.clone(),
            Arc::new(NoOpTransactionManager),
        );
        (engine, store)
    }

    #[tokio::test]
    async fn test_filtered_items_count_toward_interval() {
        let writer = RecordingWriter::default();
        let (engine, _) = engine(
            6,
            2,
            Some(Box::new(OddFilter)),
            ErrorPolicy::new().skip_on("bad"),
            writer.clone(),
        );

        let report = engine.execute().await;
        assert!(matches!(report.outcome, StepOutcome::Completed));

        // chunks [0,1] [2,3] [4,5]: 4 is skipped in processing, odds are filtered
        let calls = writer.calls.lock().clone();
        assert_eq!(calls, vec![vec![json!(0)], vec![json!(2)]]);
        assert_eq!(report.metrics.read_count, 6);
        assert_eq!(report.metrics.filter_count, 3);
        assert_eq!(report.metrics.process_skip_count, 1);
        assert_eq!(report.metrics.write_count, 2);
        assert_eq!(report.metrics.commit_count, 3);
        assert_eq!(report.last_committed.unwrap().reader, Some(json!(6)));
    }

    #[tokio::test]
    async fn test_unclassified_processor_error_fails_step() {
        let writer = RecordingWriter::default();
        let (engine, store) = engine(
            6,
            4,
            Some(Box::new(OddFilter)),
            ErrorPolicy::new(),
            writer.clone(),
        );
        let key = engine.key.clone();

        let report = engine.execute().await;
        assert!(matches!(
            report.outcome,
            StepOutcome::Failed(BatchError::ItemFailed {
                phase: ChunkPhase::Processing,
                ..
            })
        ));
        // First chunk [0..4) committed, the failing chunk rolled back
        assert_eq!(writer.calls.lock().len(), 1);
        assert_eq!(report.metrics.rollback_count, 1);
        assert_eq!(
            store.load(&key).await.unwrap().unwrap().reader,
            Some(json!(4))
        );
    }

    #[tokio::test]
    async fn test_stop_before_first_cycle() {
        let writer = RecordingWriter::default();
        let (engine, store) = engine(5, 2, None, ErrorPolicy::new(), writer.clone());
        let key = engine.key.clone();
        let stop = StopSignal::new();
        stop.request_stop();

        let report = engine.with_stop_signal(stop).execute().await;
        assert!(matches!(report.outcome, StepOutcome::Stopped));
        assert!(writer.calls.lock().is_empty());
        assert!(store.load(&key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_skip_limit_is_fatal() {
        let writer = RecordingWriter::default();
        let (engine, _) = engine(
            10,
            10,
            Some(Box::new(OddFilter)),
            ErrorPolicy::new().skip_on("bad").with_skip_limit(0),
            writer,
        );

        let report = engine.execute().await;
        assert!(matches!(
            report.outcome,
            StepOutcome::Failed(BatchError::SkipLimitExceeded { limit: 0, .. })
        ));
    }

    #[tokio::test]
    async fn test_progress_reports_each_commit() {
        let writer = RecordingWriter::default();
        let (engine, _) = engine(5, 2, None, ErrorPolicy::new(), writer);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();

        let report = engine
            .with_progress(Arc::new(move |metrics, _marker| {
                sink.lock().push(metrics.write_count);
            }))
            .execute()
            .await;

        assert!(matches!(report.outcome, StepOutcome::Completed));
        assert_eq!(seen.lock().clone(), vec![2, 4, 5]);
    }
}
