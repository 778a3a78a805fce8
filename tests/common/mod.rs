//! Shared fixtures for integration tests: environments, scripted artifacts and
//! a checkpoint store that can be told to fail.

#![allow(dead_code)] // Each test binary uses a different subset

use async_trait::async_trait;
use batch_core::artifacts::{
    ArtifactContext, ArtifactResult, Batchlet, Item, ItemError, ItemReader, ItemWriter,
    StepListener,
};
use batch_core::checkpoint::{
    CheckpointError, CheckpointKey, CheckpointMarker, CheckpointResult, CheckpointStore,
    InMemoryCheckpointStore,
};
use batch_core::config::{BatchConfig, ConfigManager};
use batch_core::environment::DefaultBatchEnvironment;
use batch_core::models::StepExecution;
use batch_core::orchestration::StopSignal;
use batch_core::support::{CollectingItemWriter, ItemSink, ListItemReader};
use batch_core::JobOperator;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

pub const AWAIT: Duration = Duration::from_secs(10);

pub fn numbers(count: u64) -> Vec<Item> {
    (0..count).map(|n| json!(n)).collect()
}

/// Environment with built-in defaults, never reading `batch-config.toml`
pub fn environment() -> Arc<DefaultBatchEnvironment> {
    environment_with(BatchConfig::default())
}

pub fn environment_with(config: BatchConfig) -> Arc<DefaultBatchEnvironment> {
    batch_core::logging::init_structured_logging();
    Arc::new(
        DefaultBatchEnvironment::new().with_config(ConfigManager::from_config(config).unwrap()),
    )
}

pub fn operator(
    environment: Arc<DefaultBatchEnvironment>,
) -> (JobOperator, Arc<InMemoryCheckpointStore>) {
    let store = Arc::new(InMemoryCheckpointStore::new());
    (JobOperator::new(environment, store.clone()), store)
}

/// Failure a [`ScriptedWriter`] raises when a chunk contains `item`
#[derive(Debug, Clone)]
pub struct WriteFailure {
    pub item: Item,
    pub category: &'static str,
    /// Report the offending item's position within the chunk
    pub with_index: bool,
    /// How many times to fail; `usize::MAX` fails forever
    pub times: usize,
}

/// Shared state of every writer instance created by one [`ScriptedWriter::factory`]
#[derive(Debug, Default)]
pub struct WriteScript {
    pub sink: ItemSink,
    pub calls: Mutex<Vec<Vec<Item>>>,
    failures: Mutex<Vec<WriteFailure>>,
    gate: Option<Gate>,
}

impl WriteScript {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing(failures: Vec<WriteFailure>) -> Arc<Self> {
        Arc::new(Self {
            failures: Mutex::new(failures),
            ..Default::default()
        })
    }

    /// Pause inside the `after_calls`-th successful write until released
    pub fn gated(after_calls: usize) -> Arc<Self> {
        Arc::new(Self {
            gate: Some(Gate {
                after_calls,
                writes: AtomicUsize::new(0),
                reached: Notify::new(),
                release: Notify::new(),
            }),
            ..Default::default()
        })
    }

    pub fn call_sizes(&self) -> Vec<usize> {
        self.calls.lock().iter().map(Vec::len).collect()
    }

    pub async fn wait_until_gated(&self) {
        if let Some(gate) = &self.gate {
            gate.reached.notified().await;
        }
    }

    pub fn release(&self) {
        if let Some(gate) = &self.gate {
            gate.release.notify_one();
        }
    }

    fn take_failure(&self, items: &[Item]) -> Option<ItemError> {
        let mut failures = self.failures.lock();
        let failure = failures
            .iter_mut()
            .find(|f| f.times > 0 && items.contains(&f.item))?;
        if failure.times != usize::MAX {
            failure.times -= 1;
        }

        let error = ItemError::new(failure.category, format!("cannot write {}", failure.item));
        if failure.with_index {
            let index = items.iter().position(|item| *item == failure.item)?;
            Some(error.at_item(index))
        } else {
            Some(error)
        }
    }
}

#[derive(Debug)]
struct Gate {
    after_calls: usize,
    writes: AtomicUsize,
    reached: Notify,
    release: Notify,
}

/// Collecting writer driven by a [`WriteScript`]
pub struct ScriptedWriter {
    inner: CollectingItemWriter,
    script: Arc<WriteScript>,
}

impl ScriptedWriter {
    pub fn factory(
        script: Arc<WriteScript>,
    ) -> impl Fn(&ArtifactContext) -> batch_core::BatchResult<Box<dyn ItemWriter>> + Send + Sync
    {
        move |_context| {
            Ok(Box::new(ScriptedWriter {
                inner: CollectingItemWriter::new(script.sink.clone()),
                script: script.clone(),
            }) as Box<dyn ItemWriter>)
        }
    }
}

#[async_trait]
impl ItemWriter for ScriptedWriter {
    async fn open(&mut self, checkpoint: Option<Value>) -> ArtifactResult<()> {
        self.inner.open(checkpoint).await
    }

    async fn write_items(&mut self, items: &[Item]) -> ArtifactResult<()> {
        self.script.calls.lock().push(items.to_vec());
        if let Some(error) = self.script.take_failure(items) {
            return Err(error);
        }
        self.inner.write_items(items).await?;

        if let Some(gate) = &self.script.gate {
            if gate.writes.fetch_add(1, Ordering::SeqCst) + 1 == gate.after_calls {
                gate.reached.notify_one();
                gate.release.notified().await;
            }
        }
        Ok(())
    }

    async fn checkpoint_info(&mut self) -> ArtifactResult<Option<Value>> {
        self.inner.checkpoint_info().await
    }
}

/// List reader that sleeps before every item
pub struct SlowReader {
    inner: ListItemReader,
    delay: Duration,
}

impl SlowReader {
    pub fn factory(
        items: Vec<Item>,
        delay: Duration,
    ) -> impl Fn(&ArtifactContext) -> batch_core::BatchResult<Box<dyn ItemReader>> + Send + Sync
    {
        move |_context| {
            Ok(Box::new(SlowReader {
                inner: ListItemReader::new(items.clone()),
                delay,
            }) as Box<dyn ItemReader>)
        }
    }
}

#[async_trait]
impl ItemReader for SlowReader {
    async fn open(&mut self, checkpoint: Option<Value>) -> ArtifactResult<()> {
        self.inner.open(checkpoint).await
    }

    async fn read_item(&mut self) -> ArtifactResult<Option<Item>> {
        tokio::time::sleep(self.delay).await;
        self.inner.read_item().await
    }

    async fn checkpoint_info(&mut self) -> ArtifactResult<Option<Value>> {
        self.inner.checkpoint_info().await
    }
}

/// Failure a [`FaultyReader`] raises in place of returning `item`
#[derive(Debug, Clone)]
pub struct ReadFailure {
    pub item: Item,
    pub category: &'static str,
    pub times: usize,
}

/// List reader that fails on scripted items; the failed item counts as consumed
pub struct FaultyReader {
    inner: ListItemReader,
    failures: Arc<Mutex<Vec<ReadFailure>>>,
}

impl FaultyReader {
    pub fn new(items: Vec<Item>, failures: Vec<ReadFailure>) -> Self {
        Self {
            inner: ListItemReader::new(items),
            failures: Arc::new(Mutex::new(failures)),
        }
    }
}

#[async_trait]
impl ItemReader for FaultyReader {
    async fn open(&mut self, checkpoint: Option<Value>) -> ArtifactResult<()> {
        self.inner.open(checkpoint).await
    }

    async fn read_item(&mut self) -> ArtifactResult<Option<Item>> {
        let Some(item) = self.inner.read_item().await? else {
            return Ok(None);
        };

        let mut failures = self.failures.lock();
        match failures
            .iter_mut()
            .find(|failure| failure.times > 0 && failure.item == item)
        {
            Some(failure) => {
                failure.times -= 1;
                Err(ItemError::new(failure.category, format!("cannot read {item}")))
            }
            None => Ok(Some(item)),
        }
    }

    async fn checkpoint_info(&mut self) -> ArtifactResult<Option<Value>> {
        self.inner.checkpoint_info().await
    }
}

/// Store that delegates to memory and fails the `fail_on`-th save (1-based)
#[derive(Debug, Default)]
pub struct FlakyCheckpointStore {
    inner: InMemoryCheckpointStore,
    saves: AtomicUsize,
    fail_on: usize,
}

impl FlakyCheckpointStore {
    pub fn failing_on(fail_on: usize) -> Self {
        Self {
            fail_on,
            ..Default::default()
        }
    }

    pub fn saves(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CheckpointStore for FlakyCheckpointStore {
    async fn load(&self, key: &CheckpointKey) -> CheckpointResult<Option<CheckpointMarker>> {
        self.inner.load(key).await
    }

    async fn save(&self, key: &CheckpointKey, marker: &CheckpointMarker) -> CheckpointResult<()> {
        let attempt = self.saves.fetch_add(1, Ordering::SeqCst) + 1;
        if attempt == self.fail_on {
            return Err(CheckpointError::Unavailable("disk detached".to_string()));
        }
        self.inner.save(key, marker).await
    }

    fn name(&self) -> &'static str {
        "flaky"
    }
}

/// Batchlet returning a fixed exit status, or failing while `failures` remain
pub struct CountingBatchlet {
    runs: Arc<AtomicUsize>,
    failures: Arc<AtomicUsize>,
    exit_status: Option<String>,
}

impl CountingBatchlet {
    pub fn factory(
        runs: Arc<AtomicUsize>,
        failures: Arc<AtomicUsize>,
        exit_status: Option<&str>,
    ) -> impl Fn(&ArtifactContext) -> batch_core::BatchResult<Box<dyn Batchlet>> + Send + Sync
    {
        let exit_status = exit_status.map(str::to_string);
        move |_context| {
            Ok(Box::new(CountingBatchlet {
                runs: runs.clone(),
                failures: failures.clone(),
                exit_status: exit_status.clone(),
            }) as Box<dyn Batchlet>)
        }
    }
}

#[async_trait]
impl Batchlet for CountingBatchlet {
    async fn process(&mut self, _stop: &StopSignal) -> ArtifactResult<Option<String>> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(ItemError::new("task", "batchlet failed on purpose"));
        }
        Ok(self.exit_status.clone())
    }
}

/// Batchlet that polls the stop signal until it is set
pub struct StoppableBatchlet;

#[async_trait]
impl Batchlet for StoppableBatchlet {
    async fn process(&mut self, stop: &StopSignal) -> ArtifactResult<Option<String>> {
        while !stop.is_stop_requested() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        Ok(Some("INTERRUPTED".to_string()))
    }
}

/// Listener recording `before:<step>` / `after:<step>` plus the worker thread name
#[derive(Clone, Default)]
pub struct RecordingListener {
    pub events: Arc<Mutex<Vec<String>>>,
    pub threads: Arc<Mutex<Vec<String>>>,
    pub fail_before: bool,
}

#[async_trait]
impl StepListener for RecordingListener {
    async fn before_step(&mut self, step: &StepExecution) -> ArtifactResult<()> {
        self.events.lock().push(format!("before:{}", step.step_name));
        if let Some(name) = std::thread::current().name() {
            self.threads.lock().push(name.to_string());
        }
        if self.fail_before {
            return Err(ItemError::new("listener", "refusing to start"));
        }
        Ok(())
    }

    async fn after_step(&mut self, step: &StepExecution) -> ArtifactResult<()> {
        self.events.lock().push(format!("after:{}", step.step_name));
        Ok(())
    }
}
