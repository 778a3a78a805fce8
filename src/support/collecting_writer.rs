use crate::artifacts::{ArtifactContext, ArtifactResult, Item, ItemError, ItemWriter};
use crate::error::BatchResult;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::sync::Arc;

/// Shared, inspectable destination of a [`CollectingItemWriter`]
#[derive(Debug, Clone, Default)]
pub struct ItemSink(Arc<Mutex<Vec<Item>>>);

impl ItemSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn items(&self) -> Vec<Item> {
        self.0.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.0.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.lock().is_empty()
    }

    pub fn clear(&self) {
        self.0.lock().clear();
    }
}

/// Appends every written chunk to an [`ItemSink`].
///
/// The checkpoint is the number of items in the sink. Opening at a checkpoint
/// truncates the sink back to it, dropping anything written after the last
/// commit, so one sink must back one writer lineage.
#[derive(Debug, Clone)]
pub struct CollectingItemWriter {
    sink: ItemSink,
}

impl CollectingItemWriter {
    pub fn new(sink: ItemSink) -> Self {
        Self { sink }
    }

    /// Factory for `ArtifactRegistry::register_writer`; every instance shares `sink`
    pub fn factory(
        sink: ItemSink,
    ) -> impl Fn(&ArtifactContext) -> BatchResult<Box<dyn ItemWriter>> + Send + Sync + 'static {
        move |_context| Ok(Box::new(Self::new(sink.clone())) as Box<dyn ItemWriter>)
    }
}

#[async_trait]
impl ItemWriter for CollectingItemWriter {
    async fn open(&mut self, checkpoint: Option<Value>) -> ArtifactResult<()> {
        let Some(value) = checkpoint else {
            return Ok(());
        };
        let committed = value
            .as_u64()
            .ok_or_else(|| ItemError::new("configuration", format!("unreadable checkpoint {value}")))?
            as usize;

        let mut items = self.sink.0.lock();
        if committed > items.len() {
            return Err(ItemError::new(
                "configuration",
                format!(
                    "checkpoint expects {committed} written items but the sink holds {}",
                    items.len()
                ),
            ));
        }
        items.truncate(committed);
        Ok(())
    }

    async fn write_items(&mut self, items: &[Item]) -> ArtifactResult<()> {
        self.sink.0.lock().extend_from_slice(items);
        Ok(())
    }

    async fn checkpoint_info(&mut self) -> ArtifactResult<Option<Value>> {
        Ok(Some(json!(self.sink.len())))
    }
}
