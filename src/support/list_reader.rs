use crate::artifacts::{ArtifactContext, ArtifactResult, Item, ItemError, ItemReader};
use crate::error::{BatchError, BatchResult};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::debug;

/// Reads items from an in-memory list.
///
/// Properties:
/// - `start`: 0-based position of the first item to read, default 0
/// - `end`: 0-based position of the last item to read (inclusive), default the last item
///
/// The checkpoint is the position of the next item to read.
#[derive(Debug, Clone)]
pub struct ListItemReader {
    items: Arc<Vec<Item>>,
    start: usize,
    /// One past the last readable position
    end: usize,
    position: usize,
}

impl ListItemReader {
    pub fn new(items: Vec<Item>) -> Self {
        let end = items.len();
        Self {
            items: Arc::new(items),
            start: 0,
            end,
            position: 0,
        }
    }

    /// Factory for `ArtifactRegistry::register_reader`; every instance reads the same list
    pub fn factory(
        items: Vec<Item>,
    ) -> impl Fn(&ArtifactContext) -> BatchResult<Box<dyn ItemReader>> + Send + Sync + 'static {
        let items = Arc::new(items);
        move |context| {
            let reader = Self::configured(items.clone(), context)?;
            Ok(Box::new(reader) as Box<dyn ItemReader>)
        }
    }

    fn configured(items: Arc<Vec<Item>>, context: &ArtifactContext) -> BatchResult<Self> {
        let len = items.len();
        let start = context.parse_property::<usize>("start")?.unwrap_or(0);
        let end = match context.parse_property::<usize>("end")? {
            Some(end) if end >= len => {
                return Err(BatchError::invalid_property(
                    "end",
                    end.to_string(),
                    format!("only {len} items are available"),
                ))
            }
            Some(end) => end + 1,
            None => len,
        };

        if start > end {
            return Err(BatchError::invalid_property(
                "start",
                start.to_string(),
                format!("start must not be after end ({})", end.saturating_sub(1)),
            ));
        }

        Ok(Self {
            items,
            start,
            end,
            position: start,
        })
    }
}

#[async_trait]
impl ItemReader for ListItemReader {
    async fn open(&mut self, checkpoint: Option<Value>) -> ArtifactResult<()> {
        let position = match checkpoint {
            None => self.start,
            Some(value) => value
                .as_u64()
                .map(|p| p as usize)
                .ok_or_else(|| ItemError::new("configuration", format!("unreadable checkpoint {value}")))?,
        };

        if position < self.start || position > self.end {
            return Err(ItemError::new(
                "configuration",
                format!(
                    "Invalid position {position} to start reading, the configured range is between {} and {}",
                    self.start,
                    self.end.saturating_sub(1)
                ),
            ));
        }

        debug!(position = position, end = self.end, "List reader opened");
        self.position = position;
        Ok(())
    }

    async fn read_item(&mut self) -> ArtifactResult<Option<Item>> {
        if self.position >= self.end {
            return Ok(None);
        }
        let item = self.items.get(self.position).cloned();
        self.position += 1;
        Ok(item)
    }

    async fn checkpoint_info(&mut self) -> ArtifactResult<Option<Value>> {
        Ok(Some(json!(self.position)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn numbers(count: u64) -> Vec<Item> {
        (0..count).map(|n| json!(n)).collect()
    }

    fn context(properties: &[(&str, &str)]) -> ArtifactContext {
        ArtifactContext::new("job", "step").with_properties(
            properties
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<HashMap<_, _>>(),
        )
    }

    #[tokio::test]
    async fn test_reads_configured_range() {
        let factory = ListItemReader::factory(numbers(10));
        let mut reader = factory(&context(&[("start", "2"), ("end", "4")])).unwrap();

        reader.open(None).await.unwrap();
        let mut read = Vec::new();
        while let Some(item) = reader.read_item().await.unwrap() {
            read.push(item);
        }
        assert_eq!(read, vec![json!(2), json!(3), json!(4)]);
        assert_eq!(reader.checkpoint_info().await.unwrap(), Some(json!(5)));
    }

    #[tokio::test]
    async fn test_resumes_from_checkpoint() {
        let mut reader = ListItemReader::new(numbers(5));
        reader.open(Some(json!(3))).await.unwrap();
        assert_eq!(reader.read_item().await.unwrap(), Some(json!(3)));
    }

    #[tokio::test]
    async fn test_checkpoint_outside_range_is_rejected() {
        let factory = ListItemReader::factory(numbers(10));
        let mut reader = factory(&context(&[("start", "2"), ("end", "4")])).unwrap();

        let error = reader.open(Some(json!(7))).await.unwrap_err();
        assert_eq!(error.category, "configuration");
        assert_eq!(
            error.message,
            "Invalid position 7 to start reading, the configured range is between 2 and 4"
        );
    }

    #[test]
    fn test_invalid_properties() {
        let factory = ListItemReader::factory(numbers(3));
        let rejected = |properties: &[(&str, &str)]| factory(&context(properties)).err().unwrap();
        assert!(rejected(&[("start", "x")]).is_configuration());
        assert!(rejected(&[("end", "3")]).is_configuration());
        assert!(rejected(&[("start", "2"), ("end", "0")]).is_configuration());
    }

    #[tokio::test]
    async fn test_empty_list_reads_nothing() {
        let factory = ListItemReader::factory(Vec::new());
        let mut reader = factory(&context(&[])).unwrap();
        reader.open(None).await.unwrap();
        assert_eq!(reader.read_item().await.unwrap(), None);
    }
}
