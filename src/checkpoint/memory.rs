use super::{CheckpointKey, CheckpointMarker, CheckpointResult, CheckpointStore};
use async_trait::async_trait;
use dashmap::DashMap;

/// Process-local store; markers do not survive the process
#[derive(Debug, Default)]
pub struct InMemoryCheckpointStore {
    markers: DashMap<CheckpointKey, CheckpointMarker>,
}

impl InMemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.markers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }
}

#[async_trait]
impl CheckpointStore for InMemoryCheckpointStore {
    async fn load(&self, key: &CheckpointKey) -> CheckpointResult<Option<CheckpointMarker>> {
        Ok(self.markers.get(key).map(|entry| entry.value().clone()))
    }

    async fn save(&self, key: &CheckpointKey, marker: &CheckpointMarker) -> CheckpointResult<()> {
        // Entry replacement happens under the shard lock
        self.markers.insert(key.clone(), marker.clone());
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
