//! JSON file per checkpoint key, replaced atomically with write-then-rename.

use super::{CheckpointError, CheckpointKey, CheckpointMarker, CheckpointResult, CheckpointStore};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

#[derive(Debug, Serialize, Deserialize)]
struct StoredCheckpoint {
    key: CheckpointKey,
    marker: CheckpointMarker,
    saved_at: DateTime<Utc>,
}

/// Stores `<directory>/<job>/<step>/<lineage>.json`
#[derive(Debug)]
pub struct FileCheckpointStore {
    directory: PathBuf,
    locks: DashMap<CheckpointKey, Arc<Mutex<()>>>,
}

impl FileCheckpointStore {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            locks: DashMap::new(),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn path_for(&self, key: &CheckpointKey) -> PathBuf {
        self.directory
            .join(sanitize(&key.job_name))
            .join(sanitize(&key.step_name))
            .join(format!("{}.json", key.lineage_id))
    }

    fn lock_for(&self, key: &CheckpointKey) -> Arc<Mutex<()>> {
        self.locks
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .value()
            .clone()
    }
}

/// Keep job and step names from escaping the store directory
fn sanitize(component: &str) -> String {
    let cleaned: String = component
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();

    match cleaned.as_str() {
        "" | "." | ".." => format!("_{cleaned}"),
        _ => cleaned,
    }
}

#[async_trait]
impl CheckpointStore for FileCheckpointStore {
    async fn load(&self, key: &CheckpointKey) -> CheckpointResult<Option<CheckpointMarker>> {
        let path = self.path_for(key);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(CheckpointError::io(key, e)),
        };

        let stored: StoredCheckpoint = serde_json::from_slice(&bytes)?;
        Ok(Some(stored.marker))
    }

    async fn save(&self, key: &CheckpointKey, marker: &CheckpointMarker) -> CheckpointResult<()> {
        let lock = self.lock_for(key);
        let result = {
            let _guard = lock.lock().await;
            self.write_marker(key, marker).await
        };
        drop(lock);

        // Only the map still holds the lock once no other save is waiting on it
        self.locks
            .remove_if(key, |_, lock| Arc::strong_count(lock) == 1);
        result
    }

    fn name(&self) -> &'static str {
        "file"
    }
}

impl FileCheckpointStore {
    async fn write_marker(&self, key: &CheckpointKey, marker: &CheckpointMarker) -> CheckpointResult<()> {
        let path = self.path_for(key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| CheckpointError::io(key, e))?;
        }

        let stored = StoredCheckpoint {
            key: key.clone(),
            marker: marker.clone(),
            saved_at: Utc::now(),
        };
        let bytes = serde_json::to_vec_pretty(&stored)?;

        let temp_path = path.with_extension("json.tmp");
        tokio::fs::write(&temp_path, &bytes)
            .await
            .map_err(|e| CheckpointError::io(key, e))?;
        tokio::fs::rename(&temp_path, &path)
            .await
            .map_err(|e| CheckpointError::io(key, e))?;

        debug!(key = %key, path = %path.display(), "Checkpoint saved");
        Ok(())
    }
}
