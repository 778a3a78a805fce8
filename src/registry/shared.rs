//! Delegating wrappers handed out for shared-scope artifacts.

use crate::artifacts::{
    ArtifactResult, Item, ItemProcessor, ItemReader, ItemWriter, ProcessResult,
};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::Mutex;

pub(crate) struct SharedReader(Arc<Mutex<Box<dyn ItemReader>>>);

impl SharedReader {
    pub(crate) fn new(inner: Arc<Mutex<Box<dyn ItemReader>>>) -> Self {
        Self(inner)
    }
}

#[async_trait]
impl ItemReader for SharedReader {
    async fn open(&mut self, checkpoint: Option<Value>) -> ArtifactResult<()> {
        self.0.lock().await.open(checkpoint).await
    }

    async fn read_item(&mut self) -> ArtifactResult<Option<Item>> {
        self.0.lock().await.read_item().await
    }

    async fn checkpoint_info(&mut self) -> ArtifactResult<Option<Value>> {
        self.0.lock().await.checkpoint_info().await
    }

    async fn close(&mut self) -> ArtifactResult<()> {
        self.0.lock().await.close().await
    }
}

pub(crate) struct SharedProcessor(Arc<Mutex<Box<dyn ItemProcessor>>>);

impl SharedProcessor {
    pub(crate) fn new(inner: Arc<Mutex<Box<dyn ItemProcessor>>>) -> Self {
        Self(inner)
    }
}

#[async_trait]
impl ItemProcessor for SharedProcessor {
    async fn process_item(&mut self, item: Item) -> ArtifactResult<ProcessResult> {
        self.0.lock().await.process_item(item).await
    }
}

pub(crate) struct SharedWriter(Arc<Mutex<Box<dyn ItemWriter>>>);

impl SharedWriter {
    pub(crate) fn new(inner: Arc<Mutex<Box<dyn ItemWriter>>>) -> Self {
        Self(inner)
    }
}

#[async_trait]
impl ItemWriter for SharedWriter {
    async fn open(&mut self, checkpoint: Option<Value>) -> ArtifactResult<()> {
        self.0.lock().await.open(checkpoint).await
    }

    async fn write_items(&mut self, items: &[Item]) -> ArtifactResult<()> {
        self.0.lock().await.write_items(items).await
    }

    async fn checkpoint_info(&mut self) -> ArtifactResult<Option<Value>> {
        self.0.lock().await.checkpoint_info().await
    }

    async fn close(&mut self) -> ArtifactResult<()> {
        self.0.lock().await.close().await
    }
}
