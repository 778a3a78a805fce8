//! Begin/commit/rollback boundary around a chunk cycle.

use crate::error::BatchResult;
use async_trait::async_trait;

#[async_trait]
pub trait Transaction: Send {
    async fn commit(self: Box<Self>) -> BatchResult<()>;

    async fn rollback(self: Box<Self>) -> BatchResult<()>;
}

#[async_trait]
pub trait TransactionManager: Send + Sync {
    async fn begin(&self) -> BatchResult<Box<dyn Transaction>>;

    fn name(&self) -> &'static str;
}

/// Used when no transactional resource participates in the chunk.
///
/// Chunk commits are still serialized by the engine, one cycle at a time per step.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpTransactionManager;

struct NoOpTransaction;

#[async_trait]
impl Transaction for NoOpTransaction {
    async fn commit(self: Box<Self>) -> BatchResult<()> {
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> BatchResult<()> {
        Ok(())
    }
}

#[async_trait]
impl TransactionManager for NoOpTransactionManager {
    async fn begin(&self) -> BatchResult<Box<dyn Transaction>> {
        Ok(Box::new(NoOpTransaction))
    }

    fn name(&self) -> &'static str {
        "noop"
    }
}
