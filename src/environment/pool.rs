//! Lazily created worker pool shared by every job execution in the process.

use crate::config::WorkerPoolConfig;
use crate::error::{BatchError, BatchResult};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use tokio::runtime::{Builder, Handle, Runtime};
use tracing::info;

/// Multi-threaded tokio runtime built on first use and never resized.
///
/// Tasks are not bounded by the pool; every submitted job or partition gets
/// its own task.
#[derive(Debug, Default)]
pub struct WorkerPool {
    handle: OnceLock<Handle>,
    runtime: Mutex<Option<Runtime>>,
}

impl WorkerPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle to the pool, building it under the lock on first call
    pub fn handle(&self, config: &WorkerPoolConfig) -> BatchResult<Handle> {
        if let Some(handle) = self.handle.get() {
            return Ok(handle.clone());
        }

        let mut runtime = self.runtime.lock();
        if let Some(handle) = self.handle.get() {
            return Ok(handle.clone());
        }

        let prefix = config.thread_name_prefix.clone();
        let counter = Arc::new(AtomicUsize::new(0));
        let mut builder = Builder::new_multi_thread();
        builder.enable_all().thread_name_fn(move || {
            let id = counter.fetch_add(1, Ordering::SeqCst);
            format!("{prefix}-{id}")
        });
        if let Some(threads) = config.worker_threads {
            builder.worker_threads(threads);
        }

        let built = builder
            .build()
            .map_err(|e| BatchError::WorkerPool(format!("failed to build worker pool: {e}")))?;
        let handle = built.handle().clone();
        *runtime = Some(built);
        // Only set while the lock is held, so a second builder never runs
        let _ = self.handle.set(handle.clone());

        info!(
            thread_name_prefix = %config.thread_name_prefix,
            worker_threads = ?config.worker_threads,
            "Worker pool initialized"
        );
        Ok(handle)
    }

    pub fn is_initialized(&self) -> bool {
        self.handle.get().is_some()
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        if let Some(runtime) = self.runtime.get_mut().take() {
            runtime.shutdown_background();
        }
    }
}
