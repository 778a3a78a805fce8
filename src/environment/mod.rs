//! # Execution Environment
//!
//! Process-scoped services the engine runs on: the worker pool, named-artifact
//! resolution, the transaction boundary around chunk cycles, process-wide
//! configuration and ambient thread-context propagation.
//!
//! The worker pool and configuration are initialized at most once, lazily and
//! under a lock, on first use. Everything else is side-effect free.
//!
//! ```rust,no_run
//! use batch_core::environment::{BatchEnvironment, DefaultBatchEnvironment};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let environment = DefaultBatchEnvironment::shared();
//! let config = environment.configuration()?;
//! println!("commit interval {}", config.config().engine.default_commit_interval);
//! # Ok(())
//! # }
//! ```

mod pool;
mod thread_context;
mod transaction;

pub use pool::WorkerPool;
pub use thread_context::{NoOpThreadContextSetup, TearDownHandle, ThreadContextSetup};
pub use transaction::{NoOpTransactionManager, Transaction, TransactionManager};

use crate::config::ConfigManager;
use crate::error::BatchResult;
use crate::registry::ArtifactRegistry;
use futures::future::BoxFuture;
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::{Arc, OnceLock};
use thread_context::ThreadContextGuard;
use tokio::task::JoinHandle;
use tracing::debug;

pub trait BatchEnvironment: Send + Sync {
    /// Named artifact factories
    fn artifacts(&self) -> &ArtifactRegistry;

    /// Schedule a job or partition task on the shared worker pool
    fn submit(&self, task: BoxFuture<'static, ()>) -> BatchResult<JoinHandle<()>>;

    fn transaction_manager(&self) -> Arc<dyn TransactionManager>;

    /// Process-wide configuration, loaded on first access
    fn configuration(&self) -> BatchResult<Arc<ConfigManager>>;

    fn thread_context_setup(&self) -> Arc<dyn ThreadContextSetup>;
}

static SHARED_ENVIRONMENT: OnceLock<Arc<DefaultBatchEnvironment>> = OnceLock::new();

pub struct DefaultBatchEnvironment {
    artifacts: ArtifactRegistry,
    pool: WorkerPool,
    transactions: Arc<dyn TransactionManager>,
    thread_context: Arc<dyn ThreadContextSetup>,
    config_path: Option<PathBuf>,
    config: OnceLock<Arc<ConfigManager>>,
    config_lock: Mutex<()>,
}

impl Default for DefaultBatchEnvironment {
    fn default() -> Self {
        Self::new()
    }
}

impl DefaultBatchEnvironment {
    pub fn new() -> Self {
        Self {
            artifacts: ArtifactRegistry::new(),
            pool: WorkerPool::new(),
            transactions: Arc::new(NoOpTransactionManager),
            thread_context: Arc::new(NoOpThreadContextSetup),
            config_path: None,
            config: OnceLock::new(),
            config_lock: Mutex::new(()),
        }
    }

    /// Process-wide environment, created on first call
    pub fn shared() -> Arc<DefaultBatchEnvironment> {
        SHARED_ENVIRONMENT
            .get_or_init(|| Arc::new(DefaultBatchEnvironment::new()))
            .clone()
    }

    /// Read configuration from `path` instead of `batch-config.toml`
    #[must_use]
    pub fn with_config_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_path = Some(path.into());
        self
    }

    /// Use an already loaded configuration
    #[must_use]
    pub fn with_config(self, config: Arc<ConfigManager>) -> Self {
        let _ = self.config.set(config);
        self
    }

    #[must_use]
    pub fn with_transaction_manager(mut self, transactions: Arc<dyn TransactionManager>) -> Self {
        self.transactions = transactions;
        self
    }

    #[must_use]
    pub fn with_thread_context_setup(mut self, setup: Arc<dyn ThreadContextSetup>) -> Self {
        self.thread_context = setup;
        self
    }

    pub fn worker_pool(&self) -> &WorkerPool {
        &self.pool
    }
}

impl BatchEnvironment for DefaultBatchEnvironment {
    fn artifacts(&self) -> &ArtifactRegistry {
        &self.artifacts
    }

    fn submit(&self, task: BoxFuture<'static, ()>) -> BatchResult<JoinHandle<()>> {
        let config = self.configuration()?;
        let handle = self.pool.handle(&config.config().worker_pool)?;
        let setup = self.thread_context.clone();

        Ok(handle.spawn(async move {
            let _context = ThreadContextGuard::enter(setup.as_ref());
            task.await;
        }))
    }

    fn transaction_manager(&self) -> Arc<dyn TransactionManager> {
        self.transactions.clone()
    }

    fn configuration(&self) -> BatchResult<Arc<ConfigManager>> {
        if let Some(config) = self.config.get() {
            return Ok(config.clone());
        }

        let _guard = self.config_lock.lock();
        if let Some(config) = self.config.get() {
            return Ok(config.clone());
        }

        debug!(path = ?self.config_path, "Loading batch configuration");
        let loaded = ConfigManager::load_from(self.config_path.as_deref())?;
        let _ = self.config.set(loaded.clone());
        Ok(loaded)
    }

    fn thread_context_setup(&self) -> Arc<dyn ThreadContextSetup> {
        self.thread_context.clone()
    }
}
