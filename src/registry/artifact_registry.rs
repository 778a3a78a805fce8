//! # Artifact Registry
//!
//! Maps artifact names to factory functions. Every resolution calls the
//! factory and yields a fresh instance, unless the reference asks for a shared
//! scope; then one instance per `(scope, name)` is handed out behind a lock
//! until the scope is released.
//!
//! ```rust
//! use batch_core::registry::ArtifactRegistry;
//! use batch_core::support::{CollectingItemWriter, ItemSink, ListItemReader};
//! use serde_json::json;
//!
//! let registry = ArtifactRegistry::new();
//! registry.register_reader("numbers", ListItemReader::factory(vec![json!(1), json!(2)]));
//! registry.register_writer("sink", CollectingItemWriter::factory(ItemSink::new()));
//! assert!(registry.contains(batch_core::artifacts::ArtifactKind::Reader, "numbers"));
//! ```

use super::shared::{SharedProcessor, SharedReader, SharedWriter};
use crate::artifacts::{
    ArtifactContext, ArtifactKind, ArtifactScope, Batchlet, ItemProcessor, ItemReader, ItemWriter,
    StepListener,
};
use crate::chunk::ErrorClassifier;
use crate::constants::operations;
use crate::error::{BatchError, BatchResult};
use crate::models::ArtifactRef;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

pub type ArtifactFactory<T> = Arc<dyn Fn(&ArtifactContext) -> BatchResult<Box<T>> + Send + Sync>;

type SharedKey = (String, String);
type SharedInstances<T> = DashMap<SharedKey, Arc<Mutex<Box<T>>>>;

#[derive(Default)]
pub struct ArtifactRegistry {
    readers: DashMap<String, ArtifactFactory<dyn ItemReader>>,
    processors: DashMap<String, ArtifactFactory<dyn ItemProcessor>>,
    writers: DashMap<String, ArtifactFactory<dyn ItemWriter>>,
    batchlets: DashMap<String, ArtifactFactory<dyn Batchlet>>,
    listeners: DashMap<String, ArtifactFactory<dyn StepListener>>,
    classifiers: DashMap<String, Arc<dyn ErrorClassifier>>,
    shared_readers: SharedInstances<dyn ItemReader>,
    shared_processors: SharedInstances<dyn ItemProcessor>,
    shared_writers: SharedInstances<dyn ItemWriter>,
}

impl ArtifactRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_reader<F>(&self, name: impl Into<String>, factory: F)
    where
        F: Fn(&ArtifactContext) -> BatchResult<Box<dyn ItemReader>> + Send + Sync + 'static,
    {
        let factory: ArtifactFactory<dyn ItemReader> = Arc::new(factory);
        register(&self.readers, ArtifactKind::Reader, name.into(), factory);
    }

    pub fn register_processor<F>(&self, name: impl Into<String>, factory: F)
    where
        F: Fn(&ArtifactContext) -> BatchResult<Box<dyn ItemProcessor>> + Send + Sync + 'static,
    {
        let factory: ArtifactFactory<dyn ItemProcessor> = Arc::new(factory);
        register(&self.processors, ArtifactKind::Processor, name.into(), factory);
    }

    pub fn register_writer<F>(&self, name: impl Into<String>, factory: F)
    where
        F: Fn(&ArtifactContext) -> BatchResult<Box<dyn ItemWriter>> + Send + Sync + 'static,
    {
        let factory: ArtifactFactory<dyn ItemWriter> = Arc::new(factory);
        register(&self.writers, ArtifactKind::Writer, name.into(), factory);
    }

    pub fn register_batchlet<F>(&self, name: impl Into<String>, factory: F)
    where
        F: Fn(&ArtifactContext) -> BatchResult<Box<dyn Batchlet>> + Send + Sync + 'static,
    {
        let factory: ArtifactFactory<dyn Batchlet> = Arc::new(factory);
        register(&self.batchlets, ArtifactKind::Batchlet, name.into(), factory);
    }

    pub fn register_listener<F>(&self, name: impl Into<String>, factory: F)
    where
        F: Fn(&ArtifactContext) -> BatchResult<Box<dyn StepListener>> + Send + Sync + 'static,
    {
        let factory: ArtifactFactory<dyn StepListener> = Arc::new(factory);
        register(&self.listeners, ArtifactKind::Listener, name.into(), factory);
    }

    /// Classifiers are stateless and shared as-is
    pub fn register_classifier(&self, name: impl Into<String>, classifier: Arc<dyn ErrorClassifier>) {
        register(
            &self.classifiers,
            ArtifactKind::Classifier,
            name.into(),
            classifier,
        );
    }

    pub fn resolve_reader(
        &self,
        reference: &ArtifactRef,
        context: &ArtifactContext,
    ) -> BatchResult<Box<dyn ItemReader>> {
        let factory = lookup(&self.readers, ArtifactKind::Reader, &reference.name)?;
        match &reference.scope {
            ArtifactScope::Fresh => factory(context),
            ArtifactScope::Shared(scope) => {
                let shared = shared_instance(&self.shared_readers, scope, &reference.name, || {
                    factory(context)
                })?;
                Ok(Box::new(SharedReader::new(shared)))
            }
        }
    }

    pub fn resolve_processor(
        &self,
        reference: &ArtifactRef,
        context: &ArtifactContext,
    ) -> BatchResult<Box<dyn ItemProcessor>> {
        let factory = lookup(&self.processors, ArtifactKind::Processor, &reference.name)?;
        match &reference.scope {
            ArtifactScope::Fresh => factory(context),
            ArtifactScope::Shared(scope) => {
                let shared =
                    shared_instance(&self.shared_processors, scope, &reference.name, || {
                        factory(context)
                    })?;
                Ok(Box::new(SharedProcessor::new(shared)))
            }
        }
    }

    pub fn resolve_writer(
        &self,
        reference: &ArtifactRef,
        context: &ArtifactContext,
    ) -> BatchResult<Box<dyn ItemWriter>> {
        let factory = lookup(&self.writers, ArtifactKind::Writer, &reference.name)?;
        match &reference.scope {
            ArtifactScope::Fresh => factory(context),
            ArtifactScope::Shared(scope) => {
                let shared = shared_instance(&self.shared_writers, scope, &reference.name, || {
                    factory(context)
                })?;
                Ok(Box::new(SharedWriter::new(shared)))
            }
        }
    }

    pub fn resolve_batchlet(
        &self,
        reference: &ArtifactRef,
        context: &ArtifactContext,
    ) -> BatchResult<Box<dyn Batchlet>> {
        lookup(&self.batchlets, ArtifactKind::Batchlet, &reference.name)?(context)
    }

    pub fn resolve_listener(
        &self,
        reference: &ArtifactRef,
        context: &ArtifactContext,
    ) -> BatchResult<Box<dyn StepListener>> {
        lookup(&self.listeners, ArtifactKind::Listener, &reference.name)?(context)
    }

    pub fn resolve_classifier(&self, name: &str) -> BatchResult<Arc<dyn ErrorClassifier>> {
        lookup(&self.classifiers, ArtifactKind::Classifier, name)
    }

    pub fn contains(&self, kind: ArtifactKind, name: &str) -> bool {
        match kind {
            ArtifactKind::Reader => self.readers.contains_key(name),
            ArtifactKind::Processor => self.processors.contains_key(name),
            ArtifactKind::Writer => self.writers.contains_key(name),
            ArtifactKind::Batchlet => self.batchlets.contains_key(name),
            ArtifactKind::Listener => self.listeners.contains_key(name),
            ArtifactKind::Classifier => self.classifiers.contains_key(name),
        }
    }

    /// Drop every shared instance created for `scope`
    pub fn release_scope(&self, scope: &str) -> usize {
        let before =
            self.shared_readers.len() + self.shared_processors.len() + self.shared_writers.len();
        self.shared_readers.retain(|(s, _), _| s != scope);
        self.shared_processors.retain(|(s, _), _| s != scope);
        self.shared_writers.retain(|(s, _), _| s != scope);
        let released = before
            - (self.shared_readers.len() + self.shared_processors.len() + self.shared_writers.len());

        if released > 0 {
            debug!(scope = %scope, released = released, "Released shared artifact scope");
        }
        released
    }
}

impl std::fmt::Debug for ArtifactRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArtifactRegistry")
            .field("readers", &self.readers.len())
            .field("processors", &self.processors.len())
            .field("writers", &self.writers.len())
            .field("batchlets", &self.batchlets.len())
            .field("listeners", &self.listeners.len())
            .field("classifiers", &self.classifiers.len())
            .finish()
    }
}

fn register<V>(map: &DashMap<String, V>, kind: ArtifactKind, name: String, value: V) {
    if map.insert(name.clone(), value).is_some() {
        warn!(kind = %kind, name = %name, "Replaced previously registered artifact");
    } else {
        info!(
            operation = operations::ARTIFACT_REGISTER,
            kind = %kind,
            name = %name,
            "Artifact registered"
        );
    }
}

/// Clone the entry out so the map lock is released before the factory runs
fn lookup<V: Clone>(map: &DashMap<String, V>, kind: ArtifactKind, name: &str) -> BatchResult<V> {
    map.get(name)
        .map(|entry| entry.value().clone())
        .ok_or_else(|| BatchError::ArtifactNotFound {
            kind,
            name: name.to_string(),
        })
}

fn shared_instance<T: ?Sized>(
    map: &SharedInstances<T>,
    scope: &str,
    name: &str,
    create: impl FnOnce() -> BatchResult<Box<T>>,
) -> BatchResult<Arc<Mutex<Box<T>>>> {
    let key = (scope.to_string(), name.to_string());
    if let Some(existing) = map.get(&key) {
        return Ok(existing.value().clone());
    }

    // A racing resolver may win the insert; both then use the stored instance
    let created = Arc::new(Mutex::new(create()?));
    Ok(map.entry(key).or_insert(created).value().clone())
}
