//! # Registry Infrastructure
//!
//! Name-based lookup for the pieces a job is assembled from.
//!
//! ## Available Registries
//!
//! - **ArtifactRegistry**: reader, processor, writer, batchlet, listener and
//!   classifier factories, with optional shared scopes
//! - **JobRegistry**: validated job definitions
//!
//! ```text
//! Registry Infrastructure
//! ├── ArtifactRegistry   (named factories, fresh or scoped instances)
//! └── JobRegistry        (job graphs by name)
//! ```

pub mod artifact_registry;
pub mod job_registry;
mod shared;

// Re-export main types for easy access
pub use artifact_registry::{ArtifactFactory, ArtifactRegistry};
pub use job_registry::JobRegistry;
