//! # Chunk Step Engine
//!
//! Drives one step's reader, optional processor and writer through repeated
//! chunk cycles:
//!
//! ```text
//! NOT_STARTED → reading → (processing) → writing → checkpointing
//!                  ▲                                    │
//!                  └──────────── next cycle ────────────┤
//!                                          COMPLETED ◀──┴──▶ FAILED
//! ```
//!
//! Every cycle runs inside a transaction boundary. A chunk is either written,
//! checkpointed and committed as a whole, or rolled back as a whole; the
//! marker saved after chunk N covers exactly the items of chunks 1..=N.

mod engine;
mod policy;

pub use engine::{
    ChunkArtifacts, ChunkSettings, ChunkStepEngine, ChunkStepReport, ProgressSink, StepOutcome,
};
pub use policy::{CategoryClassifier, ErrorAction, ErrorClassifier, ErrorPolicy, ResolvedPolicy};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Where a chunk step currently is within its cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkPhase {
    NotStarted,
    Opening,
    Reading,
    Processing,
    Writing,
    Checkpointing,
    Closing,
    Completed,
    Failed,
}

impl fmt::Display for ChunkPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::NotStarted => "not started",
            Self::Opening => "opening",
            Self::Reading => "reading",
            Self::Processing => "processing",
            Self::Writing => "writing",
            Self::Checkpointing => "checkpointing",
            Self::Closing => "closing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}
