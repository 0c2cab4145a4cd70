//! Parallel execution framework shared by every operation.
//!
//! One task per chromosome runs on a bounded worker pool; results come back
//! in submission (chromosome) order whatever the completion order, so the
//! caller can reassemble a sharded list by index and fold genome-wide
//! statistics deterministically.

mod cancel;
mod context;
mod pool;
mod progress;

pub use cancel::StopToken;
pub use context::OperationContext;
pub use pool::OperationPool;
pub use progress::{Progress, ProgressCounter, TaskGuard};

use thiserror::Error;

use crate::flatten::FlattenError;
use crate::genome::GenomeError;
use crate::view::ViewError;

/// Errors surfaced by operations and the pool running them.
#[derive(Debug, Error)]
pub enum OperationError {
    /// Invalid parameter detected before any parallel work started.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Numeric domain error raised while transforming scores.
    #[error("arithmetic error: {0}")]
    Arithmetic(String),

    /// Two input lists cannot be combined.
    #[error("incompatible lists: {0}")]
    IncompatibleLists(String),

    /// Worker pool could not be created or lost a result.
    #[error("operation pool failure: {0}")]
    Pool(String),

    /// A view builder rejected a window.
    #[error(transparent)]
    View(#[from] ViewError),

    /// Pileup flattening failed.
    #[error(transparent)]
    Flatten(#[from] FlattenError),

    /// Chromosome set mismatch or lookup failure.
    #[error(transparent)]
    Genome(#[from] GenomeError),
}

impl OperationError {
    /// Helper for constructing argument errors.
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        OperationError::InvalidArgument(msg.into())
    }

    /// Helper for constructing arithmetic errors.
    pub fn arithmetic(msg: impl Into<String>) -> Self {
        OperationError::Arithmetic(msg.into())
    }
}
