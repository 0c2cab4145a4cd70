//! Pileup flattening: turning ordered, possibly overlapping windows into a
//! non-overlapping aggregated stream, either at coverage breakpoints or
//! re-bucketed into fixed bins.

mod accumulator;
mod flattener;

pub use flattener::{ChromosomeFlattener, FlattenMode, PileupFlattener};

use thiserror::Error;

use crate::view::ViewError;
use crate::window::ScoreOperation;

/// Errors raised by the flatteners.
#[derive(Debug, Error)]
pub enum FlattenError {
    /// The score operation cannot aggregate an arbitrary pileup.
    #[error("score operation '{0}' cannot aggregate a pileup")]
    UnsupportedOperation(ScoreOperation),

    /// Bin mode was requested with a zero bin size.
    #[error("bin size must be > 0")]
    ZeroBinSize,

    /// Windows were delivered out of order, or the output builder refused one.
    #[error(transparent)]
    View(#[from] ViewError),
}
