//! # trackengine
//!
//! Parallel engine for genome-wide scored window lists.
//!
//! A track is a chromosome-sharded list of `(start, stop, score)` windows:
//! arbitrary non-overlapping intervals, masks, or fixed-size bins. Every
//! transformation runs one task per chromosome on a shared worker pool and
//! reassembles the results in chromosome order, so outputs and genome-wide
//! statistics are deterministic whatever the scheduling.
//!
//! ## Components
//!
//! 1. **Views** ([`view`]): immutable per-chromosome window sequences and their builders
//! 2. **Lists** ([`list`]): genome-wide typed lists with cached statistics
//! 3. **Flattening** ([`flatten`]): overlapping windows to coverage or fixed bins
//! 4. **Framework** ([`framework`]): operation pool, stop tokens, progress
//! 5. **Operations** ([`operation`]): arithmetic, statistics, filters,
//!    structure, smoothing and island calling
//!
//! Zero is the "no data" score everywhere: null windows are never stored by
//! interval builders and never take part in statistics.
//!
//! ## Usage Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use trackengine::{ChromosomeSet, EngineConfig, OperationContext, ScwListBuilder, ScwListType, ScorePrecision};
//! use trackengine::operation::{FilterThreshold, Operation};
//!
//! # fn main() -> anyhow::Result<()> {
//! let pool = EngineConfig::default().with_threads(4).build_pool()?;
//! let genome = Arc::new(ChromosomeSet::new([("chr1", 1_000)])?);
//! let mut builder = ScwListBuilder::new(genome, ScwListType::Generic, ScorePrecision::Bit32);
//! builder.add(0, 0, 100, 15.0)?;
//! let list = builder.build()?;
//! let filtered = FilterThreshold::new(OperationContext::new(&pool), &list, 1.0, 9.0, true).compute()?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs, missing_debug_implementations)]
#![allow(clippy::new_without_default)]

pub mod config; // Engine settings
pub mod flatten; // Pileup flattening
pub mod framework; // Operation pool and cancellation
pub mod genome; // Chromosome sets and sharded containers
pub mod io; // Extraction, bedGraph output, snapshots
pub mod list; // Typed genome-wide lists
pub mod operation; // Operation library
pub mod view; // Per-chromosome views and builders
pub mod window; // Scored windows, precision, score operators

// Re-exports for convenience
pub use config::{ConfigError, EngineConfig};
pub use flatten::{ChromosomeFlattener, FlattenError, FlattenMode, PileupFlattener};
pub use framework::{OperationContext, OperationError, OperationPool, StopToken};
pub use genome::{
    ChromosomeSelection, ChromosomeSet, ChromosomeShardedList, GenomeError, IdentityMapper,
    PositionMapper,
};
pub use list::{BinList, ListStatistics, ScwList, ScwListBuilder, ScwListType};
pub use operation::Operation;
pub use view::{ListView, ListViewBuilder, ViewError};
pub use window::{ScoreOperation, ScorePrecision, ScoredWindow, Strand};
