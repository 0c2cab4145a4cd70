//! Boundary with track files: capability traits implemented by line
//! parsers, the raw per-chromosome columns they fill, a thin BED/bedGraph
//! reader, a bedGraph writer and gzip bin-list snapshots.

mod bed;
mod raw;
pub mod snapshot;
mod writer;

pub use bed::{BedFormat, BedReader};
pub use raw::{
    ExtractionLog, ExtractionOptions, RawChromosomeData, RawGenomicData, RawRecord,
    ValidationMode,
};
pub use writer::{render_bedgraph, write_bedgraph};

use thiserror::Error;

use crate::list::Exon;
use crate::window::Strand;

/// Errors raised while extracting records from a track file.
///
/// Everything but [`ExtractionError::Io`] concerns a single line: the line is
/// logged and skipped while extraction continues.
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// The line does not follow the file format.
    #[error("line {line}: {reason}")]
    Format {
        /// 1-based line number.
        line: usize,
        /// Human readable reason.
        reason: String,
    },

    /// The chromosome is not part of the genome.
    #[error("line {line}: unknown chromosome '{name}'")]
    UnknownChromosome {
        /// 1-based line number.
        line: usize,
        /// Chromosome name found on the line.
        name: String,
    },

    /// The interval extends past the end of its chromosome.
    #[error("line {line}: position {position} outside chromosome of length {length}")]
    OutOfBounds {
        /// 1-based line number.
        line: usize,
        /// Offending position.
        position: u32,
        /// Chromosome length.
        length: u32,
    },

    /// The interval is empty or reversed.
    #[error("line {line}: invalid interval [{start}, {stop})")]
    InvalidInterval {
        /// 1-based line number.
        line: usize,
        /// Interval start.
        start: u32,
        /// Interval stop.
        stop: u32,
    },

    /// The underlying reader failed; extraction stops.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ExtractionError {
    /// Whether the error aborts the whole extraction.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ExtractionError::Io(_))
    }
}

/// Coordinates of the current record.
pub trait IntervalReader {
    /// Chromosome name as written in the file.
    fn chromosome_name(&self) -> &str;
    /// 0-based start.
    fn start(&self) -> u32;
    /// Exclusive stop.
    fn stop(&self) -> u32;
}

/// Score column of the current record.
pub trait ScoreReader {
    /// Score, `None` when the line has none.
    fn score(&self) -> Option<f64>;
}

/// Strand column of the current record.
pub trait StrandReader {
    /// Strand, `None` when unknown.
    fn strand(&self) -> Option<Strand>;
}

/// Name column of the current record.
pub trait NameReader {
    /// Feature name.
    fn name(&self) -> Option<&str>;
}

/// Exon structure of the current record.
pub trait ExonReader {
    /// Exons in genomic order.
    fn exons(&self) -> Option<&[Exon]>;
}

/// Line-oriented parser positioned on a current record.
///
/// Optional capabilities are discovered through the `as_*` accessors, so a
/// consumer asks "does this parser expose exons?" instead of relying on a
/// concrete parser type.
pub trait Extractor: IntervalReader {
    /// Advance to the next data line.
    ///
    /// Returns `Ok(false)` at end of input. A non-fatal error rejects the
    /// current line only; calling again moves on to the following one.
    fn advance(&mut self) -> Result<bool, ExtractionError>;

    /// 1-based number of the current line.
    fn line_number(&self) -> usize;

    /// Score capability.
    fn as_score_reader(&self) -> Option<&dyn ScoreReader> {
        None
    }

    /// Strand capability.
    fn as_strand_reader(&self) -> Option<&dyn StrandReader> {
        None
    }

    /// Name capability.
    fn as_name_reader(&self) -> Option<&dyn NameReader> {
        None
    }

    /// Exon capability.
    fn as_exon_reader(&self) -> Option<&dyn ExonReader> {
        None
    }
}
