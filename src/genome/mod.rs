//! Genome layout shared by every list: the chromosome set of the active
//! project, per-chromosome sharded containers and chromosome selections.

mod chromosome;
mod selection;
mod sharded;

pub use chromosome::{Chromosome, ChromosomeSet, GenomeError, IdentityMapper, PositionMapper};
pub use selection::ChromosomeSelection;
pub use sharded::ChromosomeShardedList;
