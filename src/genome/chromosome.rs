use std::collections::HashMap;
use std::io::BufRead;

use thiserror::Error;

/// Errors raised while assembling or querying a chromosome set.
#[derive(Debug, Error)]
pub enum GenomeError {
    /// The same chromosome name appeared twice.
    #[error("duplicate chromosome '{0}'")]
    DuplicateChromosome(String),

    /// A chromosome was declared with a length of zero.
    #[error("chromosome '{0}' has zero length")]
    EmptyChromosome(String),

    /// A chromosome name was not part of the set.
    #[error("unknown chromosome '{0}'")]
    UnknownChromosome(String),

    /// A chrom-sizes line could not be parsed.
    #[error("malformed chromosome sizes line {line}: {reason}")]
    MalformedSizes {
        /// 1-based line number.
        line: usize,
        /// Human readable reason.
        reason: String,
    },

    /// A sharded list does not have one shard per chromosome.
    #[error("expected {expected} chromosome shards, got {actual}")]
    ShardCountMismatch {
        /// Number of chromosomes in the set.
        expected: usize,
        /// Number of shards supplied.
        actual: usize,
    },

    /// I/O failure while reading chromosome sizes.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Single chromosome of the active project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chromosome {
    name: String,
    length: u32,
}

impl Chromosome {
    /// Construct a chromosome description.
    pub fn new(name: impl Into<String>, length: u32) -> Self {
        Self {
            name: name.into(),
            length,
        }
    }

    /// Chromosome name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Length in base pairs.
    pub fn length(&self) -> u32 {
        self.length
    }
}

/// Ordered chromosome set fixed for the lifetime of every list built on it.
///
/// The position of a chromosome in the set is its index in every
/// [`ChromosomeShardedList`](crate::genome::ChromosomeShardedList).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChromosomeSet {
    chromosomes: Vec<Chromosome>,
    by_name: HashMap<String, usize>,
}

impl ChromosomeSet {
    /// Build a set from `(name, length)` pairs, preserving their order.
    pub fn new<I, S>(chromosomes: I) -> Result<Self, GenomeError>
    where
        I: IntoIterator<Item = (S, u32)>,
        S: Into<String>,
    {
        let mut list = Vec::new();
        let mut by_name = HashMap::new();
        for (name, length) in chromosomes {
            let name = name.into();
            if length == 0 {
                return Err(GenomeError::EmptyChromosome(name));
            }
            if by_name.insert(name.clone(), list.len()).is_some() {
                return Err(GenomeError::DuplicateChromosome(name));
            }
            list.push(Chromosome::new(name, length));
        }
        Ok(Self {
            chromosomes: list,
            by_name,
        })
    }

    /// Parse a chrom-sizes file (`<name>\t<length>` per line, `#` comments allowed).
    pub fn from_sizes_reader<R: BufRead>(reader: R) -> Result<Self, GenomeError> {
        let mut pairs = Vec::new();
        for (line_no, line) in reader.lines().enumerate() {
            let line = line?;
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            let mut fields = trimmed.split_whitespace();
            let name = fields.next().ok_or_else(|| GenomeError::MalformedSizes {
                line: line_no + 1,
                reason: "missing chromosome name".to_string(),
            })?;
            let length = fields
                .next()
                .ok_or_else(|| GenomeError::MalformedSizes {
                    line: line_no + 1,
                    reason: "missing chromosome length".to_string(),
                })?
                .parse::<u32>()
                .map_err(|err| GenomeError::MalformedSizes {
                    line: line_no + 1,
                    reason: err.to_string(),
                })?;
            pairs.push((name.to_string(), length));
        }
        Self::new(pairs)
    }

    /// Number of chromosomes.
    pub fn len(&self) -> usize {
        self.chromosomes.len()
    }

    /// Whether the set holds no chromosome.
    pub fn is_empty(&self) -> bool {
        self.chromosomes.is_empty()
    }

    /// Chromosome at `index`.
    pub fn get(&self, index: usize) -> Option<&Chromosome> {
        self.chromosomes.get(index)
    }

    /// Index of the chromosome called `name`.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.by_name.get(name).copied()
    }

    /// Index of `name`, failing with [`GenomeError::UnknownChromosome`].
    pub fn require(&self, name: &str) -> Result<usize, GenomeError> {
        self.index_of(name)
            .ok_or_else(|| GenomeError::UnknownChromosome(name.to_string()))
    }

    /// Length of the chromosome at `index` (zero when out of range).
    pub fn length(&self, index: usize) -> u32 {
        self.chromosomes.get(index).map_or(0, Chromosome::length)
    }

    /// Number of bins of width `bin_size` needed to cover chromosome `index`.
    pub fn bin_count(&self, index: usize, bin_size: u32) -> usize {
        if bin_size == 0 {
            return 0;
        }
        let length = self.length(index) as usize;
        (length + bin_size as usize - 1) / bin_size as usize
    }

    /// Total genome length.
    pub fn genome_length(&self) -> u64 {
        self.chromosomes.iter().map(|c| c.length as u64).sum()
    }

    /// Iterate chromosomes in index order.
    pub fn iter(&self) -> std::slice::Iter<'_, Chromosome> {
        self.chromosomes.iter()
    }
}

/// Translation of raw file positions into project coordinates.
///
/// Multi-genome projects plug their coordinate remapping in here; single
/// genome projects use [`IdentityMapper`].
pub trait PositionMapper: Send + Sync {
    /// Map `raw_position` on `chromosome` to the project coordinate.
    fn map(&self, chromosome: usize, raw_position: u32) -> u32;
}

/// Mapper that leaves positions untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityMapper;

impl PositionMapper for IdentityMapper {
    fn map(&self, _chromosome: usize, raw_position: u32) -> u32 {
        raw_position
    }
}
