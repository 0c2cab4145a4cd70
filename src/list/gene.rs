use std::sync::Arc;

use crate::genome::{ChromosomeSet, ChromosomeShardedList, GenomeError};
use crate::window::Strand;

/// Exon of a gene.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Exon {
    /// 0-based first position.
    pub start: u32,
    /// Exclusive end position.
    pub stop: u32,
    /// Optional exon score.
    pub score: Option<f64>,
}

/// Gene with its exon structure.
#[derive(Debug, Clone, PartialEq)]
pub struct Gene {
    /// Gene name.
    pub name: String,
    /// Strand the gene is transcribed from.
    pub strand: Strand,
    /// 0-based first position.
    pub start: u32,
    /// Exclusive end position.
    pub stop: u32,
    /// Optional gene score.
    pub score: Option<f64>,
    /// Exons sorted by start.
    pub exons: Vec<Exon>,
}

impl Gene {
    /// Whether the gene intersects `[start, stop)`.
    pub fn overlaps(&self, start: u32, stop: u32) -> bool {
        self.start < stop && start < self.stop
    }
}

/// Genes of every chromosome, sorted by start.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneList {
    chromosomes: Arc<ChromosomeSet>,
    shards: ChromosomeShardedList<Arc<[Gene]>>,
}

impl GeneList {
    /// Wrap per-chromosome gene arrays.
    pub fn new(
        chromosomes: Arc<ChromosomeSet>,
        shards: ChromosomeShardedList<Arc<[Gene]>>,
    ) -> Result<Self, GenomeError> {
        if shards.len() != chromosomes.len() {
            return Err(GenomeError::ShardCountMismatch {
                expected: chromosomes.len(),
                actual: shards.len(),
            });
        }
        Ok(Self {
            chromosomes,
            shards,
        })
    }

    /// Chromosome set the list is laid out on.
    pub fn chromosomes(&self) -> &Arc<ChromosomeSet> {
        &self.chromosomes
    }

    /// Genes of chromosome `index`.
    pub fn get(&self, index: usize) -> Option<&[Gene]> {
        self.shards.get(index).map(|genes| genes.as_ref())
    }

    /// Number of genes across chromosomes.
    pub fn gene_count(&self) -> usize {
        self.shards.present().map(|(_, genes)| genes.len()).sum()
    }

    /// First gene called `name`, with its chromosome index.
    pub fn find(&self, name: &str) -> Option<(usize, &Gene)> {
        self.shards
            .present()
            .find_map(|(index, genes)| genes.iter().find(|g| g.name == name).map(|g| (index, g)))
    }

    /// Genes of chromosome `index` intersecting `[start, stop)`.
    pub fn overlapping(&self, index: usize, start: u32, stop: u32) -> impl Iterator<Item = &Gene> {
        self.get(index)
            .unwrap_or_default()
            .iter()
            .take_while(move |gene| gene.start < stop)
            .filter(move |gene| gene.overlaps(start, stop))
    }
}
