//! Typed genome-wide lists.
//!
//! [`ScwList`] is a chromosome-sharded collection of [`ListView`]s carrying
//! lazily cached statistics. [`BinList`] narrows it to fixed-size bins.
//! Gene and repeat-family lists hold the richer records produced by
//! extraction. Every list is immutable once built; operations always
//! produce a new list.

mod factory;
mod gene;
mod repeat;
mod statistics;

pub use factory::{GeneListFactory, RepeatFamilyListFactory, ScwListFactory};
pub use gene::{Exon, Gene, GeneList};
pub use repeat::{RepeatFamily, RepeatFamilyList};
pub use statistics::{
    squared_deviation, ChromosomeStatistics, ChromosomeSummary, Deviation, ListStatistics,
};

use std::ops::Deref;
use std::sync::{Arc, OnceLock};

use serde::{Deserialize, Serialize};

use crate::genome::{ChromosomeSet, ChromosomeShardedList, GenomeError};
use crate::view::{
    BinViewBuilder, ListView, ListViewBuilder, MaskViewBuilder, ScwViewBuilder, ViewBuilder,
    ViewError,
};
use crate::window::ScorePrecision;

/// Kind of windows stored by a list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScwListType {
    /// Arbitrary non-overlapping intervals with scores.
    Generic,
    /// Intervals without score (implicitly `1`).
    Mask,
    /// Fixed bins of `bin_size` bases.
    Bin {
        /// Bin width in bases.
        bin_size: u32,
    },
}

impl ScwListType {
    /// Empty view builder producing windows of this type for a chromosome of
    /// `chromosome_length` bases.
    pub fn view_builder(self, precision: ScorePrecision, chromosome_length: u32) -> ViewBuilder {
        match self {
            ScwListType::Generic => ViewBuilder::Windows(ScwViewBuilder::new(precision)),
            ScwListType::Mask => ViewBuilder::Mask(MaskViewBuilder::new()),
            ScwListType::Bin { bin_size } => {
                let bin_size = bin_size.max(1);
                let bin_count = (chromosome_length as usize).div_ceil(bin_size as usize);
                ViewBuilder::Bins(
                    BinViewBuilder::new(bin_size, precision).with_bin_count(bin_count),
                )
            }
        }
    }
}

/// Genome-wide list of scored chromosome windows.
#[derive(Debug, Clone)]
pub struct ScwList {
    chromosomes: Arc<ChromosomeSet>,
    shards: ChromosomeShardedList<ListView>,
    list_type: ScwListType,
    precision: ScorePrecision,
    statistics: OnceLock<ListStatistics>,
}

impl ScwList {
    /// Pipeline steps charged for building a list.
    pub const CREATION_STEP_COUNT: usize = 1;

    /// Wrap `shards`, one per chromosome of `chromosomes`.
    pub fn new(
        chromosomes: Arc<ChromosomeSet>,
        shards: ChromosomeShardedList<ListView>,
        list_type: ScwListType,
        precision: ScorePrecision,
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
            list_type,
            precision,
            statistics: OnceLock::new(),
        })
    }

    /// List of the same type, precision and genome holding `shards`.
    pub fn derive(&self, shards: ChromosomeShardedList<ListView>) -> Result<Self, GenomeError> {
        Self::new(
            Arc::clone(&self.chromosomes),
            shards,
            self.list_type,
            self.precision,
        )
    }

    /// Chromosome set the list is laid out on.
    pub fn chromosomes(&self) -> &Arc<ChromosomeSet> {
        &self.chromosomes
    }

    /// Per-chromosome views.
    pub fn shards(&self) -> &ChromosomeShardedList<ListView> {
        &self.shards
    }

    /// View of chromosome `index`, `None` when the shard is absent.
    pub fn get(&self, index: usize) -> Option<&ListView> {
        self.shards.get(index)
    }

    /// Number of chromosome slots.
    pub fn len(&self) -> usize {
        self.shards.len()
    }

    /// Whether the genome has no chromosome.
    pub fn is_empty(&self) -> bool {
        self.shards.is_empty()
    }

    /// Kind of windows stored.
    pub fn list_type(&self) -> ScwListType {
        self.list_type
    }

    /// Score storage precision.
    pub fn precision(&self) -> ScorePrecision {
        self.precision
    }

    /// Bin width for bin lists.
    pub fn bin_size(&self) -> Option<u32> {
        match self.list_type {
            ScwListType::Bin { bin_size } => Some(bin_size),
            _ => None,
        }
    }

    /// Whether the list is a mask.
    pub fn is_mask(&self) -> bool {
        self.list_type == ScwListType::Mask
    }

    /// Empty builder matching this list for chromosome `index`.
    pub fn view_builder(&self, index: usize) -> ViewBuilder {
        self.list_type
            .view_builder(self.precision, self.chromosomes.length(index))
    }

    /// Total number of windows across chromosomes.
    pub fn window_count(&self) -> usize {
        self.shards.present().map(|(_, view)| view.len()).sum()
    }

    /// Copy with freshly allocated storage and no cached statistics.
    pub fn deep_clone(&self) -> Self {
        Self {
            chromosomes: Arc::clone(&self.chromosomes),
            shards: self.shards.map(|_, view| view.deep_clone()),
            list_type: self.list_type,
            precision: self.precision,
            statistics: OnceLock::new(),
        }
    }

    /// Copy storing scores at `precision`; statistics are recomputed lazily.
    pub fn with_precision(&self, precision: ScorePrecision) -> Self {
        Self {
            chromosomes: Arc::clone(&self.chromosomes),
            shards: self.shards.map(|_, view| view.with_precision(precision)),
            list_type: self.list_type,
            precision,
            statistics: OnceLock::new(),
        }
    }

    /// Cached statistics, computed on first access.
    pub fn statistics(&self) -> &ListStatistics {
        self.statistics
            .get_or_init(|| ListStatistics::compute(&self.shards))
    }

    /// Smallest non-null score.
    pub fn minimum(&self) -> f64 {
        self.statistics().genome().minimum
    }

    /// Largest non-null score.
    pub fn maximum(&self) -> f64 {
        self.statistics().genome().maximum
    }

    /// Length-weighted average of the non-null scores.
    pub fn average(&self) -> f64 {
        self.statistics().genome().average
    }

    /// Length-weighted standard deviation of the non-null scores.
    pub fn standard_deviation(&self) -> f64 {
        self.statistics().genome().standard_deviation
    }

    /// Bases covered by non-null windows.
    pub fn non_null_length(&self) -> u64 {
        self.statistics().genome().non_null_length
    }

    /// Number of non-null windows.
    pub fn non_null_window_count(&self) -> u64 {
        self.statistics().genome().non_null_window_count
    }

    /// Sum of the non-null scores.
    pub fn score_sum(&self) -> f64 {
        self.statistics().genome().score_sum
    }

    /// Approximate heap footprint of the windows.
    pub fn memory_usage(&self) -> usize {
        self.shards.present().map(|(_, view)| view.memory_usage()).sum()
    }
}

impl PartialEq for ScwList {
    fn eq(&self, other: &Self) -> bool {
        self.list_type == other.list_type
            && self.chromosomes == other.chromosomes
            && self.shards == other.shards
    }
}

/// [`ScwList`] whose windows are fixed-size bins.
#[derive(Debug, Clone, PartialEq)]
pub struct BinList {
    list: ScwList,
    bin_size: u32,
}

impl BinList {
    /// Pipeline steps charged for building a bin list (bins + statistics).
    pub const CREATION_STEP_COUNT: usize = 2;

    /// Wrap bin views of width `bin_size`.
    pub fn new(
        chromosomes: Arc<ChromosomeSet>,
        bin_size: u32,
        precision: ScorePrecision,
        shards: ChromosomeShardedList<ListView>,
    ) -> Result<Self, GenomeError> {
        let bin_size = bin_size.max(1);
        let list = ScwList::new(chromosomes, shards, ScwListType::Bin { bin_size }, precision)?;
        Ok(Self { list, bin_size })
    }

    /// Narrow `list` when it stores bins.
    pub fn from_list(list: ScwList) -> Option<Self> {
        let bin_size = list.bin_size()?;
        Some(Self { list, bin_size })
    }

    /// Bin width in bases.
    pub fn bin_size(&self) -> u32 {
        self.bin_size
    }

    /// Bin list of the same layout holding `shards`.
    pub fn derive_bins(&self, shards: ChromosomeShardedList<ListView>) -> Result<Self, GenomeError> {
        Ok(Self {
            list: self.list.derive(shards)?,
            bin_size: self.bin_size,
        })
    }

    /// Copy with freshly allocated storage.
    pub fn deep_clone(&self) -> Self {
        Self {
            list: self.list.deep_clone(),
            bin_size: self.bin_size,
        }
    }

    /// Copy storing scores at `precision`.
    pub fn with_precision(&self, precision: ScorePrecision) -> Self {
        Self {
            list: self.list.with_precision(precision),
            bin_size: self.bin_size,
        }
    }

    /// Unwrap the underlying list.
    pub fn into_inner(self) -> ScwList {
        self.list
    }
}

impl Deref for BinList {
    type Target = ScwList;

    fn deref(&self) -> &ScwList {
        &self.list
    }
}

impl From<BinList> for ScwList {
    fn from(list: BinList) -> Self {
        list.list
    }
}

/// Genome-wide builder accumulating windows chromosome by chromosome.
#[derive(Debug)]
pub struct ScwListBuilder {
    chromosomes: Arc<ChromosomeSet>,
    list_type: ScwListType,
    precision: ScorePrecision,
    allow_overlaps: bool,
    builders: Vec<Option<ViewBuilder>>,
}

impl ScwListBuilder {
    /// Builder of a list of `list_type` on `chromosomes`.
    pub fn new(
        chromosomes: Arc<ChromosomeSet>,
        list_type: ScwListType,
        precision: ScorePrecision,
    ) -> Self {
        let builders = (0..chromosomes.len()).map(|_| None).collect();
        Self {
            chromosomes,
            list_type,
            precision,
            allow_overlaps: false,
            builders,
        }
    }

    /// Accept overlapping generic windows; the result must be cleaned before
    /// operations relying on non-overlapping views see it.
    pub fn allowing_overlaps(mut self) -> Self {
        self.allow_overlaps = true;
        self
    }

    /// Append a window to chromosome `chromosome`.
    pub fn add(
        &mut self,
        chromosome: usize,
        start: u32,
        stop: u32,
        score: f64,
    ) -> Result<(), ViewError> {
        let count = self.builders.len();
        let slot = self
            .builders
            .get_mut(chromosome)
            .ok_or(ViewError::UnknownChromosome {
                index: chromosome,
                count,
            })?;
        let builder = slot.get_or_insert_with(|| {
            match self
                .list_type
                .view_builder(self.precision, self.chromosomes.length(chromosome))
            {
                ViewBuilder::Windows(builder) if self.allow_overlaps => {
                    ViewBuilder::Windows(builder.allowing_overlaps())
                }
                builder => builder,
            }
        });
        builder.add_element(start, stop, score)
    }

    /// Freeze the list; chromosomes that received nothing are absent.
    pub fn build(self) -> Result<ScwList, GenomeError> {
        let shards = self
            .builders
            .into_iter()
            .map(|builder| builder.map(ListViewBuilder::build))
            .collect();
        ScwList::new(
            self.chromosomes,
            ChromosomeShardedList::from_shards(shards),
            self.list_type,
            self.precision,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::window::ScoredWindow;

    fn genome() -> Arc<ChromosomeSet> {
        Arc::new(ChromosomeSet::new([("chr1", 1_000), ("chr2", 500)]).unwrap())
    }

    #[test]
    fn builder_leaves_untouched_chromosomes_absent() {
        let mut builder = ScwListBuilder::new(genome(), ScwListType::Generic, ScorePrecision::Bit32);
        builder.add(0, 0, 10, 2.0).unwrap();
        builder.add(0, 20, 30, 4.0).unwrap();
        assert!(builder.add(7, 0, 1, 1.0).is_err());
        let list = builder.build().unwrap();
        assert_eq!(list.window_count(), 2);
        assert!(list.get(1).is_none());
        assert_eq!(list.average(), 3.0);
    }

    #[test]
    fn bin_builder_covers_the_whole_chromosome() {
        let mut builder = ScwListBuilder::new(
            genome(),
            ScwListType::Bin { bin_size: 100 },
            ScorePrecision::Bit32,
        );
        builder.add(1, 100, 200, 5.0).unwrap();
        let list = BinList::from_list(builder.build().unwrap()).unwrap();
        let view = list.get(1).unwrap();
        assert_eq!(view.len(), 5);
        assert_eq!(view.get(1), Some(ScoredWindow::new(100, 200, 5.0)));
        assert_eq!(list.bin_size(), 100);
    }

    #[test]
    fn shard_count_must_match_the_genome() {
        let shards = ChromosomeShardedList::new(1);
        assert!(matches!(
            ScwList::new(genome(), shards, ScwListType::Generic, ScorePrecision::Bit32),
            Err(GenomeError::ShardCountMismatch { expected: 2, actual: 1 })
        ));
    }

    #[test]
    fn precision_change_recomputes_statistics() {
        let mut builder = ScwListBuilder::new(genome(), ScwListType::Generic, ScorePrecision::Bit64);
        builder.add(0, 0, 10, 2.4).unwrap();
        let list = builder.build().unwrap();
        assert_eq!(list.maximum(), 2.4);
        let coarse = list.with_precision(ScorePrecision::Bit8);
        assert_eq!(coarse.maximum(), 2.0);
        assert_eq!(coarse.precision(), ScorePrecision::Bit8);
        assert_eq!(list.deep_clone(), list);
    }
}
