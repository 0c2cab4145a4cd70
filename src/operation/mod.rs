//! Operation library.
//!
//! Every operation is built from one or two input lists, a set of
//! parameters and an [`OperationContext`]. Argument errors are reported by
//! `compute()` before any task is submitted; numeric domain errors raised by
//! a task abort the whole operation. A stopped operation returns `Ok(None)`.

mod arithmetic;
mod filter;
mod islands;
mod smoothing;
mod statistics;
mod structure;
mod two_layers;

pub use arithmetic::{
    AddConstant, DivideConstant, Index, IndexByChromosome, InvertConstant, Log, LogBase,
    LogOnAverageWithDamper, MultiplyConstant, Normalize, NormalizeStandardScore,
    SubtractConstant, UniqueScore,
};
pub use filter::{FilterBandStop, FilterCount, FilterPercentage, FilterThreshold};
pub use islands::{
    FindIslands, FindPeaksStdev, IslandFinder, IslandResult, IslandScore, IslandThreshold,
    Transfrag,
};
pub use smoothing::{Gauss, Loess, MovingAverage};
pub use statistics::{
    Average, ComputeStats, CorrelationCoefficient, CountNonNullLength, CountNonNullWindows,
    CountWindows, Maximum, Minimum, Repartition, RepartitionBin, StandardDeviation, SumScore,
};
pub use structure::{
    ApplyMask, CleanList, ConvertIntoBinList, ConvertIntoMask, InvertMask, MergeWindows,
};
pub use two_layers::TwoLayers;

use crate::framework::{OperationContext, OperationError};
use crate::list::ScwList;
use crate::view::{ListView, ListViewBuilder};

/// A transformation or reduction over lists.
pub trait Operation {
    /// Produced list or scalar.
    type Output;

    /// Run the operation; `Ok(None)` when it was stopped.
    fn compute(&self) -> Result<Option<Self::Output>, OperationError>;

    /// Short name shown to users.
    fn description(&self) -> &'static str;

    /// Progress message shown while computing.
    fn processing_description(&self) -> String {
        format!("{}...", self.description())
    }

    /// Pipeline-progress weight: creation of the produced structures plus one.
    fn step_count(&self) -> usize {
        ScwList::CREATION_STEP_COUNT + 1
    }

    /// Pool and stop token the operation runs with.
    fn context(&self) -> &OperationContext;

    /// Ask a running `compute()` to stop at its next loop check.
    fn stop(&self) {
        self.context().stop();
    }
}

/// Rebuild every present chromosome of `list` with `f`, keeping its layout.
pub(crate) fn map_views<F>(
    context: &OperationContext,
    list: &ScwList,
    f: F,
) -> Result<Option<ScwList>, OperationError>
where
    F: Fn(usize, &ListView) -> Result<ListView, OperationError> + Sync,
{
    let Some(shards) = context.map_shards(list.shards(), f)? else {
        return Ok(None);
    };
    Ok(Some(list.derive(shards)?))
}

/// Apply `f` to the score of every non-null window of `list`.
///
/// Null windows stay null whatever `f` does; a window whose new score is
/// zero becomes null.
pub(crate) fn transform_scores<F>(
    context: &OperationContext,
    list: &ScwList,
    f: F,
) -> Result<Option<ScwList>, OperationError>
where
    F: Fn(f64) -> Result<f64, OperationError> + Sync,
{
    map_views(context, list, |chromosome, view| {
        let mut builder = list.view_builder(chromosome);
        for window in view.iter().take_while(|_| !context.is_stopped()) {
            if window.is_null() {
                continue;
            }
            builder.add_element(window.start, window.stop, f(window.score)?)?;
        }
        Ok(builder.build())
    })
}

/// Fail with [`OperationError::IncompatibleLists`] unless both lists share a genome.
pub(crate) fn require_same_genome(first: &ScwList, second: &ScwList) -> Result<(), OperationError> {
    if first.chromosomes() == second.chromosomes() {
        Ok(())
    } else {
        Err(OperationError::IncompatibleLists(
            "lists are laid out on different chromosome sets".to_string(),
        ))
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use crate::framework::{OperationContext, OperationPool};
    use crate::genome::ChromosomeSet;
    use crate::list::{BinList, ScwList, ScwListBuilder, ScwListType};
    use crate::window::{ScorePrecision, ScoredWindow};

    pub(crate) fn context() -> OperationContext {
        OperationContext::new(&Arc::new(OperationPool::new(Some(2)).unwrap()))
    }

    pub(crate) fn genome() -> Arc<ChromosomeSet> {
        Arc::new(ChromosomeSet::new([("chr1", 100), ("chr2", 100)]).unwrap())
    }

    pub(crate) fn list(windows: &[(usize, u32, u32, f64)]) -> ScwList {
        let mut builder = ScwListBuilder::new(genome(), ScwListType::Generic, ScorePrecision::Bit64);
        for &(chromosome, start, stop, score) in windows {
            builder.add(chromosome, start, stop, score).unwrap();
        }
        builder.build().unwrap()
    }

    pub(crate) fn overlapping_list(windows: &[(u32, u32, f64)]) -> ScwList {
        let mut builder = ScwListBuilder::new(genome(), ScwListType::Generic, ScorePrecision::Bit64)
            .allowing_overlaps();
        for &(start, stop, score) in windows {
            builder.add(0, start, stop, score).unwrap();
        }
        builder.build().unwrap()
    }

    pub(crate) fn bins(bin_size: u32, scores: &[f64]) -> BinList {
        let mut builder = ScwListBuilder::new(
            genome(),
            ScwListType::Bin { bin_size },
            ScorePrecision::Bit64,
        );
        for (index, &score) in scores.iter().enumerate() {
            let start = index as u32 * bin_size;
            builder.add(0, start, start + bin_size, score).unwrap();
        }
        BinList::from_list(builder.build().unwrap()).unwrap()
    }

    pub(crate) fn windows(list: &ScwList, chromosome: usize) -> Vec<(u32, u32, f64)> {
        list.get(chromosome)
            .map(|view| view.iter().map(|w: ScoredWindow| (w.start, w.stop, w.score)).collect())
            .unwrap_or_default()
    }

    pub(crate) fn bin_scores(list: &ScwList, chromosome: usize) -> Vec<f64> {
        list.get(chromosome)
            .map(|view| view.iter().map(|w| w.score).collect())
            .unwrap_or_default()
    }
}
