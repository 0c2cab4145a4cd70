use std::sync::Arc;

use tracing::debug;

use super::{map_views, require_same_genome, Operation};
use crate::flatten::{ChromosomeFlattener, FlattenMode};
use crate::framework::{OperationContext, OperationError};
use crate::genome::ChromosomeShardedList;
use crate::list::{BinList, ScwList, ScwListType};
use crate::view::{ListView, ListViewBuilder, MaskViewBuilder, ScwViewBuilder};
use crate::window::{ScoreOperation, ScorePrecision, ScoredWindow};

/// How the score of a cluster of overlapping windows is derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ClusterScore {
    Sum,
    First,
}

/// Coalesce every run of overlapping or touching windows of `view` into one
/// window spanning the run.
fn coalesce(
    context: &OperationContext,
    view: &ListView,
    precision: ScorePrecision,
    rule: ClusterScore,
) -> Result<ListView, OperationError> {
    let mut builder = ScwViewBuilder::new(precision);
    let mut cluster: Option<ScoredWindow> = None;
    for window in view.iter().take_while(|_| !context.is_stopped()) {
        if window.is_empty() {
            continue;
        }
        match cluster.as_mut() {
            Some(current) if current.stop >= window.start => {
                current.stop = current.stop.max(window.stop);
                if rule == ClusterScore::Sum {
                    current.score += window.score;
                }
            }
            _ => {
                if let Some(done) = cluster.replace(window) {
                    builder.add_window(&done)?;
                }
            }
        }
    }
    if let Some(done) = cluster {
        builder.add_window(&done)?;
    }
    Ok(builder.build())
}

fn coalesce_list(
    context: &OperationContext,
    list: &ScwList,
    rule: ClusterScore,
) -> Result<Option<ScwList>, OperationError> {
    if list.bin_size().is_some() {
        // bins never overlap
        return map_views(context, list, |_, view| Ok(view.clone()));
    }
    let list_type = if list.is_mask() {
        ScwListType::Mask
    } else {
        ScwListType::Generic
    };
    let precision = list.precision();
    let Some(shards) = context.map_shards(list.shards(), |_, view| {
        let coalesced = coalesce(context, view, precision, rule)?;
        if list_type == ScwListType::Mask {
            let mut mask = MaskViewBuilder::new();
            for window in coalesced.iter() {
                mask.add_window(&window)?;
            }
            return Ok(mask.build());
        }
        Ok(coalesced)
    })?
    else {
        return Ok(None);
    };
    Ok(Some(ScwList::new(
        Arc::clone(list.chromosomes()),
        shards,
        list_type,
        precision,
    )?))
}

/// Merges overlapping windows; the merged window scores the **sum** of its
/// parts.
///
/// Input windows may overlap (lists built with overlaps allowed); the output
/// never does.
#[derive(Debug)]
pub struct CleanList<'a> {
    list: &'a ScwList,
    context: OperationContext,
}

impl<'a> CleanList<'a> {
    /// Clean `list`.
    pub fn new(context: OperationContext, list: &'a ScwList) -> Self {
        Self { list, context }
    }
}

impl Operation for CleanList<'_> {
    type Output = ScwList;

    fn compute(&self) -> Result<Option<ScwList>, OperationError> {
        coalesce_list(&self.context, self.list, ClusterScore::Sum)
    }

    fn description(&self) -> &'static str {
        "Clean List"
    }

    fn context(&self) -> &OperationContext {
        &self.context
    }
}

/// Merges overlapping or touching windows keeping the score of the first
/// window of each run.
#[derive(Debug)]
pub struct MergeWindows<'a> {
    list: &'a ScwList,
    context: OperationContext,
}

impl<'a> MergeWindows<'a> {
    /// Merge the windows of `list`.
    pub fn new(context: OperationContext, list: &'a ScwList) -> Self {
        Self { list, context }
    }
}

impl Operation for MergeWindows<'_> {
    type Output = ScwList;

    fn compute(&self) -> Result<Option<ScwList>, OperationError> {
        coalesce_list(&self.context, self.list, ClusterScore::First)
    }

    fn description(&self) -> &'static str {
        "Merge Windows"
    }

    fn context(&self) -> &OperationContext {
        &self.context
    }
}

/// Complement of a mask: every gap between non-null windows, including the
/// gaps before the first and after the last window, becomes a mask window.
///
/// Chromosomes without data are fully covered by the result.
#[derive(Debug)]
pub struct InvertMask<'a> {
    list: &'a ScwList,
    context: OperationContext,
}

impl<'a> InvertMask<'a> {
    /// Invert `list`.
    pub fn new(context: OperationContext, list: &'a ScwList) -> Self {
        Self { list, context }
    }
}

impl Operation for InvertMask<'_> {
    type Output = ScwList;

    fn compute(&self) -> Result<Option<ScwList>, OperationError> {
        let chromosomes = self.list.chromosomes();
        let Some(views) = self.context.map_indices(chromosomes.len(), |chromosome| {
            let length = chromosomes.length(chromosome);
            let mut builder = MaskViewBuilder::new();
            let mut cursor = 0;
            if let Some(view) = self.list.get(chromosome) {
                for window in view.iter().take_while(|_| !self.context.is_stopped()) {
                    if window.is_null() {
                        continue;
                    }
                    builder.add_element(cursor, window.start.min(length), 1.0)?;
                    cursor = cursor.max(window.stop);
                }
            }
            builder.add_element(cursor, length, 1.0)?;
            Ok(Some(builder.build()))
        })?
        else {
            return Ok(None);
        };
        Ok(Some(ScwList::new(
            Arc::clone(chromosomes),
            ChromosomeShardedList::from_shards(views),
            ScwListType::Mask,
            self.list.precision(),
        )?))
    }

    fn description(&self) -> &'static str {
        "Invert Mask"
    }

    fn context(&self) -> &OperationContext {
        &self.context
    }
}

/// Keeps the parts of a list covered by a mask.
///
/// Interval windows are clipped to the mask windows; a bin is kept whole
/// when any part of it is masked. Every non-null window of `mask` counts as
/// masked.
#[derive(Debug)]
pub struct ApplyMask<'a> {
    list: &'a ScwList,
    mask: &'a ScwList,
    context: OperationContext,
}

impl<'a> ApplyMask<'a> {
    /// Mask `list` with `mask`.
    pub fn new(context: OperationContext, list: &'a ScwList, mask: &'a ScwList) -> Self {
        Self {
            list,
            mask,
            context,
        }
    }
}

impl Operation for ApplyMask<'_> {
    type Output = ScwList;

    fn compute(&self) -> Result<Option<ScwList>, OperationError> {
        require_same_genome(self.list, self.mask)?;
        let keep_whole = self.list.bin_size().is_some();
        map_views(&self.context, self.list, |chromosome, view| {
            let mut builder = self.list.view_builder(chromosome);
            let Some(mask) = self.mask.get(chromosome) else {
                return Ok(builder.build());
            };
            let masked: Vec<ScoredWindow> = mask.iter().filter(|w| !w.is_null()).collect();
            let mut first = 0;
            for window in view.iter().take_while(|_| !self.context.is_stopped()) {
                if window.is_null() {
                    continue;
                }
                while first < masked.len() && masked[first].stop <= window.start {
                    first += 1;
                }
                let covering = masked[first..]
                    .iter()
                    .take_while(|m| m.start < window.stop);
                if keep_whole {
                    if covering.count() > 0 {
                        builder.add_window(&window)?;
                    }
                    continue;
                }
                for m in covering {
                    builder.add_element(
                        window.start.max(m.start),
                        window.stop.min(m.stop),
                        window.score,
                    )?;
                }
            }
            Ok(builder.build())
        })
    }

    fn description(&self) -> &'static str {
        "Apply Mask"
    }

    fn context(&self) -> &OperationContext {
        &self.context
    }
}

/// Mask covering every non-null window of a list.
#[derive(Debug)]
pub struct ConvertIntoMask<'a> {
    list: &'a ScwList,
    context: OperationContext,
}

impl<'a> ConvertIntoMask<'a> {
    /// Mask of `list`.
    pub fn new(context: OperationContext, list: &'a ScwList) -> Self {
        Self { list, context }
    }
}

impl Operation for ConvertIntoMask<'_> {
    type Output = ScwList;

    fn compute(&self) -> Result<Option<ScwList>, OperationError> {
        let Some(shards) = self.context.map_shards(self.list.shards(), |_, view| {
            let mut builder = MaskViewBuilder::new();
            for window in view.iter().take_while(|_| !self.context.is_stopped()) {
                if !window.is_null() {
                    builder.add_window(&window)?;
                }
            }
            Ok(builder.build())
        })?
        else {
            return Ok(None);
        };
        Ok(Some(ScwList::new(
            Arc::clone(self.list.chromosomes()),
            shards,
            ScwListType::Mask,
            self.list.precision(),
        )?))
    }

    fn description(&self) -> &'static str {
        "Convert Into Mask"
    }

    fn context(&self) -> &OperationContext {
        &self.context
    }
}

/// Re-buckets any list into fixed bins.
///
/// Each bin aggregates the windows overlapping it with `operation`
/// (length-weighted for averages and sums).
#[derive(Debug)]
pub struct ConvertIntoBinList<'a> {
    list: &'a ScwList,
    bin_size: u32,
    operation: ScoreOperation,
    precision: ScorePrecision,
    context: OperationContext,
}

impl<'a> ConvertIntoBinList<'a> {
    /// Convert `list` into bins of `bin_size` bases.
    pub fn new(
        context: OperationContext,
        list: &'a ScwList,
        bin_size: u32,
        operation: ScoreOperation,
        precision: ScorePrecision,
    ) -> Self {
        Self {
            list,
            bin_size,
            operation,
            precision,
            context,
        }
    }
}

impl Operation for ConvertIntoBinList<'_> {
    type Output = BinList;

    fn compute(&self) -> Result<Option<BinList>, OperationError> {
        if self.bin_size == 0 {
            return Err(OperationError::invalid_argument("bin size must be > 0"));
        }
        if !self.operation.aggregates() {
            return Err(OperationError::invalid_argument(format!(
                "'{}' cannot aggregate windows into bins",
                self.operation
            )));
        }
        let chromosomes = self.list.chromosomes();
        debug!(bin_size = self.bin_size, operation = %self.operation, "converting into bins");
        let Some(shards) = self.context.map_shards(self.list.shards(), |chromosome, view| {
            let mut flattener = ChromosomeFlattener::new(
                FlattenMode::Bins {
                    bin_size: self.bin_size,
                },
                self.operation,
                self.precision,
                chromosomes.length(chromosome),
            )?;
            for window in view.iter().take_while(|_| !self.context.is_stopped()) {
                flattener.add_window(&window)?;
            }
            Ok(flattener.finish()?)
        })?
        else {
            return Ok(None);
        };
        Ok(Some(BinList::new(
            Arc::clone(chromosomes),
            self.bin_size,
            self.precision,
            shards,
        )?))
    }

    fn description(&self) -> &'static str {
        "Convert Into Bin List"
    }

    fn step_count(&self) -> usize {
        BinList::CREATION_STEP_COUNT + 1
    }

    fn context(&self) -> &OperationContext {
        &self.context
    }
}
