use std::collections::VecDeque;
use std::sync::Arc;

use super::accumulator::BinAccumulator;
use super::FlattenError;
use crate::genome::{ChromosomeSet, ChromosomeShardedList};
use crate::view::{BinViewBuilder, ListView, ListViewBuilder, ScwViewBuilder, ViewError};
use crate::window::{ScoreOperation, ScorePrecision, ScoredWindow};

/// Granularity of the flattened output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlattenMode {
    /// One output window per stretch of constant coverage.
    Variable,
    /// Fixed bins of `bin_size` bases.
    Bins {
        /// Bin width in bases.
        bin_size: u32,
    },
}

#[derive(Debug)]
enum FlattenState {
    Variable {
        active: Vec<ScoredWindow>,
        flushed_to: u32,
        output: ScwViewBuilder,
    },
    Bins {
        bin_size: u32,
        open: VecDeque<BinAccumulator>,
        first_bin: usize,
        output: BinViewBuilder,
    },
}

/// Stateful reducer flattening the windows of one chromosome.
///
/// Windows must arrive in non-decreasing start order; an out-of-order window
/// is rejected with [`ViewError::Unsorted`]. Output regions are emitted as
/// soon as no later window can change them.
#[derive(Debug)]
pub struct ChromosomeFlattener {
    operation: ScoreOperation,
    last_start: Option<u32>,
    state: FlattenState,
}

impl ChromosomeFlattener {
    /// Flattener for a chromosome of `chromosome_length` bases.
    pub fn new(
        mode: FlattenMode,
        operation: ScoreOperation,
        precision: ScorePrecision,
        chromosome_length: u32,
    ) -> Result<Self, FlattenError> {
        if !operation.aggregates() {
            return Err(FlattenError::UnsupportedOperation(operation));
        }
        let state = match mode {
            FlattenMode::Variable => FlattenState::Variable {
                active: Vec::new(),
                flushed_to: 0,
                output: ScwViewBuilder::new(precision).merging_adjacent(),
            },
            FlattenMode::Bins { bin_size } => {
                if bin_size == 0 {
                    return Err(FlattenError::ZeroBinSize);
                }
                let bin_count = (chromosome_length as usize + bin_size as usize - 1) / bin_size as usize;
                FlattenState::Bins {
                    bin_size,
                    open: VecDeque::new(),
                    first_bin: 0,
                    output: BinViewBuilder::new(bin_size, precision).with_bin_count(bin_count),
                }
            }
        };
        Ok(Self {
            operation,
            last_start: None,
            state,
        })
    }

    /// Feed the next window.
    pub fn add_window(&mut self, window: &ScoredWindow) -> Result<(), FlattenError> {
        if window.is_empty() || window.is_null() {
            return Ok(());
        }
        if let Some(previous) = self.last_start {
            if window.start < previous {
                return Err(ViewError::Unsorted {
                    previous,
                    start: window.start,
                }
                .into());
            }
        }
        self.last_start = Some(window.start);

        let operation = self.operation;
        match &mut self.state {
            FlattenState::Variable {
                active,
                flushed_to,
                output,
            } => {
                flush_variable(active, flushed_to, output, operation, window.start)?;
                active.push(*window);
            }
            FlattenState::Bins {
                bin_size,
                open,
                first_bin,
                output,
            } => {
                let bin_size = *bin_size;
                let first = (window.start / bin_size) as usize;
                let last = ((window.stop - 1) / bin_size) as usize;
                flush_bins(open, first_bin, output, operation, bin_size, first)?;
                while *first_bin + open.len() <= last {
                    open.push_back(BinAccumulator::default());
                }
                for bin in first..=last {
                    let bin_start = bin as u32 * bin_size;
                    let overlap = window.overlap(bin_start, bin_start.saturating_add(bin_size));
                    open[bin - *first_bin].observe(window.score, overlap);
                }
            }
        }
        Ok(())
    }

    /// Flush every open region and return the flattened view.
    pub fn finish(self) -> Result<ListView, FlattenError> {
        let operation = self.operation;
        match self.state {
            FlattenState::Variable {
                mut active,
                mut flushed_to,
                mut output,
            } => {
                let limit = active.iter().map(|w| w.stop).max().unwrap_or(flushed_to);
                flush_variable(&mut active, &mut flushed_to, &mut output, operation, limit)?;
                Ok(output.build())
            }
            FlattenState::Bins {
                bin_size,
                mut open,
                mut first_bin,
                mut output,
            } => {
                let end = first_bin + open.len();
                flush_bins(&mut open, &mut first_bin, &mut output, operation, bin_size, end)?;
                Ok(output.build())
            }
        }
    }
}

fn flush_variable(
    active: &mut Vec<ScoredWindow>,
    flushed_to: &mut u32,
    output: &mut ScwViewBuilder,
    operation: ScoreOperation,
    limit: u32,
) -> Result<(), ViewError> {
    if active.is_empty() {
        *flushed_to = limit;
        return Ok(());
    }
    if limit <= *flushed_to {
        return Ok(());
    }

    let mut points = Vec::with_capacity(active.len() * 2 + 2);
    points.push(*flushed_to);
    points.push(limit);
    for window in active.iter() {
        for point in [window.start, window.stop] {
            if point > *flushed_to && point < limit {
                points.push(point);
            }
        }
    }
    points.sort_unstable();
    points.dedup();

    let mut scores = Vec::with_capacity(active.len());
    for pair in points.windows(2) {
        let (start, stop) = (pair[0], pair[1]);
        scores.clear();
        scores.extend(
            active
                .iter()
                .filter(|w| w.start <= start && w.stop >= stop)
                .map(|w| w.score),
        );
        if !scores.is_empty() {
            output.add_element(start, stop, operation.aggregate(&scores))?;
        }
    }

    active.retain(|w| w.stop > limit);
    *flushed_to = limit;
    Ok(())
}

fn flush_bins(
    open: &mut VecDeque<BinAccumulator>,
    first_bin: &mut usize,
    output: &mut BinViewBuilder,
    operation: ScoreOperation,
    bin_size: u32,
    until: usize,
) -> Result<(), ViewError> {
    while *first_bin < until {
        match open.pop_front() {
            Some(acc) => {
                if !acc.is_empty() {
                    output.set_bin(*first_bin, acc.value(operation, bin_size))?;
                }
                *first_bin += 1;
            }
            None => {
                *first_bin = until;
            }
        }
    }
    Ok(())
}

/// Genome-wide flattener dispatching windows to per-chromosome reducers.
///
/// This is the sequential entry point, for callers streaming a whole genome
/// from one source on one thread. The factories and `ConvertIntoBinList` run
/// one [`ChromosomeFlattener`] per pool task instead and produce the same
/// views.
#[derive(Debug)]
pub struct PileupFlattener {
    chromosomes: Arc<ChromosomeSet>,
    mode: FlattenMode,
    operation: ScoreOperation,
    precision: ScorePrecision,
    flatteners: Vec<Option<ChromosomeFlattener>>,
}

impl PileupFlattener {
    /// Flattener over `chromosomes`.
    pub fn new(
        chromosomes: Arc<ChromosomeSet>,
        mode: FlattenMode,
        operation: ScoreOperation,
        precision: ScorePrecision,
    ) -> Result<Self, FlattenError> {
        // validate once so that later lazy construction cannot fail on parameters
        ChromosomeFlattener::new(mode, operation, precision, 1)?;
        let flatteners = (0..chromosomes.len()).map(|_| None).collect();
        Ok(Self {
            chromosomes,
            mode,
            operation,
            precision,
            flatteners,
        })
    }

    /// Feed `window` of chromosome `chromosome`.
    pub fn add_window(
        &mut self,
        chromosome: usize,
        window: &ScoredWindow,
    ) -> Result<(), FlattenError> {
        let count = self.flatteners.len();
        let slot = self
            .flatteners
            .get_mut(chromosome)
            .ok_or(ViewError::UnknownChromosome {
                index: chromosome,
                count,
            })?;
        if slot.is_none() {
            *slot = Some(ChromosomeFlattener::new(
                self.mode,
                self.operation,
                self.precision,
                self.chromosomes.length(chromosome),
            )?);
        }
        match slot {
            Some(flattener) => flattener.add_window(window),
            None => Ok(()),
        }
    }

    /// Flush every chromosome; chromosomes that never received a window stay absent.
    pub fn into_genomic_list(self) -> Result<ChromosomeShardedList<ListView>, FlattenError> {
        let shards = self
            .flatteners
            .into_iter()
            .map(|slot| slot.map(ChromosomeFlattener::finish).transpose())
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ChromosomeShardedList::from_shards(shards))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flatten(mode: FlattenMode, op: ScoreOperation, windows: &[(u32, u32, f64)]) -> Vec<ScoredWindow> {
        let mut flattener = ChromosomeFlattener::new(mode, op, ScorePrecision::Bit64, 100).unwrap();
        for &(start, stop, score) in windows {
            flattener
                .add_window(&ScoredWindow::new(start, stop, score))
                .unwrap();
        }
        flattener.finish().unwrap().to_vec()
    }

    #[test]
    fn variable_mode_sums_overlaps() {
        let out = flatten(
            FlattenMode::Variable,
            ScoreOperation::Addition,
            &[(0, 10, 1.0), (5, 15, 2.0), (20, 30, 4.0)],
        );
        assert_eq!(
            out,
            vec![
                ScoredWindow::new(0, 5, 1.0),
                ScoredWindow::new(5, 10, 3.0),
                ScoredWindow::new(10, 15, 2.0),
                ScoredWindow::new(20, 30, 4.0),
            ]
        );
    }

    #[test]
    fn variable_mode_coalesces_equal_neighbours() {
        let out = flatten(
            FlattenMode::Variable,
            ScoreOperation::Maximum,
            &[(0, 10, 3.0), (5, 15, 3.0)],
        );
        assert_eq!(out, vec![ScoredWindow::new(0, 15, 3.0)]);
    }

    #[test]
    fn bin_mode_weights_average_by_overlap() {
        let out = flatten(
            FlattenMode::Bins { bin_size: 10 },
            ScoreOperation::Average,
            &[(0, 5, 4.0), (5, 15, 2.0)],
        );
        let scores: Vec<f64> = out.iter().map(|w| w.score).collect();
        assert_eq!(scores.len(), 10);
        assert_eq!(scores[0], 3.0);
        assert_eq!(scores[1], 2.0);
        assert!(scores[2..].iter().all(|&s| s == 0.0));
    }

    #[test]
    fn bin_mode_counts_windows() {
        let out = flatten(
            FlattenMode::Bins { bin_size: 10 },
            ScoreOperation::Count,
            &[(0, 5, 1.0), (2, 8, 1.0), (8, 25, 1.0)],
        );
        let scores: Vec<f64> = out.iter().take(3).map(|w| w.score).collect();
        assert_eq!(scores, vec![3.0, 1.0, 1.0]);
    }

    #[test]
    fn unsorted_input_fails_fast() {
        let mut flattener = ChromosomeFlattener::new(
            FlattenMode::Variable,
            ScoreOperation::Addition,
            ScorePrecision::Bit64,
            100,
        )
        .unwrap();
        flattener.add_window(&ScoredWindow::new(10, 20, 1.0)).unwrap();
        let err = flattener.add_window(&ScoredWindow::new(5, 20, 1.0)).unwrap_err();
        assert!(matches!(err, FlattenError::View(ViewError::Unsorted { .. })));
    }

    #[test]
    fn unsupported_operation_is_rejected() {
        assert!(matches!(
            ChromosomeFlattener::new(
                FlattenMode::Variable,
                ScoreOperation::Division,
                ScorePrecision::Bit64,
                100
            ),
            Err(FlattenError::UnsupportedOperation(ScoreOperation::Division))
        ));
    }

    #[test]
    fn genome_flattener_leaves_untouched_chromosomes_absent() {
        let chromosomes = Arc::new(ChromosomeSet::new([("chr1", 100), ("chr2", 100)]).unwrap());
        let mut flattener = PileupFlattener::new(
            chromosomes,
            FlattenMode::Variable,
            ScoreOperation::Addition,
            ScorePrecision::Bit32,
        )
        .unwrap();
        flattener.add_window(1, &ScoredWindow::new(0, 10, 1.0)).unwrap();
        assert!(flattener.add_window(5, &ScoredWindow::new(0, 10, 1.0)).is_err());
        let list = flattener.into_genomic_list().unwrap();
        assert!(list.get(0).is_none());
        assert_eq!(list.get(1).map(ListView::len), Some(1));
    }
}
