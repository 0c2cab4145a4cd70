use std::sync::Arc;

use tracing::debug;

use super::{require_same_genome, Operation};
use crate::framework::{OperationContext, OperationError};
use crate::genome::ChromosomeShardedList;
use crate::list::{ScwList, ScwListType};
use crate::view::{ListView, ListViewBuilder, ScwViewBuilder};
use crate::window::{ScoreOperation, ScoredWindow};

/// Combine the scores two lists carry at the same position.
///
/// `None` means the list has no data there. Max, min and average only look
/// at the present sides; the arithmetic operators read an absent side as
/// zero, and a division by zero gives zero. Count is the number of present
/// sides.
fn combine(operation: ScoreOperation, first: Option<f64>, second: Option<f64>) -> f64 {
    match (operation, first, second) {
        (_, None, None) => 0.0,
        (ScoreOperation::Count, a, b) => (a.is_some() as u8 + b.is_some() as u8) as f64,
        (ScoreOperation::Maximum | ScoreOperation::Minimum | ScoreOperation::Average, Some(a), None)
        | (
            ScoreOperation::Maximum | ScoreOperation::Minimum | ScoreOperation::Average,
            None,
            Some(a),
        ) => a,
        (ScoreOperation::Division, a, b) => {
            let divisor = b.unwrap_or(0.0);
            if divisor == 0.0 {
                0.0
            } else {
                a.unwrap_or(0.0) / divisor
            }
        }
        (operation, a, b) => operation.aggregate(&[a.unwrap_or(0.0), b.unwrap_or(0.0)]),
    }
}

fn present(score: f64) -> Option<f64> {
    (score != 0.0).then_some(score)
}

/// Non-null window of `windows` covering `position`, advancing `cursor`.
fn covering(windows: &[ScoredWindow], cursor: &mut usize, position: u32) -> Option<f64> {
    while *cursor < windows.len() && windows[*cursor].stop <= position {
        *cursor += 1;
    }
    windows
        .get(*cursor)
        .filter(|w| w.start <= position)
        .map(|w| w.score)
}

/// Combines two lists position by position.
///
/// Two bin lists of the same bin size are combined bin by bin and produce a
/// bin list. Any other pair is walked in lock-step over the union of both
/// lists' window boundaries and produces a generic list; touching output
/// windows with equal scores are merged.
#[derive(Debug)]
pub struct TwoLayers<'a> {
    first: &'a ScwList,
    second: &'a ScwList,
    operation: ScoreOperation,
    context: OperationContext,
}

impl<'a> TwoLayers<'a> {
    /// Combine `first` and `second` with `operation`.
    pub fn new(
        context: OperationContext,
        first: &'a ScwList,
        second: &'a ScwList,
        operation: ScoreOperation,
    ) -> Self {
        Self {
            first,
            second,
            operation,
            context,
        }
    }

    fn combine_bins(&self, chromosome: usize) -> Result<ListView, OperationError> {
        let mut builder = self.first.view_builder(chromosome);
        let first = self.first.get(chromosome);
        let second = self.second.get(chromosome);
        let bin_count = first
            .map_or(0, ListView::len)
            .max(second.map_or(0, ListView::len));
        let score_at = |view: Option<&ListView>, bin: usize| {
            view.and_then(|v| v.score(bin)).and_then(present)
        };
        for bin in (0..bin_count).take_while(|_| !self.context.is_stopped()) {
            let score = combine(self.operation, score_at(first, bin), score_at(second, bin));
            if score != 0.0 {
                let window = first.or(second).and_then(|v| v.get(bin));
                if let Some(window) = window {
                    builder.add_element(window.start, window.stop, score)?;
                }
            }
        }
        Ok(builder.build())
    }

    fn combine_windows(&self, chromosome: usize) -> Result<ListView, OperationError> {
        let collect = |list: &ScwList| -> Vec<ScoredWindow> {
            list.get(chromosome)
                .map(|view| view.iter().filter(|w| !w.is_null()).collect())
                .unwrap_or_default()
        };
        let first = collect(self.first);
        let second = collect(self.second);
        let mut breakpoints: Vec<u32> = first
            .iter()
            .chain(second.iter())
            .flat_map(|w| [w.start, w.stop])
            .collect();
        breakpoints.sort_unstable();
        breakpoints.dedup();

        let mut builder = ScwViewBuilder::new(self.first.precision()).merging_adjacent();
        let (mut i, mut j) = (0, 0);
        for segment in breakpoints
            .windows(2)
            .take_while(|_| !self.context.is_stopped())
        {
            let (start, stop) = (segment[0], segment[1]);
            let a = covering(&first, &mut i, start);
            let b = covering(&second, &mut j, start);
            builder.add_element(start, stop, combine(self.operation, a, b))?;
        }
        Ok(builder.build())
    }
}

impl Operation for TwoLayers<'_> {
    type Output = ScwList;

    fn compute(&self) -> Result<Option<ScwList>, OperationError> {
        require_same_genome(self.first, self.second)?;
        let bin_size = match (self.first.bin_size(), self.second.bin_size()) {
            (Some(a), Some(b)) if a != b => {
                return Err(OperationError::IncompatibleLists(format!(
                    "cannot combine bin lists of bin size {a} and {b}"
                )))
            }
            (Some(a), Some(_)) => Some(a),
            _ => None,
        };
        debug!(operation = %self.operation, binned = bin_size.is_some(), "combining two lists");

        let chromosomes = self.first.chromosomes();
        let Some(views) = self.context.map_indices(chromosomes.len(), |chromosome| {
            if self.first.get(chromosome).is_none() && self.second.get(chromosome).is_none() {
                return Ok(None);
            }
            let view = match bin_size {
                Some(_) => self.combine_bins(chromosome)?,
                None => self.combine_windows(chromosome)?,
            };
            Ok(Some(view))
        })?
        else {
            return Ok(None);
        };
        let list_type = match bin_size {
            Some(bin_size) => ScwListType::Bin { bin_size },
            None => ScwListType::Generic,
        };
        Ok(Some(ScwList::new(
            Arc::clone(chromosomes),
            ChromosomeShardedList::from_shards(views),
            list_type,
            self.first.precision(),
        )?))
    }

    fn description(&self) -> &'static str {
        "Two Layers Operation"
    }

    fn processing_description(&self) -> String {
        format!("Computing {} of two layers...", self.operation)
    }

    fn context(&self) -> &OperationContext {
        &self.context
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operation::test_support::{bin_scores, bins, context, list, windows};
    use test_case::test_case;

    fn layers() -> (ScwList, ScwList) {
        (
            list(&[(0, 0, 10, 1.0), (0, 20, 30, 2.0)]),
            list(&[(0, 5, 25, 3.0), (1, 0, 10, 6.0)]),
        )
    }

    #[test_case(ScoreOperation::Addition, vec![(0, 5, 1.0), (5, 10, 4.0), (10, 20, 3.0), (20, 25, 5.0), (25, 30, 2.0)]; "addition")]
    #[test_case(ScoreOperation::Subtraction, vec![(0, 5, 1.0), (5, 10, -2.0), (10, 20, -3.0), (20, 25, -1.0), (25, 30, 2.0)]; "subtraction")]
    #[test_case(ScoreOperation::Maximum, vec![(0, 5, 1.0), (5, 25, 3.0), (25, 30, 2.0)]; "maximum")]
    #[test_case(ScoreOperation::Division, vec![(5, 10, 1.0 / 3.0), (20, 25, 2.0 / 3.0)]; "division")]
    #[test_case(ScoreOperation::Count, vec![(0, 5, 1.0), (5, 10, 2.0), (10, 20, 1.0), (20, 25, 2.0), (25, 30, 1.0)]; "count")]
    fn breakpoint_union(operation: ScoreOperation, expected: Vec<(u32, u32, f64)>) {
        let (first, second) = layers();
        let combined = TwoLayers::new(context(), &first, &second, operation)
            .compute()
            .unwrap()
            .unwrap();
        assert_eq!(windows(&combined, 0), expected);
    }

    #[test]
    fn chromosome_present_in_one_layer_only() {
        let (first, second) = layers();
        let combined = TwoLayers::new(context(), &first, &second, ScoreOperation::Average)
            .compute()
            .unwrap()
            .unwrap();
        assert_eq!(windows(&combined, 1), vec![(0, 10, 6.0)]);
    }

    #[test]
    fn bins_combine_bin_by_bin() {
        let first = bins(10, &[1.0, 2.0, 0.0]);
        let second = bins(10, &[3.0, 0.0, 4.0]);
        let combined = TwoLayers::new(context(), &first, &second, ScoreOperation::Addition)
            .compute()
            .unwrap()
            .unwrap();
        assert_eq!(combined.bin_size(), Some(10));
        assert_eq!(&bin_scores(&combined, 0)[..3], &[4.0, 2.0, 4.0]);
    }

    #[test]
    fn differing_bin_sizes_are_incompatible() {
        let first = bins(10, &[1.0]);
        let second = bins(20, &[1.0]);
        let result = TwoLayers::new(context(), &first, &second, ScoreOperation::Addition).compute();
        assert!(matches!(result, Err(OperationError::IncompatibleLists(_))));
    }
}
