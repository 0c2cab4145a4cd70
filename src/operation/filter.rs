use tracing::debug;

use super::{map_views, Operation};
use crate::framework::{OperationContext, OperationError};
use crate::list::ScwList;
use crate::view::ListViewBuilder;

/// Keep scores within `[low, high]`; out-of-range scores are clamped when
/// `saturation` is set and dropped otherwise. Null windows are never kept.
fn apply_threshold(
    context: &OperationContext,
    list: &ScwList,
    low: f64,
    high: f64,
    saturation: bool,
) -> Result<Option<ScwList>, OperationError> {
    map_views(context, list, |chromosome, view| {
        let mut builder = list.view_builder(chromosome);
        for window in view.iter().take_while(|_| !context.is_stopped()) {
            if window.is_null() {
                continue;
            }
            let score = if window.score > high {
                if !saturation {
                    continue;
                }
                high
            } else if window.score < low {
                if !saturation {
                    continue;
                }
                low
            } else {
                window.score
            };
            builder.add_element(window.start, window.stop, score)?;
        }
        Ok(builder.build())
    })
}

/// Every non-null score of `list`, sorted ascending.
fn sorted_scores(
    context: &OperationContext,
    list: &ScwList,
) -> Result<Option<Vec<f64>>, OperationError> {
    let Some(per_chromosome) = context.map_shards(list.shards(), |_, view| {
        Ok(view
            .iter()
            .take_while(|_| !context.is_stopped())
            .filter(|w| !w.is_null())
            .map(|w| w.score)
            .collect::<Vec<_>>())
    })?
    else {
        return Ok(None);
    };
    let mut scores: Vec<f64> = per_chromosome
        .into_shards()
        .into_iter()
        .flatten()
        .flatten()
        .collect();
    scores.sort_by(f64::total_cmp);
    Ok(Some(scores))
}

/// Remove the `low_count` smallest and `high_count` largest scores (by
/// threshold on their values).
fn filter_extremes(
    context: &OperationContext,
    list: &ScwList,
    low_count: usize,
    high_count: usize,
    saturation: bool,
) -> Result<Option<ScwList>, OperationError> {
    let Some(scores) = sorted_scores(context, list)? else {
        return Ok(None);
    };
    if low_count + high_count > scores.len() {
        return Err(OperationError::invalid_argument(format!(
            "cannot filter {} values out of {}",
            low_count + high_count,
            scores.len()
        )));
    }
    if !scores.is_empty() && low_count + high_count == scores.len() {
        debug!(count = scores.len(), "every value filtered out");
        return map_views(context, list, |chromosome, _| {
            Ok(list.view_builder(chromosome).build())
        });
    }
    let low = if low_count == 0 {
        f64::NEG_INFINITY
    } else {
        scores[low_count]
    };
    let high = if high_count == 0 {
        f64::INFINITY
    } else {
        scores[scores.len() - 1 - high_count]
    };
    debug!(low, high, "filtering extreme values");
    apply_threshold(context, list, low, high, saturation)
}

/// Threshold filter.
///
/// Scores above `high` (below `low`) are clamped to the bound when
/// `saturation` is set, dropped otherwise. Null windows are always dropped.
/// Either bound may be infinite.
#[derive(Debug)]
pub struct FilterThreshold<'a> {
    list: &'a ScwList,
    low: f64,
    high: f64,
    saturation: bool,
    context: OperationContext,
}

impl<'a> FilterThreshold<'a> {
    /// Filter `list` to `[low, high]`.
    pub fn new(
        context: OperationContext,
        list: &'a ScwList,
        low: f64,
        high: f64,
        saturation: bool,
    ) -> Self {
        Self {
            list,
            low,
            high,
            saturation,
            context,
        }
    }
}

impl Operation for FilterThreshold<'_> {
    type Output = ScwList;

    fn compute(&self) -> Result<Option<ScwList>, OperationError> {
        if self.low >= self.high {
            return Err(OperationError::invalid_argument(format!(
                "low threshold {} must be below high threshold {}",
                self.low, self.high
            )));
        }
        apply_threshold(&self.context, self.list, self.low, self.high, self.saturation)
    }

    fn description(&self) -> &'static str {
        "Threshold Filter"
    }

    fn context(&self) -> &OperationContext {
        &self.context
    }
}

/// Band-stop filter: drops the windows whose score lies in `[low, high]`.
#[derive(Debug)]
pub struct FilterBandStop<'a> {
    list: &'a ScwList,
    low: f64,
    high: f64,
    context: OperationContext,
}

impl<'a> FilterBandStop<'a> {
    /// Remove scores within `[low, high]` from `list`.
    pub fn new(context: OperationContext, list: &'a ScwList, low: f64, high: f64) -> Self {
        Self {
            list,
            low,
            high,
            context,
        }
    }
}

impl Operation for FilterBandStop<'_> {
    type Output = ScwList;

    fn compute(&self) -> Result<Option<ScwList>, OperationError> {
        if self.low >= self.high {
            return Err(OperationError::invalid_argument(format!(
                "low bound {} must be below high bound {}",
                self.low, self.high
            )));
        }
        let (low, high) = (self.low, self.high);
        map_views(&self.context, self.list, |chromosome, view| {
            let mut builder = self.list.view_builder(chromosome);
            for window in view.iter().take_while(|_| !self.context.is_stopped()) {
                if window.is_null() || (window.score >= low && window.score <= high) {
                    continue;
                }
                builder.add_window(&window)?;
            }
            Ok(builder.build())
        })
    }

    fn description(&self) -> &'static str {
        "Band Stop Filter"
    }

    fn context(&self) -> &OperationContext {
        &self.context
    }
}

/// Removes a number of the lowest and highest values of the list.
#[derive(Debug)]
pub struct FilterCount<'a> {
    list: &'a ScwList,
    low_count: usize,
    high_count: usize,
    saturation: bool,
    context: OperationContext,
}

impl<'a> FilterCount<'a> {
    /// Filter the `low_count` smallest and `high_count` largest values.
    pub fn new(
        context: OperationContext,
        list: &'a ScwList,
        low_count: usize,
        high_count: usize,
        saturation: bool,
    ) -> Self {
        Self {
            list,
            low_count,
            high_count,
            saturation,
            context,
        }
    }
}

impl Operation for FilterCount<'_> {
    type Output = ScwList;

    fn compute(&self) -> Result<Option<ScwList>, OperationError> {
        filter_extremes(
            &self.context,
            self.list,
            self.low_count,
            self.high_count,
            self.saturation,
        )
    }

    fn description(&self) -> &'static str {
        "Count Filter"
    }

    fn step_count(&self) -> usize {
        ScwList::CREATION_STEP_COUNT + 2
    }

    fn context(&self) -> &OperationContext {
        &self.context
    }
}

/// Removes a fraction of the lowest and highest values of the list.
///
/// Both fractions lie in `[0, 1]` and sum to at most `1`.
#[derive(Debug)]
pub struct FilterPercentage<'a> {
    list: &'a ScwList,
    low_percentage: f64,
    high_percentage: f64,
    saturation: bool,
    context: OperationContext,
}

impl<'a> FilterPercentage<'a> {
    /// Filter the lowest `low_percentage` and highest `high_percentage` values.
    pub fn new(
        context: OperationContext,
        list: &'a ScwList,
        low_percentage: f64,
        high_percentage: f64,
        saturation: bool,
    ) -> Self {
        Self {
            list,
            low_percentage,
            high_percentage,
            saturation,
            context,
        }
    }
}

impl Operation for FilterPercentage<'_> {
    type Output = ScwList;

    fn compute(&self) -> Result<Option<ScwList>, OperationError> {
        let (low, high) = (self.low_percentage, self.high_percentage);
        if !(0.0..=1.0).contains(&low) || !(0.0..=1.0).contains(&high) {
            return Err(OperationError::invalid_argument(
                "percentages must lie in [0, 1]",
            ));
        }
        if low + high > 1.0 {
            return Err(OperationError::invalid_argument(
                "low and high percentages must sum to at most 1",
            ));
        }
        let Some(count) = self.list.shards().present().try_fold(0usize, |count, (_, view)| {
            (!self.context.is_stopped())
                .then(|| count + view.iter().filter(|w| !w.is_null()).count())
        }) else {
            return Ok(None);
        };
        let low_count = (count as f64 * low).floor() as usize;
        let high_count = (count as f64 * high).floor() as usize;
        filter_extremes(&self.context, self.list, low_count, high_count, self.saturation)
    }

    fn description(&self) -> &'static str {
        "Percentage Filter"
    }

    fn step_count(&self) -> usize {
        ScwList::CREATION_STEP_COUNT + 2
    }

    fn context(&self) -> &OperationContext {
        &self.context
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operation::test_support::{bin_scores, bins, context, list, windows};

    #[test]
    fn saturation_clamps_and_plain_mode_drops() {
        let input = list(&[(0, 0, 10, 15.0), (0, 10, 20, 5.0), (0, 20, 30, 0.5)]);
        let saturated = FilterThreshold::new(context(), &input, 1.0, 9.0, true)
            .compute()
            .unwrap()
            .unwrap();
        assert_eq!(
            windows(&saturated, 0),
            vec![(0, 10, 9.0), (10, 20, 5.0), (20, 30, 1.0)]
        );
        let dropped = FilterThreshold::new(context(), &input, 1.0, 9.0, false)
            .compute()
            .unwrap()
            .unwrap();
        assert_eq!(windows(&dropped, 0), vec![(10, 20, 5.0)]);
    }

    #[test]
    fn null_bins_are_never_kept() {
        let input = bins(10, &[0.0, 3.0]);
        let filtered = FilterThreshold::new(context(), &input, -5.0, 5.0, true)
            .compute()
            .unwrap()
            .unwrap();
        assert_eq!(&bin_scores(&filtered, 0)[..2], &[0.0, 3.0]);
    }

    #[test]
    fn inverted_bounds_fail_before_any_work() {
        let input = list(&[(0, 0, 10, 1.0)]);
        let pool_context = context();
        let result = FilterThreshold::new(pool_context.clone(), &input, 9.0, 1.0, true).compute();
        assert!(matches!(result, Err(OperationError::InvalidArgument(_))));
        assert_eq!(pool_context.pool().progress().total, 0);
    }

    #[test]
    fn band_stop_removes_the_band() {
        let input = list(&[(0, 0, 10, 1.0), (0, 10, 20, 5.0), (0, 20, 30, 9.0)]);
        let filtered = FilterBandStop::new(context(), &input, 4.0, 6.0)
            .compute()
            .unwrap()
            .unwrap();
        assert_eq!(windows(&filtered, 0), vec![(0, 10, 1.0), (20, 30, 9.0)]);
    }

    #[test]
    fn count_filter_removes_extremes() {
        let input = list(&[
            (0, 0, 10, 1.0),
            (0, 10, 20, 2.0),
            (0, 20, 30, 3.0),
            (1, 0, 10, 4.0),
        ]);
        let filtered = FilterCount::new(context(), &input, 1, 1, false)
            .compute()
            .unwrap()
            .unwrap();
        assert_eq!(windows(&filtered, 0), vec![(10, 20, 2.0), (20, 30, 3.0)]);
        assert!(windows(&filtered, 1).is_empty());
        assert!(FilterCount::new(context(), &input, 3, 2, false).compute().is_err());

        let emptied = FilterCount::new(context(), &input, 2, 2, true)
            .compute()
            .unwrap()
            .unwrap();
        assert_eq!(emptied.window_count(), 0);
    }

    #[test]
    fn zero_percentages_are_a_no_op() {
        let input = list(&[(0, 0, 10, 1.0), (1, 5, 9, 7.0)]);
        let filtered = FilterPercentage::new(context(), &input, 0.0, 0.0, false)
            .compute()
            .unwrap()
            .unwrap();
        assert_eq!(filtered, input);
    }

    #[test]
    fn percentages_are_validated() {
        let input = list(&[(0, 0, 10, 1.0)]);
        for (low, high) in [(-0.1, 0.0), (0.0, 1.5), (0.6, 0.6)] {
            assert!(matches!(
                FilterPercentage::new(context(), &input, low, high, false).compute(),
                Err(OperationError::InvalidArgument(_))
            ));
        }
    }
}
