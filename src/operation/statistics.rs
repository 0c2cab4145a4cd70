use std::collections::BTreeMap;

use tracing::debug;

use super::{require_same_genome, Operation};
use crate::framework::{OperationContext, OperationError};
use crate::genome::ChromosomeSelection;
use crate::list::{
    squared_deviation, BinList, ChromosomeSummary, Deviation, ListStatistics, ScwList,
};

fn check_selection(
    list: &ScwList,
    selection: Option<&ChromosomeSelection>,
) -> Result<(), OperationError> {
    match selection {
        Some(selection) if selection.len() != list.len() => Err(OperationError::invalid_argument(
            format!(
                "selection covers {} chromosomes, list has {}",
                selection.len(),
                list.len()
            ),
        )),
        _ => Ok(()),
    }
}

fn is_selected(selection: Option<&ChromosomeSelection>, chromosome: usize) -> bool {
    selection.map_or(true, |s| s.is_selected(chromosome))
}

/// First pass: per-chromosome summaries of the selected chromosomes, folded
/// in chromosome order.
fn selected_summary(
    context: &OperationContext,
    list: &ScwList,
    selection: Option<&ChromosomeSelection>,
) -> Result<Option<ChromosomeSummary>, OperationError> {
    check_selection(list, selection)?;
    let summaries = context.map_shards(list.shards(), |chromosome, view| {
        if !is_selected(selection, chromosome) {
            return Ok(None);
        }
        Ok(Some(ChromosomeSummary::from_windows(
            view.iter().take_while(|_| !context.is_stopped()),
        )))
    })?;
    Ok(summaries.map(|summaries| {
        ChromosomeSummary::fold(summaries.present().filter_map(|(_, s)| s.as_ref()))
    }))
}

macro_rules! summary_operation {
    ($(#[$doc:meta])* $name:ident, $output:ty, $description:literal, |$summary:ident| $value:expr) => {
        $(#[$doc])*
        #[derive(Debug)]
        pub struct $name<'a> {
            list: &'a ScwList,
            selection: Option<ChromosomeSelection>,
            context: OperationContext,
        }

        impl<'a> $name<'a> {
            /// Reduction over every chromosome of `list`.
            pub fn new(context: OperationContext, list: &'a ScwList) -> Self {
                Self {
                    list,
                    selection: None,
                    context,
                }
            }

            /// Restrict the reduction to the chromosomes of `selection`.
            pub fn with_selection(mut self, selection: ChromosomeSelection) -> Self {
                self.selection = Some(selection);
                self
            }
        }

        impl Operation for $name<'_> {
            type Output = $output;

            fn compute(&self) -> Result<Option<$output>, OperationError> {
                let summary =
                    selected_summary(&self.context, self.list, self.selection.as_ref())?;
                Ok(summary.map(|$summary| $value))
            }

            fn description(&self) -> &'static str {
                $description
            }

            fn step_count(&self) -> usize {
                1
            }

            fn context(&self) -> &OperationContext {
                &self.context
            }
        }
    };
}

summary_operation!(
    /// Length-weighted average of the non-null scores.
    Average, f64, "Average", |summary| summary.average()
);

summary_operation!(
    /// Number of bases covered by non-null windows.
    CountNonNullLength, u64, "Count Non-Null Length", |summary| summary.non_null_length
);

summary_operation!(
    /// Number of non-null windows.
    CountNonNullWindows, u64, "Count Non-Null Windows", |summary| summary.non_null_windows
);

summary_operation!(
    /// Number of windows, null ones included.
    CountWindows, u64, "Count Windows", |summary| summary.window_count
);

summary_operation!(
    /// Smallest non-null score, `0` for an empty list.
    Minimum, f64, "Minimum", |summary| if summary.non_null_windows == 0 {
        0.0
    } else {
        summary.minimum
    }
);

summary_operation!(
    /// Largest non-null score, `0` for an empty list.
    Maximum, f64, "Maximum", |summary| if summary.non_null_windows == 0 {
        0.0
    } else {
        summary.maximum
    }
);

summary_operation!(
    /// Sum of the non-null scores.
    SumScore, f64, "Sum Score", |summary| summary.score_sum
);

/// Length-weighted population standard deviation of the non-null scores.
///
/// Runs two parallel passes: the second needs the genome-wide mean.
#[derive(Debug)]
pub struct StandardDeviation<'a> {
    list: &'a ScwList,
    selection: Option<ChromosomeSelection>,
    context: OperationContext,
}

impl<'a> StandardDeviation<'a> {
    /// Standard deviation over every chromosome of `list`.
    pub fn new(context: OperationContext, list: &'a ScwList) -> Self {
        Self {
            list,
            selection: None,
            context,
        }
    }

    /// Restrict the computation to the chromosomes of `selection`.
    pub fn with_selection(mut self, selection: ChromosomeSelection) -> Self {
        self.selection = Some(selection);
        self
    }
}

impl Operation for StandardDeviation<'_> {
    type Output = f64;

    fn compute(&self) -> Result<Option<f64>, OperationError> {
        let selection = self.selection.as_ref();
        let Some(summary) = selected_summary(&self.context, self.list, selection)? else {
            return Ok(None);
        };
        if summary.non_null_length == 0 {
            return Ok(Some(0.0));
        }
        let mean = summary.average();
        let deviations = self.context.map_shards(self.list.shards(), |chromosome, view| {
            if !is_selected(selection, chromosome) {
                return Ok(None);
            }
            let windows = view.iter().take_while(|_| !self.context.is_stopped());
            Ok(Some(squared_deviation(windows, mean)))
        })?;
        Ok(deviations.map(|deviations| {
            let total: f64 = deviations.present().filter_map(|(_, d)| *d).sum();
            (total / summary.non_null_length as f64).sqrt()
        }))
    }

    fn description(&self) -> &'static str {
        "Standard Deviation"
    }

    fn step_count(&self) -> usize {
        2
    }

    fn context(&self) -> &OperationContext {
        &self.context
    }
}

/// Genome-wide and per-chromosome statistics computed on the pool.
///
/// Produces exactly the statistics cached by [`ScwList::statistics`].
#[derive(Debug)]
pub struct ComputeStats<'a> {
    list: &'a ScwList,
    context: OperationContext,
}

impl<'a> ComputeStats<'a> {
    /// Statistics of `list`.
    pub fn new(context: OperationContext, list: &'a ScwList) -> Self {
        Self { list, context }
    }
}

impl Operation for ComputeStats<'_> {
    type Output = ListStatistics;

    fn compute(&self) -> Result<Option<ListStatistics>, OperationError> {
        let stop = &self.context;
        let Some(summaries) = self.context.map_shards(self.list.shards(), |_, view| {
            Ok(ChromosomeSummary::from_windows(
                view.iter().take_while(|_| !stop.is_stopped()),
            ))
        })?
        else {
            return Ok(None);
        };
        let summaries = summaries.into_shards();
        let genome_mean = ChromosomeSummary::fold(summaries.iter().flatten()).average();

        let Some(deviations) = self.context.map_shards(self.list.shards(), |chromosome, view| {
            let chromosome_mean = summaries[chromosome]
                .as_ref()
                .map_or(0.0, ChromosomeSummary::average);
            let windows = || view.iter().take_while(|_| !stop.is_stopped());
            Ok(Deviation {
                from_genome_mean: squared_deviation(windows(), genome_mean),
                from_chromosome_mean: squared_deviation(windows(), chromosome_mean),
            })
        })?
        else {
            return Ok(None);
        };
        debug!(genome_mean, "statistics computed");
        Ok(Some(ListStatistics::assemble(
            &summaries,
            &deviations.into_shards(),
        )))
    }

    fn description(&self) -> &'static str {
        "Compute Statistics"
    }

    fn step_count(&self) -> usize {
        2
    }

    fn context(&self) -> &OperationContext {
        &self.context
    }
}

/// One bucket of a score histogram.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RepartitionBin {
    /// Inclusive lower score bound.
    pub lower: f64,
    /// Exclusive upper score bound.
    pub upper: f64,
    /// Non-null windows whose score falls in the bucket.
    pub window_count: u64,
    /// Bases covered by those windows.
    pub length: u64,
}

/// Largest bucket index magnitude; `i64` keys stay exact below it.
const MAX_BUCKET_INDEX: f64 = (1u64 << 62) as f64;

/// Histogram of the non-null scores in buckets of `score_bin_size`.
///
/// Only occupied buckets are reported, in increasing score order.
#[derive(Debug)]
pub struct Repartition<'a> {
    list: &'a ScwList,
    score_bin_size: f64,
    context: OperationContext,
}

impl<'a> Repartition<'a> {
    /// Histogram of `list` with buckets `score_bin_size` wide.
    pub fn new(context: OperationContext, list: &'a ScwList, score_bin_size: f64) -> Self {
        Self {
            list,
            score_bin_size,
            context,
        }
    }
}

impl Operation for Repartition<'_> {
    type Output = Vec<RepartitionBin>;

    fn compute(&self) -> Result<Option<Vec<RepartitionBin>>, OperationError> {
        let size = self.score_bin_size;
        if !(size > 0.0 && size.is_finite()) {
            return Err(OperationError::invalid_argument(
                "score bin size must be a positive number",
            ));
        }
        let Some(counts) = self.context.map_shards(self.list.shards(), |_, view| {
            let mut counts: BTreeMap<i64, (u64, u64)> = BTreeMap::new();
            for window in view.iter().take_while(|_| !self.context.is_stopped()) {
                if window.is_null() {
                    continue;
                }
                let ratio = (window.score / size).floor();
                if ratio.abs() >= MAX_BUCKET_INDEX {
                    return Err(OperationError::invalid_argument(format!(
                        "score {} is too far from 0 for buckets {size} wide",
                        window.score
                    )));
                }
                let bucket = ratio as i64;
                let entry = counts.entry(bucket).or_default();
                entry.0 += 1;
                entry.1 += window.len() as u64;
            }
            Ok(counts)
        })?
        else {
            return Ok(None);
        };

        let mut merged: BTreeMap<i64, (u64, u64)> = BTreeMap::new();
        for (_, counts) in counts.present() {
            for (&bucket, &(windows, length)) in counts {
                let entry = merged.entry(bucket).or_default();
                entry.0 += windows;
                entry.1 += length;
            }
        }
        Ok(Some(
            merged
                .into_iter()
                .map(|(bucket, (window_count, length))| RepartitionBin {
                    lower: bucket as f64 * size,
                    upper: (bucket + 1) as f64 * size,
                    window_count,
                    length,
                })
                .collect(),
        ))
    }

    fn description(&self) -> &'static str {
        "Score Repartition"
    }

    fn step_count(&self) -> usize {
        1
    }

    fn context(&self) -> &OperationContext {
        &self.context
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct CorrelationSums {
    count: f64,
    x: f64,
    y: f64,
    xy: f64,
    xx: f64,
    yy: f64,
}

impl CorrelationSums {
    fn observe(&mut self, x: f64, y: f64) {
        self.count += 1.0;
        self.x += x;
        self.y += y;
        self.xy += x * y;
        self.xx += x * x;
        self.yy += y * y;
    }

    fn merge(&mut self, other: &Self) {
        self.count += other.count;
        self.x += other.x;
        self.y += other.y;
        self.xy += other.xy;
        self.xx += other.xx;
        self.yy += other.yy;
    }

    fn coefficient(&self) -> f64 {
        let n = self.count;
        let numerator = n * self.xy - self.x * self.y;
        let denominator = ((n * self.xx - self.x * self.x) * (n * self.yy - self.y * self.y)).sqrt();
        if denominator == 0.0 || denominator.is_nan() {
            0.0
        } else {
            numerator / denominator
        }
    }
}

/// Pearson correlation of two bin lists over the bins where at least one
/// list has data.
#[derive(Debug)]
pub struct CorrelationCoefficient<'a> {
    first: &'a BinList,
    second: &'a BinList,
    context: OperationContext,
}

impl<'a> CorrelationCoefficient<'a> {
    /// Correlation between `first` and `second`.
    pub fn new(context: OperationContext, first: &'a BinList, second: &'a BinList) -> Self {
        Self {
            first,
            second,
            context,
        }
    }
}

impl Operation for CorrelationCoefficient<'_> {
    type Output = f64;

    fn compute(&self) -> Result<Option<f64>, OperationError> {
        require_same_genome(self.first, self.second)?;
        if self.first.bin_size() != self.second.bin_size() {
            return Err(OperationError::IncompatibleLists(format!(
                "bin sizes differ ({} and {})",
                self.first.bin_size(),
                self.second.bin_size()
            )));
        }
        let Some(sums) = self.context.map_shards(self.first.shards(), |chromosome, first| {
            let mut sums = CorrelationSums::default();
            let Some(second) = self.second.get(chromosome) else {
                return Ok(sums);
            };
            for (a, b) in first
                .iter()
                .zip(second.iter())
                .take_while(|_| !self.context.is_stopped())
            {
                if !a.is_null() || !b.is_null() {
                    sums.observe(a.score, b.score);
                }
            }
            Ok(sums)
        })?
        else {
            return Ok(None);
        };
        let mut total = CorrelationSums::default();
        for (_, sums) in sums.present() {
            total.merge(sums);
        }
        Ok(Some(total.coefficient()))
    }

    fn description(&self) -> &'static str {
        "Correlation Coefficient"
    }

    fn step_count(&self) -> usize {
        1
    }

    fn context(&self) -> &OperationContext {
        &self.context
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operation::test_support::{bins, context, list};

    #[test]
    fn average_over_all_chromosomes_matches_the_cache() {
        let list = list(&[(0, 0, 10, 1.0), (0, 10, 30, 4.0), (1, 5, 9, 2.5)]);
        let all = ChromosomeSelection::all(list.len());
        let average = Average::new(context(), &list)
            .with_selection(all.clone())
            .compute()
            .unwrap()
            .unwrap();
        assert_eq!(average, list.average());
        let stdev = StandardDeviation::new(context(), &list)
            .with_selection(all)
            .compute()
            .unwrap()
            .unwrap();
        assert_eq!(stdev, list.standard_deviation());
    }

    #[test]
    fn computed_statistics_equal_cached_statistics() {
        let list = list(&[(0, 0, 10, 1.5), (0, 20, 25, -3.0), (1, 0, 100, 0.25)]);
        let stats = ComputeStats::new(context(), &list).compute().unwrap().unwrap();
        assert_eq!(&stats, list.statistics());
    }

    #[test]
    fn selection_restricts_reductions() {
        let list = list(&[(0, 0, 10, 1.0), (1, 0, 10, 5.0)]);
        let mut selection = ChromosomeSelection::none(list.len());
        selection.select(1);
        let max = Maximum::new(context(), &list)
            .with_selection(selection.clone())
            .compute()
            .unwrap()
            .unwrap();
        let count = CountNonNullWindows::new(context(), &list)
            .with_selection(selection)
            .compute()
            .unwrap()
            .unwrap();
        assert_eq!((max, count), (5.0, 1));
        let wrong = ChromosomeSelection::all(5);
        assert!(Minimum::new(context(), &list)
            .with_selection(wrong)
            .compute()
            .is_err());
    }

    #[test]
    fn empty_lists_reduce_to_zero() {
        let list = list(&[]);
        assert_eq!(Minimum::new(context(), &list).compute().unwrap(), Some(0.0));
        assert_eq!(StandardDeviation::new(context(), &list).compute().unwrap(), Some(0.0));
        assert_eq!(CountNonNullLength::new(context(), &list).compute().unwrap(), Some(0));
    }

    #[test]
    fn repartition_buckets_scores() {
        let list = list(&[(0, 0, 10, 0.5), (0, 10, 20, 2.5), (1, 0, 5, 2.9)]);
        let histogram = Repartition::new(context(), &list, 1.0).compute().unwrap().unwrap();
        let counts: Vec<u64> = histogram.iter().map(|b| b.window_count).collect();
        assert_eq!(counts, vec![1, 2]);
        assert_eq!((histogram[1].lower, histogram[1].upper), (2.0, 3.0));
        assert_eq!(histogram[1].length, 15);
        assert!(Repartition::new(context(), &list, 0.0).compute().is_err());
    }

    #[test]
    fn repartition_skips_empty_buckets_between_distant_scores() {
        let distant = list(&[(0, 0, 10, 1.0), (0, 10, 20, 1e13)]);
        let histogram = Repartition::new(context(), &distant, 1.0).compute().unwrap().unwrap();
        assert_eq!(histogram.len(), 2);
        assert_eq!(histogram[0].lower, 1.0);
        assert_eq!(histogram[1].lower, 1e13);

        let extreme = list(&[(0, 0, 10, 1e300)]);
        assert!(matches!(
            Repartition::new(context(), &extreme, 1e-10).compute(),
            Err(OperationError::InvalidArgument(_))
        ));
    }

    #[test]
    fn identical_bin_lists_correlate_perfectly() {
        let first = bins(10, &[1.0, 2.0, 0.0, 4.0]);
        let second = bins(10, &[2.0, 4.0, 0.0, 8.0]);
        let r = CorrelationCoefficient::new(context(), &first, &second)
            .compute()
            .unwrap()
            .unwrap();
        assert!((r - 1.0).abs() < 1e-12);
        let other = bins(20, &[1.0]);
        assert!(matches!(
            CorrelationCoefficient::new(context(), &first, &other).compute(),
            Err(OperationError::IncompatibleLists(_))
        ));
    }
}
