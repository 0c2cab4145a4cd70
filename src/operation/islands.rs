//! Island calling.
//!
//! An island is a run of non-null windows in which consecutive windows are
//! separated by at most a gap. [`Transfrag`] scores plain islands;
//! [`FindIslands`] first keeps the bins that are unlikely under a Poisson
//! background (see [`IslandFinder`]) and then scores islands by their
//! combined significance; [`FindPeaksStdev`] keeps bins whose neighbourhood
//! varies more than the genome as a whole.

use statrs::distribution::{DiscreteCDF, Poisson};
use tracing::{debug, info};

use super::{map_views, Operation, StandardDeviation};
use crate::framework::{OperationContext, OperationError};
use crate::list::{BinList, ScwList};
use crate::view::{ListView, ListViewBuilder};

/// How the windows of a transfrag are summarised.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IslandScore {
    /// Length-weighted average of the non-null windows.
    Average,
    /// Sum of the scores.
    Sum,
    /// Largest score.
    Maximum,
}

#[derive(Debug, Clone, Copy)]
struct Island {
    start: u32,
    stop: u32,
    weighted_sum: f64,
    length: u64,
    sum: f64,
    maximum: f64,
}

impl Island {
    fn open(start: u32, stop: u32, score: f64) -> Self {
        let length = u64::from(stop - start);
        Self {
            start,
            stop,
            weighted_sum: score * length as f64,
            length,
            sum: score,
            maximum: score,
        }
    }

    fn extend(&mut self, start: u32, stop: u32, score: f64) {
        let length = u64::from(stop - start);
        self.stop = stop;
        self.weighted_sum += score * length as f64;
        self.length += length;
        self.sum += score;
        self.maximum = self.maximum.max(score);
    }

    fn score(&self, rule: IslandScore) -> f64 {
        match rule {
            IslandScore::Average => self.weighted_sum / self.length as f64,
            IslandScore::Sum => self.sum,
            IslandScore::Maximum => self.maximum,
        }
    }
}

/// Replaces every island with a single region carrying the island score.
///
/// `gap` is counted in bins for bin lists (every bin of the island receives
/// the score) and in bases otherwise.
#[derive(Debug)]
pub struct Transfrag<'a> {
    list: &'a ScwList,
    gap: u32,
    score: IslandScore,
    context: OperationContext,
}

impl<'a> Transfrag<'a> {
    /// Transfrags of `list` tolerating `gap` null units inside an island.
    pub fn new(context: OperationContext, list: &'a ScwList, gap: u32, score: IslandScore) -> Self {
        Self {
            list,
            gap,
            score,
            context,
        }
    }
}

impl Operation for Transfrag<'_> {
    type Output = ScwList;

    fn compute(&self) -> Result<Option<ScwList>, OperationError> {
        let max_gap = match self.list.bin_size() {
            Some(bin_size) => self.gap.saturating_mul(bin_size),
            None => self.gap,
        };
        map_views(&self.context, self.list, |chromosome, view| {
            let mut builder = self.list.view_builder(chromosome);
            let mut island: Option<Island> = None;
            for window in view.iter().take_while(|_| !self.context.is_stopped()) {
                if window.is_null() || window.is_empty() {
                    continue;
                }
                match island.as_mut() {
                    Some(current) if window.start.saturating_sub(current.stop) <= max_gap => {
                        current.extend(window.start, window.stop, window.score);
                    }
                    _ => {
                        let next = Island::open(window.start, window.stop, window.score);
                        if let Some(done) = island.replace(next) {
                            builder.add_element(done.start, done.stop, done.score(self.score))?;
                        }
                    }
                }
            }
            if let Some(done) = island {
                builder.add_element(done.start, done.stop, done.score(self.score))?;
            }
            Ok(builder.build())
        })
    }

    fn description(&self) -> &'static str {
        "Transfrag"
    }

    fn context(&self) -> &OperationContext {
        &self.context
    }
}

/// Poisson background model of a bin list.
///
/// Bin scores are read as read counts drawn from a Poisson distribution
/// whose mean `lambda` is the genome-wide average per bin (null bins
/// included). [`IslandFinder::p_value`] and
/// [`IslandFinder::read_count_limit`] are inverse of each other on integer
/// read counts.
#[derive(Debug, Clone)]
pub struct IslandFinder {
    lambda: f64,
    poisson: Poisson,
}

impl IslandFinder {
    /// Model with mean `lambda`.
    pub fn new(lambda: f64) -> Result<Self, OperationError> {
        if !(lambda.is_finite() && lambda > 0.0) {
            return Err(OperationError::arithmetic(format!(
                "Poisson mean must be positive, got {lambda}"
            )));
        }
        let poisson = Poisson::new(lambda).map_err(|err| OperationError::arithmetic(err.to_string()))?;
        Ok(Self { lambda, poisson })
    }

    /// Model whose mean is the average read count per bin of `list`.
    pub fn for_list(list: &BinList) -> Result<Self, OperationError> {
        let chromosomes = list.chromosomes();
        let bin_count: usize = (0..chromosomes.len())
            .map(|index| chromosomes.bin_count(index, list.bin_size()))
            .sum();
        if bin_count == 0 {
            return Err(OperationError::invalid_argument("bin list has no bin"));
        }
        let lambda = list.score_sum() / bin_count as f64;
        debug!(lambda, bin_count, "Poisson background estimated");
        Self::new(lambda)
    }

    /// Mean of the background distribution.
    pub fn lambda(&self) -> f64 {
        self.lambda
    }

    /// Probability of observing at least `read_count` reads in a bin.
    ///
    /// Fractional counts are rounded up; non-positive and NaN counts give 1.
    pub fn p_value(&self, read_count: f64) -> f64 {
        if !(read_count > 0.0) {
            return 1.0;
        }
        let reads = read_count.ceil() as u64;
        self.poisson.sf(reads - 1)
    }

    /// Smallest read count whose [`p_value`](Self::p_value) is at most `p_value`.
    pub fn read_count_limit(&self, p_value: f64) -> Result<f64, OperationError> {
        if !(p_value > 0.0 && p_value <= 1.0) {
            return Err(OperationError::invalid_argument(format!(
                "p-value must lie in (0, 1], got {p_value}"
            )));
        }
        let mut high: u64 = 1;
        while self.p_value(high as f64) > p_value {
            high = high.checked_mul(2).ok_or_else(|| {
                OperationError::arithmetic(format!("no read count reaches p-value {p_value}"))
            })?;
        }
        let mut low = high / 2;
        if self.p_value(low as f64) <= p_value {
            return Ok(low as f64);
        }
        // p_value(low) > target >= p_value(high)
        while high - low > 1 {
            let middle = low + (high - low) / 2;
            if self.p_value(middle as f64) <= p_value {
                high = middle;
            } else {
                low = middle;
            }
        }
        Ok(high as f64)
    }

    /// Significance of one bin: `-log10` of its p-value.
    pub fn bin_significance(&self, read_count: f64) -> f64 {
        let p = self.p_value(read_count);
        if p <= 0.0 {
            f64::MAX.log10()
        } else {
            -p.log10()
        }
    }
}

/// What [`FindIslands`] writes into the bins of an island.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IslandResult {
    /// Keep the original scores of the island bins.
    Filtered,
    /// Every bin of the island receives the island significance score.
    IslandScore,
}

/// Minimal read count a bin needs to seed an island.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum IslandThreshold {
    /// Explicit read count.
    ReadCount(f64),
    /// Read count derived from a p-value under the background model.
    PValue(f64),
}

/// Calls enriched islands on a bin list.
///
/// Bins reaching the read-count threshold are eligible; eligible bins at
/// most `gap` bins apart form an island. An island scores the sum of the
/// significances of its eligible bins and is kept when it spans at least
/// `min_length` bins and scores at least `min_score`.
#[derive(Debug)]
pub struct FindIslands<'a> {
    list: &'a BinList,
    threshold: IslandThreshold,
    gap: u32,
    min_length: u32,
    min_score: f64,
    result: IslandResult,
    context: OperationContext,
}

impl<'a> FindIslands<'a> {
    /// Island calling on `list` with `threshold`; no gap, no length or score
    /// cut-off, filtered output.
    pub fn new(context: OperationContext, list: &'a BinList, threshold: IslandThreshold) -> Self {
        Self {
            list,
            threshold,
            gap: 0,
            min_length: 1,
            min_score: 0.0,
            result: IslandResult::Filtered,
            context,
        }
    }

    /// Tolerate up to `gap` ineligible bins inside an island.
    pub fn with_gap(mut self, gap: u32) -> Self {
        self.gap = gap;
        self
    }

    /// Discard islands spanning fewer than `min_length` bins.
    pub fn with_min_length(mut self, min_length: u32) -> Self {
        self.min_length = min_length;
        self
    }

    /// Discard islands scoring below `min_score`.
    pub fn with_min_score(mut self, min_score: f64) -> Self {
        self.min_score = min_score;
        self
    }

    /// Choose what the kept islands carry.
    pub fn with_result(mut self, result: IslandResult) -> Self {
        self.result = result;
        self
    }

    fn write_island(
        &self,
        builder: &mut impl ListViewBuilder,
        view: &ListView,
        bins: (usize, usize),
        score: f64,
    ) -> Result<(), OperationError> {
        let (first, last) = bins;
        if last + 1 - first < self.min_length as usize || score < self.min_score {
            return Ok(());
        }
        for bin in first..=last {
            let Some(window) = view.get(bin) else {
                break;
            };
            let value = match self.result {
                IslandResult::Filtered => window.score,
                IslandResult::IslandScore => score,
            };
            builder.add_element(window.start, window.stop, value)?;
        }
        Ok(())
    }
}

impl Operation for FindIslands<'_> {
    type Output = BinList;

    fn compute(&self) -> Result<Option<BinList>, OperationError> {
        let finder = IslandFinder::for_list(self.list)?;
        let read_count = match self.threshold {
            IslandThreshold::ReadCount(count) => count,
            IslandThreshold::PValue(p) => finder.read_count_limit(p)?,
        };
        info!(
            lambda = finder.lambda(),
            read_count,
            gap = self.gap,
            "calling islands"
        );
        let gap = self.gap as usize;
        let Some(shards) = self.context.map_shards(self.list.shards(), |chromosome, view| {
            let mut builder = self.list.view_builder(chromosome);
            // (first bin, last bin, score) of the open island
            let mut island: Option<(usize, usize, f64)> = None;
            for (bin, window) in view
                .iter()
                .enumerate()
                .take_while(|_| !self.context.is_stopped())
            {
                if window.is_null() || window.score < read_count {
                    continue;
                }
                let significance = finder.bin_significance(window.score);
                match island.as_mut() {
                    Some((_, last, score)) if bin - *last <= gap + 1 => {
                        *last = bin;
                        *score += significance;
                    }
                    _ => {
                        if let Some((first, last, score)) =
                            island.replace((bin, bin, significance))
                        {
                            self.write_island(&mut builder, view, (first, last), score)?;
                        }
                    }
                }
            }
            if let Some((first, last, score)) = island {
                self.write_island(&mut builder, view, (first, last), score)?;
            }
            Ok(builder.build())
        })?
        else {
            return Ok(None);
        };
        Ok(Some(self.list.derive_bins(shards)?))
    }

    fn description(&self) -> &'static str {
        "Island Finder"
    }

    fn step_count(&self) -> usize {
        BinList::CREATION_STEP_COUNT + 1
    }

    fn context(&self) -> &OperationContext {
        &self.context
    }
}

/// Keeps the bins whose neighbourhood standard deviation exceeds
/// `multiplier` times the genome-wide standard deviation.
///
/// The neighbourhood spans `half_width` bins on each side; only non-null
/// bins take part.
#[derive(Debug)]
pub struct FindPeaksStdev<'a> {
    list: &'a BinList,
    half_width: u32,
    multiplier: f64,
    context: OperationContext,
}

impl<'a> FindPeaksStdev<'a> {
    /// Peaks of `list`.
    pub fn new(context: OperationContext, list: &'a BinList, half_width: u32, multiplier: f64) -> Self {
        Self {
            list,
            half_width,
            multiplier,
            context,
        }
    }
}

fn local_stdev(scores: &[f64]) -> f64 {
    let present: Vec<f64> = scores.iter().copied().filter(|s| *s != 0.0).collect();
    if present.is_empty() {
        return 0.0;
    }
    let mean = present.iter().sum::<f64>() / present.len() as f64;
    let variance = present.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / present.len() as f64;
    variance.sqrt()
}

impl Operation for FindPeaksStdev<'_> {
    type Output = BinList;

    fn compute(&self) -> Result<Option<BinList>, OperationError> {
        if self.half_width == 0 {
            return Err(OperationError::invalid_argument("half width must be > 0 bins"));
        }
        if !(self.multiplier.is_finite() && self.multiplier >= 0.0) {
            return Err(OperationError::invalid_argument(format!(
                "invalid standard deviation multiplier {}",
                self.multiplier
            )));
        }
        let Some(genome_stdev) =
            StandardDeviation::new(self.context.nested(), self.list).compute()?
        else {
            return Ok(None);
        };
        let threshold = genome_stdev * self.multiplier;
        debug!(genome_stdev, threshold, "finding peaks");
        let half_width = self.half_width as usize;
        let Some(shards) = self.context.map_shards(self.list.shards(), |chromosome, view| {
            let scores: Vec<f64> = view.iter().map(|w| w.score).collect();
            let mut builder = self.list.view_builder(chromosome);
            for (bin, window) in view
                .iter()
                .enumerate()
                .take_while(|_| !self.context.is_stopped())
            {
                if window.is_null() {
                    continue;
                }
                let low = bin.saturating_sub(half_width);
                let high = (bin + half_width + 1).min(scores.len());
                if local_stdev(&scores[low..high]) > threshold {
                    builder.add_window(&window)?;
                }
            }
            Ok(builder.build())
        })?
        else {
            return Ok(None);
        };
        Ok(Some(self.list.derive_bins(shards)?))
    }

    fn description(&self) -> &'static str {
        "Find Peaks (Standard Deviation)"
    }

    fn step_count(&self) -> usize {
        BinList::CREATION_STEP_COUNT + 2
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
    fn transfrag_bridges_small_gaps() {
        let input = list(&[(0, 0, 10, 2.0), (0, 15, 25, 4.0), (0, 60, 70, 9.0)]);
        let islands = Transfrag::new(context(), &input, 5, IslandScore::Average)
            .compute()
            .unwrap()
            .unwrap();
        assert_eq!(windows(&islands, 0), vec![(0, 25, 3.0), (60, 70, 9.0)]);
        let islands = Transfrag::new(context(), &input, 4, IslandScore::Sum)
            .compute()
            .unwrap()
            .unwrap();
        assert_eq!(windows(&islands, 0).len(), 3);
    }

    #[test]
    fn transfrag_on_bins_fills_every_island_bin() {
        let input = bins(10, &[1.0, 0.0, 5.0, 0.0, 0.0, 2.0]);
        let islands = Transfrag::new(context(), &input, 1, IslandScore::Maximum)
            .compute()
            .unwrap()
            .unwrap();
        assert_eq!(
            &bin_scores(&islands, 0)[..7],
            &[5.0, 5.0, 5.0, 0.0, 0.0, 2.0, 0.0]
        );
    }

    #[test]
    fn p_values_decrease_with_read_count() {
        let finder = IslandFinder::new(2.0).unwrap();
        assert_eq!(finder.p_value(0.0), 1.0);
        let mut previous = 1.0;
        for reads in 1..20 {
            let p = finder.p_value(reads as f64);
            assert!(p < previous);
            previous = p;
        }
        assert!(IslandFinder::new(0.0).is_err());
        assert!(finder.read_count_limit(0.0).is_err());
    }

    #[test]
    fn undefined_read_counts_are_not_significant() {
        let finder = IslandFinder::new(2.0).unwrap();
        assert_eq!(finder.p_value(f64::NAN), 1.0);
        assert_eq!(finder.p_value(-3.0), 1.0);
        assert_eq!(finder.bin_significance(f64::NAN), 0.0);
    }

    #[test]
    fn islands_keep_significant_runs() {
        // lambda = 30 / 20 bins
        let input = bins(10, &[1.0, 12.0, 0.0, 10.0, 1.0, 0.0, 0.0, 0.0, 0.0, 6.0]);
        let islands = FindIslands::new(context(), &input, IslandThreshold::ReadCount(8.0))
            .with_gap(1)
            .compute()
            .unwrap()
            .unwrap();
        assert_eq!(
            bin_scores(&islands, 0),
            vec![0.0, 12.0, 0.0, 10.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]
        );

        let scored = FindIslands::new(context(), &input, IslandThreshold::ReadCount(8.0))
            .with_gap(1)
            .with_min_length(4)
            .compute()
            .unwrap()
            .unwrap();
        assert_eq!(scored.non_null_window_count(), 0);
    }

    #[test]
    fn island_scores_sum_bin_significance() {
        let input = bins(10, &[1.0, 12.0, 10.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 7.0]);
        let finder = IslandFinder::for_list(&input).unwrap();
        assert_eq!(finder.lambda(), 1.5);
        let expected = finder.bin_significance(12.0) + finder.bin_significance(10.0);
        let scored = FindIslands::new(context(), &input, IslandThreshold::ReadCount(8.0))
            .with_result(IslandResult::IslandScore)
            .compute()
            .unwrap()
            .unwrap();
        let scores = bin_scores(&scored, 0);
        assert!((scores[1] - expected).abs() < 1e-9);
        assert_eq!(scores[1], scores[2]);
        assert_eq!(scores[0], 0.0);
    }

    #[test]
    fn peaks_stand_out_from_the_genome_deviation() {
        let input = bins(10, &[1.0, 1.0, 1.0, 10.0, 1.0, 1.0, 1.0]);
        let peaks = FindPeaksStdev::new(context(), &input, 1, 1.0)
            .compute()
            .unwrap()
            .unwrap();
        assert_eq!(
            &bin_scores(&peaks, 0)[..7],
            &[0.0, 0.0, 1.0, 10.0, 1.0, 0.0, 0.0]
        );
    }
}
