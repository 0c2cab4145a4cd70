use serde::Serialize;

use crate::genome::ChromosomeShardedList;
use crate::view::ListView;
use crate::window::ScoredWindow;

/// First-pass aggregate of the non-null windows of one chromosome.
///
/// Averages are weighted by window length, so a bin list and the interval
/// list it was built from report the same average.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChromosomeSummary {
    /// Smallest non-null score.
    pub minimum: f64,
    /// Largest non-null score.
    pub maximum: f64,
    /// Sum of `score * length`.
    pub weighted_sum: f64,
    /// Sum of the non-null scores.
    pub score_sum: f64,
    /// Bases covered by non-null windows.
    pub non_null_length: u64,
    /// Number of non-null windows.
    pub non_null_windows: u64,
    /// Number of windows, null ones included.
    pub window_count: u64,
}

impl Default for ChromosomeSummary {
    fn default() -> Self {
        Self {
            minimum: f64::INFINITY,
            maximum: f64::NEG_INFINITY,
            weighted_sum: 0.0,
            score_sum: 0.0,
            non_null_length: 0,
            non_null_windows: 0,
            window_count: 0,
        }
    }
}

impl ChromosomeSummary {
    /// Summarise `windows`.
    pub fn from_windows<I>(windows: I) -> Self
    where
        I: IntoIterator<Item = ScoredWindow>,
    {
        let mut summary = Self::default();
        for window in windows {
            summary.window_count += 1;
            if window.is_null() || window.is_empty() {
                continue;
            }
            let length = window.len() as u64;
            summary.minimum = summary.minimum.min(window.score);
            summary.maximum = summary.maximum.max(window.score);
            summary.weighted_sum += window.score * length as f64;
            summary.score_sum += window.score;
            summary.non_null_length += length;
            summary.non_null_windows += 1;
        }
        summary
    }

    /// Summarise every window of `view`.
    pub fn from_view(view: &ListView) -> Self {
        Self::from_windows(view.iter())
    }

    /// Fold `other` into `self`.
    pub fn merge(&mut self, other: &Self) {
        self.minimum = self.minimum.min(other.minimum);
        self.maximum = self.maximum.max(other.maximum);
        self.weighted_sum += other.weighted_sum;
        self.score_sum += other.score_sum;
        self.non_null_length += other.non_null_length;
        self.non_null_windows += other.non_null_windows;
        self.window_count += other.window_count;
    }

    /// Length-weighted mean, `0` when nothing is covered.
    pub fn average(&self) -> f64 {
        if self.non_null_length == 0 {
            0.0
        } else {
            self.weighted_sum / self.non_null_length as f64
        }
    }

    /// Fold summaries in chromosome order.
    pub fn fold<'a, I>(summaries: I) -> Self
    where
        I: IntoIterator<Item = &'a ChromosomeSummary>,
    {
        let mut total = Self::default();
        for summary in summaries {
            total.merge(summary);
        }
        total
    }
}

/// `Σ length * (score - mean)²` over the non-null windows.
pub fn squared_deviation<I>(windows: I, mean: f64) -> f64
where
    I: IntoIterator<Item = ScoredWindow>,
{
    windows
        .into_iter()
        .filter(|w| !w.is_null() && !w.is_empty())
        .map(|w| {
            let delta = w.score - mean;
            delta * delta * w.len() as f64
        })
        .sum()
}

/// Second-pass sums of one chromosome.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Deviation {
    /// Squared deviation from the genome-wide mean.
    pub from_genome_mean: f64,
    /// Squared deviation from the chromosome mean.
    pub from_chromosome_mean: f64,
}

/// Cached statistics of a chromosome or of the whole genome.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct ChromosomeStatistics {
    /// Smallest non-null score (`0` when there is none).
    pub minimum: f64,
    /// Largest non-null score (`0` when there is none).
    pub maximum: f64,
    /// Length-weighted mean of the non-null scores.
    pub average: f64,
    /// Length-weighted population standard deviation.
    pub standard_deviation: f64,
    /// Sum of the non-null scores.
    pub score_sum: f64,
    /// Bases covered by non-null windows.
    pub non_null_length: u64,
    /// Number of non-null windows.
    pub non_null_window_count: u64,
    /// Number of windows, null ones included.
    pub window_count: u64,
}

impl ChromosomeStatistics {
    fn from_parts(summary: &ChromosomeSummary, squared_deviation: f64) -> Self {
        if summary.non_null_length == 0 {
            return Self {
                window_count: summary.window_count,
                ..Self::default()
            };
        }
        Self {
            minimum: summary.minimum,
            maximum: summary.maximum,
            average: summary.average(),
            standard_deviation: (squared_deviation / summary.non_null_length as f64).sqrt(),
            score_sum: summary.score_sum,
            non_null_length: summary.non_null_length,
            non_null_window_count: summary.non_null_windows,
            window_count: summary.window_count,
        }
    }
}

/// Genome-wide statistics plus the statistics of each present chromosome.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListStatistics {
    genome: ChromosomeStatistics,
    chromosomes: Vec<Option<ChromosomeStatistics>>,
}

impl ListStatistics {
    /// Compute sequentially on the calling thread.
    pub fn compute(shards: &ChromosomeShardedList<ListView>) -> Self {
        let summaries: Vec<Option<ChromosomeSummary>> = shards
            .iter()
            .map(|(_, view)| view.map(ChromosomeSummary::from_view))
            .collect();
        let genome_mean = ChromosomeSummary::fold(summaries.iter().flatten()).average();
        let deviations: Vec<Option<Deviation>> = shards
            .iter()
            .zip(&summaries)
            .map(|((_, view), summary)| {
                let view = view?;
                let summary = summary.as_ref()?;
                Some(Deviation {
                    from_genome_mean: squared_deviation(view.iter(), genome_mean),
                    from_chromosome_mean: squared_deviation(view.iter(), summary.average()),
                })
            })
            .collect();
        Self::assemble(&summaries, &deviations)
    }

    /// Combine per-chromosome passes, folding in chromosome order.
    ///
    /// Both the sequential cache and the parallel statistics operation go
    /// through this function so they agree bit for bit.
    pub fn assemble(
        summaries: &[Option<ChromosomeSummary>],
        deviations: &[Option<Deviation>],
    ) -> Self {
        let genome_summary = ChromosomeSummary::fold(summaries.iter().flatten());
        let genome_deviation: f64 = deviations
            .iter()
            .flatten()
            .map(|d| d.from_genome_mean)
            .sum();
        let chromosomes = summaries
            .iter()
            .enumerate()
            .map(|(index, summary)| {
                summary.as_ref().map(|summary| {
                    let deviation = deviations
                        .get(index)
                        .copied()
                        .flatten()
                        .unwrap_or_default();
                    ChromosomeStatistics::from_parts(summary, deviation.from_chromosome_mean)
                })
            })
            .collect();
        Self {
            genome: ChromosomeStatistics::from_parts(&genome_summary, genome_deviation),
            chromosomes,
        }
    }

    /// Genome-wide statistics.
    pub fn genome(&self) -> &ChromosomeStatistics {
        &self.genome
    }

    /// Statistics of chromosome `index`, `None` when its shard is absent.
    pub fn chromosome(&self, index: usize) -> Option<&ChromosomeStatistics> {
        self.chromosomes.get(index).and_then(Option::as_ref)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::view::{ListViewBuilder, ScwViewBuilder};
    use crate::window::ScorePrecision;

    fn view(windows: &[(u32, u32, f64)]) -> ListView {
        let mut builder = ScwViewBuilder::new(ScorePrecision::Bit64);
        for &(start, stop, score) in windows {
            builder.add_element(start, stop, score).unwrap();
        }
        builder.build()
    }

    #[test]
    fn averages_are_length_weighted() {
        let summary = ChromosomeSummary::from_view(&view(&[(0, 10, 1.0), (10, 40, 3.0)]));
        assert_eq!(summary.average(), 2.5);
        assert_eq!(summary.score_sum, 4.0);
        assert_eq!(summary.non_null_length, 40);
    }

    #[test]
    fn genome_statistics_fold_chromosomes() {
        let shards = ChromosomeShardedList::from_shards(vec![
            Some(view(&[(0, 10, 2.0)])),
            None,
            Some(view(&[(0, 10, 4.0)])),
        ]);
        let stats = ListStatistics::compute(&shards);
        assert_eq!(stats.genome().average, 3.0);
        assert_eq!(stats.genome().standard_deviation, 1.0);
        assert_eq!(stats.genome().minimum, 2.0);
        assert_eq!(stats.genome().maximum, 4.0);
        assert!(stats.chromosome(1).is_none());
        assert_eq!(stats.chromosome(2).map(|s| s.standard_deviation), Some(0.0));
    }

    #[test]
    fn empty_genome_short_circuits_to_zero() {
        let shards = ChromosomeShardedList::from_shards(vec![Some(ListView::empty())]);
        let stats = ListStatistics::compute(&shards);
        assert_eq!(stats.genome(), &ChromosomeStatistics::default());
    }
}
