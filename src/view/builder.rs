use super::{ListView, ScoreArray, ViewError};
use crate::window::{ScorePrecision, ScoredWindow};

/// Accumulates windows in non-decreasing start order into a [`ListView`].
pub trait ListViewBuilder {
    /// Append the window `[start, stop)` with `score`.
    fn add_element(&mut self, start: u32, stop: u32, score: f64) -> Result<(), ViewError>;

    /// Append an existing window.
    fn add_window(&mut self, window: &ScoredWindow) -> Result<(), ViewError> {
        self.add_element(window.start, window.stop, window.score)
    }

    /// Freeze the accumulated windows.
    fn build(self) -> ListView
    where
        Self: Sized;
}

/// Builder of interval windows with an explicit score column.
///
/// Zero-length windows and windows whose stored score is zero are dropped.
/// Starts must be non-decreasing; overlaps are rejected unless the builder
/// was created with [`ScwViewBuilder::allowing_overlaps`], in which case the
/// resulting view does not satisfy the non-overlap invariant and must go
/// through a cleaning operation before being used by operations relying on it.
#[derive(Debug, Clone)]
pub struct ScwViewBuilder {
    starts: Vec<u32>,
    stops: Vec<u32>,
    scores: ScoreArray,
    allow_overlaps: bool,
    merge_adjacent: bool,
    last_start: Option<u32>,
}

impl ScwViewBuilder {
    /// Builder storing scores at `precision`.
    pub fn new(precision: ScorePrecision) -> Self {
        Self {
            starts: Vec::new(),
            stops: Vec::new(),
            scores: ScoreArray::new(precision),
            allow_overlaps: false,
            merge_adjacent: false,
            last_start: None,
        }
    }

    /// Accept overlapping windows (sorted starts are still required).
    pub fn allowing_overlaps(mut self) -> Self {
        self.allow_overlaps = true;
        self
    }

    /// Fuse a window into its predecessor when they touch and share a score.
    pub fn merging_adjacent(mut self) -> Self {
        self.merge_adjacent = true;
        self
    }

    /// Number of windows accumulated so far.
    pub fn len(&self) -> usize {
        self.starts.len()
    }

    /// Whether no window was accumulated.
    pub fn is_empty(&self) -> bool {
        self.starts.is_empty()
    }
}

impl ListViewBuilder for ScwViewBuilder {
    fn add_element(&mut self, start: u32, stop: u32, score: f64) -> Result<(), ViewError> {
        let stored = self.scores.precision().round_trip(score);
        if stop <= start || stored == 0.0 || stored.is_nan() {
            return Ok(());
        }
        if let Some(previous) = self.last_start {
            if start < previous {
                return Err(ViewError::Unsorted { previous, start });
            }
        }
        if let Some(&previous_stop) = self.stops.last() {
            if !self.allow_overlaps && start < previous_stop {
                return Err(ViewError::Overlapping {
                    previous_stop,
                    start,
                });
            }
            let last = self.stops.len() - 1;
            if self.merge_adjacent
                && start == previous_stop
                && self.scores.get(last) == Some(stored)
            {
                self.stops[last] = stop;
                self.last_start = Some(start);
                return Ok(());
            }
        }
        self.starts.push(start);
        self.stops.push(stop);
        self.scores.push(score);
        self.last_start = Some(start);
        Ok(())
    }

    fn build(mut self) -> ListView {
        self.starts.shrink_to_fit();
        self.stops.shrink_to_fit();
        self.scores.shrink_to_fit();
        ListView::from_windows(self.starts, self.stops, self.scores)
    }
}

/// Builder of mask windows; touching or overlapping windows are fused.
#[derive(Debug, Clone, Default)]
pub struct MaskViewBuilder {
    starts: Vec<u32>,
    stops: Vec<u32>,
}

impl MaskViewBuilder {
    /// Empty mask builder.
    pub fn new() -> Self {
        Self::default()
    }
}

impl ListViewBuilder for MaskViewBuilder {
    fn add_element(&mut self, start: u32, stop: u32, _score: f64) -> Result<(), ViewError> {
        if stop <= start {
            return Ok(());
        }
        if let Some(&previous) = self.starts.last() {
            if start < previous {
                return Err(ViewError::Unsorted { previous, start });
            }
        }
        match self.stops.last_mut() {
            Some(last_stop) if start <= *last_stop => {
                *last_stop = (*last_stop).max(stop);
            }
            _ => {
                self.starts.push(start);
                self.stops.push(stop);
            }
        }
        Ok(())
    }

    fn build(self) -> ListView {
        ListView::from_mask(self.starts, self.stops)
    }
}

/// Builder of fixed-size bins.
///
/// Every bin overlapped by an added window receives the window score; bins
/// must be filled in increasing order and never twice.
#[derive(Debug, Clone)]
pub struct BinViewBuilder {
    bin_size: u32,
    scores: ScoreArray,
    next_bin: usize,
}

impl BinViewBuilder {
    /// Builder of bins of `bin_size` bases (clamped to at least one).
    pub fn new(bin_size: u32, precision: ScorePrecision) -> Self {
        Self {
            bin_size: bin_size.max(1),
            scores: ScoreArray::new(precision),
            next_bin: 0,
        }
    }

    /// Pre-size the view to `bin_count` zero bins.
    pub fn with_bin_count(mut self, bin_count: usize) -> Self {
        if self.scores.len() < bin_count {
            self.scores.resize(bin_count);
        }
        self
    }

    /// Bin width.
    pub fn bin_size(&self) -> u32 {
        self.bin_size
    }

    /// Set the score of bin `index`.
    pub fn set_bin(&mut self, index: usize, score: f64) -> Result<(), ViewError> {
        if index < self.next_bin {
            return Err(ViewError::Unsorted {
                previous: (self.next_bin as u32 - 1) * self.bin_size,
                start: index as u32 * self.bin_size,
            });
        }
        self.scores.set(index, score);
        self.next_bin = index + 1;
        Ok(())
    }
}

impl ListViewBuilder for BinViewBuilder {
    fn add_element(&mut self, start: u32, stop: u32, score: f64) -> Result<(), ViewError> {
        if stop <= start {
            return Ok(());
        }
        let first = (start / self.bin_size) as usize;
        let last = ((stop - 1) / self.bin_size) as usize;
        for bin in first..=last {
            self.set_bin(bin, score)?;
        }
        Ok(())
    }

    fn build(mut self) -> ListView {
        self.scores.shrink_to_fit();
        ListView::from_bin_scores(self.bin_size, self.scores)
    }
}

/// Any of the view builders, chosen to match the type of a list.
#[derive(Debug, Clone)]
pub enum ViewBuilder {
    /// Interval windows.
    Windows(ScwViewBuilder),
    /// Mask windows.
    Mask(MaskViewBuilder),
    /// Fixed bins.
    Bins(BinViewBuilder),
}

impl ListViewBuilder for ViewBuilder {
    fn add_element(&mut self, start: u32, stop: u32, score: f64) -> Result<(), ViewError> {
        match self {
            ViewBuilder::Windows(builder) => builder.add_element(start, stop, score),
            ViewBuilder::Mask(builder) => builder.add_element(start, stop, score),
            ViewBuilder::Bins(builder) => builder.add_element(start, stop, score),
        }
    }

    fn build(self) -> ListView {
        match self {
            ViewBuilder::Windows(builder) => builder.build(),
            ViewBuilder::Mask(builder) => builder.build(),
            ViewBuilder::Bins(builder) => builder.build(),
        }
    }
}
