//! Immutable, restartable views over the windows of one chromosome and the
//! builders that produce them.
//!
//! A [`ListView`] is cheap to clone (the storage sits behind an `Arc`) and is
//! never mutated once a builder returns it. Three storages exist:
//!
//! - interval windows with an explicit score column,
//! - mask windows whose score is implicitly `1` and never stored,
//! - fixed-size bins whose positions are implicit (`start = i * bin_size`);
//!   their windows are materialised lazily on access.

mod builder;
mod scores;

pub use builder::{BinViewBuilder, ListViewBuilder, MaskViewBuilder, ScwViewBuilder, ViewBuilder};
pub use scores::ScoreArray;

use std::sync::Arc;

use thiserror::Error;

use crate::window::{ScorePrecision, ScoredWindow};

/// Builder contract violations.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ViewError {
    /// A window started before the previously added one.
    #[error("window starting at {start} added after a window starting at {previous}")]
    Unsorted {
        /// Start of the previously accepted window.
        previous: u32,
        /// Start of the rejected window.
        start: u32,
    },

    /// A window overlapped the previously added one while overlaps are rejected.
    #[error("window starting at {start} overlaps the previous window ending at {previous_stop}")]
    Overlapping {
        /// Stop of the previously accepted window.
        previous_stop: u32,
        /// Start of the rejected window.
        start: u32,
    },

    /// A chromosome index outside the chromosome set was addressed.
    #[error("chromosome index {index} out of range ({count} chromosomes)")]
    UnknownChromosome {
        /// Requested index.
        index: usize,
        /// Number of chromosomes in the set.
        count: usize,
    },
}

#[derive(Debug)]
enum ViewStorage {
    Windows {
        starts: Vec<u32>,
        stops: Vec<u32>,
        scores: ScoreArray,
    },
    Mask {
        starts: Vec<u32>,
        stops: Vec<u32>,
    },
    Bins {
        bin_size: u32,
        scores: ScoreArray,
    },
}

/// Randomly indexable, restartable sequence of scored windows.
#[derive(Debug, Clone)]
pub struct ListView {
    storage: Arc<ViewStorage>,
}

impl ListView {
    /// View holding no window.
    pub fn empty() -> Self {
        Self::from_windows(Vec::new(), Vec::new(), ScoreArray::new(ScorePrecision::default()))
    }

    pub(crate) fn from_windows(starts: Vec<u32>, stops: Vec<u32>, scores: ScoreArray) -> Self {
        Self {
            storage: Arc::new(ViewStorage::Windows {
                starts,
                stops,
                scores,
            }),
        }
    }

    pub(crate) fn from_mask(starts: Vec<u32>, stops: Vec<u32>) -> Self {
        Self {
            storage: Arc::new(ViewStorage::Mask { starts, stops }),
        }
    }

    /// View over fixed bins of `bin_size` bases.
    pub fn from_bin_scores(bin_size: u32, scores: ScoreArray) -> Self {
        Self {
            storage: Arc::new(ViewStorage::Bins {
                bin_size: bin_size.max(1),
                scores,
            }),
        }
    }

    /// Number of windows (bins included, whatever their score).
    pub fn len(&self) -> usize {
        match self.storage.as_ref() {
            ViewStorage::Windows { starts, .. } | ViewStorage::Mask { starts, .. } => starts.len(),
            ViewStorage::Bins { scores, .. } => scores.len(),
        }
    }

    /// Whether the view holds no window.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Window at `index`.
    pub fn get(&self, index: usize) -> Option<ScoredWindow> {
        match self.storage.as_ref() {
            ViewStorage::Windows {
                starts,
                stops,
                scores,
            } => Some(ScoredWindow::new(
                *starts.get(index)?,
                *stops.get(index)?,
                scores.get(index)?,
            )),
            ViewStorage::Mask { starts, stops } => Some(ScoredWindow::new(
                *starts.get(index)?,
                *stops.get(index)?,
                1.0,
            )),
            ViewStorage::Bins { bin_size, scores } => {
                let score = scores.get(index)?;
                let start = index as u32 * bin_size;
                Some(ScoredWindow::new(start, start + bin_size, score))
            }
        }
    }

    /// Score of the window at `index`.
    pub fn score(&self, index: usize) -> Option<f64> {
        match self.storage.as_ref() {
            ViewStorage::Windows { scores, .. } | ViewStorage::Bins { scores, .. } => {
                scores.get(index)
            }
            ViewStorage::Mask { starts, .. } => (index < starts.len()).then_some(1.0),
        }
    }

    /// First window.
    pub fn first(&self) -> Option<ScoredWindow> {
        self.get(0)
    }

    /// Last window.
    pub fn last(&self) -> Option<ScoredWindow> {
        self.len().checked_sub(1).and_then(|idx| self.get(idx))
    }

    /// Iterate the windows from the start; may be called any number of times.
    pub fn iter(&self) -> ListViewIter<'_> {
        ListViewIter {
            view: self,
            index: 0,
            end: self.len(),
        }
    }

    /// Bin width when the view stores fixed bins.
    pub fn bin_size(&self) -> Option<u32> {
        match self.storage.as_ref() {
            ViewStorage::Bins { bin_size, .. } => Some(*bin_size),
            _ => None,
        }
    }

    /// Whether the view stores mask windows.
    pub fn is_mask(&self) -> bool {
        matches!(self.storage.as_ref(), ViewStorage::Mask { .. })
    }

    /// Score precision, `None` for masks.
    pub fn precision(&self) -> Option<ScorePrecision> {
        match self.storage.as_ref() {
            ViewStorage::Windows { scores, .. } | ViewStorage::Bins { scores, .. } => {
                Some(scores.precision())
            }
            ViewStorage::Mask { .. } => None,
        }
    }

    /// Raw score column of a bin view.
    pub fn bin_scores(&self) -> Option<&ScoreArray> {
        match self.storage.as_ref() {
            ViewStorage::Bins { scores, .. } => Some(scores),
            _ => None,
        }
    }

    /// Index of the first window whose stop lies after `position`.
    ///
    /// Relies on the view being sorted and non-overlapping.
    pub fn first_index_after(&self, position: u32) -> usize {
        match self.storage.as_ref() {
            ViewStorage::Windows { stops, .. } | ViewStorage::Mask { stops, .. } => {
                stops.partition_point(|&stop| stop <= position)
            }
            ViewStorage::Bins { bin_size, scores } => {
                ((position / bin_size) as usize).min(scores.len())
            }
        }
    }

    /// Same windows stored at another precision (masks are returned as is).
    pub fn with_precision(&self, precision: ScorePrecision) -> Self {
        match self.storage.as_ref() {
            ViewStorage::Windows {
                starts,
                stops,
                scores,
            } => Self::from_windows(starts.clone(), stops.clone(), scores.convert(precision)),
            ViewStorage::Mask { .. } => self.clone(),
            ViewStorage::Bins { bin_size, scores } => {
                Self::from_bin_scores(*bin_size, scores.convert(precision))
            }
        }
    }

    /// Copy backed by freshly allocated storage.
    pub fn deep_clone(&self) -> Self {
        let storage = match self.storage.as_ref() {
            ViewStorage::Windows {
                starts,
                stops,
                scores,
            } => ViewStorage::Windows {
                starts: starts.clone(),
                stops: stops.clone(),
                scores: scores.clone(),
            },
            ViewStorage::Mask { starts, stops } => ViewStorage::Mask {
                starts: starts.clone(),
                stops: stops.clone(),
            },
            ViewStorage::Bins { bin_size, scores } => ViewStorage::Bins {
                bin_size: *bin_size,
                scores: scores.clone(),
            },
        };
        Self {
            storage: Arc::new(storage),
        }
    }

    /// Whether two views share the same storage.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.storage, &other.storage)
    }

    /// Materialise every window.
    pub fn to_vec(&self) -> Vec<ScoredWindow> {
        self.iter().collect()
    }

    /// Approximate heap footprint in bytes.
    pub fn memory_usage(&self) -> usize {
        match self.storage.as_ref() {
            ViewStorage::Windows { starts, scores, .. } => {
                starts.len() * 8 + scores.len() * scores.precision().bytes()
            }
            ViewStorage::Mask { starts, .. } => starts.len() * 8,
            ViewStorage::Bins { scores, .. } => scores.len() * scores.precision().bytes(),
        }
    }
}

impl PartialEq for ListView {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().zip(other.iter()).all(|(a, b)| a == b)
    }
}

impl<'a> IntoIterator for &'a ListView {
    type Item = ScoredWindow;
    type IntoIter = ListViewIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator over the windows of a [`ListView`].
#[derive(Debug, Clone)]
pub struct ListViewIter<'a> {
    view: &'a ListView,
    index: usize,
    end: usize,
}

impl Iterator for ListViewIter<'_> {
    type Item = ScoredWindow;

    fn next(&mut self) -> Option<Self::Item> {
        if self.index >= self.end {
            return None;
        }
        let window = self.view.get(self.index);
        self.index += 1;
        window
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.end - self.index;
        (remaining, Some(remaining))
    }
}

impl DoubleEndedIterator for ListViewIter<'_> {
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.index >= self.end {
            return None;
        }
        self.end -= 1;
        self.view.get(self.end)
    }
}

impl ExactSizeIterator for ListViewIter<'_> {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bin_views_materialise_positions() {
        let mut scores = ScoreArray::zeros(ScorePrecision::Bit32, 3);
        scores.set(1, 4.0);
        let view = ListView::from_bin_scores(10, scores);
        assert_eq!(view.len(), 3);
        assert_eq!(view.get(1), Some(ScoredWindow::new(10, 20, 4.0)));
        assert_eq!(view.bin_size(), Some(10));
        assert_eq!(view.first_index_after(25), 2);
    }

    #[test]
    fn iteration_is_restartable() {
        let view = ListView::from_windows(
            vec![0, 10],
            vec![5, 20],
            ScoreArray::Bit64(vec![1.0, 2.0]),
        );
        let first: Vec<_> = view.iter().collect();
        let second: Vec<_> = view.iter().collect();
        assert_eq!(first, second);
        assert_eq!(view.iter().rev().next(), Some(ScoredWindow::new(10, 20, 2.0)));
        assert_eq!(view.first_index_after(5), 1);
        assert_eq!(view.first_index_after(4), 0);
    }

    #[test]
    fn mask_scores_are_implicit() {
        let view = ListView::from_mask(vec![3], vec![9]);
        assert_eq!(view.get(0), Some(ScoredWindow::new(3, 9, 1.0)));
        assert_eq!(view.precision(), None);
        assert!(view.is_mask());
    }

    #[test]
    fn deep_clone_detaches_storage() {
        let view = ListView::from_mask(vec![3], vec![9]);
        let shallow = view.clone();
        let deep = view.deep_clone();
        assert!(view.ptr_eq(&shallow));
        assert!(!view.ptr_eq(&deep));
        assert_eq!(view, deep);
    }
}
