use bitvec::prelude::*;

use super::{ChromosomeSet, GenomeError};

/// Bit-set of chromosomes taking part in a computation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChromosomeSelection {
    bits: BitVec,
}

impl ChromosomeSelection {
    /// Select every chromosome.
    pub fn all(chromosome_count: usize) -> Self {
        Self {
            bits: bitvec![1; chromosome_count],
        }
    }

    /// Select no chromosome.
    pub fn none(chromosome_count: usize) -> Self {
        Self {
            bits: bitvec![0; chromosome_count],
        }
    }

    /// Select the named chromosomes of `set`.
    pub fn from_names<'a, I>(set: &ChromosomeSet, names: I) -> Result<Self, GenomeError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut selection = Self::none(set.len());
        for name in names {
            selection.select(set.require(name)?);
        }
        Ok(selection)
    }

    /// Mark chromosome `index` as selected.
    pub fn select(&mut self, index: usize) {
        if index < self.bits.len() {
            self.bits.set(index, true);
        }
    }

    /// Mark chromosome `index` as not selected.
    pub fn deselect(&mut self, index: usize) {
        if index < self.bits.len() {
            self.bits.set(index, false);
        }
    }

    /// Whether chromosome `index` is selected. Out-of-range indexes are not.
    pub fn is_selected(&self, index: usize) -> bool {
        self.bits.get(index).map(|bit| *bit).unwrap_or(false)
    }

    /// Number of selected chromosomes.
    pub fn count(&self) -> usize {
        self.bits.count_ones()
    }

    /// Whether every chromosome is selected.
    pub fn is_all(&self) -> bool {
        self.bits.all()
    }

    /// Number of chromosomes covered by the selection.
    pub fn len(&self) -> usize {
        self.bits.len()
    }

    /// Whether the selection covers no chromosome.
    pub fn is_empty(&self) -> bool {
        self.bits.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selection_by_name() {
        let set = ChromosomeSet::new([("chr1", 10), ("chr2", 10), ("chr3", 10)]).unwrap();
        let selection = ChromosomeSelection::from_names(&set, ["chr1", "chr3"]).unwrap();
        assert!(selection.is_selected(0));
        assert!(!selection.is_selected(1));
        assert!(selection.is_selected(2));
        assert!(!selection.is_selected(7));
        assert_eq!(selection.count(), 2);
        assert!(!selection.is_all());
        assert!(ChromosomeSelection::all(3).is_all());
    }
}
