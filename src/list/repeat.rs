use std::sync::Arc;

use crate::genome::{ChromosomeSet, ChromosomeShardedList};
use crate::view::ListView;

/// Named family of repeated regions, stored as a mask per chromosome.
#[derive(Debug, Clone, PartialEq)]
pub struct RepeatFamily {
    name: String,
    windows: ChromosomeShardedList<ListView>,
}

impl RepeatFamily {
    pub(crate) fn new(name: String, windows: ChromosomeShardedList<ListView>) -> Self {
        Self { name, windows }
    }

    /// Family name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Mask windows of chromosome `index`.
    pub fn get(&self, index: usize) -> Option<&ListView> {
        self.windows.get(index)
    }

    /// Number of repeats across chromosomes.
    pub fn repeat_count(&self) -> usize {
        self.windows.present().map(|(_, view)| view.len()).sum()
    }
}

/// Repeat families sorted by name.
#[derive(Debug, Clone, PartialEq)]
pub struct RepeatFamilyList {
    chromosomes: Arc<ChromosomeSet>,
    families: Vec<RepeatFamily>,
}

impl RepeatFamilyList {
    pub(crate) fn new(chromosomes: Arc<ChromosomeSet>, mut families: Vec<RepeatFamily>) -> Self {
        families.sort_by(|a, b| a.name.cmp(&b.name));
        Self {
            chromosomes,
            families,
        }
    }

    /// Chromosome set the list is laid out on.
    pub fn chromosomes(&self) -> &Arc<ChromosomeSet> {
        &self.chromosomes
    }

    /// Family called `name`.
    pub fn family(&self, name: &str) -> Option<&RepeatFamily> {
        self.families
            .binary_search_by(|family| family.name.as_str().cmp(name))
            .ok()
            .map(|index| &self.families[index])
    }

    /// Families in name order.
    pub fn iter(&self) -> std::slice::Iter<'_, RepeatFamily> {
        self.families.iter()
    }

    /// Number of families.
    pub fn len(&self) -> usize {
        self.families.len()
    }

    /// Whether no family is present.
    pub fn is_empty(&self) -> bool {
        self.families.is_empty()
    }
}
