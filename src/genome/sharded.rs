/// Genome-wide container holding one ordered shard per chromosome.
///
/// A shard may be absent (`None`), meaning "no data for this chromosome",
/// which is distinct from an empty shard. Instances are assembled once and
/// then only read; transformations always produce a new container.
#[derive(Debug, Clone, PartialEq)]
pub struct ChromosomeShardedList<T> {
    shards: Vec<Option<T>>,
}

impl<T> ChromosomeShardedList<T> {
    /// Container with `chromosome_count` absent shards.
    pub fn new(chromosome_count: usize) -> Self {
        Self {
            shards: (0..chromosome_count).map(|_| None).collect(),
        }
    }

    /// Wrap shards already ordered by chromosome index.
    pub fn from_shards(shards: Vec<Option<T>>) -> Self {
        Self { shards }
    }

    /// Number of chromosomes covered (present or absent).
    pub fn len(&self) -> usize {
        self.shards.len()
    }

    /// Whether the container covers no chromosome.
    pub fn is_empty(&self) -> bool {
        self.shards.is_empty()
    }

    /// Shard of chromosome `index`, if present.
    pub fn get(&self, index: usize) -> Option<&T> {
        self.shards.get(index).and_then(Option::as_ref)
    }

    /// Install the shard of chromosome `index` (construction only).
    pub fn set(&mut self, index: usize, shard: T) {
        if index >= self.shards.len() {
            self.shards.resize_with(index + 1, || None);
        }
        self.shards[index] = Some(shard);
    }

    /// Shard of chromosome `index`, created with `init` when absent.
    ///
    /// Returns `None` when `index` lies outside the genome.
    pub fn get_or_insert_with<F>(&mut self, index: usize, init: F) -> Option<&mut T>
    where
        F: FnOnce() -> T,
    {
        self.shards
            .get_mut(index)
            .map(|slot| slot.get_or_insert_with(init))
    }

    /// Remove the shard of chromosome `index`, leaving it absent.
    pub fn clear(&mut self, index: usize) -> Option<T> {
        self.shards.get_mut(index).and_then(Option::take)
    }

    /// Iterate `(index, shard)` pairs including absent shards.
    pub fn iter(&self) -> impl Iterator<Item = (usize, Option<&T>)> {
        self.shards.iter().enumerate().map(|(idx, s)| (idx, s.as_ref()))
    }

    /// Iterate present shards only.
    pub fn present(&self) -> impl Iterator<Item = (usize, &T)> {
        self.shards
            .iter()
            .enumerate()
            .filter_map(|(idx, s)| s.as_ref().map(|s| (idx, s)))
    }

    /// Transform every present shard, keeping absent shards absent.
    pub fn map<U, F>(&self, mut f: F) -> ChromosomeShardedList<U>
    where
        F: FnMut(usize, &T) -> U,
    {
        ChromosomeShardedList {
            shards: self
                .shards
                .iter()
                .enumerate()
                .map(|(idx, s)| s.as_ref().map(|s| f(idx, s)))
                .collect(),
        }
    }

    /// Unwrap the per-chromosome shards.
    pub fn into_shards(self) -> Vec<Option<T>> {
        self.shards
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_and_empty_shards_are_distinct() {
        let mut list: ChromosomeShardedList<Vec<u32>> = ChromosomeShardedList::new(3);
        list.set(1, Vec::new());
        assert!(list.get(0).is_none());
        assert_eq!(list.get(1).map(Vec::len), Some(0));
        assert_eq!(list.present().count(), 1);
    }

    #[test]
    fn map_keeps_layout() {
        let list = ChromosomeShardedList::from_shards(vec![Some(2), None, Some(5)]);
        let doubled = list.map(|_, v| v * 2);
        assert_eq!(doubled.into_shards(), vec![Some(4), None, Some(10)]);
    }
}
