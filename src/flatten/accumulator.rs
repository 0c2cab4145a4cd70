use crate::window::ScoreOperation;

/// Running aggregate of the windows overlapping one output bin.
#[derive(Debug, Clone, Copy)]
pub(crate) struct BinAccumulator {
    weighted_sum: f64,
    covered: u64,
    count: u32,
    maximum: f64,
    minimum: f64,
}

impl Default for BinAccumulator {
    fn default() -> Self {
        Self {
            weighted_sum: 0.0,
            covered: 0,
            count: 0,
            maximum: f64::NEG_INFINITY,
            minimum: f64::INFINITY,
        }
    }
}

impl BinAccumulator {
    pub(crate) fn observe(&mut self, score: f64, overlap: u32) {
        if overlap == 0 {
            return;
        }
        self.weighted_sum += score * overlap as f64;
        self.covered += overlap as u64;
        self.count += 1;
        self.maximum = self.maximum.max(score);
        self.minimum = self.minimum.min(score);
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Bin value: overlap-weighted mean for averages, overlap-weighted sum
    /// scaled to the bin width for additions.
    pub(crate) fn value(&self, operation: ScoreOperation, bin_size: u32) -> f64 {
        if self.is_empty() {
            return 0.0;
        }
        match operation {
            ScoreOperation::Average => self.weighted_sum / self.covered as f64,
            ScoreOperation::Addition => self.weighted_sum / bin_size as f64,
            ScoreOperation::Maximum => self.maximum,
            ScoreOperation::Minimum => self.minimum,
            ScoreOperation::Count => self.count as f64,
            _ => 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weighting_by_overlap() {
        let mut acc = BinAccumulator::default();
        acc.observe(4.0, 5);
        acc.observe(2.0, 5);
        acc.observe(9.0, 0);
        assert_eq!(acc.value(ScoreOperation::Average, 10), 3.0);
        assert_eq!(acc.value(ScoreOperation::Addition, 10), 3.0);
        assert_eq!(acc.value(ScoreOperation::Maximum, 10), 4.0);
        assert_eq!(acc.value(ScoreOperation::Count, 10), 2.0);
    }
}
