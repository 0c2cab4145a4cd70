use serde::{Deserialize, Serialize};

use crate::window::{decode_bf16, encode_bf16, encode_u8, ScorePrecision};

/// Score column stored at a given [`ScorePrecision`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ScoreArray {
    /// Unsigned 8-bit integer scores.
    Bit8(Vec<u8>),
    /// bfloat16 scores.
    Bit16(Vec<u16>),
    /// `f32` scores.
    Bit32(Vec<f32>),
    /// `f64` scores.
    Bit64(Vec<f64>),
}

impl ScoreArray {
    /// Empty column at `precision`.
    pub fn new(precision: ScorePrecision) -> Self {
        Self::with_capacity(precision, 0)
    }

    /// Empty column with room for `capacity` scores.
    pub fn with_capacity(precision: ScorePrecision, capacity: usize) -> Self {
        match precision {
            ScorePrecision::Bit8 => ScoreArray::Bit8(Vec::with_capacity(capacity)),
            ScorePrecision::Bit16 => ScoreArray::Bit16(Vec::with_capacity(capacity)),
            ScorePrecision::Bit32 => ScoreArray::Bit32(Vec::with_capacity(capacity)),
            ScorePrecision::Bit64 => ScoreArray::Bit64(Vec::with_capacity(capacity)),
        }
    }

    /// Column of `len` zero scores.
    pub fn zeros(precision: ScorePrecision, len: usize) -> Self {
        match precision {
            ScorePrecision::Bit8 => ScoreArray::Bit8(vec![0; len]),
            ScorePrecision::Bit16 => ScoreArray::Bit16(vec![0; len]),
            ScorePrecision::Bit32 => ScoreArray::Bit32(vec![0.0; len]),
            ScorePrecision::Bit64 => ScoreArray::Bit64(vec![0.0; len]),
        }
    }

    /// Storage precision.
    pub fn precision(&self) -> ScorePrecision {
        match self {
            ScoreArray::Bit8(_) => ScorePrecision::Bit8,
            ScoreArray::Bit16(_) => ScorePrecision::Bit16,
            ScoreArray::Bit32(_) => ScorePrecision::Bit32,
            ScoreArray::Bit64(_) => ScorePrecision::Bit64,
        }
    }

    /// Number of scores.
    pub fn len(&self) -> usize {
        match self {
            ScoreArray::Bit8(v) => v.len(),
            ScoreArray::Bit16(v) => v.len(),
            ScoreArray::Bit32(v) => v.len(),
            ScoreArray::Bit64(v) => v.len(),
        }
    }

    /// Whether the column is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Decoded score at `index`.
    pub fn get(&self, index: usize) -> Option<f64> {
        match self {
            ScoreArray::Bit8(v) => v.get(index).map(|&s| s as f64),
            ScoreArray::Bit16(v) => v.get(index).map(|&s| decode_bf16(s)),
            ScoreArray::Bit32(v) => v.get(index).map(|&s| s as f64),
            ScoreArray::Bit64(v) => v.get(index).copied(),
        }
    }

    /// Append `score`, returning the value actually stored.
    pub fn push(&mut self, score: f64) -> f64 {
        match self {
            ScoreArray::Bit8(v) => {
                let encoded = encode_u8(score);
                v.push(encoded);
                encoded as f64
            }
            ScoreArray::Bit16(v) => {
                let encoded = encode_bf16(score);
                v.push(encoded);
                decode_bf16(encoded)
            }
            ScoreArray::Bit32(v) => {
                v.push(score as f32);
                score as f32 as f64
            }
            ScoreArray::Bit64(v) => {
                v.push(score);
                score
            }
        }
    }

    /// Overwrite the score at `index`, growing the column with zeros if needed.
    pub fn set(&mut self, index: usize, score: f64) {
        if index >= self.len() {
            self.resize(index + 1);
        }
        match self {
            ScoreArray::Bit8(v) => v[index] = encode_u8(score),
            ScoreArray::Bit16(v) => v[index] = encode_bf16(score),
            ScoreArray::Bit32(v) => v[index] = score as f32,
            ScoreArray::Bit64(v) => v[index] = score,
        }
    }

    /// Grow or shrink to `len`, padding with zeros.
    pub fn resize(&mut self, len: usize) {
        match self {
            ScoreArray::Bit8(v) => v.resize(len, 0),
            ScoreArray::Bit16(v) => v.resize(len, 0),
            ScoreArray::Bit32(v) => v.resize(len, 0.0),
            ScoreArray::Bit64(v) => v.resize(len, 0.0),
        }
    }

    /// Re-encode every score at `precision`.
    pub fn convert(&self, precision: ScorePrecision) -> Self {
        if precision == self.precision() {
            return self.clone();
        }
        let mut converted = Self::with_capacity(precision, self.len());
        for index in 0..self.len() {
            converted.push(self.get(index).unwrap_or(0.0));
        }
        converted
    }

    /// Release excess capacity.
    pub fn shrink_to_fit(&mut self) {
        match self {
            ScoreArray::Bit8(v) => v.shrink_to_fit(),
            ScoreArray::Bit16(v) => v.shrink_to_fit(),
            ScoreArray::Bit32(v) => v.shrink_to_fit(),
            ScoreArray::Bit64(v) => v.shrink_to_fit(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_reports_stored_value() {
        let mut bytes = ScoreArray::new(ScorePrecision::Bit8);
        assert_eq!(bytes.push(2.7), 3.0);
        assert_eq!(bytes.push(300.0), 255.0);
        assert_eq!(bytes.get(1), Some(255.0));

        let mut doubles = ScoreArray::new(ScorePrecision::Bit64);
        assert_eq!(doubles.push(0.125), 0.125);
    }

    #[test]
    fn set_grows_and_convert_reencodes() {
        let mut scores = ScoreArray::zeros(ScorePrecision::Bit32, 2);
        scores.set(4, 1.5);
        assert_eq!(scores.len(), 5);
        assert_eq!(scores.get(3), Some(0.0));
        let converted = scores.convert(ScorePrecision::Bit8);
        assert_eq!(converted.precision(), ScorePrecision::Bit8);
        assert_eq!(converted.get(4), Some(2.0));
    }
}
