//! Value types shared by every list: scored windows, score storage
//! precision and the score operators used to aggregate or combine them.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Half-open `[start, stop)` interval on one chromosome carrying a score.
///
/// A score of zero is the "no data" sentinel throughout the crate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoredWindow {
    /// 0-based first position.
    pub start: u32,
    /// Exclusive end position.
    pub stop: u32,
    /// Window score.
    pub score: f64,
}

impl ScoredWindow {
    /// Construct a new window.
    pub fn new(start: u32, stop: u32, score: f64) -> Self {
        Self { start, stop, score }
    }

    /// Length in base pairs.
    pub fn len(&self) -> u32 {
        self.stop.saturating_sub(self.start)
    }

    /// Whether the window covers no base.
    pub fn is_empty(&self) -> bool {
        self.stop <= self.start
    }

    /// Whether the window carries data (non-zero score).
    pub fn is_null(&self) -> bool {
        self.score == 0.0
    }

    /// Middle of the window, used as its coordinate by smoothing kernels.
    pub fn midpoint(&self) -> f64 {
        (self.start as f64 + self.stop as f64) / 2.0
    }

    /// Number of bases shared with `[start, stop)`.
    pub fn overlap(&self, start: u32, stop: u32) -> u32 {
        let lo = self.start.max(start);
        let hi = self.stop.min(stop);
        hi.saturating_sub(lo)
    }
}

/// Error returned when parsing one of the enums of this module.
#[derive(Debug, Error)]
#[error("unrecognised {kind} '{value}'")]
pub struct ParseEnumError {
    kind: &'static str,
    value: String,
}

impl ParseEnumError {
    pub(crate) fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

/// Storage width of list scores. Affects memory, not the operations applied.
///
/// `Bit8` keeps unsigned integer scores (0..=255, rounded), `Bit16` keeps a
/// bfloat16 (the upper half of an `f32`), `Bit32` and `Bit64` keep IEEE floats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ScorePrecision {
    /// 8-bit unsigned integer scores.
    Bit8,
    /// 16-bit bfloat scores.
    Bit16,
    /// 32-bit float scores.
    #[default]
    Bit32,
    /// 64-bit float scores.
    Bit64,
}

impl ScorePrecision {
    /// Bytes used per stored score.
    pub fn bytes(self) -> usize {
        match self {
            ScorePrecision::Bit8 => 1,
            ScorePrecision::Bit16 => 2,
            ScorePrecision::Bit32 => 4,
            ScorePrecision::Bit64 => 8,
        }
    }

    /// Value actually stored for `score` at this precision.
    pub fn round_trip(self, score: f64) -> f64 {
        match self {
            ScorePrecision::Bit8 => encode_u8(score) as f64,
            ScorePrecision::Bit16 => decode_bf16(encode_bf16(score)),
            ScorePrecision::Bit32 => score as f32 as f64,
            ScorePrecision::Bit64 => score,
        }
    }
}

impl fmt::Display for ScorePrecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ScorePrecision::Bit8 => "8",
            ScorePrecision::Bit16 => "16",
            ScorePrecision::Bit32 => "32",
            ScorePrecision::Bit64 => "64",
        };
        write!(f, "{name}-bit")
    }
}

impl FromStr for ScorePrecision {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().trim_end_matches("-bit").to_ascii_lowercase().as_str() {
            "8" => Ok(ScorePrecision::Bit8),
            "16" => Ok(ScorePrecision::Bit16),
            "32" => Ok(ScorePrecision::Bit32),
            "64" => Ok(ScorePrecision::Bit64),
            _ => Err(ParseEnumError::new("score precision", s)),
        }
    }
}

pub(crate) fn encode_u8(score: f64) -> u8 {
    if score.is_nan() {
        return 0;
    }
    score.round().clamp(0.0, u8::MAX as f64) as u8
}

pub(crate) fn encode_bf16(score: f64) -> u16 {
    let bits = (score as f32).to_bits();
    // round to nearest, ties to even
    let rounding = 0x7FFF + ((bits >> 16) & 1);
    (bits.wrapping_add(rounding) >> 16) as u16
}

pub(crate) fn decode_bf16(value: u16) -> f64 {
    f32::from_bits((value as u32) << 16) as f64
}

/// Operator used to aggregate overlapping windows or combine two lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScoreOperation {
    /// Sum of the scores.
    Addition,
    /// First score minus the second.
    Subtraction,
    /// Product of the scores.
    Multiplication,
    /// First score divided by the second.
    Division,
    /// Largest score.
    Maximum,
    /// Smallest score.
    Minimum,
    /// Mean of the scores.
    Average,
    /// Number of contributing windows.
    Count,
}

impl ScoreOperation {
    /// Whether the operator can aggregate an arbitrary number of windows.
    pub fn aggregates(self) -> bool {
        matches!(
            self,
            ScoreOperation::Addition
                | ScoreOperation::Maximum
                | ScoreOperation::Minimum
                | ScoreOperation::Average
                | ScoreOperation::Count
        )
    }

    /// Aggregate `scores`; zero when there is nothing to aggregate.
    pub fn aggregate(self, scores: &[f64]) -> f64 {
        if scores.is_empty() {
            return 0.0;
        }
        match self {
            ScoreOperation::Addition => scores.iter().sum(),
            ScoreOperation::Average => scores.iter().sum::<f64>() / scores.len() as f64,
            ScoreOperation::Maximum => scores.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            ScoreOperation::Minimum => scores.iter().copied().fold(f64::INFINITY, f64::min),
            ScoreOperation::Count => scores.len() as f64,
            ScoreOperation::Subtraction => scores[1..].iter().fold(scores[0], |acc, s| acc - s),
            ScoreOperation::Multiplication => scores.iter().product(),
            ScoreOperation::Division => scores[1..]
                .iter()
                .fold(scores[0], |acc, s| if *s == 0.0 { 0.0 } else { acc / s }),
        }
    }
}

impl fmt::Display for ScoreOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ScoreOperation::Addition => "addition",
            ScoreOperation::Subtraction => "subtraction",
            ScoreOperation::Multiplication => "multiplication",
            ScoreOperation::Division => "division",
            ScoreOperation::Maximum => "maximum",
            ScoreOperation::Minimum => "minimum",
            ScoreOperation::Average => "average",
            ScoreOperation::Count => "count",
        };
        f.write_str(name)
    }
}

impl FromStr for ScoreOperation {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "addition" | "add" | "sum" => Ok(ScoreOperation::Addition),
            "subtraction" | "sub" => Ok(ScoreOperation::Subtraction),
            "multiplication" | "mul" => Ok(ScoreOperation::Multiplication),
            "division" | "div" | "ratio" => Ok(ScoreOperation::Division),
            "maximum" | "max" => Ok(ScoreOperation::Maximum),
            "minimum" | "min" => Ok(ScoreOperation::Minimum),
            "average" | "avg" | "mean" => Ok(ScoreOperation::Average),
            "count" => Ok(ScoreOperation::Count),
            _ => Err(ParseEnumError::new("score operation", s)),
        }
    }
}

/// DNA strand of a read or gene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Strand {
    /// Forward strand (`+`).
    Plus,
    /// Reverse strand (`-`).
    Minus,
}

impl fmt::Display for Strand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Strand::Plus => "+",
            Strand::Minus => "-",
        })
    }
}

impl FromStr for Strand {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "+" | "plus" | "forward" => Ok(Strand::Plus),
            "-" | "minus" | "reverse" => Ok(Strand::Minus),
            _ => Err(ParseEnumError::new("strand", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strand_parsing() {
        assert_eq!("+".parse::<Strand>().unwrap(), Strand::Plus);
        assert_eq!("minus".parse::<Strand>().unwrap(), Strand::Minus);
        assert!(".".parse::<Strand>().is_err());
        assert_eq!(Strand::Minus.to_string(), "-");
    }

    #[test]
    fn window_geometry() {
        let window = ScoredWindow::new(10, 20, 1.5);
        assert_eq!(window.len(), 10);
        assert_eq!(window.midpoint(), 15.0);
        assert_eq!(window.overlap(15, 40), 5);
        assert_eq!(window.overlap(20, 40), 0);
        assert!(!window.is_null());
    }

    #[test]
    fn precision_round_trips() {
        assert_eq!(ScorePrecision::Bit8.round_trip(3.6), 4.0);
        assert_eq!(ScorePrecision::Bit8.round_trip(-2.0), 0.0);
        assert_eq!(ScorePrecision::Bit16.round_trip(1.0), 1.0);
        assert!((ScorePrecision::Bit16.round_trip(3.14159) - 3.14159).abs() < 0.02);
        assert_eq!(ScorePrecision::Bit64.round_trip(0.1), 0.1);
        assert_eq!("16-bit".parse::<ScorePrecision>().unwrap(), ScorePrecision::Bit16);
    }

    #[test]
    fn aggregation_rules() {
        let scores = [2.0, 3.0, 7.0];
        assert_eq!(ScoreOperation::Addition.aggregate(&scores), 12.0);
        assert_eq!(ScoreOperation::Average.aggregate(&scores), 4.0);
        assert_eq!(ScoreOperation::Maximum.aggregate(&scores), 7.0);
        assert_eq!(ScoreOperation::Minimum.aggregate(&scores), 2.0);
        assert_eq!(ScoreOperation::Count.aggregate(&scores), 3.0);
        assert_eq!(ScoreOperation::Count.aggregate(&[]), 0.0);
        assert!(!ScoreOperation::Division.aggregates());
    }
}
