use std::fmt;
use std::str::FromStr;

use super::statistics::{Average, Maximum, Minimum, StandardDeviation, SumScore};
use super::{map_views, transform_scores, Operation};
use crate::framework::{OperationContext, OperationError};
use crate::list::{ChromosomeSummary, ScwList};
use crate::view::ListViewBuilder;
use crate::window::ParseEnumError;

macro_rules! constant_operation {
    ($(#[$doc:meta])* $name:ident, $description:literal, |$score:ident, $constant:ident| $value:expr) => {
        $(#[$doc])*
        #[derive(Debug)]
        pub struct $name<'a> {
            list: &'a ScwList,
            constant: f64,
            context: OperationContext,
        }

        impl<'a> $name<'a> {
            /// Apply the operation with `constant` to every non-null window of `list`.
            pub fn new(context: OperationContext, list: &'a ScwList, constant: f64) -> Self {
                Self {
                    list,
                    constant,
                    context,
                }
            }
        }

        impl Operation for $name<'_> {
            type Output = ScwList;

            fn compute(&self) -> Result<Option<ScwList>, OperationError> {
                let $constant = self.constant;
                transform_scores(&self.context, self.list, |$score| Ok($value))
            }

            fn description(&self) -> &'static str {
                $description
            }

            fn context(&self) -> &OperationContext {
                &self.context
            }
        }
    };
}

constant_operation!(
    /// Adds a constant to every non-null score.
    AddConstant, "Add Constant", |score, constant| score + constant
);

constant_operation!(
    /// Subtracts a constant from every non-null score.
    SubtractConstant, "Subtract Constant", |score, constant| score - constant
);

constant_operation!(
    /// Multiplies every non-null score by a constant.
    MultiplyConstant, "Multiply by Constant", |score, constant| score * constant
);

constant_operation!(
    /// Replaces every non-null score by `constant / score`.
    InvertConstant, "Invert Constant", |score, constant| constant / score
);

constant_operation!(
    /// Gives every non-null window the same score.
    UniqueScore, "Unique Score", |_score, constant| constant
);

/// Divides every non-null score by a constant; a zero divisor is an
/// arithmetic error.
#[derive(Debug)]
pub struct DivideConstant<'a> {
    list: &'a ScwList,
    constant: f64,
    context: OperationContext,
}

impl<'a> DivideConstant<'a> {
    /// Divide the scores of `list` by `constant`.
    pub fn new(context: OperationContext, list: &'a ScwList, constant: f64) -> Self {
        Self {
            list,
            constant,
            context,
        }
    }
}

impl Operation for DivideConstant<'_> {
    type Output = ScwList;

    fn compute(&self) -> Result<Option<ScwList>, OperationError> {
        if self.constant == 0.0 {
            return Err(OperationError::arithmetic("division by zero"));
        }
        let constant = self.constant;
        transform_scores(&self.context, self.list, |score| Ok(score / constant))
    }

    fn description(&self) -> &'static str {
        "Divide by Constant"
    }

    fn context(&self) -> &OperationContext {
        &self.context
    }
}

/// Base of a logarithm.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LogBase {
    /// Natural logarithm.
    E,
    /// Base 2.
    Two,
    /// Base 10.
    Ten,
    /// Any positive base other than one.
    Custom(f64),
}

impl LogBase {
    fn value(self) -> f64 {
        match self {
            LogBase::E => std::f64::consts::E,
            LogBase::Two => 2.0,
            LogBase::Ten => 10.0,
            LogBase::Custom(base) => base,
        }
    }

    fn validate(self) -> Result<(), OperationError> {
        let base = self.value();
        if base > 0.0 && base != 1.0 && base.is_finite() {
            Ok(())
        } else {
            Err(OperationError::invalid_argument(format!(
                "invalid logarithm base {base}"
            )))
        }
    }

    fn log(self, value: f64) -> f64 {
        match self {
            LogBase::E => value.ln(),
            LogBase::Two => value.log2(),
            LogBase::Ten => value.log10(),
            LogBase::Custom(base) => value.log(base),
        }
    }
}

impl fmt::Display for LogBase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogBase::E => f.write_str("e"),
            LogBase::Two => f.write_str("2"),
            LogBase::Ten => f.write_str("10"),
            LogBase::Custom(base) => write!(f, "{base}"),
        }
    }
}

impl FromStr for LogBase {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "e" | "ln" => Ok(LogBase::E),
            "2" => Ok(LogBase::Two),
            "10" => Ok(LogBase::Ten),
            other => other
                .parse::<f64>()
                .map(LogBase::Custom)
                .map_err(|_| ParseEnumError::new("logarithm base", s)),
        }
    }
}

fn checked_log(base: LogBase, value: f64) -> Result<f64, OperationError> {
    if value < 0.0 {
        return Err(OperationError::arithmetic(format!(
            "logarithm of negative value {value}"
        )));
    }
    if value == 0.0 {
        return Ok(0.0);
    }
    Ok(base.log(value))
}

/// Logarithm of every score. The log of zero is zero; the log of a negative
/// score is an arithmetic error.
#[derive(Debug)]
pub struct Log<'a> {
    list: &'a ScwList,
    base: LogBase,
    context: OperationContext,
}

impl<'a> Log<'a> {
    /// Logarithm in `base` of the scores of `list`.
    pub fn new(context: OperationContext, list: &'a ScwList, base: LogBase) -> Self {
        Self {
            list,
            base,
            context,
        }
    }
}

impl Operation for Log<'_> {
    type Output = ScwList;

    fn compute(&self) -> Result<Option<ScwList>, OperationError> {
        self.base.validate()?;
        let base = self.base;
        transform_scores(&self.context, self.list, |score| checked_log(base, score))
    }

    fn description(&self) -> &'static str {
        "Log"
    }

    fn processing_description(&self) -> String {
        format!("Computing log{}...", self.base)
    }

    fn context(&self) -> &OperationContext {
        &self.context
    }
}

/// `log((score + damper) / (average + damper))` for every non-null score.
///
/// The genome-wide average comes from a nested [`Average`] operation.
#[derive(Debug)]
pub struct LogOnAverageWithDamper<'a> {
    list: &'a ScwList,
    base: LogBase,
    damper: f64,
    context: OperationContext,
}

impl<'a> LogOnAverageWithDamper<'a> {
    /// Damped log ratio of the scores of `list` to their average.
    pub fn new(context: OperationContext, list: &'a ScwList, base: LogBase, damper: f64) -> Self {
        Self {
            list,
            base,
            damper,
            context,
        }
    }
}

impl Operation for LogOnAverageWithDamper<'_> {
    type Output = ScwList;

    fn compute(&self) -> Result<Option<ScwList>, OperationError> {
        self.base.validate()?;
        let Some(average) = Average::new(self.context.nested(), self.list).compute()? else {
            return Ok(None);
        };
        let denominator = average + self.damper;
        if denominator <= 0.0 {
            return Err(OperationError::arithmetic(format!(
                "average plus damper must be positive, got {denominator}"
            )));
        }
        let (base, damper) = (self.base, self.damper);
        transform_scores(&self.context, self.list, |score| {
            checked_log(base, (score + damper) / denominator)
        })
    }

    fn description(&self) -> &'static str {
        "Log on Average with Damper"
    }

    fn step_count(&self) -> usize {
        ScwList::CREATION_STEP_COUNT + 2
    }

    fn context(&self) -> &OperationContext {
        &self.context
    }
}

/// `score * factor / Σscores` for every non-null score.
#[derive(Debug)]
pub struct Normalize<'a> {
    list: &'a ScwList,
    factor: f64,
    context: OperationContext,
}

impl<'a> Normalize<'a> {
    /// Normalize `list` so its scores sum to `factor`.
    pub fn new(context: OperationContext, list: &'a ScwList, factor: f64) -> Self {
        Self {
            list,
            factor,
            context,
        }
    }
}

impl Operation for Normalize<'_> {
    type Output = ScwList;

    fn compute(&self) -> Result<Option<ScwList>, OperationError> {
        let Some(sum) = SumScore::new(self.context.nested(), self.list).compute()? else {
            return Ok(None);
        };
        if sum == 0.0 {
            return Err(OperationError::arithmetic(
                "cannot normalize a list whose scores sum to zero",
            ));
        }
        let ratio = self.factor / sum;
        transform_scores(&self.context, self.list, |score| Ok(score * ratio))
    }

    fn description(&self) -> &'static str {
        "Normalize"
    }

    fn step_count(&self) -> usize {
        ScwList::CREATION_STEP_COUNT + 2
    }

    fn context(&self) -> &OperationContext {
        &self.context
    }
}

/// Standard score `(score - average) / stdev` of every non-null score.
#[derive(Debug)]
pub struct NormalizeStandardScore<'a> {
    list: &'a ScwList,
    context: OperationContext,
}

impl<'a> NormalizeStandardScore<'a> {
    /// Standard scores of `list`.
    pub fn new(context: OperationContext, list: &'a ScwList) -> Self {
        Self { list, context }
    }
}

impl Operation for NormalizeStandardScore<'_> {
    type Output = ScwList;

    fn compute(&self) -> Result<Option<ScwList>, OperationError> {
        let Some(average) = Average::new(self.context.nested(), self.list).compute()? else {
            return Ok(None);
        };
        let Some(stdev) = StandardDeviation::new(self.context.nested(), self.list).compute()?
        else {
            return Ok(None);
        };
        if stdev == 0.0 {
            return Err(OperationError::arithmetic(
                "standard deviation is zero, standard scores are undefined",
            ));
        }
        transform_scores(&self.context, self.list, |score| Ok((score - average) / stdev))
    }

    fn description(&self) -> &'static str {
        "Standard Score"
    }

    fn step_count(&self) -> usize {
        ScwList::CREATION_STEP_COUNT + 3
    }

    fn context(&self) -> &OperationContext {
        &self.context
    }
}

fn validate_range(lower: f64, upper: f64) -> Result<(), OperationError> {
    if lower < upper {
        Ok(())
    } else {
        Err(OperationError::invalid_argument(format!(
            "index range lower bound {lower} must be below upper bound {upper}"
        )))
    }
}

/// Rescale `score` from `[minimum, maximum]` into `[lower, upper]`; a flat
/// input range maps to `upper`.
fn rescale(score: f64, minimum: f64, maximum: f64, lower: f64, upper: f64) -> f64 {
    if maximum == minimum {
        return upper;
    }
    lower + (score - minimum) / (maximum - minimum) * (upper - lower)
}

/// Rescales every non-null score linearly from the genome-wide
/// `[minimum, maximum]` into `[lower, upper]`.
#[derive(Debug)]
pub struct Index<'a> {
    list: &'a ScwList,
    lower: f64,
    upper: f64,
    context: OperationContext,
}

impl<'a> Index<'a> {
    /// Index `list` into `[lower, upper]`.
    pub fn new(context: OperationContext, list: &'a ScwList, lower: f64, upper: f64) -> Self {
        Self {
            list,
            lower,
            upper,
            context,
        }
    }
}

impl Operation for Index<'_> {
    type Output = ScwList;

    fn compute(&self) -> Result<Option<ScwList>, OperationError> {
        validate_range(self.lower, self.upper)?;
        let Some(minimum) = Minimum::new(self.context.nested(), self.list).compute()? else {
            return Ok(None);
        };
        let Some(maximum) = Maximum::new(self.context.nested(), self.list).compute()? else {
            return Ok(None);
        };
        let (lower, upper) = (self.lower, self.upper);
        transform_scores(&self.context, self.list, |score| {
            Ok(rescale(score, minimum, maximum, lower, upper))
        })
    }

    fn description(&self) -> &'static str {
        "Index"
    }

    fn step_count(&self) -> usize {
        ScwList::CREATION_STEP_COUNT + 3
    }

    fn context(&self) -> &OperationContext {
        &self.context
    }
}

/// Same as [`Index`] but with the minimum and maximum of each chromosome.
#[derive(Debug)]
pub struct IndexByChromosome<'a> {
    list: &'a ScwList,
    lower: f64,
    upper: f64,
    context: OperationContext,
}

impl<'a> IndexByChromosome<'a> {
    /// Index each chromosome of `list` into `[lower, upper]`.
    pub fn new(context: OperationContext, list: &'a ScwList, lower: f64, upper: f64) -> Self {
        Self {
            list,
            lower,
            upper,
            context,
        }
    }
}

impl Operation for IndexByChromosome<'_> {
    type Output = ScwList;

    fn compute(&self) -> Result<Option<ScwList>, OperationError> {
        validate_range(self.lower, self.upper)?;
        let (lower, upper) = (self.lower, self.upper);
        map_views(&self.context, self.list, |chromosome, view| {
            let summary = ChromosomeSummary::from_view(view);
            let mut builder = self.list.view_builder(chromosome);
            for window in view.iter().take_while(|_| !self.context.is_stopped()) {
                if window.is_null() {
                    continue;
                }
                let score = rescale(window.score, summary.minimum, summary.maximum, lower, upper);
                builder.add_element(window.start, window.stop, score)?;
            }
            Ok(builder.build())
        })
    }

    fn description(&self) -> &'static str {
        "Index per Chromosome"
    }

    fn context(&self) -> &OperationContext {
        &self.context
    }
}
