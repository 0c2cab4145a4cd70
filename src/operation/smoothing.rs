//! Smoothing kernels.
//!
//! Windows are placed at their midpoint and every kernel weights a
//! neighbour by its length. Only non-null windows contribute; null windows
//! (bins without data) receive a smoothed value only when `fill_null` is set.

use super::{map_views, Operation};
use crate::framework::{OperationContext, OperationError};
use crate::list::ScwList;
use crate::view::ListViewBuilder;

/// Non-null window reduced to what kernels read.
#[derive(Debug, Clone, Copy)]
struct Point {
    position: f64,
    score: f64,
    length: f64,
}

/// Rebuild `list` replacing each score with `estimate(position, neighbours)`,
/// where `neighbours` are the non-null windows whose midpoint lies within
/// `reach` of `position`.
fn smooth<F>(
    context: &OperationContext,
    list: &ScwList,
    reach: f64,
    fill_null: bool,
    estimate: F,
) -> Result<Option<ScwList>, OperationError>
where
    F: Fn(f64, &[Point]) -> f64 + Sync,
{
    map_views(context, list, |chromosome, view| {
        let points: Vec<Point> = view
            .iter()
            .filter(|w| !w.is_null())
            .map(|w| Point {
                position: w.midpoint(),
                score: w.score,
                length: w.len() as f64,
            })
            .collect();
        let mut builder = list.view_builder(chromosome);
        let (mut low, mut high) = (0, 0);
        for window in view.iter().take_while(|_| !context.is_stopped()) {
            if window.is_null() && !fill_null {
                continue;
            }
            let position = window.midpoint();
            while low < points.len() && points[low].position < position - reach {
                low += 1;
            }
            high = high.max(low);
            while high < points.len() && points[high].position <= position + reach {
                high += 1;
            }
            let score = estimate(position, &points[low..high]);
            builder.add_element(window.start, window.stop, score)?;
        }
        Ok(builder.build())
    })
}

fn weighted_mean(points: &[Point], weight: impl Fn(&Point) -> f64) -> f64 {
    let (sum, total) = points.iter().fold((0.0, 0.0), |(sum, total), point| {
        let w = weight(point);
        (sum + w * point.score, total + w)
    });
    if total > 0.0 {
        sum / total
    } else {
        0.0
    }
}

fn require_positive(name: &str, value: f64) -> Result<(), OperationError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(OperationError::invalid_argument(format!(
            "{name} must be a positive number of bases, got {value}"
        )))
    }
}

/// Length-weighted moving average over `half_width` bases on each side.
#[derive(Debug)]
pub struct MovingAverage<'a> {
    list: &'a ScwList,
    half_width: u32,
    fill_null: bool,
    context: OperationContext,
}

impl<'a> MovingAverage<'a> {
    /// Smooth `list` with a moving window of `2 * half_width` bases.
    pub fn new(
        context: OperationContext,
        list: &'a ScwList,
        half_width: u32,
        fill_null: bool,
    ) -> Self {
        Self {
            list,
            half_width,
            fill_null,
            context,
        }
    }
}

impl Operation for MovingAverage<'_> {
    type Output = ScwList;

    fn compute(&self) -> Result<Option<ScwList>, OperationError> {
        require_positive("moving average half width", self.half_width as f64)?;
        smooth(
            &self.context,
            self.list,
            self.half_width as f64,
            self.fill_null,
            |_, neighbours| weighted_mean(neighbours, |p| p.length),
        )
    }

    fn description(&self) -> &'static str {
        "Moving Average"
    }

    fn context(&self) -> &OperationContext {
        &self.context
    }
}

/// Gaussian kernel smoothing with standard deviation `sigma` bases,
/// truncated at three sigmas.
#[derive(Debug)]
pub struct Gauss<'a> {
    list: &'a ScwList,
    sigma: f64,
    fill_null: bool,
    context: OperationContext,
}

impl<'a> Gauss<'a> {
    /// Smooth `list` with a gaussian of width `sigma`.
    pub fn new(context: OperationContext, list: &'a ScwList, sigma: f64, fill_null: bool) -> Self {
        Self {
            list,
            sigma,
            fill_null,
            context,
        }
    }
}

impl Operation for Gauss<'_> {
    type Output = ScwList;

    fn compute(&self) -> Result<Option<ScwList>, OperationError> {
        require_positive("gaussian sigma", self.sigma)?;
        let denominator = 2.0 * self.sigma * self.sigma;
        smooth(
            &self.context,
            self.list,
            3.0 * self.sigma,
            self.fill_null,
            |position, neighbours| {
                weighted_mean(neighbours, |p| {
                    let distance = p.position - position;
                    (-distance * distance / denominator).exp() * p.length
                })
            },
        )
    }

    fn description(&self) -> &'static str {
        "Gaussian Smoothing"
    }

    fn context(&self) -> &OperationContext {
        &self.context
    }
}

/// Local linear regression (LOESS) with tricube weights over `half_width`
/// bases on each side.
///
/// Falls back to the weighted mean where the neighbourhood is too narrow to
/// fit a line.
#[derive(Debug)]
pub struct Loess<'a> {
    list: &'a ScwList,
    half_width: u32,
    fill_null: bool,
    context: OperationContext,
}

impl<'a> Loess<'a> {
    /// Smooth `list` with a LOESS fit over `2 * half_width` bases.
    pub fn new(
        context: OperationContext,
        list: &'a ScwList,
        half_width: u32,
        fill_null: bool,
    ) -> Self {
        Self {
            list,
            half_width,
            fill_null,
            context,
        }
    }
}

fn local_linear_fit(position: f64, neighbours: &[Point], half_width: f64) -> f64 {
    let mut sw = 0.0;
    let mut swx = 0.0;
    let mut swxx = 0.0;
    let mut swy = 0.0;
    let mut swxy = 0.0;
    for point in neighbours {
        let x = point.position - position;
        let ratio = (x.abs() / half_width).min(1.0);
        let w = (1.0 - ratio.powi(3)).powi(3) * point.length;
        sw += w;
        swx += w * x;
        swxx += w * x * x;
        swy += w * point.score;
        swxy += w * x * point.score;
    }
    if sw <= 0.0 {
        return 0.0;
    }
    let determinant = sw * swxx - swx * swx;
    if determinant.abs() <= 1e-9 * sw * swxx.max(1.0) {
        return swy / sw;
    }
    // intercept of the weighted fit, x measured from `position`
    (swxx * swy - swx * swxy) / determinant
}

impl Operation for Loess<'_> {
    type Output = ScwList;

    fn compute(&self) -> Result<Option<ScwList>, OperationError> {
        require_positive("LOESS half width", self.half_width as f64)?;
        let half_width = self.half_width as f64;
        smooth(
            &self.context,
            self.list,
            half_width,
            self.fill_null,
            |position, neighbours| local_linear_fit(position, neighbours, half_width),
        )
    }

    fn description(&self) -> &'static str {
        "LOESS Smoothing"
    }

    fn context(&self) -> &OperationContext {
        &self.context
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operation::test_support::{bin_scores, bins, context, list, windows};

    #[test]
    fn moving_average_fills_null_bins_on_request() {
        let input = bins(10, &[0.0, 3.0, 0.0, 6.0, 0.0]);
        let kept = MovingAverage::new(context(), &input, 10, false)
            .compute()
            .unwrap()
            .unwrap();
        assert_eq!(&bin_scores(&kept, 0)[..6], &[0.0, 3.0, 0.0, 6.0, 0.0, 0.0]);
        let filled = MovingAverage::new(context(), &input, 10, true)
            .compute()
            .unwrap()
            .unwrap();
        assert_eq!(&bin_scores(&filled, 0)[..6], &[3.0, 3.0, 4.5, 6.0, 6.0, 0.0]);
    }

    #[test]
    fn moving_average_weights_by_length() {
        let input = list(&[(0, 0, 10, 2.0), (0, 10, 30, 5.0)]);
        let smoothed = MovingAverage::new(context(), &input, 20, false)
            .compute()
            .unwrap()
            .unwrap();
        assert_eq!(windows(&smoothed, 0), vec![(0, 10, 4.0), (10, 30, 4.0)]);
    }

    #[test]
    fn gauss_keeps_constants_and_flattens_spikes() {
        let flat = bins(10, &[2.0; 6]);
        let smoothed = Gauss::new(context(), &flat, 10.0, false).compute().unwrap().unwrap();
        for score in &bin_scores(&smoothed, 0)[..6] {
            assert!((score - 2.0).abs() < 1e-12);
        }

        let spike = bins(10, &[1.0, 1.0, 10.0, 1.0, 1.0]);
        let smoothed = Gauss::new(context(), &spike, 10.0, false).compute().unwrap().unwrap();
        let peak = bin_scores(&smoothed, 0)[2];
        assert!(peak > 1.0 && peak < 10.0);
    }

    #[test]
    fn loess_reproduces_a_line() {
        let input = bins(10, &[1.0, 2.0, 3.0, 4.0, 5.0]);
        let smoothed = Loess::new(context(), &input, 30, false).compute().unwrap().unwrap();
        let scores = bin_scores(&smoothed, 0);
        for (expected, score) in [1.0, 2.0, 3.0, 4.0, 5.0].iter().zip(&scores) {
            assert!((expected - score).abs() < 1e-9, "{expected} vs {score}");
        }
    }

    #[test]
    fn widths_must_be_positive() {
        let input = bins(10, &[1.0]);
        assert!(MovingAverage::new(context(), &input, 0, false).compute().is_err());
        assert!(Gauss::new(context(), &input, f64::NAN, false).compute().is_err());
        assert!(Loess::new(context(), &input, 0, true).compute().is_err());
    }
}
