//! Least-squares trend lines over monthly series.

use serde::Serialize;

use crate::error::{AnalyticsError, Result};
use crate::period::MonthBucket;

/// Default number of months projected past the last observation.
pub const DEFAULT_HORIZON: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LinearFit {
    pub slope: f64,
    pub intercept: f64,
}

impl LinearFit {
    pub fn at(&self, x: f64) -> f64 {
        self.slope * x + self.intercept
    }
}

/// Ordinary least squares over parallel `xs`/`ys`.
///
/// Fails with `MalformedRecord` when the slices differ in length or contain
/// non-finite values, and with `InsufficientData` when there are fewer than
/// two distinct x values.
pub fn linear_regression(xs: &[f64], ys: &[f64]) -> Result<LinearFit> {
    if xs.len() != ys.len() {
        return Err(AnalyticsError::malformed(
            "regression input",
            format!("{} x values but {} y values", xs.len(), ys.len()),
        ));
    }
    if xs.iter().chain(ys).any(|v| !v.is_finite()) {
        return Err(AnalyticsError::malformed(
            "regression input",
            "non-finite value",
        ));
    }

    let distinct = distinct_count(xs);
    if distinct < 2 {
        return Err(AnalyticsError::insufficient("distinct periods", 2, distinct));
    }

    let n = xs.len() as f64;
    let sum_x: f64 = xs.iter().sum();
    let sum_y: f64 = ys.iter().sum();
    let sum_xy: f64 = xs.iter().zip(ys).map(|(x, y)| x * y).sum();
    let sum_x2: f64 = xs.iter().map(|x| x * x).sum();

    let denominator = n * sum_x2 - sum_x * sum_x;
    let slope = (n * sum_xy - sum_x * sum_y) / denominator;
    let intercept = (sum_y - slope * sum_x) / n;
    if !slope.is_finite() || !intercept.is_finite() {
        return Err(AnalyticsError::malformed(
            "regression input",
            "x values too close together to fit a line",
        ));
    }
    Ok(LinearFit { slope, intercept })
}

fn distinct_count(xs: &[f64]) -> usize {
    let mut sorted = xs.to_vec();
    sorted.sort_by(f64::total_cmp);
    sorted.dedup();
    sorted.len()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectedPoint {
    pub month: MonthBucket,
    pub value: f64,
}

/// Observed monthly averages, the fitted line over them, and the forecast.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendProjection {
    pub fit: LinearFit,
    pub observed: Vec<ProjectedPoint>,
    pub fitted: Vec<ProjectedPoint>,
    pub forecast: Vec<ProjectedPoint>,
}

impl TrendProjection {
    /// Month labels for the observed and forecast range, in order.
    pub fn labels(&self) -> Vec<String> {
        self.observed
            .iter()
            .chain(&self.forecast)
            .map(|point| point.month.to_string())
            .collect()
    }
}

/// Fits a line through a chronological monthly series indexed 0..n and
/// extends it `horizon` months past the last label.
pub fn project(series: &[(MonthBucket, f64)], horizon: usize) -> Result<TrendProjection> {
    let Some(&(last_month, _)) = series.last() else {
        return Err(AnalyticsError::insufficient("distinct periods", 2, 0));
    };

    let xs: Vec<f64> = (0..series.len()).map(|i| i as f64).collect();
    let ys: Vec<f64> = series.iter().map(|(_, value)| *value).collect();
    let fit = linear_regression(&xs, &ys)?;

    let observed = series
        .iter()
        .map(|&(month, value)| ProjectedPoint { month, value })
        .collect();
    let fitted = series
        .iter()
        .zip(&xs)
        .map(|(&(month, _), &x)| ProjectedPoint {
            month,
            value: fit.at(x),
        })
        .collect();
    let forecast = (0..horizon)
        .map(|step| ProjectedPoint {
            month: last_month.advance(step as u32 + 1),
            value: fit.at((series.len() + step) as f64),
        })
        .collect();

    Ok(TrendProjection {
        fit,
        observed,
        fitted,
        forecast,
    })
}
