//! Least-squares trend lines over bucket-ordered series

use serde::{Deserialize, Serialize};

use crate::aggregate::{BucketStat, Metric};

/// Relative tolerance below which the x-spread is treated as zero
const DEGENERATE_EPS: f64 = 1e-12;

/// Outcome of a line fit. Failures are explicit variants, never a zero slope.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TrendResult {
    Fit { slope: f64, intercept: f64 },
    /// Fewer than two points with a value
    InsufficientData { usable_points: usize },
    /// All x equal, or the computation did not produce finite numbers
    Degenerate,
}

impl TrendResult {
    pub fn slope(&self) -> Option<f64> {
        match self {
            TrendResult::Fit { slope, .. } => Some(*slope),
            _ => None,
        }
    }

    pub fn intercept(&self) -> Option<f64> {
        match self {
            TrendResult::Fit { intercept, .. } => Some(*intercept),
            _ => None,
        }
    }

    /// Value of the fitted line at `x`
    pub fn value_at(&self, x: f64) -> Option<f64> {
        match self {
            TrendResult::Fit { slope, intercept } => Some(slope * x + intercept),
            _ => None,
        }
    }

    pub fn is_fit(&self) -> bool {
        matches!(self, TrendResult::Fit { .. })
    }
}

/// Fit `y = slope * x + intercept`. Pairs with an absent `y` are dropped first.
pub fn fit(pairs: &[(f64, Option<f64>)]) -> TrendResult {
    let points: Vec<(f64, f64)> = pairs
        .iter()
        .filter_map(|&(x, y)| y.map(|y| (x, y)))
        .collect();

    if points.len() < 2 {
        return TrendResult::InsufficientData {
            usable_points: points.len(),
        };
    }

    let n = points.len() as f64;
    let mean_x = points.iter().map(|p| p.0).sum::<f64>() / n;
    let mean_y = points.iter().map(|p| p.1).sum::<f64>() / n;

    // Centered sums are better conditioned than the raw normal equations
    let mut sxx = 0.0;
    let mut sxy = 0.0;
    for &(x, y) in &points {
        let dx = x - mean_x;
        sxx += dx * dx;
        sxy += dx * (y - mean_y);
    }

    let scale = points.iter().map(|p| p.0 * p.0).sum::<f64>().max(1.0);
    if !sxx.is_finite() || sxx <= DEGENERATE_EPS * scale {
        return TrendResult::Degenerate;
    }

    let slope = sxy / sxx;
    let intercept = mean_y - slope * mean_x;
    if !slope.is_finite() || !intercept.is_finite() {
        return TrendResult::Degenerate;
    }

    TrendResult::Fit { slope, intercept }
}

/// Fit over ordinal positions 0, 1, 2, ... of `values`
pub fn fit_series(values: &[Option<f64>]) -> TrendResult {
    let pairs: Vec<(f64, Option<f64>)> = values
        .iter()
        .enumerate()
        .map(|(i, y)| (i as f64, *y))
        .collect();
    fit(&pairs)
}

/// Fit one metric across bucket stats in the order given
pub fn fit_metric(stats: &[BucketStat], metric: Metric) -> TrendResult {
    let values: Vec<Option<f64>> = stats.iter().map(|s| metric.value(s)).collect();
    fit_series(&values)
}
