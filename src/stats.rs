//! Descriptive statistics on finite samples.
//!
//! Moments come from `statrs::statistics::Statistics`; quantiles use the
//! R-7 linear interpolation rule (the default of R, NumPy and pandas) so
//! that bucket thresholds and outlier fences match what analysts compute
//! in notebooks.
//!
//! Functions return `None` for inputs that are too short, mirroring the
//! rest of the numeric helpers; callers turn that into an error.

use statrs::statistics::Statistics;

/// Arithmetic mean. `None` for an empty slice.
pub fn mean(data: &[f64]) -> Option<f64> {
    if data.is_empty() {
        return None;
    }
    Some(data.iter().mean())
}

/// Sample variance (denominator `n − 1`). `None` when `n < 2`.
pub fn variance(data: &[f64]) -> Option<f64> {
    if data.len() < 2 {
        return None;
    }
    Some(data.iter().variance())
}

/// Sample standard deviation (denominator `n − 1`).
pub fn std_dev(data: &[f64]) -> Option<f64> {
    variance(data).map(f64::sqrt)
}

/// Population standard deviation (denominator `n`).
pub fn population_std_dev(data: &[f64]) -> Option<f64> {
    if data.is_empty() {
        return None;
    }
    Some(data.iter().population_std_dev())
}

/// Sample covariance (denominator `n − 1`). `None` when lengths differ
/// or `n < 2`.
pub fn covariance(x: &[f64], y: &[f64]) -> Option<f64> {
    if x.len() != y.len() || x.len() < 2 {
        return None;
    }
    Some(x.iter().covariance(y.iter()))
}

/// Median (the 0.5 quantile).
pub fn median(data: &[f64]) -> Option<f64> {
    quantile(data, 0.5)
}

/// Quantile `p ∈ [0, 1]` with R-7 interpolation:
/// h = (n − 1)p, Q = x₍⌊h⌋₎ + (h − ⌊h⌋)(x₍⌊h⌋+1₎ − x₍⌊h⌋₎).
pub fn quantile(data: &[f64], p: f64) -> Option<f64> {
    if data.is_empty() || !(0.0..=1.0).contains(&p) {
        return None;
    }
    let sorted = sorted_copy(data);
    Some(quantile_sorted(&sorted, p))
}

/// Several quantiles with a single sort.
pub fn quantiles(data: &[f64], ps: &[f64]) -> Option<Vec<f64>> {
    if data.is_empty() || ps.iter().any(|p| !(0.0..=1.0).contains(p)) {
        return None;
    }
    let sorted = sorted_copy(data);
    Some(ps.iter().map(|&p| quantile_sorted(&sorted, p)).collect())
}

/// R-7 quantile of already sorted, non-empty data.
pub(crate) fn quantile_sorted(sorted: &[f64], p: f64) -> f64 {
    let n = sorted.len();
    if n == 1 {
        return sorted[0];
    }
    let h = (n - 1) as f64 * p;
    let lo = h.floor() as usize;
    let hi = (lo + 1).min(n - 1);
    let frac = h - lo as f64;
    sorted[lo] + frac * (sorted[hi] - sorted[lo])
}

pub(crate) fn sorted_copy(data: &[f64]) -> Vec<f64> {
    let mut sorted = data.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    sorted
}
