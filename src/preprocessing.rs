//! Outlier filtering and variance-stabilizing transforms.
//!
//! - [`remove_outliers_percentile`] — keep rows strictly inside a quantile band
//! - [`remove_outliers_iqr`] — keep rows inside Tukey's 1.5·IQR fences
//! - [`box_cox`] / [`inv_box_cox`] — power transform with ML-fitted λ
//!
//! # Examples
//!
//! ```
//! use u_experiment::preprocessing::{box_cox, inv_box_cox};
//!
//! let revenue = [1.2, 3.4, 0.8, 15.0, 2.2, 4.1, 0.5, 7.7];
//! let fitted = box_cox(&revenue).unwrap();
//! let restored = inv_box_cox(&fitted.values, fitted.lambda).unwrap();
//! for (a, b) in revenue.iter().zip(&restored) {
//!     assert!((a - b).abs() < 1e-8);
//! }
//! ```

use crate::dataset::Dataset;
use crate::error::{ensure_finite, ensure_len, AnalysisError, Result};
use crate::stats;

/// Quantile band used by [`remove_outliers_percentile`].
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PercentileBounds {
    /// Lower quantile in [0, 1] (default 0.05).
    pub low: f64,
    /// Upper quantile in [0, 1] (default 0.95).
    pub high: f64,
}

impl Default for PercentileBounds {
    fn default() -> Self {
        Self {
            low: 0.05,
            high: 0.95,
        }
    }
}

/// Row indices whose `column` value lies strictly between the `low` and
/// `high` quantiles of that column. Missing cells never pass.
///
/// # Errors
///
/// `InvalidArgument` for an unknown or categorical column or bounds that
/// are not `0 <= low < high <= 1`; `InsufficientData` when the column has
/// no present values.
pub fn remove_outliers_percentile(
    data: &Dataset,
    column: &str,
    bounds: PercentileBounds,
) -> Result<Vec<usize>> {
    let PercentileBounds { low, high } = bounds;
    if !(0.0..=1.0).contains(&low) || !(0.0..=1.0).contains(&high) || low >= high {
        return Err(AnalysisError::invalid(format!(
            "percentile bounds must satisfy 0 <= low < high <= 1, got ({low}, {high})"
        )));
    }
    let present = data.present_values(column)?;
    ensure_len(&present, 1)?;
    let cuts = stats::quantiles(&present, &[low, high])
        .ok_or_else(|| AnalysisError::invalid("quantile outside [0, 1]"))?;
    let (lo, hi) = (cuts[0], cuts[1]);

    let col = data.column(column)?;
    Ok((0..data.n_rows())
        .filter(|&row| col.number(row).is_some_and(|v| v > lo && v < hi))
        .collect())
}

/// Tukey fences around the interquartile range.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct IqrFences {
    /// First quartile.
    pub q1: f64,
    /// Third quartile.
    pub q3: f64,
    /// Q1 − 1.5·IQR.
    pub lower: f64,
    /// Q3 + 1.5·IQR.
    pub upper: f64,
}

impl IqrFences {
    /// True when `x` lies within the closed fence interval.
    pub fn contains(&self, x: f64) -> bool {
        x >= self.lower && x <= self.upper
    }
}

/// Computes Q1, Q3 and the 1.5·IQR fences of a finite sample.
pub fn iqr_fences(values: &[f64]) -> Result<IqrFences> {
    ensure_len(values, 1)?;
    ensure_finite(values)?;
    let q = stats::quantiles(values, &[0.25, 0.75])
        .ok_or_else(|| AnalysisError::invalid("quantile outside [0, 1]"))?;
    let (q1, q3) = (q[0], q[1]);
    let iqr = q3 - q1;
    Ok(IqrFences {
        q1,
        q3,
        lower: q1 - 1.5 * iqr,
        upper: q3 + 1.5 * iqr,
    })
}

/// Rows of `data` whose `column` value lies within
/// `[Q1 − 1.5·IQR, Q3 + 1.5·IQR]`; rows with a missing value are dropped.
pub fn remove_outliers_iqr(data: &Dataset, column: &str) -> Result<Dataset> {
    let present = data.present_values(column)?;
    let fences = iqr_fences(&present)?;
    let col = data.column(column)?;
    let keep: Vec<usize> = (0..data.n_rows())
        .filter(|&row| col.number(row).is_some_and(|v| fences.contains(v)))
        .collect();
    tracing::debug!(
        column,
        kept = keep.len(),
        removed = data.n_rows() - keep.len(),
        "iqr outlier filter"
    );
    data.take(&keep)
}

// ---------------------------------------------------------------------------
// Box-Cox
// ---------------------------------------------------------------------------

/// A Box–Cox transformed sample together with its λ.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BoxCox {
    /// Transformed (or, after inversion, restored) values.
    pub values: Vec<f64>,
    /// λ used by the transform.
    pub lambda: f64,
}

/// Initial search interval for λ; widened while the optimum sits on an edge.
const LAMBDA_BRACKET: (f64, f64) = (-2.0, 2.0);

/// Widest λ the search will consider.
const LAMBDA_LIMIT: f64 = 64.0;

/// Golden-section tolerance on λ.
const LAMBDA_TOL: f64 = 1e-10;

const MAX_ITER: usize = 500;

fn transform_one(x: f64, lambda: f64) -> f64 {
    if lambda == 0.0 {
        x.ln()
    } else {
        (lambda * x.ln()).exp_m1() / lambda
    }
}

/// Box–Cox profile log-likelihood:
/// ℓ(λ) = (λ − 1) Σ ln xᵢ − (n/2) ln σ̂²(y(λ)), σ̂² with denominator n.
fn box_cox_llf(values: &[f64], sum_ln: f64, lambda: f64) -> f64 {
    let y: Vec<f64> = values.iter().map(|&x| transform_one(x, lambda)).collect();
    let n = values.len() as f64;
    let var = match stats::population_std_dev(&y) {
        Some(sd) => sd * sd,
        None => return f64::NEG_INFINITY,
    };
    let llf = (lambda - 1.0) * sum_ln - 0.5 * n * var.ln();
    if llf.is_finite() {
        llf
    } else {
        f64::NEG_INFINITY
    }
}

fn golden_section_max(f: impl Fn(f64) -> f64, mut a: f64, mut b: f64) -> f64 {
    let inv_phi = (5.0_f64.sqrt() - 1.0) / 2.0;
    let mut c = b - inv_phi * (b - a);
    let mut d = a + inv_phi * (b - a);
    let mut fc = f(c);
    let mut fd = f(d);
    for _ in 0..MAX_ITER {
        if (b - a).abs() < LAMBDA_TOL {
            break;
        }
        if fc > fd {
            b = d;
            d = c;
            fd = fc;
            c = b - inv_phi * (b - a);
            fc = f(c);
        } else {
            a = c;
            c = d;
            fc = fd;
            d = a + inv_phi * (b - a);
            fd = f(d);
        }
    }
    0.5 * (a + b)
}

fn ensure_positive(values: &[f64]) -> Result<()> {
    ensure_len(values, 1)?;
    ensure_finite(values)?;
    if values.iter().any(|&x| x <= 0.0) {
        return Err(AnalysisError::invalid("Box-Cox requires strictly positive data"));
    }
    Ok(())
}

/// Fits λ by maximum likelihood and transforms the sample.
///
/// # Errors
///
/// `InsufficientData` for fewer than 2 values, `InvalidArgument` for
/// non-positive values, `Degenerate` when all values are equal (the
/// likelihood has no maximum).
pub fn box_cox(values: &[f64]) -> Result<BoxCox> {
    ensure_len(values, 2)?;
    ensure_positive(values)?;
    let first = values[0];
    if values.iter().all(|&x| x == first) {
        return Err(AnalysisError::degenerate("Box-Cox fit on a constant sample"));
    }

    let sum_ln: f64 = values.iter().map(|x| x.ln()).sum();
    let llf = |lambda: f64| box_cox_llf(values, sum_ln, lambda);

    let (mut lo, mut hi) = LAMBDA_BRACKET;
    let mut lambda = golden_section_max(&llf, lo, hi);
    // Widen the bracket while the optimum is pinned to an edge.
    while (lambda - lo).abs() < 1e-6 || (hi - lambda).abs() < 1e-6 {
        if lo <= -LAMBDA_LIMIT && hi >= LAMBDA_LIMIT {
            break;
        }
        lo = (lo * 2.0).max(-LAMBDA_LIMIT);
        hi = (hi * 2.0).min(LAMBDA_LIMIT);
        lambda = golden_section_max(&llf, lo, hi);
    }
    tracing::debug!(lambda, n = values.len(), "box-cox lambda fitted");

    box_cox_with_lambda(values, lambda)
}

/// Transforms a positive sample with a known λ (e.g. the λ fitted on the
/// control group).
pub fn box_cox_with_lambda(values: &[f64], lambda: f64) -> Result<BoxCox> {
    ensure_positive(values)?;
    if !lambda.is_finite() {
        return Err(AnalysisError::invalid("lambda must be finite"));
    }
    Ok(BoxCox {
        values: values.iter().map(|&x| transform_one(x, lambda)).collect(),
        lambda,
    })
}

/// Maps Box–Cox transformed values back to the original scale.
///
/// # Errors
///
/// `Degenerate` if a value lies outside the transform's range
/// (λy + 1 ≤ 0 for λ ≠ 0).
pub fn inv_box_cox(values: &[f64], lambda: f64) -> Result<Vec<f64>> {
    ensure_finite(values)?;
    if !lambda.is_finite() {
        return Err(AnalysisError::invalid("lambda must be finite"));
    }
    values
        .iter()
        .map(|&y| {
            if lambda == 0.0 {
                return Ok(y.exp());
            }
            let base = lambda * y + 1.0;
            if base <= 0.0 {
                return Err(AnalysisError::degenerate(format!(
                    "value {y} is outside the Box-Cox range for lambda {lambda}"
                )));
            }
            Ok(((lambda * y).ln_1p() / lambda).exp())
        })
        .collect()
}

/// Two-mode entry point: without `lambda` the sample is transformed with
/// an ML-fitted λ; with `lambda` the sample is treated as transformed data
/// and mapped back to the original scale.
pub fn box_cox_transform(values: &[f64], lambda: Option<f64>) -> Result<BoxCox> {
    match lambda {
        None => box_cox(values),
        Some(lambda) => Ok(BoxCox {
            values: inv_box_cox(values, lambda)?,
            lambda,
        }),
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn box_cox_round_trip(
            data in proptest::collection::vec(0.1_f64..100.0, 5..=40)
        ) {
            if let Ok(fitted) = box_cox(&data) {
                prop_assume!(fitted.lambda.abs() < 5.0);
                let back = inv_box_cox(&fitted.values, fitted.lambda).expect("in range");
                for (a, b) in data.iter().zip(&back) {
                    prop_assert!((a - b).abs() <= 1e-6 * a.abs().max(1.0), "{} vs {}", a, b);
                }
            }
        }

        #[test]
        fn iqr_fences_bracket_quartiles(
            data in proptest::collection::vec(-1e3_f64..1e3, 1..=50)
        ) {
            let f = iqr_fences(&data).expect("finite data");
            prop_assert!(f.lower <= f.q1 && f.q1 <= f.q3 && f.q3 <= f.upper);
        }
    }
}
