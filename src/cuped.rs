//! CUPED variance reduction.
//!
//! Controlled-experiment Using Pre-Experiment Data: a pre-period covariate
//! correlated with the outcome is used to remove predictable variation
//! from the post-period metric.
//!
//! θ = cov(post, pre) / var(pre) over both groups pooled, and each value
//! becomes `post − θ (pre − mean(pre))`. The adjusted metric keeps the
//! pooled mean of the original metric while its variance shrinks by the
//! factor 1 − ρ².
//!
//! # References
//!
//! Deng, Xu, Kohavi & Walker (2013). "Improving the sensitivity of online
//! controlled experiments by utilizing pre-experiment data". WSDM '13.
//!
//! # Examples
//!
//! ```
//! use u_experiment::cuped::cuped_adjust;
//!
//! let control_pre = [10.0, 12.0, 9.0, 14.0];
//! let treatment_pre = [11.0, 8.0, 13.0, 10.0];
//! let control_post = [11.0, 13.5, 9.5, 15.0];
//! let treatment_post = [12.5, 9.0, 14.5, 11.5];
//! let adj = cuped_adjust(&control_pre, &treatment_pre, &control_post, &treatment_post).unwrap();
//! assert_eq!(adj.control.len(), 4);
//! assert!(adj.theta > 0.0);
//! ```

use crate::error::{ensure_finite, AnalysisError, Result};
use crate::stats;

/// CUPED-adjusted series for both groups.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CupedAdjusted {
    /// Adjusted control metric, same order as the input.
    pub control: Vec<f64>,
    /// Adjusted treatment metric, same order as the input.
    pub treatment: Vec<f64>,
    /// Regression coefficient of post on pre.
    pub theta: f64,
    /// Pooled pre-period mean used for centring.
    pub pre_mean: f64,
}

/// Adjusts both groups' post-period metric with the pooled pre-period
/// covariate.
///
/// # Errors
///
/// - `InvalidArgument` if a group's pre and post series differ in length
/// - `InsufficientData` if fewer than 2 rows are pooled
/// - `NonFinite` for NaN/∞ inputs
/// - `Degenerate` if the pooled covariate has zero variance
pub fn cuped_adjust(
    control_pre: &[f64],
    treatment_pre: &[f64],
    control_post: &[f64],
    treatment_post: &[f64],
) -> Result<CupedAdjusted> {
    if control_pre.len() != control_post.len() || treatment_pre.len() != treatment_post.len() {
        return Err(AnalysisError::invalid(format!(
            "pre/post lengths differ: control {}/{}, treatment {}/{}",
            control_pre.len(),
            control_post.len(),
            treatment_pre.len(),
            treatment_post.len()
        )));
    }

    let pre: Vec<f64> = control_pre.iter().chain(treatment_pre).copied().collect();
    let post: Vec<f64> = control_post.iter().chain(treatment_post).copied().collect();
    if pre.len() < 2 {
        return Err(AnalysisError::InsufficientData {
            needed: 2,
            got: pre.len(),
        });
    }
    ensure_finite(&pre)?;
    ensure_finite(&post)?;

    let var_pre = stats::variance(&pre).unwrap_or(0.0);
    if var_pre <= 1e-300 {
        return Err(AnalysisError::degenerate(
            "pre-period covariate has zero variance",
        ));
    }
    let cov = stats::covariance(&post, &pre).unwrap_or(0.0);
    let theta = cov / var_pre;
    let pre_mean = stats::mean(&pre).unwrap_or(0.0);

    let adjust = |post: &[f64], pre: &[f64]| -> Vec<f64> {
        post.iter()
            .zip(pre)
            .map(|(&y, &x)| y - (x - pre_mean) * theta)
            .collect()
    };

    tracing::debug!(theta, pre_mean, n = pre.len(), "cuped adjustment");

    Ok(CupedAdjusted {
        control: adjust(control_post, control_pre),
        treatment: adjust(treatment_post, treatment_pre),
        theta,
        pre_mean,
    })
}
