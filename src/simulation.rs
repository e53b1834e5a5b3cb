//! Monte-Carlo validation of test methodology.
//!
//! Repeatedly splits a pool of historical values into two synthetic
//! groups, optionally shifts the second one by a known effect and records
//! the t-test p-value. A/A runs (no effect) estimate the Type-I error rate,
//! A/B runs estimate the Type-II error rate.
//!
//! # Examples
//!
//! ```
//! use rand::SeedableRng;
//! use rand_xoshiro::Xoshiro256PlusPlus;
//! use u_experiment::simulation::{estimate_errors, run_synthetic_experiments};
//!
//! let values: Vec<f64> = (0..200).map(|i| (i % 17) as f64).collect();
//! let mut rng = Xoshiro256PlusPlus::seed_from_u64(1);
//! let aa = run_synthetic_experiments(&values, 30, 0.0, 200, &mut rng).unwrap();
//! let ab = run_synthetic_experiments(&values, 30, 8.0, 200, &mut rng).unwrap();
//! let rates = estimate_errors(&aa, &ab, 0.05).unwrap();
//! assert!(rates.type_ii.rate < 0.05);
//! println!("{rates}");
//! ```

use std::fmt;

use rand::seq::index;
use rand::Rng;

use crate::error::{ensure_finite, ensure_unit_open, AnalysisError, Result};
use crate::special;
use crate::testing::{self, Alternative, ConfidenceInterval, VarianceAssumption};

/// Confidence level of the intervals reported by [`estimate_errors`].
pub const ERROR_RATE_CI_ALPHA: f64 = 0.05;

/// Runs `n_iterations` synthetic two-group experiments and returns their
/// pooled t-test p-values.
///
/// Each iteration draws `2 · sample_size` distinct positions of `values`;
/// the first half forms group A, the second half plus `effect` forms
/// group B.
///
/// # Errors
///
/// - `InvalidArgument` for zero iterations or a non-finite effect
/// - `InsufficientData` if `sample_size < 2` or `2 · sample_size` exceeds
///   the pool
/// - `NonFinite` for NaN/∞ in `values`
/// - `Degenerate` if a draw has zero pooled variance. The call stops at
///   that draw and the p-values collected so far are discarded; pools
///   dominated by one value (sparse 0/1 metrics) hit this with small
///   `sample_size`.
pub fn run_synthetic_experiments<R: Rng + ?Sized>(
    values: &[f64],
    sample_size: usize,
    effect: f64,
    n_iterations: usize,
    rng: &mut R,
) -> Result<Vec<f64>> {
    if n_iterations == 0 {
        return Err(AnalysisError::invalid("n_iterations must be positive"));
    }
    if !effect.is_finite() {
        return Err(AnalysisError::invalid("effect must be finite"));
    }
    if sample_size < 2 {
        return Err(AnalysisError::InsufficientData {
            needed: 2,
            got: sample_size,
        });
    }
    if 2 * sample_size > values.len() {
        return Err(AnalysisError::InsufficientData {
            needed: 2 * sample_size,
            got: values.len(),
        });
    }
    ensure_finite(values)?;

    tracing::debug!(
        pool = values.len(),
        sample_size,
        effect,
        n_iterations,
        "running synthetic experiments"
    );

    let mut a = vec![0.0; sample_size];
    let mut b = vec![0.0; sample_size];
    let mut pvalues = Vec::with_capacity(n_iterations);
    for _ in 0..n_iterations {
        let picks = index::sample(rng, values.len(), 2 * sample_size);
        for (i, pos) in picks.into_iter().enumerate() {
            if i < sample_size {
                a[i] = values[pos];
            } else {
                b[i - sample_size] = values[pos] + effect;
            }
        }
        let t = testing::t_test_ind(&a, &b, VarianceAssumption::Pooled, Alternative::TwoSided)?;
        pvalues.push(t.p_value);
    }
    Ok(pvalues)
}

/// Normal-approximation interval `p ± z₁₋α/₂ √(p(1−p)/n)` for a Bernoulli
/// proportion.
///
/// # Examples
///
/// ```
/// use u_experiment::simulation::estimate_ci_bernoulli;
///
/// let ci = estimate_ci_bernoulli(0.5, 100, 0.05).unwrap();
/// assert!((ci.lower - 0.402).abs() < 1e-3);
/// assert!((ci.upper - 0.598).abs() < 1e-3);
/// ```
pub fn estimate_ci_bernoulli(p: f64, n: usize, alpha: f64) -> Result<ConfidenceInterval> {
    ensure_unit_open("alpha", alpha)?;
    if !(0.0..=1.0).contains(&p) {
        return Err(AnalysisError::invalid(format!(
            "proportion must lie in [0, 1], got {p}"
        )));
    }
    if n == 0 {
        return Err(AnalysisError::InsufficientData { needed: 1, got: 0 });
    }
    let half = special::inverse_normal_cdf(1.0 - alpha / 2.0) * (p * (1.0 - p) / n as f64).sqrt();
    Ok(ConfidenceInterval {
        lower: p - half,
        upper: p + half,
        level: 1.0 - alpha,
    })
}

/// An empirical error rate with its Bernoulli interval.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ErrorEstimate {
    /// Share of p-values counted as errors.
    pub rate: f64,
    /// 95% normal-approximation interval for the rate.
    pub ci: ConfidenceInterval,
}

/// Empirical Type-I and Type-II error rates.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ErrorRates {
    /// Share of A/A p-values below alpha.
    pub type_i: ErrorEstimate,
    /// Share of A/B p-values at or above alpha.
    pub type_ii: ErrorEstimate,
    /// Significance level the rates were computed at.
    pub alpha: f64,
}

impl ErrorRates {
    /// 1 − Type-II rate.
    pub fn empirical_power(&self) -> f64 {
        1.0 - self.type_ii.rate
    }
}

impl fmt::Display for ErrorRates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (i, ii) = (&self.type_i, &self.type_ii);
        writeln!(
            f,
            "error I = {:.4}  CI=({:.4}, {:.4})",
            i.rate, i.ci.lower, i.ci.upper
        )?;
        write!(
            f,
            "error II = {:.4} CI=({:.4}, {:.4})",
            ii.rate, ii.ci.lower, ii.ci.upper
        )
    }
}

/// Error rates of A/A and A/B p-value series at level `alpha`.
///
/// Intervals are always at the 95% level.
///
/// # Errors
///
/// `InvalidArgument` for alpha outside (0, 1) or p-values outside [0, 1];
/// `InsufficientData` for an empty series.
pub fn estimate_errors(pvalues_aa: &[f64], pvalues_ab: &[f64], alpha: f64) -> Result<ErrorRates> {
    ensure_unit_open("alpha", alpha)?;
    let estimate = |pvalues: &[f64], hit: &dyn Fn(f64) -> bool| -> Result<ErrorEstimate> {
        if pvalues.is_empty() {
            return Err(AnalysisError::InsufficientData { needed: 1, got: 0 });
        }
        if pvalues.iter().any(|p| !(0.0..=1.0).contains(p)) {
            return Err(AnalysisError::invalid("p-values must lie in [0, 1]"));
        }
        let hits = pvalues.iter().filter(|&&p| hit(p)).count();
        let rate = hits as f64 / pvalues.len() as f64;
        Ok(ErrorEstimate {
            rate,
            ci: estimate_ci_bernoulli(rate, pvalues.len(), ERROR_RATE_CI_ALPHA)?,
        })
    };
    Ok(ErrorRates {
        type_i: estimate(pvalues_aa, &|p: f64| p < alpha)?,
        type_ii: estimate(pvalues_ab, &|p: f64| p >= alpha)?,
        alpha,
    })
}

/// Runs an A/A and an A/B simulation on the same pool and summarizes
/// their error rates.
pub fn simulate_error_rates<R: Rng + ?Sized>(
    values: &[f64],
    sample_size: usize,
    effect: f64,
    n_iterations: usize,
    alpha: f64,
    rng: &mut R,
) -> Result<ErrorRates> {
    ensure_unit_open("alpha", alpha)?;
    let aa = run_synthetic_experiments(values, sample_size, 0.0, n_iterations, rng)?;
    let ab = run_synthetic_experiments(values, sample_size, effect, n_iterations, rng)?;
    let rates = estimate_errors(&aa, &ab, alpha)?;
    tracing::debug!(
        type_i = rates.type_i.rate,
        type_ii = rates.type_ii.rate,
        "simulated error rates"
    );
    Ok(rates)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256PlusPlus;

    fn binary_pool() -> Vec<f64> {
        let mut v = vec![0.0; 50];
        v.extend(vec![1.0; 50]);
        v
    }

    #[test]
    fn binary_pool_gives_requested_pvalues() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(2024);
        let p = run_synthetic_experiments(&binary_pool(), 20, 0.0, 1000, &mut rng).expect("valid");
        assert_eq!(p.len(), 1000);
        assert!(p.iter().all(|&x| (0.0..=1.0).contains(&x)));
    }

    #[test]
    fn same_seed_same_pvalues() {
        let pool: Vec<f64> = (0..50).map(|i| (i * 7 % 13) as f64).collect();
        let mut r1 = Xoshiro256PlusPlus::seed_from_u64(9);
        let mut r2 = Xoshiro256PlusPlus::seed_from_u64(9);
        let a = run_synthetic_experiments(&pool, 10, 1.0, 50, &mut r1).expect("valid");
        let b = run_synthetic_experiments(&pool, 10, 1.0, 50, &mut r2).expect("valid");
        assert_eq!(a, b);
    }

    #[test]
    fn aa_type_i_rate_near_alpha() {
        let pool: Vec<f64> = (0..400).map(|i| ((i * 7919) % 1000) as f64 / 10.0).collect();
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(77);
        let p = run_synthetic_experiments(&pool, 30, 0.0, 2000, &mut rng).expect("valid");
        let rate = p.iter().filter(|&&x| x < 0.05).count() as f64 / p.len() as f64;
        assert!(rate > 0.02 && rate < 0.08, "type I rate = {rate}");
    }

    #[test]
    fn simulation_rejects_bad_arguments() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(1);
        let pool = binary_pool();
        assert!(run_synthetic_experiments(&pool, 51, 0.0, 10, &mut rng).is_err());
        assert!(run_synthetic_experiments(&pool, 1, 0.0, 10, &mut rng).is_err());
        assert!(run_synthetic_experiments(&pool, 10, 0.0, 0, &mut rng).is_err());
        assert!(run_synthetic_experiments(&pool, 10, f64::NAN, 5, &mut rng).is_err());
        assert!(matches!(
            run_synthetic_experiments(&[3.0; 10], 5, 0.0, 3, &mut rng),
            Err(AnalysisError::Degenerate(_))
        ));
    }

    #[test]
    fn sparse_binary_pool_aborts_on_constant_draw() {
        // two ones among 40 values: over half of the draws of 10 see no one at all
        let mut pool = vec![0.0; 38];
        pool.extend([1.0, 1.0]);
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(5);
        assert!(matches!(
            run_synthetic_experiments(&pool, 5, 0.0, 100, &mut rng),
            Err(AnalysisError::Degenerate(_))
        ));
    }

    fn distinct_pool() -> Vec<f64> {
        // 7919 is coprime with 1000, so all 400 values differ
        (0..400).map(|i| ((i * 7919) % 1000) as f64 / 10.0).collect()
    }

    #[test]
    fn type_i_interval_covers_alpha_in_most_runs() {
        let pool = distinct_pool();
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(31);
        let runs = 50;
        let mut covered = 0;
        for _ in 0..runs {
            let aa = run_synthetic_experiments(&pool, 30, 0.0, 400, &mut rng).expect("valid");
            let rates = estimate_errors(&aa, &aa, 0.05).expect("valid");
            if rates.type_i.ci.contains(0.05) {
                covered += 1;
            }
        }
        assert!(covered >= 42, "alpha covered in {covered}/{runs} runs");
    }

    #[test]
    fn aa_mann_whitney_pvalues_roughly_uniform() {
        let pool = distinct_pool();
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(12);
        let n_iter = 1000;
        let mut rejected = 0;
        let mut bins = [0usize; 10];
        for _ in 0..n_iter {
            let picks = index::sample(&mut rng, pool.len(), 60).into_vec();
            let a: Vec<f64> = picks[..30].iter().map(|&i| pool[i]).collect();
            let b: Vec<f64> = picks[30..].iter().map(|&i| pool[i]).collect();
            let r = crate::abtest::ab_test_nonparametric(&a, &b, Alternative::TwoSided, 0.05)
                .expect("should compute");
            if r.significant {
                rejected += 1;
            }
            let p = r.p_value.expect("Mann-Whitney has a p-value");
            bins[((p * 10.0) as usize).min(9)] += 1;
        }
        let rate = rejected as f64 / n_iter as f64;
        assert!(rate > 0.02 && rate < 0.08, "rejection rate = {rate}");
        for (i, &count) in bins.iter().enumerate() {
            assert!((60..=140).contains(&count), "decile {i} holds {count} p-values");
        }
    }

    #[test]
    fn bernoulli_interval() {
        let ci = estimate_ci_bernoulli(0.05, 1000, 0.05).expect("valid");
        let half = 1.959_963_984_540_054 * (0.05_f64 * 0.95 / 1000.0).sqrt();
        assert!((ci.lower - (0.05 - half)).abs() < 1e-9);
        assert!((ci.upper - (0.05 + half)).abs() < 1e-9);
        let zero = estimate_ci_bernoulli(0.0, 10, 0.05).expect("valid");
        assert_eq!((zero.lower, zero.upper), (0.0, 0.0));
        assert!(estimate_ci_bernoulli(1.5, 10, 0.05).is_err());
        assert!(estimate_ci_bernoulli(0.5, 0, 0.05).is_err());
    }

    #[test]
    fn error_rates_and_display() {
        let aa = [0.01, 0.2, 0.5, 0.9];
        let ab = [0.01, 0.02, 0.03, 0.5];
        let r = estimate_errors(&aa, &ab, 0.05).expect("valid");
        assert_eq!(r.type_i.rate, 0.25);
        assert_eq!(r.type_ii.rate, 0.25);
        assert_eq!(r.empirical_power(), 0.75);
        let text = r.to_string();
        assert!(text.starts_with("error I = 0.2500  CI=("));
        assert!(text.contains("\nerror II = 0.2500 CI=("));
        assert!(estimate_errors(&[], &ab, 0.05).is_err());
        assert!(estimate_errors(&aa, &[1.5], 0.05).is_err());
    }

    #[test]
    fn large_effect_has_high_power() {
        let pool: Vec<f64> = (0..200).map(|i| (i % 10) as f64).collect();
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(3);
        let rates = simulate_error_rates(&pool, 40, 4.0, 300, 0.05, &mut rng).expect("valid");
        assert!(rates.empirical_power() > 0.95);
        assert!(rates.type_i.rate < 0.15);
    }
}
