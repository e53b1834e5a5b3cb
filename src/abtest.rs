//! A/B test wrappers sharing one result shape.
//!
//! | Function | Test | Effect |
//! |----------|------|--------|
//! | [`ab_test_bootstrap`] | two-sample bootstrap | `compare(stat(a), stat(b))` |
//! | [`ab_test_nonparametric`] | Mann–Whitney U | median(a) − median(b) |
//! | [`ab_test_parametric_continuous`] | Levene, then Student or Welch t | mean(a) − mean(b) |
//! | [`ab_test_parametric_nominal`] / [`proportions_z_test`] | pooled two-proportion z | p_a − p_b |
//!
//! `a` is the treatment (or first) sample, `b` the control; one-sided
//! alternatives are stated for `a` relative to `b`.

use crate::bootstrap::{self, BootstrapConfig, BootstrapStat, CiMethod, CompareFunc};
use crate::error::{ensure_unit_open, AnalysisError, Result};
use crate::special;
use crate::stats;
use crate::testing::{self, Alternative, ConfidenceInterval, VarianceAssumption};

/// Which test produced an [`AbTestResult`], with its test-specific details.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TestMethod {
    /// Two-sample bootstrap.
    Bootstrap {
        stat: BootstrapStat,
        compare: CompareFunc,
        ci_method: CiMethod,
        n_bootstraps: usize,
    },
    /// Mann–Whitney U test.
    MannWhitney {
        alternative: Alternative,
        /// Exact null distribution rather than normal approximation.
        exact: bool,
    },
    /// Student or Welch t-test chosen by Levene's test.
    TTest {
        alternative: Alternative,
        variance: VarianceAssumption,
        df: f64,
        /// p-value of the preceding Levene test.
        levene_p_value: f64,
    },
    /// Pooled two-proportion z-test.
    ProportionZ {
        alternative: Alternative,
        /// Success rate of `a`.
        rate_a: f64,
        /// Success rate of `b`.
        rate_b: f64,
    },
}

/// Common outcome of every A/B wrapper.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AbTestResult {
    /// Test and its details.
    pub method: TestMethod,
    /// Test statistic; `None` for the bootstrap.
    pub statistic: Option<f64>,
    /// p-value; `None` for the bootstrap.
    pub p_value: Option<f64>,
    /// Point estimate of the treatment effect.
    pub effect: f64,
    /// Interval for the effect, when the test provides one.
    pub ci: Option<ConfidenceInterval>,
    /// Whether H₀ is rejected at the requested level.
    pub significant: bool,
}

/// Bootstrap comparison of `a` against `b`.
///
/// Significant when the interval lies strictly on one side of zero.
///
/// # Examples
///
/// ```
/// use u_experiment::abtest::ab_test_bootstrap;
/// use u_experiment::bootstrap::BootstrapConfig;
///
/// let a = [12.0, 11.5, 13.2, 12.8, 11.9, 12.4, 13.0, 12.2];
/// let b = [10.1, 9.8, 10.5, 10.0, 9.6, 10.3, 10.2, 9.9];
/// let r = ab_test_bootstrap(&a, &b, &BootstrapConfig { seed: Some(1), ..Default::default() }).unwrap();
/// assert!(r.significant && r.effect > 0.0);
/// ```
pub fn ab_test_bootstrap(a: &[f64], b: &[f64], config: &BootstrapConfig) -> Result<AbTestResult> {
    let outcome = bootstrap::bootstrap_compare(a, b, config)?;
    Ok(AbTestResult {
        method: TestMethod::Bootstrap {
            stat: config.stat,
            compare: config.compare,
            ci_method: config.ci_method,
            n_bootstraps: config.n_bootstraps,
        },
        statistic: None,
        p_value: None,
        effect: outcome.effect,
        significant: outcome.ci.excludes_zero(),
        ci: Some(outcome.ci),
    })
}

/// Mann–Whitney U comparison; effect is the difference in medians.
pub fn ab_test_nonparametric(
    a: &[f64],
    b: &[f64],
    alternative: Alternative,
    alpha: f64,
) -> Result<AbTestResult> {
    ensure_unit_open("alpha", alpha)?;
    let mw = testing::mann_whitney_u_test(a, b, alternative)?;
    let effect = stats::median(a).unwrap_or(f64::NAN) - stats::median(b).unwrap_or(f64::NAN);
    Ok(AbTestResult {
        method: TestMethod::MannWhitney {
            alternative,
            exact: mw.exact,
        },
        statistic: Some(mw.statistic),
        p_value: Some(mw.p_value),
        effect,
        ci: None,
        significant: mw.p_value <= alpha,
    })
}

/// t-test on continuous samples, pooled when Levene's test does not
/// reject equal variances (`p > alpha`), Welch otherwise.
///
/// # Examples
///
/// ```
/// use u_experiment::abtest::{ab_test_parametric_continuous, TestMethod};
/// use u_experiment::testing::{Alternative, VarianceAssumption};
///
/// let a = [5.2, 5.8, 6.1, 5.5, 6.0, 5.7];
/// let b = [4.9, 5.1, 5.4, 4.8, 5.0, 5.3];
/// let r = ab_test_parametric_continuous(&a, &b, Alternative::TwoSided, 0.05).unwrap();
/// assert!(matches!(r.method, TestMethod::TTest { variance: VarianceAssumption::Pooled, .. }));
/// assert!(r.significant);
/// ```
pub fn ab_test_parametric_continuous(
    a: &[f64],
    b: &[f64],
    alternative: Alternative,
    alpha: f64,
) -> Result<AbTestResult> {
    ensure_unit_open("alpha", alpha)?;
    let levene = testing::levene_test(&[a, b])?;
    let variance = if levene.p_value > alpha {
        VarianceAssumption::Pooled
    } else {
        VarianceAssumption::Unequal
    };
    tracing::debug!(levene_p = levene.p_value, ?variance, "t-test variance model");

    let t = testing::t_test_ind(a, b, variance, alternative)?;
    let ci = t.confidence_interval(alpha, alternative)?;
    Ok(AbTestResult {
        method: TestMethod::TTest {
            alternative,
            variance,
            df: t.df,
            levene_p_value: levene.p_value,
        },
        statistic: Some(t.statistic),
        p_value: Some(t.p_value),
        effect: t.mean_difference,
        ci: Some(ci),
        significant: t.p_value <= alpha,
    })
}

/// Two-proportion z-test on 0/1 samples.
///
/// # Errors
///
/// `InvalidArgument` if a value is neither 0 nor 1, plus the errors of
/// [`proportions_z_test`].
pub fn ab_test_parametric_nominal(
    a: &[f64],
    b: &[f64],
    alternative: Alternative,
    alpha: f64,
) -> Result<AbTestResult> {
    let successes = |data: &[f64]| -> Result<u64> {
        let mut count = 0;
        for &v in data {
            if v == 1.0 {
                count += 1;
            } else if v != 0.0 {
                return Err(AnalysisError::invalid(format!(
                    "nominal samples must hold 0/1 values, found {v}"
                )));
            }
        }
        Ok(count)
    };
    proportions_z_test(
        successes(a)?,
        a.len() as u64,
        successes(b)?,
        b.len() as u64,
        alternative,
        alpha,
    )
}

/// Pooled two-proportion z-test on success counts.
///
/// The interval is the unpooled Wald interval
/// `p_a − p_b ± z₁₋α/₂ √(p_a(1−p_a)/n_a + p_b(1−p_b)/n_b)`.
///
/// # Examples
///
/// ```
/// use u_experiment::abtest::proportions_z_test;
/// use u_experiment::testing::Alternative;
///
/// let r = proportions_z_test(150, 1000, 100, 1000, Alternative::TwoSided, 0.05).unwrap();
/// assert!((r.effect - 0.05).abs() < 1e-12);
/// assert!(r.significant);
/// ```
pub fn proportions_z_test(
    successes_a: u64,
    n_a: u64,
    successes_b: u64,
    n_b: u64,
    alternative: Alternative,
    alpha: f64,
) -> Result<AbTestResult> {
    ensure_unit_open("alpha", alpha)?;
    let z = testing::two_proportion_z_test(successes_a, n_a, successes_b, n_b, alternative)?;

    let rate_a = successes_a as f64 / n_a as f64;
    let rate_b = successes_b as f64 / n_b as f64;
    let effect = rate_a - rate_b;
    let se = (rate_a * (1.0 - rate_a) / n_a as f64 + rate_b * (1.0 - rate_b) / n_b as f64).sqrt();
    let half = special::inverse_normal_cdf(1.0 - alpha / 2.0) * se;

    Ok(AbTestResult {
        method: TestMethod::ProportionZ {
            alternative,
            rate_a,
            rate_b,
        },
        statistic: Some(z.statistic),
        p_value: Some(z.p_value),
        effect,
        ci: Some(ConfidenceInterval {
            lower: effect - half,
            upper: effect + half,
            level: 1.0 - alpha,
        }),
        significant: z.p_value <= alpha,
    })
}
