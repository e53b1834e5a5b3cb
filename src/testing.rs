//! Hypothesis testing primitives.
//!
//! Two-sample t-tests (pooled and Welch), one-way ANOVA, Levene's test for
//! equal variances, the Mann–Whitney U test and the pooled two-proportion
//! z-test. The A/B wrappers in [`crate::abtest`] are built on these.
//!
//! # Examples
//!
//! ```
//! use u_experiment::testing::{t_test_ind, Alternative, VarianceAssumption};
//!
//! let a = [5.1, 4.9, 5.2, 5.0, 4.8];
//! let b = [7.1, 6.9, 7.2, 7.0, 6.8];
//! let r = t_test_ind(&a, &b, VarianceAssumption::Pooled, Alternative::TwoSided).unwrap();
//! assert!(r.p_value < 0.01); // means clearly differ
//! ```

use std::fmt;
use std::str::FromStr;

use crate::error::{ensure_finite, ensure_len, AnalysisError, Result};
use crate::special;
use crate::stats;

/// Result of a hypothesis test.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TestResult {
    /// Test statistic (t, F, U or z depending on test).
    pub statistic: f64,
    /// Degrees of freedom (fractional for Welch, 0 where not applicable).
    pub df: f64,
    /// p-value for the requested alternative.
    pub p_value: f64,
}

/// Alternative hypothesis, stated for the first sample relative to the
/// second.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Alternative {
    /// The samples differ in either direction.
    #[default]
    TwoSided,
    /// The first sample is stochastically larger / has the larger mean.
    Greater,
    /// The first sample is stochastically smaller / has the smaller mean.
    Less,
}

impl fmt::Display for Alternative {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Alternative::TwoSided => write!(f, "two-sided"),
            Alternative::Greater => write!(f, "greater"),
            Alternative::Less => write!(f, "less"),
        }
    }
}

impl FromStr for Alternative {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "two-sided" | "two_sided" => Ok(Alternative::TwoSided),
            "greater" | "larger" => Ok(Alternative::Greater),
            "less" | "smaller" => Ok(Alternative::Less),
            other => Err(AnalysisError::invalid(format!(
                "alternative must be 'two-sided', 'greater' or 'less', got '{other}'"
            ))),
        }
    }
}

/// Confidence interval bounds. One-sided intervals use ±∞ for the open end.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ConfidenceInterval {
    /// Lower bound.
    pub lower: f64,
    /// Upper bound.
    pub upper: f64,
    /// Nominal coverage, e.g. 0.95.
    pub level: f64,
}

impl ConfidenceInterval {
    /// True when `x` lies inside the closed interval.
    pub fn contains(&self, x: f64) -> bool {
        x >= self.lower && x <= self.upper
    }

    /// True when the whole interval lies strictly on one side of zero.
    pub fn excludes_zero(&self) -> bool {
        (self.lower > 0.0 && self.upper > 0.0) || (self.lower < 0.0 && self.upper < 0.0)
    }
}

/// Converts a statistic's tail probabilities into a p-value.
fn p_from_tails(alternative: Alternative, cdf: f64, sf: f64) -> f64 {
    let p = match alternative {
        Alternative::TwoSided => 2.0 * cdf.min(sf),
        Alternative::Greater => sf,
        Alternative::Less => cdf,
    };
    p.clamp(0.0, 1.0)
}

fn z_p_value(z: f64, alternative: Alternative) -> f64 {
    p_from_tails(
        alternative,
        special::standard_normal_cdf(z),
        special::standard_normal_sf(z),
    )
}

// ---------------------------------------------------------------------------
// t-tests
// ---------------------------------------------------------------------------

/// Variance model of the two-sample t-test.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum VarianceAssumption {
    /// Equal variances: pooled estimate, df = n₁ + n₂ − 2 (Student).
    Pooled,
    /// Unequal variances: Welch–Satterthwaite df.
    Unequal,
}

/// Two-sample t-test outcome with the pieces needed for an interval.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TTestResult {
    /// t statistic.
    pub statistic: f64,
    /// Degrees of freedom.
    pub df: f64,
    /// p-value for the requested alternative.
    pub p_value: f64,
    /// x̄₁ − x̄₂.
    pub mean_difference: f64,
    /// Standard error of the difference.
    pub std_error: f64,
    /// Variance model used.
    pub variance: VarianceAssumption,
}

impl TTestResult {
    /// Confidence interval for the mean difference at level `1 − alpha`.
    ///
    /// One-sided alternatives give a half-open interval: `Greater` yields
    /// `(d − t₁₋α·se, ∞)`, `Less` yields `(−∞, d + t₁₋α·se)`.
    pub fn confidence_interval(
        &self,
        alpha: f64,
        alternative: Alternative,
    ) -> Result<ConfidenceInterval> {
        crate::error::ensure_unit_open("alpha", alpha)?;
        let d = self.mean_difference;
        let (lower, upper) = match alternative {
            Alternative::TwoSided => {
                let q = special::t_distribution_quantile(1.0 - alpha / 2.0, self.df)?;
                (d - q * self.std_error, d + q * self.std_error)
            }
            Alternative::Greater => {
                let q = special::t_distribution_quantile(1.0 - alpha, self.df)?;
                (d - q * self.std_error, f64::INFINITY)
            }
            Alternative::Less => {
                let q = special::t_distribution_quantile(1.0 - alpha, self.df)?;
                (f64::NEG_INFINITY, d + q * self.std_error)
            }
        };
        Ok(ConfidenceInterval {
            lower,
            upper,
            level: 1.0 - alpha,
        })
    }
}

/// Independent two-sample t-test: H₀: μ₁ = μ₂.
///
/// # Algorithm
///
/// Pooled: s_p² = ((n₁−1)s₁² + (n₂−1)s₂²)/(n₁+n₂−2), se = s_p √(1/n₁ + 1/n₂).
/// Unequal: se = √(s₁²/n₁ + s₂²/n₂), df by Welch–Satterthwaite.
/// t = (x̄₁ − x̄₂) / se.
///
/// # Errors
///
/// `InsufficientData` if either sample has fewer than 2 observations,
/// `NonFinite` for NaN/∞, `Degenerate` if the standard error is zero.
///
/// # References
///
/// Welch (1947). "The generalization of Student's problem when several
/// different population variances are involved". Biometrika, 34, 28–35.
pub fn t_test_ind(
    a: &[f64],
    b: &[f64],
    variance: VarianceAssumption,
    alternative: Alternative,
) -> Result<TTestResult> {
    ensure_len(a, 2)?;
    ensure_len(b, 2)?;
    ensure_finite(a)?;
    ensure_finite(b)?;

    let n1f = a.len() as f64;
    let n2f = b.len() as f64;
    let mean1 = stats::mean(a).unwrap_or(0.0);
    let mean2 = stats::mean(b).unwrap_or(0.0);
    let var1 = stats::variance(a).unwrap_or(0.0);
    let var2 = stats::variance(b).unwrap_or(0.0);

    let (se_sq, df) = match variance {
        VarianceAssumption::Pooled => {
            let df = n1f + n2f - 2.0;
            let sp_sq = ((n1f - 1.0) * var1 + (n2f - 1.0) * var2) / df;
            (sp_sq * (1.0 / n1f + 1.0 / n2f), df)
        }
        VarianceAssumption::Unequal => {
            // Welch-Satterthwaite degrees of freedom
            let v1 = var1 / n1f;
            let v2 = var2 / n2f;
            let df = (v1 + v2).powi(2) / (v1 * v1 / (n1f - 1.0) + v2 * v2 / (n2f - 1.0));
            (v1 + v2, df)
        }
    };

    if se_sq < 1e-300 {
        return Err(AnalysisError::degenerate(
            "t-test undefined: both samples have zero variance",
        ));
    }

    let se = se_sq.sqrt();
    let diff = mean1 - mean2;
    let t = diff / se;
    let p_value = p_from_tails(
        alternative,
        special::t_distribution_cdf(t, df)?,
        special::t_distribution_sf(t, df)?,
    );

    Ok(TTestResult {
        statistic: t,
        df,
        p_value,
        mean_difference: diff,
        std_error: se,
        variance,
    })
}

// ---------------------------------------------------------------------------
// ANOVA / Levene
// ---------------------------------------------------------------------------

/// Result of one-way ANOVA.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AnovaResult {
    /// F-statistic.
    pub f_statistic: f64,
    /// Degrees of freedom between groups.
    pub df_between: usize,
    /// Degrees of freedom within groups.
    pub df_within: usize,
    /// p-value.
    pub p_value: f64,
    /// Group means.
    pub group_means: Vec<f64>,
    /// Grand mean.
    pub grand_mean: f64,
}

/// One-way ANOVA: H₀: all group means are equal.
///
/// # Algorithm
///
/// F = MS_between / MS_within where
/// MS_between = SS_between / (k-1),
/// MS_within = SS_within / (N-k).
///
/// # Errors
///
/// `InvalidArgument` for fewer than 2 groups, `InsufficientData` when a
/// group has fewer than 2 observations, `Degenerate` when every group is
/// constant and the group means coincide (F = 0/0).
///
/// # References
///
/// Fisher (1925). "Statistical Methods for Research Workers".
pub fn one_way_anova(groups: &[&[f64]]) -> Result<AnovaResult> {
    let k = groups.len();
    if k < 2 {
        return Err(AnalysisError::invalid("ANOVA needs at least 2 groups"));
    }
    for g in groups {
        ensure_len(g, 2)?;
        ensure_finite(g)?;
    }

    let total_n: usize = groups.iter().map(|g| g.len()).sum();
    let grand_mean = groups.iter().flat_map(|g| g.iter()).sum::<f64>() / total_n as f64;
    let group_means: Vec<f64> = groups
        .iter()
        .map(|g| g.iter().sum::<f64>() / g.len() as f64)
        .collect();

    let ss_between: f64 = groups
        .iter()
        .zip(group_means.iter())
        .map(|(g, &gm)| g.len() as f64 * (gm - grand_mean).powi(2))
        .sum();
    let ss_within: f64 = groups
        .iter()
        .zip(group_means.iter())
        .map(|(g, &gm)| g.iter().map(|&x| (x - gm).powi(2)).sum::<f64>())
        .sum();

    let df_between = k - 1;
    let df_within = total_n - k;
    let ms_between = ss_between / df_between as f64;
    let ms_within = ss_within / df_within as f64;

    let (f_statistic, p_value) = if ms_within > 1e-300 {
        let f = ms_between / ms_within;
        (
            f,
            special::f_distribution_sf(f, df_between as f64, df_within as f64)?,
        )
    } else if ms_between > 1e-300 {
        (f64::INFINITY, 0.0)
    } else {
        return Err(AnalysisError::degenerate(
            "ANOVA undefined: no variation within or between groups",
        ));
    };

    Ok(AnovaResult {
        f_statistic,
        df_between,
        df_within,
        p_value,
        group_means,
        grand_mean,
    })
}

/// Levene's test for equality of variances (Brown–Forsythe variant).
///
/// # Algorithm
///
/// 1. zᵢⱼ = |xᵢⱼ − median(group i)|
/// 2. One-way ANOVA on the z values
///
/// Centring on the median makes the test robust to non-normal data.
///
/// # References
///
/// - Levene (1960). "Robust tests for equality of variances". In
///   Olkin (Ed.), Contributions to Probability and Statistics.
/// - Brown & Forsythe (1974). "Robust tests for the equality of variances".
///   JASA, 69(346), 364–367.
///
/// # Examples
///
/// ```
/// use u_experiment::testing::levene_test;
///
/// let g1 = [4.9, 5.0, 5.0, 5.1, 5.0]; // tight cluster (low variance)
/// let g2 = [0.0, 3.0, 5.0, 7.0, 10.0]; // wide spread (high variance)
/// let r = levene_test(&[&g1, &g2]).unwrap();
/// assert!(r.p_value < 0.05); // clear variance difference
/// ```
pub fn levene_test(groups: &[&[f64]]) -> Result<TestResult> {
    if groups.len() < 2 {
        return Err(AnalysisError::invalid("Levene's test needs at least 2 groups"));
    }
    for g in groups {
        ensure_len(g, 2)?;
        ensure_finite(g)?;
    }

    let z_groups: Vec<Vec<f64>> = groups
        .iter()
        .map(|g| {
            let median = stats::median(g).unwrap_or(0.0);
            g.iter().map(|&x| (x - median).abs()).collect()
        })
        .collect();

    let z_refs: Vec<&[f64]> = z_groups.iter().map(|v| v.as_slice()).collect();
    let anova = one_way_anova(&z_refs)?;

    Ok(TestResult {
        statistic: anova.f_statistic,
        df: anova.df_between as f64,
        p_value: anova.p_value,
    })
}

// ---------------------------------------------------------------------------
// Mann-Whitney U
// ---------------------------------------------------------------------------

/// Largest smaller-sample size for which the exact U distribution is used.
pub const MANN_WHITNEY_EXACT_MAX: usize = 8;

/// Mann–Whitney U outcome.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MannWhitneyResult {
    /// U statistic of the first sample.
    pub statistic: f64,
    /// p-value for the requested alternative.
    pub p_value: f64,
    /// Whether the exact null distribution was used.
    pub exact: bool,
}

/// Mann–Whitney U test: H₀: the two samples come from the same
/// distribution.
///
/// # Algorithm
///
/// 1. Combine samples, rank all observations (average ranks for ties)
/// 2. U₁ = R₁ − n₁(n₁+1)/2 where R₁ = sum of ranks in sample 1
/// 3. If the smaller sample has at most 8 observations and there are no
///    ties, the p-value comes from the exact null distribution of U
///    (coefficients of the Gaussian binomial [n₁+n₂ choose n₁]_q).
///    Otherwise the normal approximation with tie and continuity
///    correction is used: z = (U − n₁n₂/2 − ½) / σ.
///
/// # References
///
/// - Mann & Whitney (1947). "On a test of whether one of two random
///   variables is stochastically larger than the other". Annals of
///   Mathematical Statistics, 18(1), 50–60.
///
/// # Examples
///
/// ```
/// use u_experiment::testing::{mann_whitney_u_test, Alternative};
///
/// let a = [1.0, 2.0, 3.0, 4.0, 5.0];
/// let b = [6.0, 7.0, 8.0, 9.0, 10.0];
/// let r = mann_whitney_u_test(&a, &b, Alternative::TwoSided).unwrap();
/// assert_eq!(r.statistic, 0.0);
/// assert!(r.exact && r.p_value < 0.05);
/// ```
pub fn mann_whitney_u_test(
    a: &[f64],
    b: &[f64],
    alternative: Alternative,
) -> Result<MannWhitneyResult> {
    ensure_len(a, 1)?;
    ensure_len(b, 1)?;
    ensure_finite(a)?;
    ensure_finite(b)?;

    let n1 = a.len();
    let n2 = b.len();
    let n1f = n1 as f64;
    let n2f = n2 as f64;
    let nf = (n1 + n2) as f64;

    let mut combined: Vec<(f64, usize)> = Vec::with_capacity(n1 + n2);
    combined.extend(a.iter().map(|&v| (v, 0)));
    combined.extend(b.iter().map(|&v| (v, 1)));
    combined.sort_by(|x, y| x.0.total_cmp(&y.0));

    let ranks = average_ranks(&combined);
    let r1: f64 = combined
        .iter()
        .zip(ranks.iter())
        .filter(|((_, g), _)| *g == 0)
        .map(|(_, &r)| r)
        .sum();

    let u1 = r1 - n1f * (n1f + 1.0) / 2.0;
    let u2 = n1f * n2f - u1;
    let tie_correction = compute_tie_correction(&combined);

    // U whose upper tail measures evidence for the alternative
    let u = match alternative {
        Alternative::TwoSided => u1.max(u2),
        Alternative::Greater => u1,
        Alternative::Less => u2,
    };

    if n1.min(n2) <= MANN_WHITNEY_EXACT_MAX && tie_correction == 0.0 {
        let mut p_value = exact_u_upper_tail(n1, n2, u.round() as usize);
        if alternative == Alternative::TwoSided {
            p_value = (2.0 * p_value).min(1.0);
        }
        return Ok(MannWhitneyResult {
            statistic: u1,
            p_value,
            exact: true,
        });
    }

    let mu = n1f * n2f / 2.0;
    let sigma_sq = n1f * n2f / 12.0 * (nf + 1.0 - tie_correction / (nf * (nf - 1.0)));
    if sigma_sq <= 0.0 {
        return Err(AnalysisError::degenerate(
            "Mann-Whitney undefined: all observations are tied",
        ));
    }
    let z = (u - mu - 0.5) / sigma_sq.sqrt();
    let mut p_value = special::standard_normal_sf(z);
    if alternative == Alternative::TwoSided {
        p_value *= 2.0;
    }

    Ok(MannWhitneyResult {
        statistic: u1,
        p_value: p_value.clamp(0.0, 1.0),
        exact: false,
    })
}

/// P(U ≥ u) under H₀ for sample sizes (m, n) without ties.
fn exact_u_upper_tail(m: usize, n: usize, u: usize) -> f64 {
    let counts = u_null_counts(m.min(n), m.max(n));
    let total: f64 = counts.iter().map(|&c| c as f64).sum();
    let upper: f64 = counts.iter().skip(u).map(|&c| c as f64).sum();
    upper / total
}

/// Number of rank arrangements giving each U = 0..=m·n, read off the
/// Gaussian binomial ∏ᵢ (1 − q^{n+i}) / (1 − qⁱ), i = 1..=m.
fn u_null_counts(m: usize, n: usize) -> Vec<i128> {
    let max_u = m * n;
    let mut c = vec![0_i128; max_u + 1];
    c[0] = 1;
    for i in 1..=m {
        let k = n + i;
        for u in (k..=max_u).rev() {
            c[u] -= c[u - k];
        }
    }
    for i in 1..=m {
        for u in i..=max_u {
            c[u] += c[u - i];
        }
    }
    c
}

// Assign average ranks (1-based) to sorted (value, group) pairs
fn average_ranks(sorted: &[(f64, usize)]) -> Vec<f64> {
    let n = sorted.len();
    let mut ranks = vec![0.0; n];
    let mut i = 0;
    while i < n {
        let mut j = i + 1;
        while j < n && sorted[j].0 == sorted[i].0 {
            j += 1;
        }
        // Positions i..j are tied; average rank = (i+1 + j) / 2
        let avg_rank = (i + 1 + j) as f64 / 2.0;
        for rank in ranks.iter_mut().take(j).skip(i) {
            *rank = avg_rank;
        }
        i = j;
    }
    ranks
}

// Compute tie correction factor: Σ tₖ(tₖ² - 1) for all tie groups
fn compute_tie_correction(sorted: &[(f64, usize)]) -> f64 {
    let n = sorted.len();
    let mut correction = 0.0;
    let mut i = 0;
    while i < n {
        let mut j = i + 1;
        while j < n && sorted[j].0 == sorted[i].0 {
            j += 1;
        }
        let t = (j - i) as f64;
        if t > 1.0 {
            correction += t * (t * t - 1.0);
        }
        i = j;
    }
    correction
}

// ---------------------------------------------------------------------------
// Proportions
// ---------------------------------------------------------------------------

/// Pooled two-proportion z-test: H₀: p₁ = p₂.
///
/// # Algorithm
///
/// p̂ = (x₁ + x₂)/(n₁ + n₂), z = (x₁/n₁ − x₂/n₂) / √(p̂(1−p̂)(1/n₁ + 1/n₂)).
///
/// # Errors
///
/// `InvalidArgument` if a group is empty or has more successes than
/// trials; `Degenerate` when the pooled proportion is 0 or 1.
pub fn two_proportion_z_test(
    successes_a: u64,
    n_a: u64,
    successes_b: u64,
    n_b: u64,
    alternative: Alternative,
) -> Result<TestResult> {
    if n_a == 0 || n_b == 0 {
        return Err(AnalysisError::invalid("both groups need at least one trial"));
    }
    if successes_a > n_a || successes_b > n_b {
        return Err(AnalysisError::invalid("successes exceed number of trials"));
    }
    let (x1, x2) = (successes_a as f64, successes_b as f64);
    let (n1, n2) = (n_a as f64, n_b as f64);
    let pooled = (x1 + x2) / (n1 + n2);
    let var = pooled * (1.0 - pooled) * (1.0 / n1 + 1.0 / n2);
    if var <= 0.0 {
        return Err(AnalysisError::degenerate(
            "z-test undefined: pooled proportion is 0 or 1",
        ));
    }
    let z = (x1 / n1 - x2 / n2) / var.sqrt();
    Ok(TestResult {
        statistic: z,
        df: 0.0,
        p_value: z_p_value(z, alternative),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    // -----------------------------------------------------------------------
    // t-tests
    // -----------------------------------------------------------------------

    #[test]
    fn pooled_reference_value() {
        // scipy.stats.ttest_ind([1,2,3,4,5], [3,4,5,6,7]) -> t = -2.0, p = 0.0805
        let a = [1.0, 2.0, 3.0, 4.0, 5.0];
        let b = [3.0, 4.0, 5.0, 6.0, 7.0];
        let r = t_test_ind(&a, &b, VarianceAssumption::Pooled, Alternative::TwoSided)
            .expect("should compute");
        assert!((r.statistic + 2.0).abs() < 1e-12);
        assert_eq!(r.df, 8.0);
        assert!((r.p_value - 0.080_516).abs() < 1e-4, "p = {}", r.p_value);
        assert_eq!(r.mean_difference, -2.0);
    }

    #[test]
    fn welch_df_smaller_than_pooled() {
        let a = [1.0, 2.0, 3.0, 2.0, 1.5, 2.5];
        let b = [10.0, 15.0, 5.0, 20.0, 0.0, 12.0, 8.0];
        let w = t_test_ind(&a, &b, VarianceAssumption::Unequal, Alternative::TwoSided)
            .expect("should compute");
        let p = t_test_ind(&a, &b, VarianceAssumption::Pooled, Alternative::TwoSided)
            .expect("should compute");
        assert!(w.df < p.df);
        assert!((w.statistic - w.mean_difference / w.std_error).abs() < 1e-12);
    }

    #[test]
    fn one_sided_p_values_split_two_sided() {
        let a = [5.0, 6.0, 7.0, 6.5, 5.5];
        let b = [4.0, 5.0, 4.5, 5.5, 4.8];
        let two = t_test_ind(&a, &b, VarianceAssumption::Pooled, Alternative::TwoSided)
            .expect("should compute");
        let greater = t_test_ind(&a, &b, VarianceAssumption::Pooled, Alternative::Greater)
            .expect("should compute");
        let less = t_test_ind(&a, &b, VarianceAssumption::Pooled, Alternative::Less)
            .expect("should compute");
        assert!((greater.p_value * 2.0 - two.p_value).abs() < 1e-12);
        assert!((greater.p_value + less.p_value - 1.0).abs() < 1e-12);
    }

    #[test]
    fn t_test_edge_cases() {
        let v = VarianceAssumption::Pooled;
        let alt = Alternative::TwoSided;
        assert!(t_test_ind(&[1.0], &[2.0, 3.0], v, alt).is_err());
        assert!(matches!(
            t_test_ind(&[1.0, 1.0], &[1.0, 1.0], v, alt),
            Err(AnalysisError::Degenerate(_))
        ));
        assert_eq!(
            t_test_ind(&[1.0, f64::NAN], &[1.0, 2.0], v, alt),
            Err(AnalysisError::NonFinite)
        );
    }

    #[test]
    fn confidence_interval_brackets_difference() {
        let a = [1.0, 2.0, 3.0, 4.0, 5.0];
        let b = [3.0, 4.0, 5.0, 6.0, 7.0];
        let r = t_test_ind(&a, &b, VarianceAssumption::Pooled, Alternative::TwoSided)
            .expect("should compute");
        let ci = r.confidence_interval(0.05, Alternative::TwoSided).expect("valid");
        // -2 ± 2.306 * 1.0
        assert!((ci.lower + 4.306).abs() < 1e-3, "lower = {}", ci.lower);
        assert!((ci.upper - 0.306).abs() < 1e-3, "upper = {}", ci.upper);
        assert!(ci.contains(0.0));

        let greater = r.confidence_interval(0.05, Alternative::Greater).expect("valid");
        assert_eq!(greater.upper, f64::INFINITY);
        let less = r.confidence_interval(0.05, Alternative::Less).expect("valid");
        assert_eq!(less.lower, f64::NEG_INFINITY);
    }

    // -----------------------------------------------------------------------
    // ANOVA / Levene
    // -----------------------------------------------------------------------

    #[test]
    fn anova_distinct_groups() {
        let g1 = [5.0, 6.0, 7.0, 5.5, 6.5];
        let g2 = [8.0, 9.0, 8.5, 9.5, 8.0];
        let g3 = [4.0, 3.0, 3.5, 4.5, 4.0];
        let r = one_way_anova(&[&g1, &g2, &g3]).expect("should compute");
        assert!(r.p_value < 0.01);
        assert_eq!(r.df_between, 2);
        assert_eq!(r.df_within, 12);
    }

    #[test]
    fn levene_equal_spread() {
        let g1 = [1.0, 2.0, 3.0, 4.0, 5.0];
        let g2 = [11.0, 12.0, 13.0, 14.0, 15.0];
        let r = levene_test(&[&g1, &g2]).expect("should compute");
        assert!(r.statistic.abs() < 1e-12);
        assert!((r.p_value - 1.0).abs() < 1e-9);
    }

    #[test]
    fn levene_edge_cases() {
        assert!(levene_test(&[&[1.0, 2.0]]).is_err());
        assert!(levene_test(&[&[1.0], &[1.0, 2.0]]).is_err());
    }

    // -----------------------------------------------------------------------
    // Mann-Whitney
    // -----------------------------------------------------------------------

    #[test]
    fn u_null_counts_small_case() {
        // m = 2, n = 2: U in 0..=4 with counts 1,1,2,1,1 (C(4,2) = 6)
        assert_eq!(u_null_counts(2, 2), vec![1, 1, 2, 1, 1]);
        let c = u_null_counts(3, 5);
        assert_eq!(c.iter().sum::<i128>(), 56); // C(8,3)
        assert!(c.iter().all(|&x| x >= 0));
    }

    #[test]
    fn mann_whitney_exact_reference() {
        // complete separation, n1 = n2 = 5: p = 2 / C(10,5) = 2/252
        let a = [1.0, 2.0, 3.0, 4.0, 5.0];
        let b = [6.0, 7.0, 8.0, 9.0, 10.0];
        let r = mann_whitney_u_test(&a, &b, Alternative::TwoSided).expect("should compute");
        assert!(r.exact);
        assert!((r.p_value - 2.0 / 252.0).abs() < 1e-12);
        let less = mann_whitney_u_test(&a, &b, Alternative::Less).expect("should compute");
        assert!((less.p_value - 1.0 / 252.0).abs() < 1e-12);
        let greater = mann_whitney_u_test(&a, &b, Alternative::Greater).expect("should compute");
        assert!((greater.p_value - 1.0).abs() < 1e-12);
    }

    #[test]
    fn mann_whitney_asymptotic_with_ties() {
        let a = [1.0, 2.0, 2.0, 3.0, 4.0, 5.0, 5.0, 6.0, 7.0, 8.0];
        let b = [5.0, 6.0, 7.0, 7.0, 8.0, 9.0, 10.0, 11.0, 12.0, 12.0];
        let r = mann_whitney_u_test(&a, &b, Alternative::TwoSided).expect("should compute");
        assert!(!r.exact);
        assert!(r.p_value < 0.05, "p = {}", r.p_value);
        assert!(r.statistic < 50.0);
    }

    #[test]
    fn mann_whitney_identical_samples() {
        let a: Vec<f64> = (0..20).map(|i| i as f64).collect();
        let r = mann_whitney_u_test(&a, &a, Alternative::TwoSided).expect("should compute");
        assert_eq!(r.statistic, 200.0);
        assert!(r.p_value > 0.9);
        assert!(matches!(
            mann_whitney_u_test(&[1.0; 10], &[1.0; 10], Alternative::TwoSided),
            Err(AnalysisError::Degenerate(_))
        ));
    }

    // -----------------------------------------------------------------------
    // Proportions
    // -----------------------------------------------------------------------

    #[test]
    fn z_test_reference() {
        // 120/1000 vs 100/1000: pooled p = 0.11, z = 0.02 / sqrt(0.11*0.89*0.002)
        let r = two_proportion_z_test(120, 1000, 100, 1000, Alternative::TwoSided)
            .expect("should compute");
        let expected_z = 0.02 / (0.11_f64 * 0.89 * 0.002).sqrt();
        assert!((r.statistic - expected_z).abs() < 1e-12);
        assert!((r.p_value - 0.1529).abs() < 1e-3, "p = {}", r.p_value);
    }

    #[test]
    fn z_test_edge_cases() {
        let alt = Alternative::TwoSided;
        assert!(two_proportion_z_test(0, 0, 1, 2, alt).is_err());
        assert!(two_proportion_z_test(3, 2, 1, 2, alt).is_err());
        assert!(matches!(
            two_proportion_z_test(0, 10, 0, 10, alt),
            Err(AnalysisError::Degenerate(_))
        ));
    }

    #[test]
    fn alternative_parsing() {
        assert_eq!("two-sided".parse::<Alternative>(), Ok(Alternative::TwoSided));
        assert_eq!("larger".parse::<Alternative>(), Ok(Alternative::Greater));
        assert!("sideways".parse::<Alternative>().is_err());
        assert_eq!(Alternative::Less.to_string(), "less");
    }

    #[test]
    fn interval_sign_checks() {
        let ci = ConfidenceInterval { lower: 0.1, upper: 0.5, level: 0.95 };
        assert!(ci.excludes_zero());
        let ci = ConfidenceInterval { lower: -0.1, upper: 0.5, level: 0.95 };
        assert!(!ci.excludes_zero());
        let ci = ConfidenceInterval { lower: 0.0, upper: 0.0, level: 0.95 };
        assert!(!ci.excludes_zero());
    }
}
