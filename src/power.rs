//! Power analysis and sample-size planning.
//!
//! Closed-form expressions over standard-normal quantiles. Nothing here
//! iterates: every function is one algebraic formula, with the pilot
//! standard deviation (denominator `n − 1`) taken from a sample where the
//! formula needs one.
//!
//! Notation: z_a = Φ⁻¹(1 − α/2), z_b = Φ⁻¹(power).
//!
//! # Examples
//!
//! ```
//! use u_experiment::power::min_sample_size_nominal;
//!
//! // 10% baseline conversion, detect +2 points at α = 0.05 with 80% power
//! let n = min_sample_size_nominal(0.10, 0.02, 0.05, 0.8).unwrap();
//! assert_eq!(n, 3842);
//! ```

use crate::error::{ensure_finite, ensure_len, ensure_unit_open, AnalysisError, Result};
use crate::special::inverse_normal_cdf;
use crate::stats;

/// (z_{1−α/2} + z_{power}) after validating both parameters.
fn z_sum(alpha: f64, power: f64) -> Result<f64> {
    ensure_unit_open("alpha", alpha)?;
    ensure_unit_open("power", power)?;
    Ok(inverse_normal_cdf(1.0 - alpha / 2.0) + inverse_normal_cdf(power))
}

fn ensure_effect(name: &str, effect: f64) -> Result<()> {
    if effect.is_finite() && effect != 0.0 {
        Ok(())
    } else {
        Err(AnalysisError::invalid(format!(
            "{name} must be finite and non-zero, got {effect}"
        )))
    }
}

/// Pilot sample size and standard deviation.
fn pilot(data: &[f64]) -> Result<(f64, f64)> {
    ensure_len(data, 2)?;
    ensure_finite(data)?;
    let sd = stats::std_dev(data).ok_or(AnalysisError::InsufficientData {
        needed: 2,
        got: data.len(),
    })?;
    Ok((data.len() as f64, sd))
}

fn round_count(n: f64) -> Result<u64> {
    if !n.is_finite() || n < 0.0 {
        return Err(AnalysisError::degenerate(format!(
            "sample size evaluated to {n}"
        )));
    }
    Ok(n.round() as u64)
}

/// Minimum detectable effect of a mean metric, given the pilot sample and
/// the share `test_size` of traffic routed to the test group:
///
/// MDE = sd · √((z_a + z_b)² (1/q₀ + 1/q₁) / n), q₀ = test_size, q₁ = 1 − q₀.
pub fn mde_mean(data: &[f64], test_size: f64, alpha: f64, power: f64) -> Result<f64> {
    ensure_unit_open("test_size", test_size)?;
    let z = z_sum(alpha, power)?;
    let (n, sd) = pilot(data)?;
    let (q0, q1) = (test_size, 1.0 - test_size);
    let c = z * z * (1.0 / q0 + 1.0 / q1);
    Ok(sd * (c / n).sqrt())
}

/// Minimum detectable effect of a proportion metric with a 50/50 split:
/// MDE = (z_a + z_b) · √(2 sd² / n).
pub fn mde_proportion(data: &[f64], alpha: f64, power: f64) -> Result<f64> {
    let z = z_sum(alpha, power)?;
    let (n, sd) = pilot(data)?;
    Ok(z * (2.0 * sd * sd / n).sqrt())
}

/// Per-group sample size to detect `effect_size` in a mean metric:
/// n = 2 (z_a + z_b)² sd² / effect².
pub fn estimate_sample_size(effect_size: f64, data: &[f64], alpha: f64, power: f64) -> Result<f64> {
    ensure_effect("effect_size", effect_size)?;
    let z = z_sum(alpha, power)?;
    let (_, sd) = pilot(data)?;
    Ok(2.0 * z * z * sd * sd / (effect_size * effect_size))
}

fn ensure_rates(bcr: f64, mde: f64) -> Result<()> {
    ensure_unit_open("bcr", bcr)?;
    ensure_effect("mde", mde)?;
    ensure_unit_open("bcr + mde", bcr + mde)
}

/// Per-group sample size for a two-proportion z-test with baseline
/// conversion `bcr` and absolute lift `mde`, using the pooled rate
/// p̄ = bcr + mde/2:
///
/// n = 2 p̄ (1 − p̄)(z_a + z_b)² / mde².
pub fn min_sample_size_nominal(bcr: f64, mde: f64, alpha: f64, power: f64) -> Result<u64> {
    ensure_rates(bcr, mde)?;
    let z = z_sum(alpha, power)?;
    let pooled = (bcr + bcr + mde) / 2.0;
    round_count(2.0 * pooled * (1.0 - pooled) * z * z / (mde * mde))
}

/// Per-group sample size matching R's `pwr.2p.test` for equal groups.
///
/// Uses Cohen's effect size h = 2 asin√p₁ − 2 asin√p₂ and
/// n = 2 ((z_a + z_b) / h)²; the probability of rejecting in the wrong
/// tail is ignored, which changes the result by far less than one unit.
pub fn min_sample_size_nominal_in_r(bcr: f64, mde: f64, alpha: f64, power: f64) -> Result<u64> {
    ensure_rates(bcr, mde)?;
    let z = z_sum(alpha, power)?;
    let h = cohens_h(bcr, bcr + mde);
    round_count(2.0 * (z / h).powi(2))
}

/// Cohen's h for two proportions: 2 asin√p₁ − 2 asin√p₂.
pub fn cohens_h(p1: f64, p2: f64) -> f64 {
    2.0 * p1.sqrt().asin() - 2.0 * p2.sqrt().asin()
}

/// Sample size for a difference in means `d` with spread parameter `s`
/// (the variance of the metric):
///
/// n = s (z_power + z_{1−sig/2})² / d².
pub fn sample_power_difftest(d: f64, s: f64, power: f64, sig: f64) -> Result<u64> {
    ensure_effect("d", d)?;
    if !s.is_finite() || s <= 0.0 {
        return Err(AnalysisError::invalid(format!("s must be positive, got {s}")));
    }
    let z = z_sum(sig, power)?;
    round_count(s * z * z / (d * d))
}

/// Precomputed (z_a + z_b)² constants for the continuous t-test formula.
///
/// | power | α = 0.05 | α = 0.01 |
/// |-------|----------|----------|
/// | 0.8   | 7.85     | 11.68    |
/// | 0.9   | 10.51    | 14.88    |
fn continuous_constant(alpha: f64, power: f64) -> Result<f64> {
    const TABLE: [(f64, f64, f64); 4] = [
        (0.8, 0.05, 7.85),
        (0.8, 0.01, 11.68),
        (0.9, 0.05, 10.51),
        (0.9, 0.01, 14.88),
    ];
    TABLE
        .iter()
        .find(|(p, a, _)| (p - power).abs() < 1e-9 && (a - alpha).abs() < 1e-9)
        .map(|&(_, _, c)| c)
        .ok_or_else(|| {
            AnalysisError::invalid(format!(
                "no tabulated constant for alpha = {alpha}, power = {power}; \
                 supported: power in {{0.8, 0.9}}, alpha in {{0.05, 0.01}}"
            ))
        })
}

/// Per-group sample size for a t-test on a continuous metric:
/// n = 1 + 2c (sd / mde)², `c` from the lookup table above.
pub fn min_sample_size_continuous(data: &[f64], mde: f64, alpha: f64, power: f64) -> Result<f64> {
    ensure_effect("mde", mde)?;
    let c = continuous_constant(alpha, power)?;
    let (_, sd) = pilot(data)?;
    Ok(1.0 + 2.0 * c * (sd / mde).powi(2))
}

/// Per-group sample size for the Mann–Whitney alternative to the t-test,
/// inflating the normal-theory size by the 1.15 asymptotic relative
/// efficiency factor:
///
/// n = 1.15 · 2 sd² (z_a + z_b)² / mde².
pub fn min_sample_size_continuous_nonparametric(
    data: &[f64],
    mde: f64,
    alpha: f64,
    power: f64,
) -> Result<f64> {
    ensure_effect("mde", mde)?;
    let z = z_sum(alpha, power)?;
    let (_, sd) = pilot(data)?;
    Ok(1.15 * 2.0 * sd * sd * z * z / (mde * mde))
}

#[cfg(test)]
mod tests {
    use super::*;

    const PILOT: [f64; 8] = [10.0, 12.0, 9.0, 11.0, 13.0, 8.0, 10.0, 11.0];

    fn pilot_sd() -> f64 {
        stats::std_dev(&PILOT).expect("n >= 2")
    }

    #[test]
    fn nominal_matches_reference() {
        assert_eq!(min_sample_size_nominal(0.1, 0.02, 0.05, 0.8), Ok(3842));
        // smaller lift needs more users
        let small = min_sample_size_nominal(0.1, 0.01, 0.05, 0.8).expect("valid");
        assert!(small > 3842 * 3);
    }

    #[test]
    fn nominal_in_r_close_to_pooled_formula() {
        let r = min_sample_size_nominal_in_r(0.1, 0.02, 0.05, 0.8).expect("valid");
        assert_eq!(r, 3835);
        let pooled = min_sample_size_nominal(0.1, 0.02, 0.05, 0.8).expect("valid");
        assert!((r as i64 - pooled as i64).abs() < 50);
    }

    #[test]
    fn nominal_rejects_bad_rates() {
        assert!(min_sample_size_nominal(0.0, 0.02, 0.05, 0.8).is_err());
        assert!(min_sample_size_nominal(0.1, 0.0, 0.05, 0.8).is_err());
        assert!(min_sample_size_nominal(0.95, 0.1, 0.05, 0.8).is_err());
        assert!(min_sample_size_nominal(0.1, 0.02, 1.5, 0.8).is_err());
    }

    #[test]
    fn mde_and_sample_size_are_inverse() {
        // n = 2 z² sd² / e²  and  MDE(n, q=0.5) = sd z √(4/n)
        let mde = mde_mean(&PILOT, 0.5, 0.05, 0.8).expect("valid");
        let n = PILOT.len() as f64;
        let z = inverse_normal_cdf(0.975) + inverse_normal_cdf(0.8);
        assert!((mde - pilot_sd() * z * (4.0 / n).sqrt()).abs() < 1e-12);

        let needed = estimate_sample_size(mde, &PILOT, 0.05, 0.8).expect("valid");
        // each group needs half the pilot size
        assert!((needed - n / 2.0).abs() < 1e-9, "needed = {needed}");
    }

    #[test]
    fn mde_proportion_formula() {
        let data = [1.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0];
        let mde = mde_proportion(&data, 0.05, 0.8).expect("valid");
        let sd = stats::std_dev(&data).expect("n >= 2");
        let z = inverse_normal_cdf(0.975) + inverse_normal_cdf(0.8);
        assert!((mde - z * (2.0 * sd * sd / 10.0).sqrt()).abs() < 1e-12);
    }

    #[test]
    fn difftest() {
        // z = 2.8016, s = 4, d = 1 -> 4 * 7.849 = 31.4
        assert_eq!(sample_power_difftest(1.0, 4.0, 0.8, 0.05), Ok(31));
        assert!(sample_power_difftest(0.0, 4.0, 0.8, 0.05).is_err());
        assert!(sample_power_difftest(1.0, -1.0, 0.8, 0.05).is_err());
    }

    #[test]
    fn continuous_lookup() {
        let sd = pilot_sd();
        let n = min_sample_size_continuous(&PILOT, 1.0, 0.05, 0.8).expect("tabulated");
        assert!((n - (1.0 + 2.0 * 7.85 * sd * sd)).abs() < 1e-9);
        let n90 = min_sample_size_continuous(&PILOT, 1.0, 0.01, 0.9).expect("tabulated");
        assert!(n90 > n);
        assert!(matches!(
            min_sample_size_continuous(&PILOT, 1.0, 0.1, 0.8),
            Err(AnalysisError::InvalidArgument(_))
        ));
    }

    #[test]
    fn nonparametric_inflates_normal_theory() {
        let np = min_sample_size_continuous_nonparametric(&PILOT, 1.0, 0.05, 0.8).expect("valid");
        let normal = estimate_sample_size(1.0, &PILOT, 0.05, 0.8).expect("valid");
        assert!((np / normal - 1.15).abs() < 1e-12);
    }

    #[test]
    fn pilot_validation() {
        assert!(matches!(
            mde_mean(&[1.0], 0.5, 0.05, 0.8),
            Err(AnalysisError::InsufficientData { .. })
        ));
        assert_eq!(
            estimate_sample_size(1.0, &[1.0, f64::NAN], 0.05, 0.8),
            Err(AnalysisError::NonFinite)
        );
        assert!(mde_mean(&PILOT, 1.0, 0.05, 0.8).is_err());
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn nominal_size_decreases_with_lift(
            bcr in 0.01_f64..0.5,
            mde in 0.005_f64..0.2,
        ) {
            let n1 = min_sample_size_nominal(bcr, mde, 0.05, 0.8).expect("valid");
            let n2 = min_sample_size_nominal(bcr, mde * 2.0, 0.05, 0.8).expect("valid");
            prop_assert!(n2 <= n1, "n({}) = {} < n({}) = {}", mde * 2.0, n2, mde, n1);
        }

        #[test]
        fn higher_power_needs_more_data(
            data in proptest::collection::vec(-1e3_f64..1e3, 3..=30),
            effect in 0.1_f64..10.0,
        ) {
            if let (Ok(a), Ok(b)) = (
                estimate_sample_size(effect, &data, 0.05, 0.8),
                estimate_sample_size(effect, &data, 0.05, 0.9),
            ) {
                prop_assert!(b >= a);
            }
        }
    }
}
