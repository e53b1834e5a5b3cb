//! Distribution functions used by the tests and power formulas.
//!
//! Thin layer over `statrs`: the standard normal is evaluated through the
//! complementary error function, Student-t and F go through the
//! distribution objects and surface parameter errors as
//! [`AnalysisError::Distribution`].

use statrs::distribution::{ContinuousCDF, FisherSnedecor, StudentsT};
use statrs::function::erf::{erfc, erfc_inv};

use crate::error::{AnalysisError, Result};

/// Φ(x), the standard normal CDF.
pub fn standard_normal_cdf(x: f64) -> f64 {
    0.5 * erfc(-x / std::f64::consts::SQRT_2)
}

/// 1 − Φ(x), computed without cancellation in the upper tail.
pub fn standard_normal_sf(x: f64) -> f64 {
    0.5 * erfc(x / std::f64::consts::SQRT_2)
}

/// Φ⁻¹(p). Returns ∓∞ at p = 0 and p = 1.
pub fn inverse_normal_cdf(p: f64) -> f64 {
    if p <= 0.0 {
        return f64::NEG_INFINITY;
    }
    if p >= 1.0 {
        return f64::INFINITY;
    }
    -std::f64::consts::SQRT_2 * erfc_inv(2.0 * p)
}

fn students_t(df: f64) -> Result<StudentsT> {
    StudentsT::new(0.0, 1.0, df).map_err(|e| AnalysisError::Distribution(e.to_string()))
}

/// CDF of Student's t with `df` degrees of freedom (fractional df allowed).
pub fn t_distribution_cdf(t: f64, df: f64) -> Result<f64> {
    Ok(students_t(df)?.cdf(t))
}

/// Upper tail P(T > t).
pub fn t_distribution_sf(t: f64, df: f64) -> Result<f64> {
    Ok(students_t(df)?.sf(t))
}

/// Quantile of Student's t.
pub fn t_distribution_quantile(p: f64, df: f64) -> Result<f64> {
    Ok(students_t(df)?.inverse_cdf(p))
}

/// Upper tail of the F distribution, P(F > f).
pub fn f_distribution_sf(f: f64, df1: f64, df2: f64) -> Result<f64> {
    let dist =
        FisherSnedecor::new(df1, df2).map_err(|e| AnalysisError::Distribution(e.to_string()))?;
    Ok(dist.sf(f))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normal_reference_values() {
        assert!((standard_normal_cdf(0.0) - 0.5).abs() < 1e-12);
        assert!((standard_normal_cdf(1.959_963_984_540_054) - 0.975).abs() < 1e-9);
        assert!((standard_normal_sf(1.644_853_626_951_472_2) - 0.05).abs() < 1e-9);
        assert!((inverse_normal_cdf(0.975) - 1.959_963_984_540_054).abs() < 1e-6);
        assert!((inverse_normal_cdf(0.8) - 0.841_621_233_572_914_2).abs() < 1e-6);
        assert_eq!(inverse_normal_cdf(0.0), f64::NEG_INFINITY);
        assert_eq!(inverse_normal_cdf(1.0), f64::INFINITY);
    }

    #[test]
    fn student_t_reference_values() {
        // t_{0.975, 10} = 2.228139
        let q = t_distribution_quantile(0.975, 10.0).expect("valid df");
        assert!((q - 2.228_139).abs() < 1e-4, "q = {q}");
        let c = t_distribution_cdf(q, 10.0).expect("valid df");
        assert!((c - 0.975).abs() < 1e-6);
        let s = t_distribution_sf(0.0, 5.0).expect("valid df");
        assert!((s - 0.5).abs() < 1e-12);
        assert!(t_distribution_cdf(1.0, 0.0).is_err());
    }

    #[test]
    fn f_tail() {
        // F_{0.95}(2, 10) = 4.102821
        let p = f_distribution_sf(4.102_821, 2.0, 10.0).expect("valid df");
        assert!((p - 0.05).abs() < 1e-4, "p = {p}");
        assert!(f_distribution_sf(1.0, -1.0, 3.0).is_err());
    }
}
