//! Error taxonomy shared by every routine in the crate.
//!
//! Each public function either returns a finished result or one of these
//! variants; nothing is partially computed and no NaN is returned in place
//! of an error.

use thiserror::Error;

/// Errors produced by experiment analysis routines.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AnalysisError {
    /// An argument is outside its accepted domain (unknown option name,
    /// alpha outside (0, 1), unknown column, mismatched lengths, ...).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Not enough observations for the requested computation.
    #[error("insufficient data: need at least {needed}, got {got}")]
    InsufficientData { needed: usize, got: usize },

    /// A sample contains NaN or an infinite value.
    #[error("sample contains non-finite values")]
    NonFinite,

    /// The computation is undefined for this input (zero variance,
    /// division by zero, ...).
    #[error("computation failed: {0}")]
    Degenerate(String),

    /// A distribution could not be constructed with the derived parameters.
    #[error("distribution error: {0}")]
    Distribution(String),
}

impl AnalysisError {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        AnalysisError::InvalidArgument(msg.into())
    }

    pub(crate) fn degenerate(msg: impl Into<String>) -> Self {
        AnalysisError::Degenerate(msg.into())
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, AnalysisError>;

/// Rejects slices containing NaN or infinities.
pub(crate) fn ensure_finite(data: &[f64]) -> Result<()> {
    if data.iter().all(|v| v.is_finite()) {
        Ok(())
    } else {
        Err(AnalysisError::NonFinite)
    }
}

/// Requires at least `needed` observations.
pub(crate) fn ensure_len(data: &[f64], needed: usize) -> Result<()> {
    if data.len() < needed {
        return Err(AnalysisError::InsufficientData {
            needed,
            got: data.len(),
        });
    }
    Ok(())
}

/// Requires a probability-like parameter strictly inside (0, 1).
pub(crate) fn ensure_unit_open(name: &str, value: f64) -> Result<()> {
    if value.is_finite() && value > 0.0 && value < 1.0 {
        Ok(())
    } else {
        Err(AnalysisError::invalid(format!(
            "{name} must lie in (0, 1), got {value}"
        )))
    }
}
