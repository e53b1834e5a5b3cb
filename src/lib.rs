//! # u-experiment
//!
//! Statistics for controlled (A/B) experiments: cohort allocation,
//! variance reduction, power analysis, hypothesis tests and Monte-Carlo
//! validation of the test methodology.
//!
//! Every routine is a stateless function from inputs to a result value.
//! Randomized routines take an explicit generator or seed.
//!
//! ## Modules
//!
//! - [`dataset`] — Column table with missing values and row ids
//! - [`preprocessing`] — Percentile and IQR outlier filters, Box-Cox transform
//! - [`power`] — Minimum detectable effect and sample-size formulas
//! - [`cuped`] — CUPED adjustment with a pre-period covariate
//! - [`stratification`] — Quantile-stratified cohort sampling
//! - [`testing`] — t-tests, ANOVA, Levene, Mann-Whitney U, two-proportion z
//! - [`bootstrap`] — Seeded two-sample bootstrap with pivotal/percentile CI
//! - [`abtest`] — A/B wrappers returning a common [`abtest::AbTestResult`]
//! - [`simulation`] — Synthetic A/A and A/B runs, empirical error rates
//! - [`special`] / [`stats`] — Distribution functions and descriptive helpers
//!
//! ## Design Philosophy
//!
//! - **No silent NaN**: invalid or degenerate input yields an [`AnalysisError`]
//! - **Reproducible**: same seed, same cohorts and bootstrap intervals
//! - **Research-backed**: algorithms cite their references

pub mod abtest;
pub mod bootstrap;
pub mod cuped;
pub mod dataset;
pub mod error;
pub mod power;
pub mod preprocessing;
pub mod simulation;
pub mod special;
pub mod stats;
pub mod stratification;
pub mod testing;

pub use error::{AnalysisError, Result};
