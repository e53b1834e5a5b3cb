//! Stratified cohort sampling.
//!
//! Rows are grouped into strata by their quantile bucket on each numeric
//! stratification column (and by category on categorical columns). Every
//! stratum contributes to the experiment in proportion to its size, and
//! inside a stratum the selected rows are split evenly across cohorts, so
//! each cohort has the same covariate mix.
//!
//! # Algorithm
//!
//! For a stratum of `L` rows out of `L_total`, with `R` requested rows
//! per cohort and `N` cohorts:
//!
//! 1. m = ⌈R · L / L_total⌉
//! 2. If m · N > L the stratum is too small and is handled by
//!    [`SmallStrataPolicy`].
//! 3. Otherwise m · N rows are drawn without replacement, shuffled and
//!    cut into N runs of m; run i becomes cohort i + 1. The rest of the
//!    stratum is left unallocated.
//!
//! # Examples
//!
//! ```
//! use u_experiment::dataset::Dataset;
//! use u_experiment::stratification::{stratified_sample, StratifyConfig};
//!
//! let ids: Vec<Option<f64>> = (0..100).map(|i| Some(i as f64)).collect();
//! let flag: Vec<Option<f64>> = (0..100).map(|i| Some((i % 2) as f64)).collect();
//! let data = Dataset::new()
//!     .with_numeric("id", ids).unwrap()
//!     .with_numeric("flag", flag).unwrap();
//!
//! let config = StratifyConfig { n_cohorts: 2, n_rows: 50, seed: Some(42), ..Default::default() };
//! let sample = stratified_sample(&data, &["flag"], "id", &config).unwrap();
//! assert_eq!(sample.cohort_sizes(), vec![50, 50]);
//! ```

use std::collections::{BTreeMap, HashSet};
use std::fmt;

use rand::seq::{index, SliceRandom};
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;

use crate::dataset::{Column, Dataset, RowKey};
use crate::error::{AnalysisError, Result};
use crate::stats;

/// Percentiles separating the five quantile buckets.
pub const BUCKET_PERCENTILES: [f64; 4] = [0.2, 0.4, 0.6, 0.8];

/// Name of the cohort column added by [`StratifiedSample::experiment_table`].
pub const COHORT_COLUMN: &str = "cohort";

/// 20/40/60/80th percentiles (R-7) of the given values.
///
/// # Errors
///
/// `InsufficientData` for an empty slice, `NonFinite` for NaN/∞.
pub fn quantile_thresholds(values: &[f64]) -> Result<[f64; 4]> {
    crate::error::ensure_len(values, 1)?;
    crate::error::ensure_finite(values)?;
    let sorted = stats::sorted_copy(values);
    Ok(BUCKET_PERCENTILES.map(|p| stats::quantile_sorted(&sorted, p)))
}

/// Bucket 1..=5 of `value`: the first threshold it does not exceed, or 5
/// above the last one.
pub fn quantile_bucket(value: f64, thresholds: &[f64; 4]) -> u8 {
    thresholds
        .iter()
        .position(|&t| value <= t)
        .map_or(5, |i| i as u8 + 1)
}

/// Appends a `<col>_q` bucket column for every numeric column in `cols`.
///
/// Returns the extended table and the column names to stratify on: the
/// bucket column for numeric inputs, the column itself for categorical
/// ones. Missing cells stay missing.
pub fn add_quantile_columns(data: &Dataset, cols: &[&str]) -> Result<(Dataset, Vec<String>)> {
    let mut out = data.clone();
    let mut names = Vec::with_capacity(cols.len());
    for &col in cols {
        match data.column(col)? {
            Column::Numeric(cells) => {
                let thresholds = numeric_thresholds(data, col)?;
                let buckets = cells
                    .iter()
                    .map(|v| {
                        v.filter(|x| !x.is_nan())
                            .map(|x| f64::from(quantile_bucket(x, &thresholds)))
                    })
                    .collect();
                let name = format!("{col}_q");
                out = out.with_numeric(name.clone(), buckets)?;
                names.push(name);
            }
            Column::Categorical(_) => names.push(col.to_string()),
        }
    }
    Ok((out, names))
}

fn numeric_thresholds(data: &Dataset, col: &str) -> Result<[f64; 4]> {
    let present = data.present_values(col)?;
    if present.is_empty() {
        return Err(AnalysisError::InsufficientData { needed: 1, got: 0 });
    }
    quantile_thresholds(&present)
}

/// One component of a stratum key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum StratumLevel {
    /// Quantile bucket 1..=5 of a numeric column.
    Bucket(u8),
    /// Category of a categorical column.
    Category(String),
}

impl fmt::Display for StratumLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StratumLevel::Bucket(b) => write!(f, "q{b}"),
            StratumLevel::Category(c) => f.write_str(c),
        }
    }
}

/// Stratum identity: one level per stratification column, in column order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StratumKey(pub Vec<StratumLevel>);

impl fmt::Display for StratumKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, level) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("/")?;
            }
            write!(f, "{level}")?;
        }
        Ok(())
    }
}

/// What happens to a stratum too small to fill every cohort.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SmallStrataPolicy {
    /// Leave the stratum out entirely; its rows are reported as dropped.
    #[default]
    Drop,
    /// Keep the stratum's rows in the unallocated pool.
    Unallocate,
}

/// Stratified sampling configuration.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StratifyConfig {
    /// Number of cohorts N (default: 2)
    pub n_cohorts: usize,
    /// Target rows per cohort R (default: 1000)
    pub n_rows: usize,
    /// Generator seed; `None` is not reproducible
    pub seed: Option<u64>,
    /// Handling of strata with fewer than m · N rows
    pub small_strata: SmallStrataPolicy,
}

impl Default for StratifyConfig {
    fn default() -> Self {
        Self {
            n_cohorts: 2,
            n_rows: 1000,
            seed: None,
            small_strata: SmallStrataPolicy::Drop,
        }
    }
}

/// A row placed in a cohort.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CohortAssignment {
    /// Row index in the input dataset.
    pub row: usize,
    /// Id of the row.
    pub id: RowKey,
    /// Cohort label, 1..=N.
    pub cohort: usize,
    /// Stratum the row was drawn from.
    pub stratum: StratumKey,
}

/// Outcome of a stratum during allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum StratumStatus {
    /// Rows were allocated to every cohort.
    Allocated,
    /// Too small; rows reported as dropped.
    Dropped,
    /// Too small; rows left unallocated.
    Unallocated,
}

/// Per-stratum allocation record.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StratumSummary {
    /// Stratum identity.
    pub key: StratumKey,
    /// Rows in the stratum.
    pub size: usize,
    /// Rows given to each cohort (m); 0 unless allocated.
    pub per_cohort: usize,
    /// Whether the stratum was allocated, dropped or left unallocated.
    pub status: StratumStatus,
}

/// Result of [`stratified_sample`].
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StratifiedSample {
    /// Number of cohorts the sample was drawn for.
    pub n_cohorts: usize,
    /// Allocated rows, stratum by stratum in key order.
    pub experiment: Vec<usize>,
    /// Cohort assignments parallel to `experiment`.
    pub assignments: Vec<CohortAssignment>,
    /// Rows of allocated strata not drawn, plus small strata under
    /// [`SmallStrataPolicy::Unallocate`].
    pub unallocated: Vec<usize>,
    /// Rows of small strata under [`SmallStrataPolicy::Drop`].
    pub dropped: Vec<usize>,
    /// Rows missing a stratification value.
    pub excluded: Vec<usize>,
    /// Per-stratum summaries in key order.
    pub strata: Vec<StratumSummary>,
}

impl StratifiedSample {
    /// Assignments of cohort `c` (1-based).
    pub fn cohort(&self, c: usize) -> impl Iterator<Item = &CohortAssignment> + '_ {
        self.assignments.iter().filter(move |a| a.cohort == c)
    }

    /// Number of rows in each cohort, index 0 holding cohort 1.
    pub fn cohort_sizes(&self) -> Vec<usize> {
        let mut sizes = vec![0; self.n_cohorts];
        for a in &self.assignments {
            sizes[a.cohort - 1] += 1;
        }
        sizes
    }

    /// Allocated rows of `data` in assignment order, with a numeric
    /// `cohort` column appended.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` if `data` already has a `cohort` column or is not
    /// the table the sample was drawn from.
    pub fn experiment_table(&self, data: &Dataset) -> Result<Dataset> {
        let cohorts = self
            .assignments
            .iter()
            .map(|a| Some(a.cohort as f64))
            .collect();
        data.take(&self.experiment)?
            .with_numeric(COHORT_COLUMN, cohorts)
    }

    /// Unallocated rows of `data`.
    pub fn unallocated_table(&self, data: &Dataset) -> Result<Dataset> {
        data.take(&self.unallocated)
    }
}

/// Splits `data` into `config.n_cohorts` balanced cohorts of about
/// `config.n_rows` rows, stratified on `cols`.
///
/// `id_col` must hold a unique, non-missing id per row.
///
/// # Errors
///
/// - `InvalidArgument`: zero cohorts or rows, empty `cols`, unknown
///   column, missing or duplicate ids, or a row target so large that
///   the per-stratum draw overflows `usize`
/// - `InsufficientData`: empty dataset, or a numeric stratification column
///   without any present value
pub fn stratified_sample(
    data: &Dataset,
    cols: &[&str],
    id_col: &str,
    config: &StratifyConfig,
) -> Result<StratifiedSample> {
    if config.n_cohorts == 0 {
        return Err(AnalysisError::invalid("n_cohorts must be positive"));
    }
    if config.n_rows == 0 {
        return Err(AnalysisError::invalid("n_rows must be positive"));
    }
    if cols.is_empty() {
        return Err(AnalysisError::invalid("no stratification columns given"));
    }
    let total = data.n_rows();
    if total == 0 {
        return Err(AnalysisError::InsufficientData { needed: 1, got: 0 });
    }
    let ids = data.unique_keys(id_col)?;

    let levels = stratum_levels(data, cols)?;
    let mut strata: BTreeMap<StratumKey, Vec<usize>> = BTreeMap::new();
    let mut excluded = Vec::new();
    for row in 0..total {
        let key: Option<Vec<StratumLevel>> = levels.iter().map(|col| col[row].clone()).collect();
        match key {
            Some(key) => strata.entry(StratumKey(key)).or_default().push(row),
            None => excluded.push(row),
        }
    }
    if !excluded.is_empty() {
        tracing::warn!(
            rows = excluded.len(),
            "rows missing a stratification value were excluded"
        );
    }

    let seed = config.seed.unwrap_or_else(|| rand::thread_rng().gen());
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);

    let n = config.n_cohorts;
    let mut sample = StratifiedSample {
        n_cohorts: n,
        experiment: Vec::new(),
        assignments: Vec::new(),
        unallocated: Vec::new(),
        dropped: Vec::new(),
        excluded,
        strata: Vec::with_capacity(strata.len()),
    };

    for (key, rows) in strata {
        let size = rows.len();
        let m = config
            .n_rows
            .checked_mul(size)
            .and_then(|v| v.checked_add(total - 1))
            .map(|v| v / total)
            .ok_or_else(|| {
                AnalysisError::invalid(format!("n_rows = {} is too large", config.n_rows))
            })?;
        let needed = m.checked_mul(n).ok_or_else(|| {
            AnalysisError::invalid(format!("n_cohorts = {n} times {m} rows per cohort overflows"))
        })?;

        if needed > size {
            let status = match config.small_strata {
                SmallStrataPolicy::Drop => {
                    sample.dropped.extend_from_slice(&rows);
                    StratumStatus::Dropped
                }
                SmallStrataPolicy::Unallocate => {
                    sample.unallocated.extend_from_slice(&rows);
                    StratumStatus::Unallocated
                }
            };
            tracing::warn!(stratum = %key, size, needed, ?status, "stratum too small");
            sample.strata.push(StratumSummary {
                key,
                size,
                per_cohort: 0,
                status,
            });
            continue;
        }

        let mut chosen: Vec<usize> = index::sample(&mut rng, size, m * n)
            .into_iter()
            .map(|i| rows[i])
            .collect();
        chosen.shuffle(&mut rng);

        let chosen_ids: HashSet<&RowKey> = chosen.iter().map(|&r| &ids[r]).collect();
        sample
            .unallocated
            .extend(rows.iter().filter(|&&r| !chosen_ids.contains(&ids[r])));

        for (i, group) in chosen.chunks(m).enumerate() {
            for &row in group {
                sample.experiment.push(row);
                sample.assignments.push(CohortAssignment {
                    row,
                    id: ids[row].clone(),
                    cohort: i + 1,
                    stratum: key.clone(),
                });
            }
        }
        tracing::debug!(stratum = %key, size, per_cohort = m, "stratum allocated");
        sample.strata.push(StratumSummary {
            key,
            size,
            per_cohort: m,
            status: StratumStatus::Allocated,
        });
    }

    tracing::debug!(
        allocated = sample.experiment.len(),
        unallocated = sample.unallocated.len(),
        dropped = sample.dropped.len(),
        excluded = sample.excluded.len(),
        "stratified sample drawn"
    );
    Ok(sample)
}

/// Stratum level of every row for every column; `None` where missing.
fn stratum_levels(data: &Dataset, cols: &[&str]) -> Result<Vec<Vec<Option<StratumLevel>>>> {
    cols.iter()
        .map(|&col| match data.column(col)? {
            Column::Numeric(_) => {
                let thresholds = numeric_thresholds(data, col)?;
                let column = data.column(col)?;
                Ok((0..data.n_rows())
                    .map(|row| {
                        column
                            .number(row)
                            .map(|x| StratumLevel::Bucket(quantile_bucket(x, &thresholds)))
                    })
                    .collect())
            }
            Column::Categorical(cells) => Ok(cells
                .iter()
                .map(|c| c.clone().map(StratumLevel::Category))
                .collect()),
        })
        .collect()
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(48))]

        #[test]
        fn partition_and_balance(
            xs in proptest::collection::vec(proptest::option::of(0.0_f64..50.0), 10..=120),
            n_cohorts in 1_usize..=4,
            n_rows in 1_usize..=40,
            seed in any::<u64>(),
        ) {
            let n = xs.len();
            let data = Dataset::new()
                .with_numeric("id", (0..n).map(|i| Some(i as f64)).collect())
                .expect("first column")
                .with_numeric("x", xs.clone())
                .expect("same length");
            prop_assume!(xs.iter().any(Option::is_some));
            let config = StratifyConfig { n_cohorts, n_rows, seed: Some(seed), ..Default::default() };
            let s = stratified_sample(&data, &["x"], "id", &config).expect("valid input");

            let mut all: Vec<usize> = s.experiment.iter()
                .chain(&s.unallocated).chain(&s.dropped).chain(&s.excluded)
                .copied().collect();
            all.sort_unstable();
            prop_assert_eq!(all, (0..n).collect::<Vec<_>>());

            let sizes = s.cohort_sizes();
            prop_assert!(sizes.iter().all(|&c| c == sizes[0]));
        }
    }
}
