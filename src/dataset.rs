//! Minimal column-oriented table for row-level experiment data.
//!
//! Rows are addressed by position; identity across subsets is carried by
//! an explicit id column (see [`Dataset::row_key`]). Cells may be missing:
//! `None`, or NaN in a numeric column.
//!
//! # Examples
//!
//! ```
//! use u_experiment::dataset::Dataset;
//!
//! let data = Dataset::new()
//!     .with_numeric("user_id", vec![Some(1.0), Some(2.0), Some(3.0)])
//!     .unwrap()
//!     .with_categorical("country", vec![Some("de".into()), None, Some("fr".into())])
//!     .unwrap();
//! assert_eq!(data.n_rows(), 3);
//! assert_eq!(data.numeric("user_id").unwrap()[1], Some(2.0));
//! ```

use std::collections::HashSet;

use crate::error::{AnalysisError, Result};

/// A single column of values.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Column {
    /// Numeric values; `None` or NaN marks a missing cell.
    Numeric(Vec<Option<f64>>),
    /// Category labels; `None` marks a missing cell.
    Categorical(Vec<Option<String>>),
}

impl Column {
    /// Number of cells.
    pub fn len(&self) -> usize {
        match self {
            Column::Numeric(v) => v.len(),
            Column::Categorical(v) => v.len(),
        }
    }

    /// True when the column has no cells.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Numeric value at `row`, with NaN folded into `None`.
    pub fn number(&self, row: usize) -> Option<f64> {
        match self {
            Column::Numeric(v) => v.get(row).copied().flatten().filter(|x| !x.is_nan()),
            Column::Categorical(_) => None,
        }
    }

    fn take(&self, rows: &[usize]) -> Column {
        match self {
            Column::Numeric(v) => Column::Numeric(rows.iter().map(|&r| v[r]).collect()),
            Column::Categorical(v) => {
                Column::Categorical(rows.iter().map(|&r| v[r].clone()).collect())
            }
        }
    }
}

/// Hashable identity of a row, taken from its id cell.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RowKey {
    /// Bit pattern of a numeric id (`-0.0` is normalized to `0.0`).
    Number(u64),
    /// Text id.
    Text(String),
}

impl RowKey {
    /// Numeric id value, if this key came from a numeric column.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            RowKey::Number(bits) => Some(f64::from_bits(*bits)),
            RowKey::Text(_) => None,
        }
    }
}

/// Named columns of equal length.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Dataset {
    names: Vec<String>,
    columns: Vec<Column>,
}

impl Dataset {
    /// Empty table with no columns.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a numeric column.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` on a duplicate name or a length that differs from
    /// the existing columns.
    pub fn with_numeric(self, name: impl Into<String>, values: Vec<Option<f64>>) -> Result<Self> {
        self.with_column(name, Column::Numeric(values))
    }

    /// Appends a categorical column.
    pub fn with_categorical(
        self,
        name: impl Into<String>,
        values: Vec<Option<String>>,
    ) -> Result<Self> {
        self.with_column(name, Column::Categorical(values))
    }

    /// Appends an arbitrary column.
    pub fn with_column(mut self, name: impl Into<String>, column: Column) -> Result<Self> {
        let name = name.into();
        if self.names.iter().any(|n| *n == name) {
            return Err(AnalysisError::invalid(format!("duplicate column '{name}'")));
        }
        if let Some(first) = self.columns.first() {
            if first.len() != column.len() {
                return Err(AnalysisError::invalid(format!(
                    "column '{name}' has {} rows, table has {}",
                    column.len(),
                    first.len()
                )));
            }
        }
        self.names.push(name);
        self.columns.push(column);
        Ok(self)
    }

    /// Number of rows (0 for a table without columns).
    pub fn n_rows(&self) -> usize {
        self.columns.first().map_or(0, Column::len)
    }

    /// Column names in insertion order.
    pub fn column_names(&self) -> &[String] {
        &self.names
    }

    /// Looks up a column by name.
    pub fn column(&self, name: &str) -> Result<&Column> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|i| &self.columns[i])
            .ok_or_else(|| AnalysisError::invalid(format!("unknown column '{name}'")))
    }

    /// Numeric cells of a column.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` if the column is missing or categorical.
    pub fn numeric(&self, name: &str) -> Result<&[Option<f64>]> {
        match self.column(name)? {
            Column::Numeric(v) => Ok(v),
            Column::Categorical(_) => Err(AnalysisError::invalid(format!(
                "column '{name}' is not numeric"
            ))),
        }
    }

    /// Non-missing values of a numeric column, in row order.
    pub fn present_values(&self, name: &str) -> Result<Vec<f64>> {
        Ok(self
            .numeric(name)?
            .iter()
            .filter_map(|v| (*v).filter(|x| !x.is_nan()))
            .collect())
    }

    /// Identity of `row` taken from the id column; `None` when the cell is
    /// missing.
    pub fn row_key(&self, id_col: &str, row: usize) -> Result<Option<RowKey>> {
        if row >= self.n_rows() {
            return Err(AnalysisError::invalid(format!(
                "row {row} out of range for {} rows",
                self.n_rows()
            )));
        }
        Ok(match self.column(id_col)? {
            Column::Numeric(v) => v[row]
                .filter(|x| !x.is_nan())
                .map(|x| RowKey::Number((x + 0.0).to_bits())),
            Column::Categorical(v) => v[row].clone().map(RowKey::Text),
        })
    }

    /// Row keys for every row, rejecting missing or duplicated ids.
    pub fn unique_keys(&self, id_col: &str) -> Result<Vec<RowKey>> {
        let mut seen = HashSet::with_capacity(self.n_rows());
        let mut keys = Vec::with_capacity(self.n_rows());
        for row in 0..self.n_rows() {
            let key = self
                .row_key(id_col, row)?
                .ok_or_else(|| AnalysisError::invalid(format!("row {row} has no id")))?;
            if !seen.insert(key.clone()) {
                return Err(AnalysisError::invalid(format!(
                    "id {key:?} appears more than once in '{id_col}'"
                )));
            }
            keys.push(key);
        }
        Ok(keys)
    }

    /// New table holding `rows` in the given order.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` if any index is out of range.
    pub fn take(&self, rows: &[usize]) -> Result<Dataset> {
        let n = self.n_rows();
        if let Some(&bad) = rows.iter().find(|&&r| r >= n) {
            return Err(AnalysisError::invalid(format!(
                "row {bad} out of range for {n} rows"
            )));
        }
        Ok(Dataset {
            names: self.names.clone(),
            columns: self.columns.iter().map(|c| c.take(rows)).collect(),
        })
    }
}
