//! Predictor column selection
//!
//! Drops the outcome column, columns matching a non-predictive name pattern
//! (row index, subject, timestamps, window markers) and columns whose
//! missing-value fraction reaches a threshold.

use crate::error::Result;
use polars::prelude::*;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Default pattern for columns that never carry signal
pub const DEFAULT_NON_PREDICTIVE_PATTERN: &str =
    r"(?i)^(x|index|row_?id|)$|user_name|timestamp|window";

/// Default missing fraction at which a column is dropped
pub const DEFAULT_MISSING_THRESHOLD: f64 = 0.95;

/// Why a column was left out of the predictor set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Exclusion {
    /// The column is the outcome itself
    Outcome,
    /// The column name matches the non-predictive pattern
    NonPredictive,
    /// Too many missing values
    MostlyMissing,
}

/// Name and missingness of one column
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    pub name: String,
    pub missing: usize,
    pub missing_fraction: f64,
    pub excluded: Option<Exclusion>,
}

impl ColumnDescriptor {
    pub fn is_predictor(&self) -> bool {
        self.excluded.is_none()
    }
}

/// Outcome of a filter pass
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterReport {
    /// Every column, sorted by missing count then name (outcome first)
    pub columns: Vec<ColumnDescriptor>,
    /// Retained predictor names, in the same order
    pub predictors: Vec<String>,
    /// Rows the missing fractions were computed over
    pub n_rows: usize,
}

impl FilterReport {
    /// Columns excluded for the given reason
    pub fn excluded(&self, reason: Exclusion) -> impl Iterator<Item = &ColumnDescriptor> {
        self.columns
            .iter()
            .filter(move |c| c.excluded == Some(reason))
    }
}

/// Column filter configuration
#[derive(Debug, Clone)]
pub struct ColumnFilter {
    outcome: String,
    non_predictive: Regex,
    missing_threshold: f64,
}

impl ColumnFilter {
    /// Create a filter with the default pattern and threshold
    pub fn new(outcome: impl Into<String>) -> Result<Self> {
        Ok(Self {
            outcome: outcome.into(),
            non_predictive: Regex::new(DEFAULT_NON_PREDICTIVE_PATTERN)?,
            missing_threshold: DEFAULT_MISSING_THRESHOLD,
        })
    }

    /// Replace the non-predictive name pattern
    pub fn with_non_predictive_pattern(mut self, pattern: &str) -> Result<Self> {
        self.non_predictive = Regex::new(pattern)?;
        Ok(self)
    }

    /// Set the missing fraction at which columns are dropped
    pub fn with_missing_threshold(mut self, threshold: f64) -> Self {
        self.missing_threshold = threshold;
        self
    }

    pub fn outcome(&self) -> &str {
        &self.outcome
    }

    /// True when the name matches the non-predictive pattern
    pub fn is_non_predictive(&self, name: &str) -> bool {
        self.non_predictive.is_match(name)
    }

    /// Compute the predictor set from a (training) data frame
    pub fn apply(&self, df: &DataFrame) -> FilterReport {
        let n_rows = df.height();
        let cutoff = self.missing_threshold * n_rows as f64;

        let mut columns: Vec<ColumnDescriptor> = df
            .get_columns()
            .iter()
            .map(|col| {
                let name = col.name().to_string();
                let missing = col.null_count();
                let missing_fraction = if n_rows > 0 {
                    missing as f64 / n_rows as f64
                } else {
                    0.0
                };

                // The outcome is removed by name before any missingness rule applies.
                let excluded = if name == self.outcome {
                    Some(Exclusion::Outcome)
                } else if self.is_non_predictive(&name) {
                    Some(Exclusion::NonPredictive)
                } else if n_rows > 0 && missing as f64 >= cutoff {
                    Some(Exclusion::MostlyMissing)
                } else {
                    None
                };

                ColumnDescriptor {
                    name,
                    missing,
                    missing_fraction,
                    excluded,
                }
            })
            .collect();

        columns.sort_by(|a, b| {
            let a_outcome = a.excluded == Some(Exclusion::Outcome);
            let b_outcome = b.excluded == Some(Exclusion::Outcome);
            b_outcome
                .cmp(&a_outcome)
                .then(a.missing.cmp(&b.missing))
                .then_with(|| a.name.cmp(&b.name))
        });

        let predictors: Vec<String> = columns
            .iter()
            .filter(|c| c.is_predictor())
            .map(|c| c.name.clone())
            .collect();

        for col in columns.iter().filter(|c| !c.is_predictor()) {
            debug!(column = %col.name, missing = col.missing, reason = ?col.excluded, "excluded column");
        }

        info!(
            rows = n_rows,
            columns = columns.len(),
            predictors = predictors.len(),
            "filtered predictor columns"
        );

        FilterReport {
            columns,
            predictors,
            n_rows,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column_with_missing(name: &str, n: usize, missing: usize) -> Column {
        let values: Vec<Option<f64>> = (0..n)
            .map(|i| if i < missing { None } else { Some(i as f64) })
            .collect();
        Series::new(name.into(), values).into()
    }

    #[test]
    fn test_threshold_boundary() {
        let df = DataFrame::new(vec![
            column_with_missing("mostly_gone", 100, 96),
            column_with_missing("at_threshold", 100, 95),
            column_with_missing("kept", 100, 94),
            column_with_missing("classe", 100, 0),
        ])
        .unwrap();

        let report = ColumnFilter::new("classe").unwrap().apply(&df);

        assert_eq!(report.predictors, vec!["kept".to_string()]);
        let dropped: Vec<&str> = report
            .excluded(Exclusion::MostlyMissing)
            .map(|c| c.name.as_str())
            .collect();
        assert_eq!(dropped, vec!["at_threshold", "mostly_gone"]);
    }

    #[test]
    fn test_non_predictive_names() {
        let df = df!(
            "X" => &[1i64, 2, 3],
            "user_name" => &["a", "b", "c"],
            "raw_timestamp_part_1" => &[1i64, 2, 3],
            "cvtd_timestamp" => &["t1", "t2", "t3"],
            "new_window" => &["no", "no", "yes"],
            "num_window" => &[11i64, 11, 12],
            "roll_belt" => &[1.0, 2.0, 3.0],
            "classe" => &["A", "B", "A"]
        )
        .unwrap();

        let report = ColumnFilter::new("classe").unwrap().apply(&df);

        assert_eq!(report.predictors, vec!["roll_belt".to_string()]);
        assert_eq!(report.excluded(Exclusion::NonPredictive).count(), 6);
        assert_eq!(report.excluded(Exclusion::Outcome).count(), 1);
    }

    #[test]
    fn test_outcome_with_missing_values_is_never_mostly_missing() {
        let df = DataFrame::new(vec![
            column_with_missing("classe", 10, 10),
            column_with_missing("pitch_arm", 10, 0),
        ])
        .unwrap();

        let report = ColumnFilter::new("classe").unwrap().apply(&df);

        assert_eq!(report.columns[0].name, "classe");
        assert_eq!(report.columns[0].excluded, Some(Exclusion::Outcome));
        assert_eq!(report.predictors, vec!["pitch_arm".to_string()]);
    }

    #[test]
    fn test_order_by_missing_then_name() {
        let df = DataFrame::new(vec![
            column_with_missing("zeta", 10, 0),
            column_with_missing("gamma", 10, 2),
            column_with_missing("alpha", 10, 2),
            column_with_missing("beta", 10, 0),
        ])
        .unwrap();

        let first = ColumnFilter::new("classe").unwrap().apply(&df);
        let second = ColumnFilter::new("classe").unwrap().apply(&df);

        assert_eq!(first.predictors, vec!["beta", "zeta", "alpha", "gamma"]);
        assert_eq!(first.predictors, second.predictors);
    }

    #[test]
    fn test_custom_pattern() {
        let df = df!(
            "subject_id" => &[1i64, 2],
            "accel_x" => &[0.1, 0.2]
        )
        .unwrap();

        let report = ColumnFilter::new("classe")
            .unwrap()
            .with_non_predictive_pattern("^subject")
            .unwrap()
            .apply(&df);

        assert_eq!(report.predictors, vec!["accel_x".to_string()]);
    }
}
