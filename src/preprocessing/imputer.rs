//! Median fill for gaps left in retained predictor columns

use crate::error::{FormError, Result};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Per-column median fill values learned from the training partition
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MedianImputer {
    fill_values: BTreeMap<String, f64>,
}

impl MedianImputer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Learn the median of every listed column
    pub fn fit(&mut self, df: &DataFrame, columns: &[String]) -> Result<&mut Self> {
        for name in columns {
            let values = numeric_column(df, name)?;
            let mut present: Vec<f64> = values.into_iter().flatten().filter(|v| v.is_finite()).collect();
            self.fill_values.insert(name.clone(), median(&mut present));
        }
        Ok(self)
    }

    /// Fill value for a column (0.0 when the column was never seen with data)
    pub fn fill_value(&self, column: &str) -> f64 {
        self.fill_values.get(column).copied().unwrap_or(0.0)
    }

    /// Replace missing or non-finite values of a column with its median
    pub fn fill(&self, column: &str, values: Vec<Option<f64>>) -> Vec<f64> {
        let fill = self.fill_value(column);
        values
            .into_iter()
            .map(|v| match v {
                Some(x) if x.is_finite() => x,
                _ => fill,
            })
            .collect()
    }
}

/// Read a column as optional floats, casting non-float types
pub fn numeric_column(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>> {
    let column = df
        .column(name)
        .map_err(|_| FormError::FeatureNotFound(name.to_string()))?;
    let series_f64 = column
        .as_materialized_series()
        .cast(&DataType::Float64)
        .map_err(|e| FormError::DataError(e.to_string()))?;
    let values = series_f64
        .f64()
        .map_err(|e| FormError::DataError(e.to_string()))?
        .into_iter()
        .collect();
    Ok(values)
}

fn median(values: &mut [f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    }
}
