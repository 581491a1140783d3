//! Conversion from data frames to the dense arrays the forest consumes

use crate::error::{FormError, Result};
use crate::preprocessing::{numeric_column, MedianImputer};
use ndarray::{Array1, Array2};
use polars::prelude::*;
use serde::{Deserialize, Serialize};

/// Sorted set of outcome labels; a label's position is its class index
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassCodebook {
    classes: Vec<String>,
}

impl ClassCodebook {
    /// Collect the distinct labels in sorted order
    pub fn fit<'a, I>(labels: I) -> Result<Self>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut classes: Vec<String> = labels.into_iter().map(str::to_string).collect();
        classes.sort();
        classes.dedup();
        if classes.is_empty() {
            return Err(FormError::DataError("outcome has no labels".to_string()));
        }
        Ok(Self { classes })
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn n_classes(&self) -> usize {
        self.classes.len()
    }

    pub fn encode(&self, label: &str) -> Result<usize> {
        self.classes
            .binary_search_by(|c| c.as_str().cmp(label))
            .map_err(|_| FormError::ValidationError(format!("unknown class label '{}'", label)))
    }

    pub fn decode(&self, class: usize) -> &str {
        &self.classes[class]
    }

    /// Encode a full label column; every label must be present
    pub fn encode_all(&self, labels: &[Option<String>]) -> Result<Array1<usize>> {
        labels
            .iter()
            .enumerate()
            .map(|(row, label)| match label {
                Some(label) => self.encode(label),
                None => Err(FormError::DataError(format!("row {} has no outcome label", row))),
            })
            .collect::<Result<Vec<usize>>>()
            .map(Array1::from_vec)
    }
}

/// Read the outcome column as strings
pub fn outcome_labels(df: &DataFrame, outcome: &str) -> Result<Vec<Option<String>>> {
    let column = df
        .column(outcome)
        .map_err(|_| FormError::FeatureNotFound(outcome.to_string()))?;
    let as_str = column
        .as_materialized_series()
        .cast(&DataType::String)
        .map_err(|e| FormError::DataError(e.to_string()))?;
    let labels = as_str
        .str()
        .map_err(|e| FormError::DataError(e.to_string()))?
        .into_iter()
        .map(|v| v.map(str::to_string))
        .collect();
    Ok(labels)
}

/// Check that every predictor is present in the frame
pub fn require_columns(df: &DataFrame, columns: &[String]) -> Result<()> {
    match columns.iter().find(|c| df.column(c.as_str()).is_err()) {
        Some(missing) => Err(FormError::FeatureNotFound(missing.clone())),
        None => Ok(()),
    }
}

/// Build a row-major design matrix from the named columns, filling gaps
pub fn design_matrix(
    df: &DataFrame,
    columns: &[String],
    imputer: &MedianImputer,
) -> Result<Array2<f64>> {
    let n_rows = df.height();
    let n_cols = columns.len();

    let col_data: Vec<Vec<f64>> = columns
        .iter()
        .map(|name| Ok(imputer.fill(name, numeric_column(df, name)?)))
        .collect::<Result<Vec<Vec<f64>>>>()?;

    Ok(Array2::from_shape_fn((n_rows, n_cols), |(r, c)| col_data[c][r]))
}
