//! Data loading utilities

use crate::error::{FormError, Result};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info};

/// Tokens treated as missing when none are configured
pub const DEFAULT_MISSING_TOKENS: &[&str] = &["NA", "#DIV/0!"];

/// CSV loader that normalizes missing-value tokens at read time
#[derive(Debug, Clone)]
pub struct DataLoader {
    /// Literal cell values read as null in every column
    missing_tokens: Vec<String>,
    /// Rows scanned for schema inference (None = whole file)
    infer_schema_length: Option<usize>,
}

impl Default for DataLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl DataLoader {
    /// Create a new data loader with the default missing tokens
    pub fn new() -> Self {
        Self {
            missing_tokens: DEFAULT_MISSING_TOKENS.iter().map(|s| s.to_string()).collect(),
            infer_schema_length: None,
        }
    }

    /// Replace the missing-value tokens
    pub fn with_missing_tokens<I, S>(mut self, tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.missing_tokens = tokens.into_iter().map(Into::into).collect();
        self
    }

    /// Limit schema inference to the first `rows` rows
    pub fn with_infer_schema_length(mut self, rows: Option<usize>) -> Self {
        self.infer_schema_length = rows;
        self
    }

    /// Tokens currently treated as missing
    pub fn missing_tokens(&self) -> &[String] {
        &self.missing_tokens
    }

    /// Load a CSV file with a header row
    pub fn load_csv(&self, path: &Path) -> Result<DataFrame> {
        if !path.exists() {
            return Err(FormError::DataError(format!(
                "input file not found: {}",
                path.display()
            )));
        }

        let start = Instant::now();

        let null_values = if self.missing_tokens.is_empty() {
            None
        } else {
            Some(NullValues::AllColumns(
                self.missing_tokens.iter().map(|t| t.as_str().into()).collect(),
            ))
        };

        let parse_opts = CsvParseOptions::default().with_null_values(null_values);

        let file = File::open(path)?;
        let df = CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(self.infer_schema_length)
            .with_parse_options(parse_opts)
            .into_reader_with_file_handle(file)
            .finish()?;

        info!(
            path = %path.display(),
            rows = df.height(),
            columns = df.width(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "loaded dataset"
        );

        Ok(df)
    }
}

/// Per-column missing-value summary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnSummary {
    pub name: String,
    pub dtype: String,
    pub missing: usize,
}

/// Shape and missingness of a loaded dataset
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetSummary {
    pub n_rows: usize,
    pub n_cols: usize,
    pub columns: Vec<ColumnSummary>,
}

impl DatasetSummary {
    /// Summarize a data frame
    pub fn from_frame(df: &DataFrame) -> Self {
        let columns = df
            .get_columns()
            .iter()
            .map(|col| ColumnSummary {
                name: col.name().to_string(),
                dtype: format!("{:?}", col.dtype()),
                missing: col.null_count(),
            })
            .collect();

        Self {
            n_rows: df.height(),
            n_cols: df.width(),
            columns,
        }
    }

    /// Number of columns that contain at least one missing value
    pub fn columns_with_missing(&self) -> usize {
        self.columns.iter().filter(|c| c.missing > 0).count()
    }
}

/// Writes data frames back to disk
pub struct DataSaver;

impl DataSaver {
    /// Save to CSV
    pub fn save_csv(df: &mut DataFrame, path: &Path) -> Result<()> {
        let mut file = File::create(path)?;

        CsvWriter::new(&mut file).finish(df)?;

        debug!(path = %path.display(), rows = df.height(), "wrote csv");
        Ok(())
    }
}
