//! Data preprocessing: predictor selection and missing-value fill

pub mod column_filter;
mod imputer;

pub use column_filter::{
    ColumnDescriptor, ColumnFilter, Exclusion, FilterReport, DEFAULT_MISSING_THRESHOLD,
    DEFAULT_NON_PREDICTIVE_PATTERN,
};
pub use imputer::{numeric_column, MedianImputer};
