//! Error types for the dumbbell-form pipeline

use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, FormError>;

/// Main error type for the pipeline
#[derive(Error, Debug)]
pub enum FormError {
    #[error("Data error: {0}")]
    DataError(String),

    #[error("Column not found: {0}")]
    FeatureNotFound(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Training error: {0}")]
    TrainingError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Model not fitted")]
    ModelNotFitted,

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Invalid shape: expected {expected}, got {actual}")]
    ShapeError { expected: String, actual: String },
}

impl From<polars::error::PolarsError> for FormError {
    fn from(err: polars::error::PolarsError) -> Self {
        FormError::DataError(err.to_string())
    }
}

impl From<serde_json::Error> for FormError {
    fn from(err: serde_json::Error) -> Self {
        FormError::SerializationError(err.to_string())
    }
}

impl From<regex::Error> for FormError {
    fn from(err: regex::Error) -> Self {
        FormError::ConfigError(err.to_string())
    }
}

impl From<ndarray::ShapeError> for FormError {
    fn from(err: ndarray::ShapeError) -> Self {
        FormError::ShapeError {
            expected: "valid shape".to_string(),
            actual: err.to_string(),
        }
    }
}
