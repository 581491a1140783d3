//! dumbbell-form - classifying dumbbell lifting technique from wearable sensors
//!
//! Loads accelerometer recordings of unilateral biceps curls, selects
//! predictor columns, fits a random forest tuned with k-fold
//! cross-validation and predicts the execution quality (classes A to E)
//! of unlabelled repetitions.
//!
//! # Modules
//!
//! - [`utils`] - CSV loading with missing-value tokens, dataset summaries
//! - [`preprocessing`] - Predictor column selection and median fill
//! - [`training`] - Partitioning, formula, trees, forests, mtry tuning
//! - [`inference`] - Held-out evaluation and validation predictions
//! - [`report`] - Markdown report rendering
//! - [`pipeline`] - End-to-end orchestration and configuration
//! - [`cli`] - Command-line interface

// Core error handling
pub mod error;

// Stages
pub mod utils;
pub mod preprocessing;
pub mod training;
pub mod inference;
pub mod report;

// Orchestration
pub mod pipeline;
pub mod cli;

pub use error::{FormError, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::error::{FormError, Result};

    pub use crate::utils::{DataLoader, DatasetSummary};

    pub use crate::preprocessing::{ColumnFilter, Exclusion, FilterReport, MedianImputer};

    pub use crate::training::{
        ClassificationMetrics, Formula, ModelSource, ModelTrainer, Partition, RandomForest,
        StratifiedPartitioner, TrainedModel, TrainingConfig, VariableImportance,
    };

    pub use crate::inference::{EvaluationReport, Evaluator, PredictionSet, Predictor};

    pub use crate::report::ReportRenderer;

    pub use crate::pipeline::{Pipeline, PipelineConfig, PipelineOutput};
}
