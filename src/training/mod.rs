//! Model training
//!
//! Covers the path from a labelled frame to a fitted model:
//! - Stratified train/test partitioning
//! - Formula construction and design matrices
//! - Classification trees and random forests
//! - k-fold cross-validation for mtry tuning
//! - Classification metrics

mod config;
mod engine;
mod features;
mod formula;
pub mod cross_validation;
pub mod decision_tree;
pub mod metrics;
pub mod partition;
pub mod random_forest;

pub use config::TrainingConfig;
pub use cross_validation::{CVResults, CVSplit, CVStrategy, CrossValidator};
pub use decision_tree::{Criterion, DecisionTree, TreeNode};
pub use engine::{scale_importance, ModelSource, ModelTrainer, TrainedModel, TuningResult, VariableImportance};
pub use features::{design_matrix, outcome_labels, require_columns, ClassCodebook};
pub use formula::Formula;
pub use metrics::{ClassificationMetrics, ConfusionMatrix};
pub use partition::{take_rows, Partition, StratifiedPartitioner};
pub use random_forest::{MaxFeatures, RandomForest};
