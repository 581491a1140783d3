//! Pipeline configuration

use crate::error::{FormError, Result};
use crate::preprocessing::{DEFAULT_MISSING_THRESHOLD, DEFAULT_NON_PREDICTIVE_PATTERN};
use crate::training::TrainingConfig;
use crate::utils::DEFAULT_MISSING_TOKENS;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Inputs, outputs and parameters of one pipeline run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Labelled training data
    pub training_path: PathBuf,

    /// Unlabelled validation data
    pub validation_path: PathBuf,

    /// Cell values read as missing
    pub missing_tokens: Vec<String>,

    pub outcome_column: String,

    /// Row identifier carried through to the predictions
    pub id_column: String,

    /// Missing fraction at which a column is dropped
    pub missing_threshold: f64,

    /// Regex matching columns that are never predictors
    pub non_predictive_pattern: String,

    /// Share of each class placed in the training partition
    pub train_fraction: f64,

    /// Seed for the partition
    pub seed: u64,

    /// Persisted model, reused when present (None = always train)
    pub model_cache: Option<PathBuf>,

    pub report_path: PathBuf,

    pub predictions_path: Option<PathBuf>,

    /// Directory for one answer file per validation row
    pub answers_dir: Option<PathBuf>,

    /// JSON summary of the run
    pub summary_path: Option<PathBuf>,

    pub training: TrainingConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            training_path: PathBuf::from("pml-training.csv"),
            validation_path: PathBuf::from("pml-testing.csv"),
            missing_tokens: DEFAULT_MISSING_TOKENS.iter().map(|s| s.to_string()).collect(),
            outcome_column: "classe".to_string(),
            id_column: "problem_id".to_string(),
            missing_threshold: DEFAULT_MISSING_THRESHOLD,
            non_predictive_pattern: DEFAULT_NON_PREDICTIVE_PATTERN.to_string(),
            train_fraction: 0.70,
            seed: 3433,
            model_cache: Some(PathBuf::from("model_fit.json")),
            report_path: PathBuf::from("report.md"),
            predictions_path: Some(PathBuf::from("predictions.csv")),
            answers_dir: None,
            summary_path: None,
            training: TrainingConfig::default(),
        }
    }
}

impl PipelineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a configuration from a JSON file; absent keys keep their defaults
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path).map_err(|e| {
            FormError::ConfigError(format!("cannot read config {}: {}", path.display(), e))
        })?;
        let config: Self = serde_json::from_str(&json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_training_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.training_path = path.into();
        self
    }

    pub fn with_validation_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.validation_path = path.into();
        self
    }

    pub fn with_model_cache(mut self, path: Option<PathBuf>) -> Self {
        self.model_cache = path;
        self
    }

    pub fn with_report_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.report_path = path.into();
        self
    }

    pub fn with_predictions_path(mut self, path: Option<PathBuf>) -> Self {
        self.predictions_path = path;
        self
    }

    pub fn with_answers_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.answers_dir = dir;
        self
    }

    pub fn with_summary_path(mut self, path: Option<PathBuf>) -> Self {
        self.summary_path = path;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_training(mut self, training: TrainingConfig) -> Self {
        self.training = training;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.missing_threshold) {
            return Err(FormError::ConfigError(format!(
                "missing_threshold must be in [0, 1], got {}",
                self.missing_threshold
            )));
        }
        if !(self.train_fraction > 0.0 && self.train_fraction < 1.0) {
            return Err(FormError::ConfigError(format!(
                "train_fraction must be in (0, 1), got {}",
                self.train_fraction
            )));
        }
        if self.outcome_column.is_empty() {
            return Err(FormError::ConfigError("outcome_column is empty".to_string()));
        }
        self.training.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.training_path, PathBuf::from("pml-training.csv"));
        assert_eq!(config.missing_tokens, vec!["NA", "#DIV/0!"]);
        assert_eq!(config.outcome_column, "classe");
        assert_eq!(config.train_fraction, 0.70);
        assert_eq!(config.seed, 3433);
        assert_eq!(config.training.cv_folds, 5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        write!(tmp, r#"{{"seed": 7, "training": {{"n_estimators": 25}}}}"#).unwrap();

        let config = PipelineConfig::from_json_file(tmp.path()).unwrap();
        assert_eq!(config.seed, 7);
        assert_eq!(config.training.n_estimators, 25);
        assert_eq!(config.training.cv_folds, 5);
        assert_eq!(config.outcome_column, "classe");
    }

    #[test]
    fn test_invalid_fraction() {
        let mut config = PipelineConfig::default();
        config.train_fraction = 1.0;
        assert!(matches!(config.validate(), Err(FormError::ConfigError(_))));
    }
}
