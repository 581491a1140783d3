//! Model trainer: k-fold tuning of mtry, final forest fit, and the model cache

use super::config::TrainingConfig;
use super::cross_validation::{CVResults, CVStrategy, CrossValidator};
use super::features::{design_matrix, outcome_labels, require_columns, ClassCodebook};
use super::formula::Formula;
use super::metrics::ClassificationMetrics;
use super::random_forest::{MaxFeatures, RandomForest};
use crate::error::{FormError, Result};
use crate::preprocessing::MedianImputer;
use chrono::{DateTime, Utc};
use ndarray::{Array1, Array2, Axis};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info};

/// Cross-validated accuracy for one mtry candidate
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TuningResult {
    pub mtry: usize,
    pub cv: CVResults,
}

/// Importance of one predictor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableImportance {
    pub variable: String,
    /// Mean impurity decrease across trees
    pub raw: f64,
    /// Raw importance rescaled to 0..=100
    pub scaled: f64,
}

/// Fitted forest together with everything needed to score new frames
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainedModel {
    formula: Formula,
    codebook: ClassCodebook,
    imputer: MedianImputer,
    forest: RandomForest,
    tuning: Vec<TuningResult>,
    best_mtry: usize,
    oob_accuracy: Option<f64>,
    importance: Vec<VariableImportance>,
    n_train: usize,
    training_time_secs: f64,
    trained_at: DateTime<Utc>,
}

impl TrainedModel {
    pub fn formula(&self) -> &Formula {
        &self.formula
    }

    pub fn classes(&self) -> &[String] {
        self.codebook.classes()
    }

    pub fn codebook(&self) -> &ClassCodebook {
        &self.codebook
    }

    pub fn forest(&self) -> &RandomForest {
        &self.forest
    }

    pub fn tuning(&self) -> &[TuningResult] {
        &self.tuning
    }

    pub fn best_mtry(&self) -> usize {
        self.best_mtry
    }

    /// Out-of-bag accuracy of the final forest
    pub fn oob_accuracy(&self) -> Option<f64> {
        self.oob_accuracy
    }

    pub fn oob_error(&self) -> Option<f64> {
        self.oob_accuracy.map(|a| 1.0 - a)
    }

    /// Predictor importances, most important first
    pub fn importance(&self) -> &[VariableImportance] {
        &self.importance
    }

    pub fn n_train(&self) -> usize {
        self.n_train
    }

    pub fn training_time_secs(&self) -> f64 {
        self.training_time_secs
    }

    pub fn trained_at(&self) -> DateTime<Utc> {
        self.trained_at
    }

    /// Design matrix for a frame that carries every predictor column
    pub fn features(&self, df: &DataFrame) -> Result<Array2<f64>> {
        require_columns(df, self.formula.predictors())?;
        design_matrix(df, self.formula.predictors(), &self.imputer)
    }

    /// Predicted class indices, one per row
    pub fn predict_indices(&self, df: &DataFrame) -> Result<Array1<usize>> {
        let x = self.features(df)?;
        self.forest.predict(&x)
    }

    /// Predicted class labels, one per row in input order
    pub fn predict(&self, df: &DataFrame) -> Result<Vec<String>> {
        Ok(self
            .predict_indices(df)?
            .iter()
            .map(|&c| self.codebook.decode(c).to_string())
            .collect())
    }

    /// Share of trees voting for each class
    pub fn predict_proba(&self, df: &DataFrame) -> Result<Array2<f64>> {
        let x = self.features(df)?;
        self.forest.predict_proba(&x)
    }

    /// Save the model as JSON
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Load a model saved with [`TrainedModel::save`]
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let model: Self = serde_json::from_str(&json)?;
        Ok(model)
    }
}

/// Where a model came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelSource {
    Trained,
    Cache(PathBuf),
}

/// Fits random forests over a training partition
#[derive(Debug, Clone)]
pub struct ModelTrainer {
    config: TrainingConfig,
    cache_path: Option<PathBuf>,
}

impl ModelTrainer {
    pub fn new(config: TrainingConfig) -> Self {
        Self {
            config,
            cache_path: None,
        }
    }

    /// Reuse (and write) a persisted model at `path`
    pub fn with_cache(mut self, path: impl Into<PathBuf>) -> Self {
        self.cache_path = Some(path.into());
        self
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    /// Load the cached model when one exists, otherwise fit and cache
    pub fn fit_or_load(&self, df: &DataFrame, formula: &Formula) -> Result<(TrainedModel, ModelSource)> {
        if let Some(path) = &self.cache_path {
            if path.exists() {
                let model = TrainedModel::load(path)?;
                info!(path = %path.display(), mtry = model.best_mtry(), "loaded cached model");
                return Ok((model, ModelSource::Cache(path.clone())));
            }
        }

        let model = self.fit(df, formula)?;
        if let Some(path) = &self.cache_path {
            model.save(path)?;
            info!(path = %path.display(), "cached trained model");
        }
        Ok((model, ModelSource::Trained))
    }

    /// Tune mtry with stratified k-fold CV and fit the final forest
    pub fn fit(&self, df: &DataFrame, formula: &Formula) -> Result<TrainedModel> {
        let start = Instant::now();
        self.config.validate()?;

        require_columns(df, formula.predictors())?;
        let n_rows = df.height();
        if n_rows < self.config.cv_folds {
            return Err(FormError::ConfigError(format!(
                "training partition has {} rows, fewer than {} folds",
                n_rows, self.config.cv_folds
            )));
        }

        let labels = outcome_labels(df, formula.outcome())?;
        let codebook = ClassCodebook::fit(labels.iter().flatten().map(String::as_str))?;
        let y = codebook.encode_all(&labels)?;

        let mut imputer = MedianImputer::new();
        imputer.fit(df, formula.predictors())?;
        let x = design_matrix(df, formula.predictors(), &imputer)?;

        info!(
            rows = n_rows,
            predictors = formula.n_predictors(),
            classes = codebook.n_classes(),
            "training random forest"
        );

        let tuning = self.tune(&x, &y, codebook.classes())?;
        let best = select_best(&tuning)
            .ok_or_else(|| FormError::TrainingError("no mtry candidate was evaluated".to_string()))?;
        let best_mtry = best.mtry;
        info!(mtry = best_mtry, cv_accuracy = best.cv.mean_score, "selected mtry");

        let mut forest = self.forest(best_mtry).with_oob_score(true);
        forest.fit(&x, &y, codebook.n_classes())?;

        let oob_accuracy = forest.oob_score_value();
        let raw = forest
            .feature_importances()
            .cloned()
            .ok_or_else(|| FormError::TrainingError("forest produced no importances".to_string()))?;
        let importance = scale_importance(formula.predictors(), &raw);

        let training_time_secs = start.elapsed().as_secs_f64();
        info!(
            oob_accuracy = ?oob_accuracy,
            secs = training_time_secs,
            "final model fitted"
        );

        Ok(TrainedModel {
            formula: formula.clone(),
            codebook,
            imputer,
            forest,
            tuning,
            best_mtry,
            oob_accuracy,
            importance,
            n_train: n_rows,
            training_time_secs,
            trained_at: Utc::now(),
        })
    }

    fn forest(&self, mtry: usize) -> RandomForest {
        RandomForest::new(self.config.n_estimators)
            .with_max_features(MaxFeatures::Fixed(mtry))
            .with_criterion(self.config.criterion)
            .with_min_samples_leaf(self.config.min_samples_leaf)
            .with_max_depth(self.config.max_depth)
            .with_random_state(self.config.random_state)
    }

    /// Cross-validated accuracy of every mtry candidate
    fn tune(&self, x: &Array2<f64>, y: &Array1<usize>, classes: &[String]) -> Result<Vec<TuningResult>> {
        let splits = CrossValidator::new(CVStrategy::StratifiedKFold {
            n_splits: self.config.cv_folds,
            shuffle: true,
        })
        .with_random_state(self.config.random_state)
        .split(x.nrows(), Some(y))?;

        self.config
            .mtry_candidates(x.ncols())
            .into_iter()
            .map(|mtry| {
                let scores = splits
                    .iter()
                    .map(|split| {
                        let x_train = x.select(Axis(0), &split.train_indices);
                        let y_train = y.select(Axis(0), &split.train_indices);
                        let x_test = x.select(Axis(0), &split.test_indices);
                        let y_test = y.select(Axis(0), &split.test_indices);

                        let mut forest = self.forest(mtry);
                        forest.fit(&x_train, &y_train, classes.len())?;
                        let y_pred = forest.predict(&x_test)?;
                        let metrics = ClassificationMetrics::compute(&y_test, &y_pred, classes)?;

                        debug!(mtry, fold = split.fold_idx, accuracy = metrics.accuracy, "fold scored");
                        Ok(metrics.accuracy)
                    })
                    .collect::<Result<Vec<f64>>>()?;

                let cv = CVResults::from_scores(scores);
                info!(mtry, accuracy = cv.mean_score, sd = cv.std_score, "tuning candidate");
                Ok(TuningResult { mtry, cv })
            })
            .collect()
    }
}

/// Highest mean accuracy; the earlier (smaller) mtry wins ties
fn select_best(tuning: &[TuningResult]) -> Option<&TuningResult> {
    tuning.iter().fold(None, |best: Option<&TuningResult>, candidate| match best {
        Some(b) if b.cv.mean_score >= candidate.cv.mean_score => Some(b),
        _ => Some(candidate),
    })
}

/// Rescale raw importances to 0..=100 and sort descending (name breaks ties)
pub fn scale_importance(names: &[String], raw: &Array1<f64>) -> Vec<VariableImportance> {
    let min = raw.iter().copied().fold(f64::INFINITY, f64::min);
    let max = raw.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let range = max - min;

    let mut scores: Vec<VariableImportance> = names
        .iter()
        .zip(raw.iter())
        .map(|(name, &value)| VariableImportance {
            variable: name.clone(),
            raw: value,
            scaled: if range > 0.0 { (value - min) / range * 100.0 } else { 100.0 },
        })
        .collect();

    scores.sort_by(|a, b| {
        b.scaled
            .partial_cmp(&a.scaled)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.variable.cmp(&b.variable))
    });
    scores
}
