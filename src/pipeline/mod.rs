//! End-to-end pipeline
//!
//! Runs the stages in order: load, partition, column filter, formula,
//! train (or restore), evaluate, predict, report. Output files are written
//! only after every stage has succeeded.

mod config;

pub use config::PipelineConfig;

use crate::error::Result;
use crate::inference::{EvaluationReport, Evaluator, PredictionSet, Predictor};
use crate::preprocessing::{ColumnFilter, FilterReport};
use crate::report::{ReportInputs, ReportRenderer};
use crate::training::{
    outcome_labels, ClassificationMetrics, Formula, ModelSource, ModelTrainer, Partition,
    StratifiedPartitioner, TrainedModel, TuningResult, VariableImportance,
};
use crate::utils::{DataLoader, DatasetSummary};
use polars::prelude::*;
use serde::Serialize;
use std::path::PathBuf;
use std::time::Instant;
use tracing::{info, warn};

/// Training data after partitioning and predictor selection
#[derive(Debug, Clone)]
pub struct PreparedData {
    pub summary: DatasetSummary,
    pub partition: Partition,
    pub train: DataFrame,
    pub test: DataFrame,
    pub filter: FilterReport,
    pub formula: Formula,
}

/// Everything a completed run produced
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub prepared: PreparedData,
    pub validation_summary: DatasetSummary,
    pub model: TrainedModel,
    pub model_source: ModelSource,
    pub evaluation: EvaluationReport,
    pub predictions: PredictionSet,
    pub report: String,
    /// Files written by the run
    pub written: Vec<PathBuf>,
    pub elapsed_secs: f64,
}

/// Machine-readable digest of a run
#[derive(Debug, Serialize)]
pub struct RunSummary<'a> {
    pub formula: String,
    pub n_train: usize,
    pub n_test: usize,
    pub excluded_columns: usize,
    pub tuning: &'a [TuningResult],
    pub best_mtry: usize,
    pub oob_error: Option<f64>,
    pub test_error: f64,
    pub test_metrics: &'a ClassificationMetrics,
    pub importance: &'a [VariableImportance],
    pub predictions: &'a PredictionSet,
}

pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    fn loader(&self) -> DataLoader {
        DataLoader::new().with_missing_tokens(self.config.missing_tokens.iter().cloned())
    }

    /// Load the training file, partition it and select predictors
    pub fn prepare(&self) -> Result<PreparedData> {
        self.config.validate()?;

        let raw = self.loader().load_csv(&self.config.training_path)?;
        let summary = DatasetSummary::from_frame(&raw);

        let labels = outcome_labels(&raw, &self.config.outcome_column)?;
        let partition = StratifiedPartitioner::new(self.config.train_fraction, self.config.seed)?
            .split(&labels)?;
        let (train, test) = partition.apply(&raw)?;

        let filter = ColumnFilter::new(self.config.outcome_column.as_str())?
            .with_non_predictive_pattern(&self.config.non_predictive_pattern)?
            .with_missing_threshold(self.config.missing_threshold)
            .apply(&train);
        let formula = Formula::new(self.config.outcome_column.as_str(), &filter.predictors)?;

        Ok(PreparedData {
            summary,
            partition,
            train,
            test,
            filter,
            formula,
        })
    }

    /// Restore the cached model if one exists, otherwise fit a new one
    pub fn obtain_model(&self, prepared: &PreparedData) -> Result<(TrainedModel, ModelSource)> {
        if let Some(path) = self.config.model_cache.as_ref().filter(|p| p.exists()) {
            let model = TrainedModel::load(path)?;
            if model.formula() != &prepared.formula {
                warn!(path = %path.display(), "cached model was fitted with a different formula");
            }
            info!(path = %path.display(), mtry = model.best_mtry(), "loaded cached model");
            return Ok((model, ModelSource::Cache(path.clone())));
        }

        let model = ModelTrainer::new(self.config.training.clone()).fit(&prepared.train, &prepared.formula)?;
        Ok((model, ModelSource::Trained))
    }

    /// Fit (or restore) the model, persisting it to the cache path
    pub fn train(&self) -> Result<(PreparedData, TrainedModel, ModelSource)> {
        let prepared = self.prepare()?;
        let mut trainer = ModelTrainer::new(self.config.training.clone());
        if let Some(path) = &self.config.model_cache {
            trainer = trainer.with_cache(path);
        }
        let (model, source) = trainer.fit_or_load(&prepared.train, &prepared.formula)?;
        Ok((prepared, model, source))
    }

    /// Score the validation file with an already trained model
    pub fn predict_validation(&self, model: &TrainedModel) -> Result<(DatasetSummary, PredictionSet)> {
        let validation = self.loader().load_csv(&self.config.validation_path)?;
        let summary = DatasetSummary::from_frame(&validation);
        let predictions = Predictor::new(model)
            .with_id_column(self.config.id_column.as_str())
            .predict(&validation)?;
        Ok((summary, predictions))
    }

    /// Run every stage, then write the cache, predictions and report
    pub fn run(&self) -> Result<PipelineOutput> {
        let start = Instant::now();

        let prepared = self.prepare()?;
        let (model, model_source) = self.obtain_model(&prepared)?;
        let evaluation = Evaluator::new(&model).evaluate(&prepared.test)?;
        let (validation_summary, predictions) = self.predict_validation(&model)?;

        let inputs = ReportInputs {
            training_data: &prepared.summary,
            validation_data: &validation_summary,
            filter: &prepared.filter,
            n_train: prepared.partition.train.len(),
            n_test: prepared.partition.test.len(),
            model: &model,
            model_source: &model_source,
            evaluation: &evaluation,
            predictions: &predictions,
        };
        let report = ReportRenderer::new().render(&inputs);

        let mut written = Vec::new();
        if let (ModelSource::Trained, Some(path)) = (&model_source, &self.config.model_cache) {
            model.save(path)?;
            written.push(path.clone());
        }
        if let Some(path) = &self.config.predictions_path {
            predictions.write_csv(path)?;
            written.push(path.clone());
        }
        if let Some(dir) = &self.config.answers_dir {
            written.extend(predictions.write_answer_files(dir)?);
        }
        if let Some(path) = &self.config.summary_path {
            let summary = RunSummary {
                formula: prepared.formula.to_string(),
                n_train: prepared.partition.train.len(),
                n_test: prepared.partition.test.len(),
                excluded_columns: prepared.filter.columns.len() - prepared.filter.predictors.len(),
                tuning: model.tuning(),
                best_mtry: model.best_mtry(),
                oob_error: model.oob_error(),
                test_error: evaluation.misclassification_rate(),
                test_metrics: &evaluation.metrics,
                importance: model.importance(),
                predictions: &predictions,
            };
            std::fs::write(path, serde_json::to_string_pretty(&summary)?)?;
            written.push(path.clone());
        }
        if let Some(parent) = self.config.report_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.config.report_path, &report)?;
        written.push(self.config.report_path.clone());

        let elapsed_secs = start.elapsed().as_secs_f64();
        info!(
            oob_error = ?model.oob_error(),
            test_error = evaluation.misclassification_rate(),
            predictions = predictions.len(),
            secs = elapsed_secs,
            "pipeline finished"
        );

        Ok(PipelineOutput {
            prepared,
            validation_summary,
            model,
            model_source,
            evaluation,
            predictions,
            report,
            written,
            elapsed_secs,
        })
    }
}

impl PreparedData {
    pub fn n_predictors(&self) -> usize {
        self.formula.n_predictors()
    }
}
