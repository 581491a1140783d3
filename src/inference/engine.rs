//! Scoring a trained model against labelled and unlabelled frames

use crate::error::{FormError, Result};
use crate::training::{outcome_labels, ClassificationMetrics, TrainedModel};
use crate::utils::DataSaver;
use ndarray::Axis;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info};

/// Held-out performance of a model on the testing partition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub metrics: ClassificationMetrics,
    pub latency_ms: f64,
}

impl EvaluationReport {
    /// Fraction of rows whose predicted label differs from the actual one
    pub fn misclassification_rate(&self) -> f64 {
        self.metrics.misclassification
    }

    pub fn accuracy(&self) -> f64 {
        self.metrics.accuracy
    }
}

/// Applies a model to the testing partition and measures its error
#[derive(Debug, Clone, Copy)]
pub struct Evaluator<'a> {
    model: &'a TrainedModel,
}

impl<'a> Evaluator<'a> {
    pub fn new(model: &'a TrainedModel) -> Self {
        Self { model }
    }

    pub fn evaluate(&self, test: &DataFrame) -> Result<EvaluationReport> {
        if test.height() == 0 {
            return Err(FormError::ValidationError("testing partition is empty".to_string()));
        }
        let start = Instant::now();

        let labels = outcome_labels(test, self.model.formula().outcome())?;
        let actual = self.model.codebook().encode_all(&labels)?;
        let predicted = self.model.predict_indices(test)?;
        let metrics = ClassificationMetrics::compute(&actual, &predicted, self.model.classes())?;

        let latency_ms = start.elapsed().as_secs_f64() * 1000.0;
        info!(
            rows = metrics.n_samples,
            accuracy = metrics.accuracy,
            error_rate = metrics.misclassification,
            "evaluated on testing partition"
        );

        Ok(EvaluationReport { metrics, latency_ms })
    }
}

/// One predicted label per validation row, in input order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionSet {
    /// Name of the id column, when the validation frame carried one
    pub id_column: Option<String>,
    pub ids: Option<Vec<String>>,
    pub labels: Vec<String>,
    /// Share of trees voting for the predicted label
    pub confidence: Vec<f64>,
}

impl PredictionSet {
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Identifier of row `i`: the id column value, or the 1-based row number
    pub fn id(&self, i: usize) -> String {
        match &self.ids {
            Some(ids) => ids[i].clone(),
            None => (i + 1).to_string(),
        }
    }

    pub fn to_frame(&self) -> Result<DataFrame> {
        let id_name = self.id_column.as_deref().unwrap_or("row");
        let ids: Vec<String> = (0..self.len()).map(|i| self.id(i)).collect();
        let df = DataFrame::new(vec![
            Column::new(id_name.into(), ids),
            Column::new("prediction".into(), self.labels.clone()),
            Column::new("confidence".into(), self.confidence.clone()),
        ])?;
        Ok(df)
    }

    /// Write `id,prediction,confidence` rows to a CSV file
    pub fn write_csv(&self, path: &Path) -> Result<()> {
        let mut df = self.to_frame()?;
        DataSaver::save_csv(&mut df, path)?;
        info!(path = %path.display(), rows = self.len(), "wrote predictions");
        Ok(())
    }

    /// Write one `problem_id_<n>.txt` file per row holding only the label
    pub fn write_answer_files(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        std::fs::create_dir_all(dir)?;
        let paths = self
            .labels
            .iter()
            .enumerate()
            .map(|(i, label)| {
                let path = dir.join(format!("problem_id_{}.txt", self.id(i)));
                std::fs::write(&path, label)?;
                Ok(path)
            })
            .collect::<Result<Vec<PathBuf>>>()?;
        debug!(dir = %dir.display(), files = paths.len(), "wrote answer files");
        Ok(paths)
    }
}

/// Applies a model to an unlabelled validation frame
#[derive(Debug, Clone)]
pub struct Predictor<'a> {
    model: &'a TrainedModel,
    id_column: Option<String>,
}

impl<'a> Predictor<'a> {
    pub fn new(model: &'a TrainedModel) -> Self {
        Self { model, id_column: None }
    }

    /// Carry this column through to the predictions when present
    pub fn with_id_column(mut self, column: impl Into<String>) -> Self {
        self.id_column = Some(column.into());
        self
    }

    pub fn predict(&self, df: &DataFrame) -> Result<PredictionSet> {
        let start = Instant::now();
        let proba = self.model.predict_proba(df)?;

        let (labels, confidence): (Vec<String>, Vec<f64>) = proba
            .axis_iter(Axis(0))
            .map(|row| {
                let mut best = 0;
                for (k, &p) in row.iter().enumerate() {
                    if p > row[best] {
                        best = k;
                    }
                }
                (self.model.codebook().decode(best).to_string(), row[best])
            })
            .unzip();

        let id_column = self
            .id_column
            .as_ref()
            .filter(|name| df.column(name.as_str()).is_ok())
            .cloned();
        let ids = match &id_column {
            Some(name) => Some(
                outcome_labels(df, name)?
                    .into_iter()
                    .enumerate()
                    .map(|(i, id)| id.unwrap_or_else(|| (i + 1).to_string()))
                    .collect(),
            ),
            None => None,
        };

        info!(
            rows = labels.len(),
            latency_ms = start.elapsed().as_secs_f64() * 1000.0,
            "predicted validation rows"
        );

        Ok(PredictionSet {
            id_column,
            ids,
            labels,
            confidence,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::{Formula, ModelTrainer, TrainingConfig};

    fn model() -> (TrainedModel, DataFrame) {
        let signal: Vec<f64> = (0..24).map(|i| if i < 12 { i as f64 } else { 100.0 + i as f64 }).collect();
        let classe: Vec<&str> = (0..24).map(|i| if i < 12 { "A" } else { "B" }).collect();
        let df = df!("signal" => &signal, "classe" => &classe).unwrap();
        let formula = Formula::new("classe", &["signal".to_string()]).unwrap();
        let config = TrainingConfig::default().with_n_estimators(10).with_cv(3);
        (ModelTrainer::new(config).fit(&df, &formula).unwrap(), df)
    }

    #[test]
    fn test_evaluate_perfect() {
        let (model, df) = model();
        let report = Evaluator::new(&model).evaluate(&df).unwrap();
        assert_eq!(report.misclassification_rate(), 0.0);
        assert_eq!(report.metrics.n_samples, 24);
    }

    #[test]
    fn test_evaluate_empty() {
        let (model, df) = model();
        let empty = df.head(Some(0));
        assert!(matches!(
            Evaluator::new(&model).evaluate(&empty),
            Err(FormError::ValidationError(_))
        ));
    }

    #[test]
    fn test_predict_preserves_order_and_ids() {
        let (model, _) = model();
        let validation = df!(
            "problem_id" => &[7i64, 8, 9],
            "signal" => &[120.0, 1.0, 115.0]
        )
        .unwrap();

        let predictions = Predictor::new(&model)
            .with_id_column("problem_id")
            .predict(&validation)
            .unwrap();
        assert_eq!(predictions.labels, vec!["B", "A", "B"]);
        assert_eq!(predictions.ids, Some(vec!["7".to_string(), "8".to_string(), "9".to_string()]));
        assert!(predictions.confidence.iter().all(|&c| c > 0.5 && c <= 1.0));
    }

    #[test]
    fn test_predict_missing_predictor() {
        let (model, _) = model();
        let validation = df!("pitch_arm" => &[1.0]).unwrap();
        let err = Predictor::new(&model).predict(&validation).unwrap_err();
        assert!(matches!(err, FormError::FeatureNotFound(name) if name == "signal"));
    }

    #[test]
    fn test_answer_files() {
        let dir = tempfile::tempdir().unwrap();
        let set = PredictionSet {
            id_column: None,
            ids: None,
            labels: vec!["A".to_string(), "C".to_string()],
            confidence: vec![1.0, 0.6],
        };
        let paths = set.write_answer_files(dir.path()).unwrap();
        assert_eq!(paths.len(), 2);
        assert_eq!(std::fs::read_to_string(dir.path().join("problem_id_2.txt")).unwrap(), "C");

        let csv = dir.path().join("predictions.csv");
        set.write_csv(&csv).unwrap();
        let written = std::fs::read_to_string(csv).unwrap();
        assert!(written.starts_with("row,prediction,confidence"));
    }
}
