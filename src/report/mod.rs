//! Markdown report of a pipeline run
//!
//! Assembles the dataset summary, predictor selection, tuning results,
//! error estimates, variable importance and final predictions into one
//! document. Holds no logic beyond formatting.

use crate::inference::{EvaluationReport, PredictionSet};
use crate::preprocessing::{Exclusion, FilterReport};
use crate::training::{ModelSource, TrainedModel};
use crate::utils::DatasetSummary;
use chrono::{DateTime, Utc};

/// Execution qualities of a unilateral dumbbell biceps curl
pub const CLASS_LEGEND: &[(&str, &str)] = &[
    ("A", "exactly according to the specification"),
    ("B", "throwing the elbows to the front"),
    ("C", "lifting the dumbbell only halfway"),
    ("D", "lowering the dumbbell only halfway"),
    ("E", "throwing the hips to the front"),
];

/// Everything a report is rendered from
#[derive(Debug, Clone, Copy)]
pub struct ReportInputs<'a> {
    pub training_data: &'a DatasetSummary,
    pub validation_data: &'a DatasetSummary,
    pub filter: &'a FilterReport,
    pub n_train: usize,
    pub n_test: usize,
    pub model: &'a TrainedModel,
    pub model_source: &'a ModelSource,
    pub evaluation: &'a EvaluationReport,
    pub predictions: &'a PredictionSet,
}

#[derive(Debug, Clone)]
pub struct ReportRenderer {
    title: String,
    /// Characters in a full-length importance bar
    bar_width: usize,
    /// Rows of the importance table and chart (None = every predictor)
    top_n: Option<usize>,
}

impl Default for ReportRenderer {
    fn default() -> Self {
        Self {
            title: "Predicting Dumbbell Lift Quality from Accelerometer Data".to_string(),
            bar_width: 40,
            top_n: Some(20),
        }
    }
}

impl ReportRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_bar_width(mut self, width: usize) -> Self {
        self.bar_width = width.max(1);
        self
    }

    pub fn with_top_n(mut self, top_n: Option<usize>) -> Self {
        self.top_n = top_n;
        self
    }

    /// Render the full report, stamped with the current time
    pub fn render(&self, inputs: &ReportInputs<'_>) -> String {
        self.render_at(inputs, Utc::now())
    }

    pub fn render_at(&self, inputs: &ReportInputs<'_>, generated_at: DateTime<Utc>) -> String {
        let mut md = String::new();

        md.push_str(&format!("# {}\n\n", self.title));
        md.push_str(&format!("*Generated: {}*\n\n", generated_at.format("%Y-%m-%d %H:%M UTC")));

        self.push_data(&mut md, inputs);
        self.push_features(&mut md, inputs.filter, inputs.model);
        self.push_model(&mut md, inputs);
        self.push_evaluation(&mut md, inputs.evaluation, inputs.model);
        self.push_importance(&mut md, inputs.model);
        self.push_predictions(&mut md, inputs.predictions);

        md
    }

    fn push_data(&self, md: &mut String, inputs: &ReportInputs<'_>) {
        md.push_str("## Data\n\n");
        md.push_str(&format!(
            "- **Training file:** {} rows, {} columns ({} with missing values)\n",
            inputs.training_data.n_rows,
            inputs.training_data.n_cols,
            inputs.training_data.columns_with_missing()
        ));
        md.push_str(&format!(
            "- **Validation file:** {} rows, {} columns\n",
            inputs.validation_data.n_rows, inputs.validation_data.n_cols
        ));
        md.push_str(&format!(
            "- **Partition:** {} training rows, {} testing rows\n\n",
            inputs.n_train, inputs.n_test
        ));

        md.push_str("The outcome records how each repetition was performed:\n\n");
        md.push_str("| Class | Execution |\n|-------|-----------|\n");
        for (class, description) in CLASS_LEGEND {
            md.push_str(&format!("| {} | {} |\n", class, description));
        }
        md.push('\n');
    }

    fn push_features(&self, md: &mut String, filter: &FilterReport, model: &TrainedModel) {
        md.push_str("## Feature Selection\n\n");
        md.push_str(&format!(
            "Missing fractions were computed over {} training rows.\n\n",
            filter.n_rows
        ));

        let non_predictive: Vec<&str> = filter
            .excluded(Exclusion::NonPredictive)
            .map(|c| c.name.as_str())
            .collect();
        let mostly_missing = filter.excluded(Exclusion::MostlyMissing).count();

        md.push_str(&format!(
            "- **Non-predictive columns dropped:** {}\n",
            if non_predictive.is_empty() {
                "none".to_string()
            } else {
                non_predictive.join(", ")
            }
        ));
        md.push_str(&format!("- **Mostly-missing columns dropped:** {}\n", mostly_missing));
        md.push_str(&format!("- **Predictors retained:** {}\n\n", filter.predictors.len()));

        md.push_str("Model formula:\n\n");
        md.push_str(&format!("```\n{}\n```\n\n", model.formula()));
    }

    fn push_model(&self, md: &mut String, inputs: &ReportInputs<'_>) {
        let model = inputs.model;
        md.push_str("## Model\n\n");
        md.push_str(&format!(
            "- **Method:** random forest, {} trees\n",
            model.forest().n_trees()
        ));
        let source = match inputs.model_source {
            ModelSource::Trained => format!("trained in {:.2}s", model.training_time_secs()),
            ModelSource::Cache(path) => format!("loaded from {}", path.display()),
        };
        md.push_str(&format!("- **Fit:** {}\n", source));
        md.push_str(&format!("- **Training rows:** {}\n\n", model.n_train()));

        let folds = model.tuning().first().map(|t| t.cv.n_folds).unwrap_or(0);
        md.push_str(&format!(
            "Variables tried at each split (mtry) were tuned with {}-fold cross-validation:\n\n",
            folds
        ));
        md.push_str("| mtry | Accuracy | SD |\n|------|----------|----|\n");
        for result in model.tuning() {
            let marker = if result.mtry == model.best_mtry() { " *" } else { "" };
            md.push_str(&format!(
                "| {}{} | {:.4} | {:.4} |\n",
                result.mtry, marker, result.cv.mean_score, result.cv.std_score
            ));
        }
        md.push_str(&format!("\nSelected mtry = {}.\n\n", model.best_mtry()));
    }

    fn push_evaluation(&self, md: &mut String, evaluation: &EvaluationReport, model: &TrainedModel) {
        md.push_str("## Error Estimates\n\n");
        match model.oob_error() {
            Some(err) => md.push_str(&format!("- **Out-of-bag error:** {:.2}%\n", err * 100.0)),
            None => md.push_str("- **Out-of-bag error:** unavailable\n"),
        }
        md.push_str(&format!(
            "- **Held-out error:** {:.2}% ({} rows)\n\n",
            evaluation.misclassification_rate() * 100.0,
            evaluation.metrics.n_samples
        ));

        let confusion = &evaluation.metrics.confusion;
        md.push_str("Confusion matrix on the testing partition (rows actual, columns predicted):\n\n");
        md.push_str("| |");
        for class in &confusion.classes {
            md.push_str(&format!(" {} |", class));
        }
        md.push_str(" Sensitivity |\n|---|");
        for _ in &confusion.classes {
            md.push_str("---|");
        }
        md.push_str("---|\n");

        for ((class, row), sensitivity) in confusion
            .classes
            .iter()
            .zip(confusion.counts.rows())
            .zip(confusion.sensitivity())
        {
            md.push_str(&format!("| **{}** |", class));
            for count in row.iter() {
                md.push_str(&format!(" {} |", count));
            }
            match sensitivity {
                Some(s) => md.push_str(&format!(" {:.4} |\n", s)),
                None => md.push_str(" - |\n"),
            }
        }
        md.push('\n');
    }

    fn push_importance(&self, md: &mut String, model: &TrainedModel) {
        let shown = self.top_n.unwrap_or(usize::MAX).min(model.importance().len());
        let rows = &model.importance()[..shown];

        md.push_str("## Variable Importance\n\n");
        md.push_str("| Variable | Scaled importance |\n|----------|-------------------|\n");
        for v in rows {
            md.push_str(&format!("| {} | {:.2} |\n", v.variable, v.scaled));
        }
        md.push('\n');

        let label_width = rows.iter().map(|v| v.variable.len()).max().unwrap_or(0);
        md.push_str("```\n");
        for v in rows {
            md.push_str(&format!(
                "{:<width$} |{} {:.1}\n",
                v.variable,
                importance_bar(v.scaled, self.bar_width),
                v.scaled,
                width = label_width
            ));
        }
        md.push_str("```\n\n");
    }

    fn push_predictions(&self, md: &mut String, predictions: &PredictionSet) {
        md.push_str("## Predictions\n\n");
        let id_name = predictions.id_column.as_deref().unwrap_or("row");
        md.push_str(&format!(
            "| {} | Prediction | Confidence |\n|---|---|---|\n",
            id_name
        ));
        for (i, (label, confidence)) in predictions
            .labels
            .iter()
            .zip(&predictions.confidence)
            .enumerate()
        {
            md.push_str(&format!("| {} | {} | {:.2} |\n", predictions.id(i), label, confidence));
        }
    }
}

/// Text bar for a 0..=100 score
pub fn importance_bar(scaled: f64, width: usize) -> String {
    let len = (scaled.clamp(0.0, 100.0) / 100.0 * width as f64).round() as usize;
    "#".repeat(len)
}
