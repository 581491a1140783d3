//! Command-line interface: full runs, training, prediction and data inspection

use clap::{Args, Parser, Subcommand};
use colored::*;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::inference::PredictionSet;
use crate::pipeline::{Pipeline, PipelineConfig};
use crate::training::{ModelSource, TrainedModel};
use crate::utils::{DataLoader, DatasetSummary};

// ─── Styling helpers ───────────────────────────────────────────────────────────

const W: usize = 58; // box inner width

fn dim(s: &str) -> ColoredString   { s.truecolor(100, 100, 100) }
fn accent(s: &str) -> ColoredString { s.truecolor(120, 170, 255) }
fn muted(s: &str) -> ColoredString  { s.truecolor(140, 140, 140) }
fn ok(s: &str) -> ColoredString     { s.truecolor(100, 210, 120) }

fn line_box_top()    { println!("  {}", dim("┌─────────────────────────────────────────────────────────┐")); }
fn line_box_bottom() { println!("  {}", dim("└─────────────────────────────────────────────────────────┘")); }
fn line_box_sep()    { println!("  {}", dim("├─────────────────────────────────────────────────────────┤")); }

fn line_box(content: &str) {
    let visible_len = strip_ansi(content).chars().count();
    let pad = W.saturating_sub(visible_len);
    println!("  {}  {}{} {}", dim("│"), content, " ".repeat(pad), dim("│"));
}

fn line_box_center(content: &str) {
    let visible_len = strip_ansi(content).chars().count();
    let total_pad = W.saturating_sub(visible_len);
    let left = total_pad / 2;
    let right = total_pad - left;
    println!("  {}  {}{}{} {}", dim("│"), " ".repeat(left), content, " ".repeat(right), dim("│"));
}

fn line_box_empty() { line_box(""); }

fn strip_ansi(s: &str) -> String {
    let mut out = String::new();
    let mut in_escape = false;
    for c in s.chars() {
        if c == '\x1b' { in_escape = true; continue; }
        if in_escape { if c == 'm' { in_escape = false; } continue; }
        out.push(c);
    }
    out
}

fn kv(key: &str, val: &str) -> String {
    format!("{} {}", muted(key), val.white())
}

fn step_ok(msg: &str) {
    println!("  {} {}", ok("✓"), msg);
}

fn step_run(msg: &str) {
    print!("  {} {}... ", accent("›"), msg);
}

fn step_done(detail: &str) {
    println!("{} {}", ok("done"), dim(detail));
}

fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", dim(&"─".repeat(56)));
}

fn pct(rate: Option<f64>) -> String {
    rate.map(|r| format!("{:.2}%", r * 100.0)).unwrap_or_else(|| "n/a".to_string())
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "dumbbell-form")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Classify dumbbell lifting technique from accelerometer data")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Paths shared by every pipeline command; flags override the config file
#[derive(Args, Debug, Clone, Default)]
pub struct PathArgs {
    /// JSON configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Labelled training CSV
    #[arg(long)]
    pub training: Option<PathBuf>,

    /// Unlabelled validation CSV
    #[arg(long)]
    pub validation: Option<PathBuf>,

    /// Persisted model location
    #[arg(long)]
    pub model_cache: Option<PathBuf>,

    /// Always retrain and never write the model cache
    #[arg(long)]
    pub no_cache: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the whole pipeline and render the report (default)
    Run {
        #[command(flatten)]
        paths: PathArgs,

        /// Report output file
        #[arg(short, long)]
        report: Option<PathBuf>,

        /// Predictions CSV output file
        #[arg(long)]
        predictions: Option<PathBuf>,

        /// Write one problem_id_<n>.txt answer file per validation row here
        #[arg(long)]
        answers_dir: Option<PathBuf>,

        /// JSON run summary output file
        #[arg(long)]
        summary: Option<PathBuf>,
    },

    /// Partition, select predictors and fit (or restore) the model
    Train {
        #[command(flatten)]
        paths: PathArgs,
    },

    /// Predict the validation file with the cached model
    Predict {
        #[command(flatten)]
        paths: PathArgs,

        /// Predictions CSV output file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show row, column and missing-value counts of a CSV file
    Info {
        /// Input data file
        #[arg(short, long)]
        data: PathBuf,
    },
}

/// Build the pipeline configuration from an optional file plus flag overrides
pub fn resolve_config(paths: &PathArgs) -> anyhow::Result<PipelineConfig> {
    let mut config = match &paths.config {
        Some(path) => PipelineConfig::from_json_file(path)?,
        None => PipelineConfig::default(),
    };
    if let Some(path) = &paths.training {
        config = config.with_training_path(path);
    }
    if let Some(path) = &paths.validation {
        config = config.with_validation_path(path);
    }
    if let Some(path) = &paths.model_cache {
        config = config.with_model_cache(Some(path.clone()));
    }
    if paths.no_cache {
        config = config.with_model_cache(None);
    }
    Ok(config)
}

// ─── Commands ──────────────────────────────────────────────────────────────────

fn print_banner() {
    println!();
    line_box_top();
    line_box_empty();
    line_box_center(&format!("{}", "dumbbell-form".white().bold()));
    line_box_center(&format!("{}", dim(&format!("v{}", env!("CARGO_PKG_VERSION")))));
    line_box_empty();
    line_box_sep();
    line_box_empty();
    line_box(&kv("Method ", "random forest, k-fold tuned mtry"));
    line_box(&kv("Classes", "A  B  C  D  E"));
    line_box_empty();
    line_box_bottom();
}

fn print_model(model: &TrainedModel, source: &ModelSource) {
    section("Model");
    let origin = match source {
        ModelSource::Trained => format!("trained in {:.2}s", model.training_time_secs()),
        ModelSource::Cache(path) => format!("cached at {}", path.display()),
    };
    println!("  {:<16} {}", muted("Formula"), format!("{} ~ {} predictors", model.formula().outcome(), model.formula().n_predictors()).white());
    println!("  {:<16} {}", muted("Source"), origin.white());
    println!("  {:<16} {}", muted("Trees"), model.forest().n_trees());
    println!("  {:<16} {}", muted("OOB error"), pct(model.oob_error()).white().bold());

    if !model.tuning().is_empty() {
        println!();
        println!("  {:<8} {:>10} {:>10}", muted("mtry"), muted("Accuracy"), muted("SD"));
        println!("  {}", dim(&"─".repeat(30)));
        for result in model.tuning() {
            let line = format!("  {:<8} {:>10.4} {:>10.4}", result.mtry, result.cv.mean_score, result.cv.std_score);
            if result.mtry == model.best_mtry() {
                println!("{} {}", line.white().bold(), ok("best"));
            } else {
                println!("{}", line);
            }
        }
    }

    println!();
    println!("  {:<24} {:>8}", muted("Variable"), muted("Scaled"));
    println!("  {}", dim(&"─".repeat(33)));
    for v in model.importance().iter().take(10) {
        println!("  {:<24} {:>8.2}", v.variable, v.scaled);
    }
}

fn print_predictions(predictions: &PredictionSet) {
    section("Predictions");
    let id_name = predictions.id_column.as_deref().unwrap_or("row");
    println!("  {:<12} {:>10} {:>12}", muted(id_name), muted("Class"), muted("Confidence"));
    println!("  {}", dim(&"─".repeat(36)));
    for (i, (label, confidence)) in predictions.labels.iter().zip(&predictions.confidence).enumerate() {
        println!("  {:<12} {:>10} {:>12.2}", predictions.id(i), label.white().bold(), confidence);
    }
}

/// Output locations for `run`; unset fields keep the configured value
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOutputs<'a> {
    pub report: Option<&'a Path>,
    pub predictions: Option<&'a Path>,
    pub answers_dir: Option<&'a Path>,
    pub summary: Option<&'a Path>,
}

pub fn cmd_run(paths: &PathArgs, outputs: RunOutputs<'_>) -> anyhow::Result<()> {
    let mut config = resolve_config(paths)?;
    if let Some(path) = outputs.report {
        config = config.with_report_path(path);
    }
    if let Some(path) = outputs.predictions {
        config = config.with_predictions_path(Some(path.to_path_buf()));
    }
    if let Some(dir) = outputs.answers_dir {
        config = config.with_answers_dir(Some(dir.to_path_buf()));
    }
    if let Some(path) = outputs.summary {
        config = config.with_summary_path(Some(path.to_path_buf()));
    }

    print_banner();
    section("Run");

    step_run("Running pipeline");
    let start = Instant::now();
    let output = Pipeline::new(config).run()?;
    step_done(&format!("{:.2?}", start.elapsed()));

    let prepared = &output.prepared;
    step_ok(&format!(
        "{} rows, {} train / {} test",
        prepared.summary.n_rows,
        prepared.partition.train.len(),
        prepared.partition.test.len()
    ));
    step_ok(&format!(
        "{} predictors kept of {} columns",
        prepared.n_predictors(),
        prepared.summary.n_cols
    ));

    print_model(&output.model, &output.model_source);

    section("Evaluation");
    println!("  {:<16} {}", muted("Held-out error"), pct(Some(output.evaluation.misclassification_rate())).white().bold());
    println!("  {:<16} {}", muted("Accuracy"), format!("{:.4}", output.evaluation.accuracy()).white());
    println!("  {:<16} {}", muted("Test rows"), output.evaluation.metrics.n_samples);

    print_predictions(&output.predictions);

    section("Output");
    for path in &output.written {
        step_ok(&path.display().to_string());
    }
    println!();
    Ok(())
}

pub fn cmd_train(paths: &PathArgs) -> anyhow::Result<()> {
    let pipeline = Pipeline::new(resolve_config(paths)?);
    section("Train");

    step_run("Fitting random forest");
    let start = Instant::now();
    let (prepared, model, source) = pipeline.train()?;
    step_done(&format!("{:.2?}", start.elapsed()));

    step_ok(&format!(
        "{} training rows, {} predictors",
        prepared.train.height(),
        prepared.n_predictors()
    ));
    if let Some(path) = &pipeline.config().model_cache {
        step_ok(&format!("model cache {}", path.display()));
    }

    print_model(&model, &source);
    println!();
    Ok(())
}

pub fn cmd_predict(paths: &PathArgs, output: Option<&Path>) -> anyhow::Result<()> {
    let config = resolve_config(paths)?;
    let Some(cache) = config.model_cache.clone() else {
        anyhow::bail!("predict needs a model cache path");
    };
    if !cache.exists() {
        anyhow::bail!("no cached model at {}; run `train` first", cache.display());
    }

    section("Predict");

    step_run("Loading model");
    let model = TrainedModel::load(&cache)?;
    step_done(&format!("mtry {}, {} trees", model.best_mtry(), model.forest().n_trees()));

    let pipeline = Pipeline::new(config);
    step_run("Scoring validation data");
    let start = Instant::now();
    let (summary, predictions) = pipeline.predict_validation(&model)?;
    step_done(&format!("{} rows in {:.2?}", summary.n_rows, start.elapsed()));

    print_predictions(&predictions);

    let target = output
        .map(Path::to_path_buf)
        .or_else(|| pipeline.config().predictions_path.clone());
    if let Some(path) = target {
        predictions.write_csv(&path)?;
        println!();
        step_ok(&format!("wrote {}", path.display()));
    }
    println!();
    Ok(())
}

pub fn cmd_info(data_path: &Path) -> anyhow::Result<()> {
    section("Data Info");

    let df = DataLoader::new().load_csv(data_path)?;
    let summary = DatasetSummary::from_frame(&df);

    println!("  {:<12} {}", muted("File"), data_path.display());
    println!("  {:<12} {}", muted("Rows"), summary.n_rows);
    println!("  {:<12} {}", muted("Columns"), summary.n_cols);
    println!("  {:<12} {}", muted("With gaps"), summary.columns_with_missing());
    println!();

    println!("  {:<28} {:<10} {:>8} {:>8}", muted("Column"), muted("Type"), muted("Missing"), muted("Share"));
    println!("  {}", dim(&"─".repeat(56)));

    for col in &summary.columns {
        let share = if summary.n_rows > 0 { col.missing as f64 / summary.n_rows as f64 } else { 0.0 };
        println!(
            "  {:<28} {:<10} {:>8} {:>7.1}%",
            col.name,
            col.dtype.truecolor(140, 140, 140),
            col.missing,
            share * 100.0
        );
    }

    println!();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_ansi() {
        let styled = format!("{}", "best".green());
        assert_eq!(strip_ansi(&styled), "best");
    }

    #[test]
    fn test_resolve_config_overrides() {
        let paths = PathArgs {
            training: Some(PathBuf::from("train.csv")),
            no_cache: true,
            ..Default::default()
        };
        let config = resolve_config(&paths).unwrap();
        assert_eq!(config.training_path, PathBuf::from("train.csv"));
        assert_eq!(config.validation_path, PathBuf::from("pml-testing.csv"));
        assert!(config.model_cache.is_none());
    }

    #[test]
    fn test_cli_parses_default_and_run() {
        let cli = Cli::try_parse_from(["dumbbell-form"]).unwrap();
        assert!(cli.command.is_none());

        let cli = Cli::try_parse_from(["dumbbell-form", "run", "--training", "t.csv", "--report", "out.md"]).unwrap();
        match cli.command {
            Some(Commands::Run { paths, report, .. }) => {
                assert_eq!(paths.training, Some(PathBuf::from("t.csv")));
                assert_eq!(report, Some(PathBuf::from("out.md")));
            }
            _ => panic!("expected run"),
        }
    }
}
