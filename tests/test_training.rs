//! Integration test: partitioning, mtry tuning, evaluation and the model cache

use dumbbell_form::inference::{Evaluator, Predictor};
use dumbbell_form::training::{
    outcome_labels, Formula, ModelSource, ModelTrainer, StratifiedPartitioner, TrainedModel, TrainingConfig,
};
use dumbbell_form::FormError;
use polars::prelude::*;
use std::collections::BTreeMap;

fn labels(spec: &[(&str, usize)]) -> Vec<Option<String>> {
    spec.iter()
        .flat_map(|(label, n)| std::iter::repeat(Some(label.to_string())).take(*n))
        .collect()
}

/// Five well separated classes plus one noise column
fn lifts(n_per_class: usize) -> DataFrame {
    let mut roll = Vec::new();
    let mut pitch = Vec::new();
    let mut noise = Vec::new();
    let mut classe = Vec::new();
    for (k, label) in ["A", "B", "C", "D", "E"].iter().enumerate() {
        for i in 0..n_per_class {
            roll.push(k as f64 * 10.0 + (i % 4) as f64 * 0.5);
            pitch.push(-(k as f64) * 3.0 + (i % 3) as f64 * 0.2);
            noise.push(((i * 31 + k * 7) % 13) as f64);
            classe.push(label.to_string());
        }
    }
    df!("roll_belt" => &roll, "pitch_belt" => &pitch, "gyros_belt_x" => &noise, "classe" => &classe).unwrap()
}

fn formula() -> Formula {
    Formula::new(
        "classe",
        &["roll_belt".to_string(), "pitch_belt".to_string(), "gyros_belt_x".to_string()],
    )
    .unwrap()
}

fn quick() -> TrainingConfig {
    TrainingConfig::default().with_n_estimators(20)
}

#[test]
fn test_ten_row_example_split() {
    let y = labels(&[("A", 6), ("B", 4)]);
    let partition = StratifiedPartitioner::new(0.7, 3433).unwrap().split(&y).unwrap();

    let count = |rows: &[usize], label: &str| {
        rows.iter().filter(|&&r| y[r].as_deref() == Some(label)).count()
    };
    assert_eq!(count(&partition.train, "A"), 4);
    assert_eq!(count(&partition.train, "B"), 3);
    assert_eq!(count(&partition.test, "A"), 2);
    assert_eq!(count(&partition.test, "B"), 1);
}

#[test]
fn test_partition_properties_across_seeds() {
    let y = labels(&[("A", 558), ("B", 379), ("C", 342), ("D", 321), ("E", 360)]);

    for seed in [1u64, 7, 3433, 99_999] {
        let partitioner = StratifiedPartitioner::new(0.7, seed).unwrap();
        let partition = partitioner.split(&y).unwrap();

        // deterministic
        assert_eq!(partition, partitioner.split(&y).unwrap());

        // disjoint cover
        assert_eq!(partition.train.len() + partition.test.len(), y.len());
        let mut seen = vec![0u8; y.len()];
        for &r in partition.train.iter().chain(&partition.test) {
            seen[r] += 1;
        }
        assert!(seen.iter().all(|&s| s == 1));

        // stratified
        let mut totals: BTreeMap<&str, (usize, usize)> = BTreeMap::new();
        for &r in &partition.train {
            totals.entry(y[r].as_deref().unwrap()).or_default().0 += 1;
        }
        for label in y.iter().flatten() {
            totals.entry(label.as_str()).or_default().1 += 1;
        }
        for (label, (train, all)) in totals {
            let fraction = train as f64 / all as f64;
            assert!((fraction - 0.7).abs() <= 0.05, "class {} fraction {}", label, fraction);
        }
    }
}

#[test]
fn test_trainer_tunes_and_scores() {
    let df = lifts(12);
    let model = ModelTrainer::new(quick()).fit(&df, &formula()).unwrap();

    let tried: Vec<usize> = model.tuning().iter().map(|t| t.mtry).collect();
    assert_eq!(tried, vec![2, 3]);
    assert!(tried.contains(&model.best_mtry()));
    assert!(model.tuning().iter().all(|t| t.cv.n_folds == 5));

    let oob = model.oob_accuracy().unwrap();
    assert!((0.0..=1.0).contains(&oob));
    assert!(oob > 0.8);

    let scaled: Vec<f64> = model.importance().iter().map(|v| v.scaled).collect();
    assert_eq!(scaled.len(), 3);
    assert_eq!(scaled[0], 100.0);
    assert_eq!(scaled[2], 0.0);
    assert!(scaled.windows(2).all(|w| w[0] >= w[1]));
    assert_eq!(model.importance()[2].variable, "gyros_belt_x");
}

#[test]
fn test_evaluator_error_rate_bounds() {
    let df = lifts(12);
    let y = outcome_labels(&df, "classe").unwrap();
    let partition = StratifiedPartitioner::new(0.7, 3433).unwrap().split(&y).unwrap();
    let (train, test) = partition.apply(&df).unwrap();

    let model = ModelTrainer::new(quick()).fit(&train, &formula()).unwrap();
    let report = Evaluator::new(&model).evaluate(&test).unwrap();

    let rate = report.misclassification_rate();
    assert!((0.0..=1.0).contains(&rate));
    assert_eq!(report.metrics.n_samples, test.height());
    let wrong = report.metrics.n_samples - report.metrics.confusion.correct();
    assert_eq!(rate == 0.0, wrong == 0);
    assert!(rate < 0.2);
}

#[test]
fn test_predictor_keeps_row_order() {
    let model = ModelTrainer::new(quick()).fit(&lifts(12), &formula()).unwrap();
    let validation = df!(
        "problem_id" => &[1i64, 2, 3, 4, 5, 6],
        "roll_belt" => &[40.5, 0.5, 20.5, 30.5, 10.5, 0.0],
        "pitch_belt" => &[-12.0, 0.2, -6.0, -9.0, -3.0, 0.0],
        "gyros_belt_x" => &[3.0, 3.0, 3.0, 3.0, 3.0, 3.0]
    )
    .unwrap();

    let predictions = Predictor::new(&model)
        .with_id_column("problem_id")
        .predict(&validation)
        .unwrap();
    assert_eq!(predictions.len(), validation.height());
    assert_eq!(predictions.labels, vec!["E", "A", "C", "D", "B", "A"]);
}

#[test]
fn test_predictor_requires_predictors() {
    let model = ModelTrainer::new(quick()).fit(&lifts(12), &formula()).unwrap();
    let validation = df!("roll_belt" => &[1.0], "gyros_belt_x" => &[0.0]).unwrap();
    let err = Predictor::new(&model).predict(&validation).unwrap_err();
    assert!(matches!(err, FormError::FeatureNotFound(name) if name == "pitch_belt"));
}

#[test]
fn test_training_failures() {
    let df = lifts(12);
    let absent = Formula::new("classe", &["roll_belt".to_string(), "magnet_arm_z".to_string()]).unwrap();
    assert!(matches!(
        ModelTrainer::new(quick()).fit(&df, &absent),
        Err(FormError::FeatureNotFound(_))
    ));

    let tiny = df.head(Some(4));
    assert!(matches!(
        ModelTrainer::new(quick()).fit(&tiny, &formula()),
        Err(FormError::ConfigError(_))
    ));
}

#[test]
fn test_cached_model_matches_fresh() {
    let dir = tempfile::tempdir().unwrap();
    let cache = dir.path().join("model_fit.json");
    let df = lifts(10);
    let trainer = ModelTrainer::new(quick()).with_cache(&cache);

    let (fresh, source) = trainer.fit_or_load(&df, &formula()).unwrap();
    assert_eq!(source, ModelSource::Trained);

    let restored = TrainedModel::load(&cache).unwrap();
    assert_eq!(restored.predict(&df).unwrap(), fresh.predict(&df).unwrap());
    assert_eq!(restored.importance(), fresh.importance());
    assert_eq!(restored.best_mtry(), fresh.best_mtry());

    let (_, source) = trainer.fit_or_load(&df, &formula()).unwrap();
    assert_eq!(source, ModelSource::Cache(cache.clone()));
}

#[test]
fn test_training_is_deterministic() {
    let df = lifts(10);
    let a = ModelTrainer::new(quick()).fit(&df, &formula()).unwrap();
    let b = ModelTrainer::new(quick()).fit(&df, &formula()).unwrap();
    assert_eq!(a.oob_accuracy(), b.oob_accuracy());
    assert_eq!(a.importance(), b.importance());
    assert_eq!(a.best_mtry(), b.best_mtry());
}
