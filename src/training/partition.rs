//! Stratified train/test partitioning

use crate::error::{FormError, Result};
use polars::prelude::*;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::info;

/// Disjoint row-index sets; both sorted ascending
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Partition {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

impl Partition {
    /// Rows covered by the two sets
    pub fn len(&self) -> usize {
        self.train.len() + self.test.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Materialize both sides as data frames
    pub fn apply(&self, df: &DataFrame) -> Result<(DataFrame, DataFrame)> {
        Ok((take_rows(df, &self.train)?, take_rows(df, &self.test)?))
    }
}

/// Select rows by index, preserving the given order
pub fn take_rows(df: &DataFrame, indices: &[usize]) -> Result<DataFrame> {
    let idx = IdxCa::from_vec(
        "idx".into(),
        indices.iter().map(|&i| i as IdxSize).collect(),
    );
    Ok(df.take(&idx)?)
}

/// Splits labeled rows so each class keeps roughly `train_fraction` of its rows in training
#[derive(Debug, Clone)]
pub struct StratifiedPartitioner {
    train_fraction: f64,
    seed: u64,
}

impl StratifiedPartitioner {
    pub fn new(train_fraction: f64, seed: u64) -> Result<Self> {
        if !(train_fraction > 0.0 && train_fraction < 1.0) {
            return Err(FormError::ConfigError(format!(
                "train fraction must be in (0, 1), got {}",
                train_fraction
            )));
        }
        Ok(Self {
            train_fraction,
            seed,
        })
    }

    pub fn train_fraction(&self) -> f64 {
        self.train_fraction
    }

    /// Split rows by label; rows without a label land in neither set
    pub fn split(&self, labels: &[Option<String>]) -> Result<Partition> {
        let mut by_class: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
        for (i, label) in labels.iter().enumerate() {
            if let Some(label) = label {
                by_class.entry(label.as_str()).or_default().push(i);
            }
        }

        if by_class.is_empty() {
            return Err(FormError::DataError(
                "no labeled rows to partition".to_string(),
            ));
        }

        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let mut train = Vec::new();
        let mut test = Vec::new();

        for (_class, mut indices) in by_class {
            indices.shuffle(&mut rng);
            let n_train = ((indices.len() as f64) * self.train_fraction)
                .round()
                .min(indices.len() as f64) as usize;
            train.extend_from_slice(&indices[..n_train]);
            test.extend_from_slice(&indices[n_train..]);
        }

        train.sort_unstable();
        test.sort_unstable();

        info!(
            train = train.len(),
            test = test.len(),
            fraction = self.train_fraction,
            "partitioned labeled rows"
        );

        Ok(Partition { train, test })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn labels(spec: &[(&str, usize)]) -> Vec<Option<String>> {
        spec.iter()
            .flat_map(|(label, n)| std::iter::repeat(Some(label.to_string())).take(*n))
            .collect()
    }

    fn class_count(labels: &[Option<String>], rows: &[usize], class: &str) -> usize {
        rows.iter()
            .filter(|&&i| labels[i].as_deref() == Some(class))
            .count()
    }

    #[test]
    fn test_ten_row_example() {
        let y = labels(&[("A", 6), ("B", 4)]);
        let partition = StratifiedPartitioner::new(0.7, 1).unwrap().split(&y).unwrap();

        assert_eq!(class_count(&y, &partition.train, "A"), 4);
        assert_eq!(class_count(&y, &partition.train, "B"), 3);
        assert_eq!(class_count(&y, &partition.test, "A"), 2);
        assert_eq!(class_count(&y, &partition.test, "B"), 1);
    }

    #[test]
    fn test_disjoint_and_covering() {
        let y = labels(&[("A", 37), ("B", 12), ("C", 51)]);
        let partition = StratifiedPartitioner::new(0.7, 99).unwrap().split(&y).unwrap();

        assert_eq!(partition.len(), y.len());
        let train: HashSet<_> = partition.train.iter().collect();
        assert!(partition.test.iter().all(|i| !train.contains(i)));
    }

    #[test]
    fn test_deterministic_for_seed() {
        let y = labels(&[("A", 40), ("B", 25), ("C", 35)]);
        let splitter = StratifiedPartitioner::new(0.7, 3433).unwrap();
        assert_eq!(splitter.split(&y).unwrap(), splitter.split(&y).unwrap());
    }

    #[test]
    fn test_stratification_tolerance() {
        let y = labels(&[("A", 558), ("B", 379), ("C", 342), ("D", 321), ("E", 360)]);
        let partition = StratifiedPartitioner::new(0.7, 7).unwrap().split(&y).unwrap();

        for (class, total) in [("A", 558), ("B", 379), ("C", 342), ("D", 321), ("E", 360)] {
            let fraction = class_count(&y, &partition.train, class) as f64 / total as f64;
            assert!((fraction - 0.7).abs() <= 0.05, "{}: {}", class, fraction);
        }
    }

    #[test]
    fn test_unlabeled_rows_are_skipped() {
        let mut y = labels(&[("A", 5)]);
        y.push(None);
        let partition = StratifiedPartitioner::new(0.6, 0).unwrap().split(&y).unwrap();
        assert_eq!(partition.len(), 5);
        assert!(!partition.train.contains(&5) && !partition.test.contains(&5));
    }

    #[test]
    fn test_invalid_fraction() {
        assert!(StratifiedPartitioner::new(1.0, 0).is_err());
        assert!(StratifiedPartitioner::new(0.0, 0).is_err());
    }

    #[test]
    fn test_apply_takes_rows() {
        let df = df!("v" => &[0i64, 1, 2, 3]).unwrap();
        let partition = Partition {
            train: vec![0, 2],
            test: vec![1, 3],
        };
        let (train, test) = partition.apply(&df).unwrap();
        assert_eq!(train.height(), 2);
        assert_eq!(test.height(), 2);
    }
}
