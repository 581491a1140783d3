//! Classification metrics

use crate::error::{FormError, Result};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

/// Rows are actual classes, columns predicted classes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    pub classes: Vec<String>,
    pub counts: Array2<usize>,
}

impl ConfusionMatrix {
    pub fn total(&self) -> usize {
        self.counts.sum()
    }

    pub fn correct(&self) -> usize {
        self.counts.diag().sum()
    }

    /// Share of each actual class that was predicted correctly
    pub fn sensitivity(&self) -> Vec<Option<f64>> {
        self.counts
            .rows()
            .into_iter()
            .enumerate()
            .map(|(i, row)| {
                let actual = row.sum();
                (actual > 0).then(|| row[i] as f64 / actual as f64)
            })
            .collect()
    }
}

/// Metrics for a set of class predictions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassificationMetrics {
    /// Share of rows predicted correctly
    pub accuracy: f64,
    /// Share of rows predicted incorrectly
    pub misclassification: f64,
    /// Number of rows scored
    pub n_samples: usize,
    pub confusion: ConfusionMatrix,
}

impl ClassificationMetrics {
    /// Compare predicted and actual class indices
    pub fn compute(
        y_true: &Array1<usize>,
        y_pred: &Array1<usize>,
        classes: &[String],
    ) -> Result<Self> {
        if y_true.len() != y_pred.len() {
            return Err(FormError::ShapeError {
                expected: format!("{} predictions", y_true.len()),
                actual: format!("{} predictions", y_pred.len()),
            });
        }
        if y_true.is_empty() {
            return Err(FormError::ValidationError(
                "cannot score an empty prediction set".to_string(),
            ));
        }

        let n_classes = classes.len();
        let mut counts = Array2::<usize>::zeros((n_classes, n_classes));
        for (&t, &p) in y_true.iter().zip(y_pred.iter()) {
            if t >= n_classes || p >= n_classes {
                return Err(FormError::ValidationError(format!(
                    "class index out of range for {} classes",
                    n_classes
                )));
            }
            counts[[t, p]] += 1;
        }

        let confusion = ConfusionMatrix {
            classes: classes.to_vec(),
            counts,
        };
        let n_samples = y_true.len();
        let wrong = n_samples - confusion.correct();
        let misclassification = wrong as f64 / n_samples as f64;

        Ok(Self {
            accuracy: 1.0 - misclassification,
            misclassification,
            n_samples,
            confusion,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn classes() -> Vec<String> {
        vec!["A".to_string(), "B".to_string()]
    }

    #[test]
    fn test_misclassification() {
        let y_true = array![0usize, 0, 1, 1];
        let y_pred = array![0usize, 1, 1, 1];

        let metrics = ClassificationMetrics::compute(&y_true, &y_pred, &classes()).unwrap();

        assert_eq!(metrics.misclassification, 0.25);
        assert_eq!(metrics.accuracy, 0.75);
        assert_eq!(metrics.confusion.counts, array![[1usize, 1], [0, 2]]);
        assert_eq!(metrics.confusion.sensitivity(), vec![Some(0.5), Some(1.0)]);
    }

    #[test]
    fn test_perfect_is_zero() {
        let y = array![0usize, 1, 1];
        let metrics = ClassificationMetrics::compute(&y, &y, &classes()).unwrap();
        assert_eq!(metrics.misclassification, 0.0);
        assert_eq!(metrics.confusion.total(), 3);
    }

    #[test]
    fn test_empty_and_mismatched() {
        let empty = Array1::<usize>::zeros(0);
        assert!(ClassificationMetrics::compute(&empty, &empty, &classes()).is_err());
        assert!(ClassificationMetrics::compute(&array![0usize], &array![0usize, 1], &classes()).is_err());
    }
}
