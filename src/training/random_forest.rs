//! Random Forest classifier

use super::decision_tree::{majority, Criterion, DecisionTree};
use crate::error::{FormError, Result};
use ndarray::{Array1, Array2, Axis};
use rand::{Rng, RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Random Forest model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForest {
    /// Individual trees
    trees: Vec<DecisionTree>,
    /// Number of trees
    pub n_estimators: usize,
    /// Maximum depth per tree
    pub max_depth: Option<usize>,
    /// Minimum samples to split
    pub min_samples_split: usize,
    /// Minimum samples in leaf
    pub min_samples_leaf: usize,
    /// Features sampled at each split
    pub max_features: MaxFeatures,
    /// Bootstrap sampling
    pub bootstrap: bool,
    /// Out-of-bag score
    pub oob_score: bool,
    /// Impurity criterion
    pub criterion: Criterion,
    /// Random state
    pub random_state: Option<u64>,
    /// Computed OOB accuracy
    oob_score_value: Option<f64>,
    /// Mean impurity decrease per feature across trees
    feature_importances: Option<Array1<f64>>,
    /// Number of features
    n_features: usize,
    /// Number of classes
    n_classes: usize,
}

/// Strategy for features sampled per split
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum MaxFeatures {
    /// Floor of the square root of n_features
    Sqrt,
    /// Fixed number
    Fixed(usize),
    /// All features
    All,
}

impl Default for RandomForest {
    fn default() -> Self {
        Self::new(100)
    }
}

impl RandomForest {
    /// Create a new classifier forest
    pub fn new(n_estimators: usize) -> Self {
        Self {
            trees: Vec::new(),
            n_estimators,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: MaxFeatures::Sqrt,
            bootstrap: true,
            oob_score: false,
            criterion: Criterion::Gini,
            random_state: None,
            oob_score_value: None,
            feature_importances: None,
            n_features: 0,
            n_classes: 0,
        }
    }

    /// Set maximum depth
    pub fn with_max_depth(mut self, depth: Option<usize>) -> Self {
        self.max_depth = depth;
        self
    }

    /// Set minimum samples in leaf
    pub fn with_min_samples_leaf(mut self, min_samples: usize) -> Self {
        self.min_samples_leaf = min_samples;
        self
    }

    /// Set max features strategy
    pub fn with_max_features(mut self, max_features: MaxFeatures) -> Self {
        self.max_features = max_features;
        self
    }

    /// Set criterion
    pub fn with_criterion(mut self, criterion: Criterion) -> Self {
        self.criterion = criterion;
        self
    }

    /// Set random state
    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
        self
    }

    /// Enable OOB score computation
    pub fn with_oob_score(mut self, oob_score: bool) -> Self {
        self.oob_score = oob_score;
        self
    }

    /// Resolve the per-split feature count for `n_features` columns
    pub fn compute_max_features(&self, n_features: usize) -> usize {
        match self.max_features {
            MaxFeatures::Sqrt => (n_features as f64).sqrt().floor() as usize,
            MaxFeatures::Fixed(n) => n.min(n_features),
            MaxFeatures::All => n_features,
        }
        .max(1)
    }

    /// Fit the forest; `y` holds class indices below `n_classes`
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<usize>, n_classes: usize) -> Result<&mut Self> {
        let n_samples = x.nrows();
        let n_features = x.ncols();

        if n_samples != y.len() {
            return Err(FormError::ShapeError {
                expected: format!("y length = {}", n_samples),
                actual: format!("y length = {}", y.len()),
            });
        }

        if n_samples == 0 || self.n_estimators == 0 {
            return Err(FormError::TrainingError(format!(
                "cannot grow {} trees on {} rows",
                self.n_estimators, n_samples
            )));
        }

        self.n_features = n_features;
        self.n_classes = n_classes;
        let max_features = self.compute_max_features(n_features);
        let base_seed = self.random_state.unwrap_or(42);

        // Every tree owns its RNG, so the result does not depend on scheduling.
        let grown: Vec<(DecisionTree, Vec<bool>)> = (0..self.n_estimators)
            .into_par_iter()
            .map(|tree_idx| -> Result<(DecisionTree, Vec<bool>)> {
                let mut rng = ChaCha8Rng::seed_from_u64(base_seed.wrapping_add(tree_idx as u64));

                let sample_indices: Vec<usize> = if self.bootstrap {
                    (0..n_samples).map(|_| rng.gen_range(0..n_samples)).collect()
                } else {
                    (0..n_samples).collect()
                };

                let mut in_bag = vec![false; n_samples];
                for &i in &sample_indices {
                    in_bag[i] = true;
                }

                let x_boot = x.select(Axis(0), &sample_indices);
                let y_boot = y.select(Axis(0), &sample_indices);

                let mut tree = DecisionTree::new()
                    .with_min_samples_leaf(self.min_samples_leaf)
                    .with_min_samples_split(self.min_samples_split)
                    .with_criterion(self.criterion)
                    .with_max_features(max_features)
                    .with_random_state(rng.next_u64());
                tree.max_depth = self.max_depth;
                tree.fit(&x_boot, &y_boot, n_classes)?;

                Ok((tree, in_bag))
            })
            .collect::<Result<Vec<_>>>()?;

        self.oob_score_value = if self.oob_score && self.bootstrap {
            self.compute_oob_score(x, y, &grown)?
        } else {
            None
        };

        self.trees = grown.into_iter().map(|(tree, _)| tree).collect();
        self.compute_feature_importances();

        debug!(
            trees = self.trees.len(),
            max_features,
            oob = ?self.oob_score_value,
            "grew random forest"
        );

        Ok(self)
    }

    /// Accuracy of majority votes from trees that did not see each row
    fn compute_oob_score(
        &self,
        x: &Array2<f64>,
        y: &Array1<usize>,
        grown: &[(DecisionTree, Vec<bool>)],
    ) -> Result<Option<f64>> {
        let n_samples = x.nrows();
        let mut votes = Array2::<usize>::zeros((n_samples, self.n_classes));

        for (tree, in_bag) in grown {
            for (i, row) in x.axis_iter(Axis(0)).enumerate() {
                if !in_bag[i] {
                    let class = tree.predict_row(&row)?;
                    votes[[i, class]] += 1;
                }
            }
        }

        let mut scored = 0usize;
        let mut correct = 0usize;
        for (i, row_votes) in votes.axis_iter(Axis(0)).enumerate() {
            let counts = row_votes.to_vec();
            if counts.iter().sum::<usize>() == 0 {
                continue;
            }
            scored += 1;
            if majority(&counts) == y[i] {
                correct += 1;
            }
        }

        Ok((scored > 0).then(|| correct as f64 / scored as f64))
    }

    fn compute_feature_importances(&mut self) {
        if self.trees.is_empty() {
            return;
        }

        let mut total = Array1::<f64>::zeros(self.n_features);
        for tree in &self.trees {
            if let Some(imp) = tree.feature_importances() {
                total += imp;
            }
        }
        total /= self.trees.len() as f64;

        self.feature_importances = Some(total);
    }

    /// Vote counts per row and class
    fn vote(&self, x: &Array2<f64>) -> Result<Array2<usize>> {
        if self.trees.is_empty() {
            return Err(FormError::ModelNotFitted);
        }

        let all_predictions: Vec<Array1<usize>> = self
            .trees
            .par_iter()
            .map(|tree| tree.predict(x))
            .collect::<Result<Vec<_>>>()?;

        let mut votes = Array2::<usize>::zeros((x.nrows(), self.n_classes));
        for preds in &all_predictions {
            for (i, &class) in preds.iter().enumerate() {
                votes[[i, class]] += 1;
            }
        }
        Ok(votes)
    }

    /// Predict class indices by majority vote
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<usize>> {
        let votes = self.vote(x)?;
        Ok(votes
            .axis_iter(Axis(0))
            .map(|row| majority(&row.to_vec()))
            .collect())
    }

    /// Fraction of trees voting for each class
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let votes = self.vote(x)?;
        let n_trees = self.trees.len() as f64;
        Ok(votes.mapv(|v| v as f64 / n_trees))
    }

    /// Mean impurity decrease per feature
    pub fn feature_importances(&self) -> Option<&Array1<f64>> {
        self.feature_importances.as_ref()
    }

    /// Get OOB accuracy
    pub fn oob_score_value(&self) -> Option<f64> {
        self.oob_score_value
    }

    /// Get number of trees
    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn n_classes(&self) -> usize {
        self.n_classes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn two_blobs() -> (Array2<f64>, Array1<usize>) {
        let x = array![
            [0.0, 0.0],
            [0.1, 0.1],
            [0.2, 0.2],
            [0.3, 0.1],
            [1.0, 1.0],
            [1.1, 1.1],
            [1.2, 1.2],
            [1.3, 1.1],
        ];
        let y = array![0usize, 0, 0, 0, 1, 1, 1, 1];
        (x, y)
    }

    #[test]
    fn test_classifier() {
        let (x, y) = two_blobs();

        let mut rf = RandomForest::new(25).with_random_state(42);
        rf.fit(&x, &y, 2).unwrap();

        let predictions = rf.predict(&x).unwrap();
        let correct = predictions.iter().zip(y.iter()).filter(|(p, a)| p == a).count();

        assert!(correct as f64 / y.len() as f64 >= 0.8);
        assert_eq!(rf.n_trees(), 25);
    }

    #[test]
    fn test_same_seed_same_forest() {
        let (x, y) = two_blobs();

        let mut a = RandomForest::new(10).with_random_state(7).with_oob_score(true);
        let mut b = RandomForest::new(10).with_random_state(7).with_oob_score(true);
        a.fit(&x, &y, 2).unwrap();
        b.fit(&x, &y, 2).unwrap();

        assert_eq!(a.predict(&x).unwrap(), b.predict(&x).unwrap());
        assert_eq!(a.oob_score_value(), b.oob_score_value());
        assert_eq!(a.feature_importances(), b.feature_importances());
    }

    #[test]
    fn test_oob_score_in_range() {
        let (x, y) = two_blobs();

        let mut rf = RandomForest::new(30).with_random_state(1).with_oob_score(true);
        rf.fit(&x, &y, 2).unwrap();

        let oob = rf.oob_score_value().unwrap();
        assert!((0.0..=1.0).contains(&oob));
    }

    #[test]
    fn test_predict_proba() {
        let (x, y) = two_blobs();

        let mut rf = RandomForest::new(10).with_random_state(42);
        rf.fit(&x, &y, 2).unwrap();

        let proba = rf.predict_proba(&x).unwrap();
        assert_eq!(proba.shape(), &[8, 2]);
        for row in proba.rows() {
            assert!((row.sum() - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_feature_importances() {
        let x = array![[1.0, 0.0], [2.0, 0.0], [3.0, 0.0], [4.0, 0.0]];
        let y = array![0usize, 0, 1, 1];

        let mut rf = RandomForest::new(10)
            .with_random_state(42)
            .with_max_features(MaxFeatures::All);
        rf.fit(&x, &y, 2).unwrap();

        let importances = rf.feature_importances().unwrap();
        assert_eq!(importances.len(), 2);
        assert!(importances[0] >= importances[1]);
        assert_eq!(importances[1], 0.0);
    }

    #[test]
    fn test_max_features() {
        let rf = RandomForest::new(1);
        assert_eq!(rf.compute_max_features(52), 7);
        assert_eq!(rf.compute_max_features(1), 1);
        let rf = rf.with_max_features(MaxFeatures::Fixed(80));
        assert_eq!(rf.compute_max_features(52), 52);
    }

    #[test]
    fn test_unfitted() {
        let rf = RandomForest::new(3);
        assert!(matches!(rf.predict(&array![[1.0]]), Err(FormError::ModelNotFitted)));
    }
}
