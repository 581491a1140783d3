//! Training configuration

use super::decision_tree::Criterion;
use crate::error::{FormError, Result};
use serde::{Deserialize, Serialize};

/// Configuration for the forest fit and its mtry tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Trees per forest (tuning fits and the final fit)
    pub n_estimators: usize,

    /// Number of cross-validation folds used for tuning
    pub cv_folds: usize,

    /// Number of mtry candidates tried during tuning
    pub tune_length: usize,

    /// Explicit mtry candidates (overrides `tune_length`)
    pub mtry_grid: Option<Vec<usize>>,

    /// Split criterion
    pub criterion: Criterion,

    /// Minimum samples per leaf
    pub min_samples_leaf: usize,

    /// Maximum depth of trees (None = grow fully)
    pub max_depth: Option<usize>,

    /// Random seed for folds and trees
    pub random_state: u64,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            cv_folds: 5,
            tune_length: 3,
            mtry_grid: None,
            criterion: Criterion::Gini,
            min_samples_leaf: 1,
            max_depth: None,
            random_state: 3433,
        }
    }
}

impl TrainingConfig {
    /// Create a new configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to set number of estimators
    pub fn with_n_estimators(mut self, n: usize) -> Self {
        self.n_estimators = n;
        self
    }

    /// Builder method to set CV folds
    pub fn with_cv(mut self, folds: usize) -> Self {
        self.cv_folds = folds;
        self
    }

    /// Builder method to set the tuning grid length
    pub fn with_tune_length(mut self, length: usize) -> Self {
        self.tune_length = length;
        self
    }

    /// Builder method to fix the mtry candidates
    pub fn with_mtry_grid(mut self, grid: Vec<usize>) -> Self {
        self.mtry_grid = Some(grid);
        self
    }

    /// Builder method to set max depth
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    /// Builder method to set random state
    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    /// Reject settings the trainer cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.n_estimators == 0 {
            return Err(FormError::ConfigError("n_estimators must be positive".to_string()));
        }
        if self.cv_folds < 2 {
            return Err(FormError::ConfigError("cv_folds must be at least 2".to_string()));
        }
        if self.tune_length == 0 {
            return Err(FormError::ConfigError("tune_length must be positive".to_string()));
        }
        if let Some(grid) = &self.mtry_grid {
            if grid.is_empty() || grid.contains(&0) {
                return Err(FormError::ConfigError(
                    "mtry_grid must hold positive values".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// mtry candidates for `n_predictors` columns: floor(seq(2, p, length = tune_length))
    pub fn mtry_candidates(&self, n_predictors: usize) -> Vec<usize> {
        if let Some(grid) = &self.mtry_grid {
            let mut grid: Vec<usize> = grid.iter().map(|&m| m.min(n_predictors).max(1)).collect();
            grid.sort_unstable();
            grid.dedup();
            return grid;
        }

        if n_predictors <= 1 {
            return vec![1];
        }
        if self.tune_length == 1 {
            return vec![2];
        }

        let lo = 2.0;
        let hi = n_predictors as f64;
        let steps = (self.tune_length - 1) as f64;
        let mut grid: Vec<usize> = (0..self.tune_length)
            .map(|i| (lo + (hi - lo) * i as f64 / steps).floor() as usize)
            .collect();
        grid.dedup();
        grid
    }
}
