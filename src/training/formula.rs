//! Model formula: outcome explained by an additive set of predictors

use crate::error::{FormError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// `outcome ~ p1 + p2 + ...` with no interactions or transformations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Formula {
    outcome: String,
    predictors: Vec<String>,
}

impl Formula {
    /// Build a formula; fails when there is nothing to predict from
    pub fn new(outcome: impl Into<String>, predictors: &[String]) -> Result<Self> {
        let outcome = outcome.into();
        if predictors.is_empty() {
            return Err(FormError::ConfigError(format!(
                "no predictor columns left to model '{}'",
                outcome
            )));
        }
        if predictors.iter().any(|p| *p == outcome) {
            return Err(FormError::ConfigError(format!(
                "outcome '{}' cannot also be a predictor",
                outcome
            )));
        }
        Ok(Self {
            outcome,
            predictors: predictors.to_vec(),
        })
    }

    pub fn outcome(&self) -> &str {
        &self.outcome
    }

    pub fn predictors(&self) -> &[String] {
        &self.predictors
    }

    pub fn n_predictors(&self) -> usize {
        self.predictors.len()
    }
}

impl fmt::Display for Formula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ~ {}", self.outcome, self.predictors.join(" + "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_display() {
        let f = Formula::new("classe", &names(&["roll_belt", "yaw_belt"])).unwrap();
        assert_eq!(f.to_string(), "classe ~ roll_belt + yaw_belt");
    }

    #[test]
    fn test_rebuild_is_textually_identical() {
        let preds = names(&["a", "b", "c"]);
        let first = Formula::new("classe", &preds).unwrap().to_string();
        let second = Formula::new("classe", &preds).unwrap().to_string();
        assert_eq!(first, second);
    }

    #[test]
    fn test_empty_predictors_fail() {
        let err = Formula::new("classe", &[]).unwrap_err();
        assert!(matches!(err, FormError::ConfigError(_)));
    }

    #[test]
    fn test_outcome_as_predictor_fails() {
        assert!(Formula::new("classe", &names(&["classe", "a"])).is_err());
    }
}
