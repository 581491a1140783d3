//! Inference: held-out evaluation and validation-set prediction

mod engine;

pub use engine::{EvaluationReport, Evaluator, PredictionSet, Predictor};
