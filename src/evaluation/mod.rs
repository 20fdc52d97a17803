//! Offline evaluation of the file-level verdict against labeled data

mod harness;
mod metrics;

pub use harness::{
    evaluate_predictions, pool_by_file, EvaluationFailure, EvaluationReport, Evaluator, FileOutcome,
    FilePool, WindowPrediction,
};
pub use metrics::ConfusionMatrix;
