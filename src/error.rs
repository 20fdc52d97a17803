// src/error.rs
//
// Error taxonomy shared by every stage of the pipeline.

use std::path::PathBuf;
use thiserror::Error;

/// Errors produced by the tampering analysis library
#[derive(Debug, Error)]
pub enum TamperError {
    /// Source audio could not be opened, decoded, or held no samples
    #[error("failed to load audio from {path}: {reason}")]
    AudioLoad { path: PathBuf, reason: String },

    /// Classifier input contract violated
    #[error("classifier input shape mismatch: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    /// Classifier returned something other than a probability in [0, 1]
    #[error("classifier returned invalid score {score} for window {window}")]
    InvalidScore { window: usize, score: f32 },

    /// No windows reached the aggregator. Windowing always yields at least
    /// one window, so this is a bug upstream.
    #[error("no windows to aggregate")]
    EmptyWindowSet,

    #[error("spectral analysis failed: {0}")]
    Spectral(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("failed to load model from {path}: {reason}")]
    Model { path: PathBuf, reason: String },

    #[error("threshold calibration failed: {0}")]
    Calibration(String),

    #[error("invalid dataset manifest {path}: {reason}")]
    Manifest { path: PathBuf, reason: String },

    #[error("feature cache error for {path}: {reason}")]
    FeatureCache { path: PathBuf, reason: String },

    #[error("analysis cancelled")]
    Cancelled,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl TamperError {
    pub(crate) fn audio_load(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::AudioLoad {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, TamperError>;
