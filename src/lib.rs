//! TamperCheckr - Detect tampering in short audio clips
//!
//! Classifies overlapping windows of a log-mel spectrogram with a small
//! convolutional model and turns the window votes into a file verdict.
//!
//! ## Pipeline
//!
//! raw audio -> log-mel spectrogram (16 kHz, 128 mels, FFT 2048, hop 512)
//! -> windows of 40 frames every 20 frames -> per-window probability
//! -> vote (`score > window_threshold`) -> ratio of positive votes
//! -> verdict (`ratio >= file_threshold`)
//!
//! ## Module Structure
//!
//! - `core` - Feature extraction, windowing, classifier, aggregation
//! - `calibration` - Youden-J window threshold from held-out scores
//! - `evaluation` - File-level accuracy and confusion matrix
//! - `dataset` - File identity, CSV manifests, synthetic tampering
//! - `config` - Immutable pipeline configuration
//! - `cli` - Command-line interface
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use tampercheckr::{CnnClassifier, PipelineConfig, TamperAnalyzer};
//!
//! let config = PipelineConfig::default();
//! let model = CnnClassifier::load("model.json")?;
//! let analyzer = TamperAnalyzer::new(&config, &model)?;
//!
//! let report = analyzer.analyze_file("clip.wav")?;
//! println!("ratio {:.2}, tampered: {}", report.verdict.tampering_ratio, report.verdict.is_tampered);
//! ```

// Core analysis pipeline
pub mod core;

// Threshold calibration
pub mod calibration;

// Offline evaluation
pub mod evaluation;

// Dataset tooling
pub mod dataset;

// Configuration
pub mod config;

// Command-line interface
pub mod cli;

mod error;

pub use calibration::{calibrate, roc_curve, Calibration, LabeledScore, RocCurve, RocPoint};
pub use config::{ConfigBuilder, FeatureConfig, PipelineConfig, Thresholds, WindowConfig};
pub use core::{
    Aggregator, AnalysisReport, AnalyzerBuilder, CancelFlag, CnnClassifier, ConfidenceBand,
    FeatureCache, FeatureExtractor, FileVerdict, InputShape, Spectrogram, TamperAnalyzer,
    WindowClassifier, WindowScore, WindowSet, Windower,
};
pub use dataset::{FileKey, Grouping, Label, Manifest, ManifestEntry, TamperKind, Tamperer};
pub use error::{Result, TamperError};
pub use evaluation::{
    evaluate_predictions, pool_by_file, ConfusionMatrix, EvaluationReport, Evaluator,
    WindowPrediction,
};
