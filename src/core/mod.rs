//! Core tampering analysis pipeline
//!
//! raw audio -> [`FeatureExtractor`] -> [`Spectrogram`] -> [`Windower`]
//! -> [`WindowClassifier`] -> [`Aggregator`] -> [`FileVerdict`]

pub mod aggregator;
pub mod analyzer;
pub mod classifier;
pub mod decoder;
pub mod dsp;
pub mod features;
pub mod visualization;
pub mod windowing;

pub use aggregator::{Aggregator, ConfidenceBand, FileVerdict};
pub use analyzer::{AnalysisReport, AnalyzerBuilder, CancelFlag, TamperAnalyzer, WindowScore};
pub use classifier::{CnnClassifier, InputShape, WindowClassifier};
pub use features::{FeatureCache, FeatureExtractor, Spectrogram};
pub use windowing::{Window, WindowSet, Windower};
