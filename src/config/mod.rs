//! Configuration module for TamperCheckr

mod pipeline;

pub use pipeline::{
    ConfigBuilder, FeatureConfig, PipelineConfig, Thresholds, WindowConfig,
    DEFAULT_FILE_THRESHOLD, DEFAULT_WINDOW_THRESHOLD,
};
