// src/config/pipeline.rs
//
// Immutable pipeline configuration. Built once, validated, then borrowed by
// every stage so several configurations can coexist in one process.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{Result, TamperError};

/// Default window threshold used when no calibration record is supplied
pub const DEFAULT_WINDOW_THRESHOLD: f32 = 0.695;
/// Default fraction of positive windows needed to flag a file
pub const DEFAULT_FILE_THRESHOLD: f32 = 0.50;

/// Log-mel feature extraction parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureConfig {
    /// Analysis sample rate in Hz; sources are resampled to this rate
    pub sample_rate: u32,
    /// Number of mel bands
    pub n_mels: usize,
    /// STFT size in samples
    pub fft_size: usize,
    /// STFT hop in samples (one spectrogram frame)
    pub hop_length: usize,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16_000,
            n_mels: 128,
            fft_size: 2048,
            hop_length: 512,
        }
    }
}

impl FeatureConfig {
    /// Duration of one spectrogram frame in seconds
    pub fn frame_secs(&self) -> f64 {
        self.hop_length as f64 / self.sample_rate as f64
    }
}

/// Analysis window geometry, in spectrogram frames
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub width: usize,
    pub hop: usize,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self { width: 40, hop: 20 }
    }
}

/// Decision thresholds for window votes and the file verdict
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    /// A window votes "tampered" when its score is strictly above this
    pub window: f32,
    /// A file is tampered when its vote ratio is at or above this
    pub file: f32,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            window: DEFAULT_WINDOW_THRESHOLD,
            file: DEFAULT_FILE_THRESHOLD,
        }
    }
}

/// Complete pipeline configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub features: FeatureConfig,
    pub windowing: WindowConfig,
    pub thresholds: Thresholds,
    /// Maximum number of windows per classifier call
    pub batch_size: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            features: FeatureConfig::default(),
            windowing: WindowConfig::default(),
            thresholds: Thresholds::default(),
            batch_size: 32,
        }
    }
}

impl PipelineConfig {
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }

    /// Load and validate a configuration from a JSON file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&json)
            .map_err(|e| TamperError::Config(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a JSON file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| TamperError::Config(e.to_string()))?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Replace the window threshold with a learned one
    pub fn with_window_threshold(mut self, threshold: f32) -> Result<Self> {
        self.thresholds.window = threshold;
        self.validate()?;
        Ok(self)
    }

    /// Check every invariant the pipeline relies on
    pub fn validate(&self) -> Result<()> {
        let f = &self.features;
        if f.sample_rate == 0 {
            return Err(TamperError::Config("sample_rate must be positive".into()));
        }
        if f.n_mels == 0 {
            return Err(TamperError::Config("n_mels must be positive".into()));
        }
        if f.fft_size < 2 {
            return Err(TamperError::Config("fft_size must be at least 2".into()));
        }
        if f.hop_length == 0 || f.hop_length > f.fft_size {
            return Err(TamperError::Config(format!(
                "hop_length must be in 1..={}, got {}",
                f.fft_size, f.hop_length
            )));
        }

        let w = &self.windowing;
        if w.width == 0 {
            return Err(TamperError::Config("window width must be positive".into()));
        }
        if w.hop == 0 || w.hop > w.width {
            return Err(TamperError::Config(format!(
                "window hop must be in 1..={}, got {}",
                w.width, w.hop
            )));
        }

        for (name, value) in [
            ("window threshold", self.thresholds.window),
            ("file threshold", self.thresholds.file),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(TamperError::Config(format!(
                    "{} must be within [0, 1], got {}",
                    name, value
                )));
            }
        }

        if self.batch_size == 0 {
            return Err(TamperError::Config("batch_size must be positive".into()));
        }
        Ok(())
    }
}

/// Fluent builder for [`PipelineConfig`]
pub struct ConfigBuilder {
    config: PipelineConfig,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: PipelineConfig::default(),
        }
    }

    pub fn from_config(config: PipelineConfig) -> Self {
        Self { config }
    }

    pub fn sample_rate(mut self, rate: u32) -> Self {
        self.config.features.sample_rate = rate;
        self
    }

    pub fn n_mels(mut self, n_mels: usize) -> Self {
        self.config.features.n_mels = n_mels;
        self
    }

    pub fn fft_size(mut self, fft_size: usize) -> Self {
        self.config.features.fft_size = fft_size;
        self
    }

    pub fn hop_length(mut self, hop_length: usize) -> Self {
        self.config.features.hop_length = hop_length;
        self
    }

    pub fn window(mut self, width: usize, hop: usize) -> Self {
        self.config.windowing = WindowConfig { width, hop };
        self
    }

    pub fn window_threshold(mut self, threshold: f32) -> Self {
        self.config.thresholds.window = threshold;
        self
    }

    pub fn file_threshold(mut self, threshold: f32) -> Self {
        self.config.thresholds.file = threshold;
        self
    }

    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.config.batch_size = batch_size;
        self
    }

    pub fn build(self) -> Result<PipelineConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = PipelineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.features.sample_rate, 16_000);
        assert_eq!(config.features.n_mels, 128);
        assert_eq!(config.windowing.width, 40);
        assert_eq!(config.windowing.hop, 20);
        assert!((config.thresholds.window - 0.695).abs() < 1e-6);
        assert!((config.thresholds.file - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_hop_must_not_exceed_width() {
        assert!(PipelineConfig::builder().window(40, 41).build().is_err());
        assert!(PipelineConfig::builder().window(40, 0).build().is_err());
        assert!(PipelineConfig::builder().window(40, 40).build().is_ok());
    }

    #[test]
    fn test_threshold_range() {
        assert!(PipelineConfig::builder().window_threshold(1.5).build().is_err());
        assert!(PipelineConfig::builder().file_threshold(-0.1).build().is_err());
    }

    #[test]
    fn test_partial_json_takes_defaults() {
        let config: PipelineConfig =
            serde_json::from_str(r#"{"thresholds": {"window": 0.4}}"#).unwrap();
        assert!((config.thresholds.window - 0.4).abs() < 1e-6);
        assert!((config.thresholds.file - 0.5).abs() < 1e-6);
        assert_eq!(config.windowing, WindowConfig::default());
    }

    #[test]
    fn test_frame_secs() {
        let features = FeatureConfig::default();
        assert!((features.frame_secs() - 0.032).abs() < 1e-9);
    }
}
