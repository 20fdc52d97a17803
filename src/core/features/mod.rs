//! Log-mel feature extraction
//!
//! Turns a clip into a `(n_mels, frames)` decibel spectrogram referenced to
//! the clip's own peak, so absolute loudness never reaches the classifier.

mod cache;
mod mel;

pub use cache::{FeatureCache, CACHE_FRAMES};
pub use mel::{hz_to_mel, mel_filterbank, mel_to_hz, power_to_db, AMIN, TOP_DB};

use log::debug;
use ndarray::{s, Array2, ArrayView2};
use std::path::Path;

use super::decoder::load_mono;
use super::dsp::StftProcessor;
use crate::config::FeatureConfig;
use crate::error::{Result, TamperError};

/// Decibel mel spectrogram of one clip. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct Spectrogram {
    data: Array2<f32>,
    hop_length: usize,
    sample_rate: u32,
}

impl Spectrogram {
    /// Wrap a `(n_mels, frames)` array computed with `features`
    pub fn new(data: Array2<f32>, features: &FeatureConfig) -> Self {
        Self {
            data,
            hop_length: features.hop_length,
            sample_rate: features.sample_rate,
        }
    }

    pub fn n_mels(&self) -> usize {
        self.data.nrows()
    }

    pub fn frames(&self) -> usize {
        self.data.ncols()
    }

    pub fn data(&self) -> ArrayView2<'_, f32> {
        self.data.view()
    }

    pub fn into_inner(self) -> Array2<f32> {
        self.data
    }

    /// Convert a (possibly fractional) frame position to seconds
    pub fn frame_to_secs(&self, frame: f64) -> f64 {
        frame * self.hop_length as f64 / self.sample_rate as f64
    }

    pub fn duration_secs(&self) -> f64 {
        self.frame_to_secs(self.frames() as f64)
    }

    /// Right-zero-pad or trim the time axis to exactly `frames` columns
    pub fn pad_or_trim(&self, frames: usize) -> Spectrogram {
        let mut data = Array2::<f32>::zeros((self.n_mels(), frames));
        let keep = frames.min(self.frames());
        data.slice_mut(s![.., ..keep])
            .assign(&self.data.slice(s![.., ..keep]));
        Spectrogram {
            data,
            hop_length: self.hop_length,
            sample_rate: self.sample_rate,
        }
    }
}

/// Computes [`Spectrogram`]s with a fixed [`FeatureConfig`]
pub struct FeatureExtractor {
    config: FeatureConfig,
    stft: StftProcessor,
    filters: Array2<f32>,
}

impl FeatureExtractor {
    pub fn new(config: &FeatureConfig) -> Self {
        Self {
            config: *config,
            stft: StftProcessor::new(config.fft_size, config.hop_length),
            filters: mel_filterbank(config.sample_rate, config.fft_size, config.n_mels),
        }
    }

    pub fn config(&self) -> &FeatureConfig {
        &self.config
    }

    /// Decode, down-mix and resample a file, then extract its spectrogram
    pub fn extract_file(&self, path: &Path) -> Result<Spectrogram> {
        let samples = load_mono(path, self.config.sample_rate)?;
        self.extract(&samples).map_err(|e| match e {
            TamperError::AudioLoad { reason, .. } => TamperError::audio_load(path, reason),
            other => other,
        })
    }

    /// Extract from mono samples already at the configured sample rate
    pub fn extract(&self, samples: &[f32]) -> Result<Spectrogram> {
        if samples.is_empty() {
            return Err(TamperError::audio_load("<memory>", "no samples"));
        }
        if samples.iter().any(|s| !s.is_finite()) {
            return Err(TamperError::audio_load("<memory>", "non-finite sample values"));
        }

        let power = self.stft.power_spectrogram(samples)?;
        let mel = self.filters.dot(&power);
        let db = power_to_db(&mel);
        debug!(
            "spectrogram: {} mels x {} frames from {} samples",
            db.nrows(),
            db.ncols(),
            samples.len()
        );
        Ok(Spectrogram::new(db, &self.config))
    }
}
