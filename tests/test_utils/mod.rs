// tests/test_utils/mod.rs
//
// Shared fixtures: synthesized WAV files and deterministic classifiers.

#![allow(dead_code)]

use ndarray::{ArrayView4, Axis};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::f32::consts::PI;
use std::path::{Path, PathBuf};

use tampercheckr::{CnnClassifier, InputShape, WindowClassifier};
use tampercheckr::core::classifier::{CnnWeights, LayerWeights};

pub fn tone(freq: f32, secs: f32, sample_rate: u32) -> Vec<f32> {
    let n = (secs * sample_rate as f32) as usize;
    (0..n)
        .map(|i| 0.5 * (2.0 * PI * freq * i as f32 / sample_rate as f32).sin())
        .collect()
}

pub fn noise(secs: f32, sample_rate: u32, seed: u64) -> Vec<f32> {
    noise_samples((secs * sample_rate as f32) as usize, seed)
}

pub fn noise_samples(n: usize, seed: u64) -> Vec<f32> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n).map(|_| rng.random_range(-0.5f32..0.5)).collect()
}

/// Write interleaved samples as a 16-bit PCM WAV
pub fn write_wav(path: &Path, samples: &[f32], sample_rate: u32, channels: u16) -> PathBuf {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec).unwrap();
    for &s in samples {
        writer.write_sample((s * i16::MAX as f32) as i16).unwrap();
    }
    writer.finalize().unwrap();
    path.to_path_buf()
}

/// Scores a window by its mean level, mapping [-80, 0] dB onto [0, 1].
/// Broadband noise scores high, a pure tone scores low.
pub struct MeanLevelClassifier;

impl WindowClassifier for MeanLevelClassifier {
    fn input_shape(&self) -> InputShape {
        InputShape::new(128, 40, 1)
    }

    fn predict_batch(&self, batch: ArrayView4<'_, f32>) -> tampercheckr::Result<Vec<f32>> {
        self.check_batch_shape(&batch)?;
        Ok(batch
            .axis_iter(Axis(0))
            .map(|w| ((w.mean().unwrap_or(-80.0) + 80.0) / 80.0).clamp(0.0, 1.0))
            .collect())
    }
}

fn layer(shape: Vec<usize>, fill: f32, bias: Vec<f32>) -> LayerWeights {
    let n = shape.iter().product();
    LayerWeights {
        shape,
        kernel: vec![fill; n],
        bias,
    }
}

/// Small model with the production input shape and layer layout
pub fn small_cnn_weights() -> CnnWeights {
    CnnWeights {
        input_shape: InputShape::new(128, 40, 1),
        conv1: layer(vec![3, 3, 1, 4], 0.01, vec![0.5; 4]),
        conv2: layer(vec![3, 3, 4, 8], 0.01, vec![0.1; 8]),
        dense1: layer(vec![8, 6], 0.1, vec![0.0; 6]),
        dense2: layer(vec![6, 1], 0.2, vec![-0.1]),
    }
}

pub fn write_model(path: &Path) -> PathBuf {
    std::fs::write(path, serde_json::to_string(&small_cnn_weights()).unwrap()).unwrap();
    path.to_path_buf()
}

pub fn small_cnn() -> CnnClassifier {
    CnnClassifier::from_weights(small_cnn_weights()).unwrap()
}
