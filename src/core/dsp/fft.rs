//! Short-time Fourier transform with windowing

use ndarray::Array2;
use realfft::{RealFftPlanner, RealToComplex};
use std::sync::Arc;

use super::windows::hann_window;
use crate::error::{Result, TamperError};

/// Centered STFT producing a power spectrogram.
///
/// The signal is zero-padded by `fft_size / 2` on the left and
/// `fft_size - fft_size / 2` on the right, so frame `t` is centered on
/// sample `t * hop_size` and the frame count is `1 + len / hop_size` for
/// odd and even FFT sizes alike.
pub struct StftProcessor {
    fft: Arc<dyn RealToComplex<f32>>,
    window: Vec<f32>,
    fft_size: usize,
    hop_size: usize,
}

impl StftProcessor {
    pub fn new(fft_size: usize, hop_size: usize) -> Self {
        let mut planner = RealFftPlanner::<f32>::new();
        Self {
            fft: planner.plan_fft_forward(fft_size),
            window: hann_window(fft_size),
            fft_size,
            hop_size,
        }
    }

    /// Number of frames produced for a signal of `len` samples
    pub fn frame_count(&self, len: usize) -> usize {
        1 + len / self.hop_size
    }

    /// Power spectrogram `|X|^2`, shape `(fft_size / 2 + 1, frames)`
    pub fn power_spectrogram(&self, samples: &[f32]) -> Result<Array2<f32>> {
        let pad = self.fft_size / 2;
        let mut padded = vec![0.0f32; samples.len() + self.fft_size];
        padded[pad..pad + samples.len()].copy_from_slice(samples);

        let n_freq = self.n_freq();
        let frames = self.frame_count(samples.len());
        let mut power = Array2::<f32>::zeros((n_freq, frames));

        let mut input = self.fft.make_input_vec();
        let mut spectrum = self.fft.make_output_vec();

        for t in 0..frames {
            let start = t * self.hop_size;
            let frame = &padded[start..start + self.fft_size];
            for ((dst, &s), &w) in input.iter_mut().zip(frame).zip(&self.window) {
                *dst = s * w;
            }

            self.fft
                .process(&mut input, &mut spectrum)
                .map_err(|e| TamperError::Spectral(format!("frame {}: {}", t, e)))?;

            for (k, c) in spectrum.iter().enumerate() {
                power[[k, t]] = c.norm_sqr();
            }
        }

        Ok(power)
    }

    pub fn n_freq(&self) -> usize {
        self.fft_size / 2 + 1
    }

    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    pub fn hop_size(&self) -> usize {
        self.hop_size
    }
}
