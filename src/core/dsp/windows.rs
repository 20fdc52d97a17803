//! Window function implementations

use std::f32::consts::PI;

/// Periodic (DFT-even) Hann window, the usual STFT analysis window
pub fn hann_window(size: usize) -> Vec<f32> {
    let n = size as f32;
    (0..size)
        .map(|i| 0.5 * (1.0 - (2.0 * PI * i as f32 / n).cos()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hann_window() {
        let window = hann_window(4);
        assert!((window[0]).abs() < 0.01);  // Should be ~0 at edges
        assert!((window[2] - 1.0).abs() < 0.01);  // Should be ~1 at center
    }

    #[test]
    fn test_periodic_hann_mirrors_about_half_length() {
        // w[i] == w[n - i]; the last sample is not a second zero
        let window = hann_window(8);
        assert!((window[1] - window[7]).abs() < 1e-6);
        assert!((window[3] - window[5]).abs() < 1e-6);
        assert!(window[7] > 0.0);
    }
}
