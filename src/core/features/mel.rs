//! Mel filterbank and decibel conversion.
//!
//! Slaney mel scale with area-normalized triangular filters, and a
//! max-referenced power-to-dB conversion with an 80 dB floor.

use ndarray::Array2;

/// Smallest power value before taking the logarithm
pub const AMIN: f32 = 1e-10;
/// Dynamic range kept below the clip's peak
pub const TOP_DB: f32 = 80.0;

const F_SP: f64 = 200.0 / 3.0;
const MIN_LOG_HZ: f64 = 1000.0;
const MIN_LOG_MEL: f64 = MIN_LOG_HZ / F_SP;

#[inline]
fn log_step() -> f64 {
    6.4f64.ln() / 27.0
}

/// Hz to mel (Slaney): linear below 1 kHz, logarithmic above
pub fn hz_to_mel(freq: f64) -> f64 {
    if freq >= MIN_LOG_HZ {
        MIN_LOG_MEL + (freq / MIN_LOG_HZ).ln() / log_step()
    } else {
        freq / F_SP
    }
}

/// Mel to Hz (Slaney)
pub fn mel_to_hz(mel: f64) -> f64 {
    if mel >= MIN_LOG_MEL {
        MIN_LOG_HZ * (log_step() * (mel - MIN_LOG_MEL)).exp()
    } else {
        mel * F_SP
    }
}

/// Triangular mel filterbank of shape `(n_mels, fft_size / 2 + 1)` covering
/// 0 Hz to Nyquist
pub fn mel_filterbank(sample_rate: u32, fft_size: usize, n_mels: usize) -> Array2<f32> {
    let n_freq = fft_size / 2 + 1;
    let fft_freqs: Vec<f64> = (0..n_freq)
        .map(|k| k as f64 * sample_rate as f64 / fft_size as f64)
        .collect();

    let mel_max = hz_to_mel(sample_rate as f64 / 2.0);
    let mel_points: Vec<f64> = (0..n_mels + 2)
        .map(|i| mel_to_hz(mel_max * i as f64 / (n_mels + 1) as f64))
        .collect();

    let mut filters = Array2::<f32>::zeros((n_mels, n_freq));
    for m in 0..n_mels {
        let (lo, center, hi) = (mel_points[m], mel_points[m + 1], mel_points[m + 2]);
        let down_width = (center - lo).max(f64::EPSILON);
        let up_width = (hi - center).max(f64::EPSILON);
        let enorm = 2.0 / (hi - lo).max(f64::EPSILON);

        for (k, &f) in fft_freqs.iter().enumerate() {
            let lower = (f - lo) / down_width;
            let upper = (hi - f) / up_width;
            let weight = lower.min(upper).max(0.0);
            filters[[m, k]] = (weight * enorm) as f32;
        }
    }
    filters
}

/// Convert a power spectrogram to decibels relative to its own maximum.
///
/// Values end up in `[-TOP_DB, 0]`.
pub fn power_to_db(power: &Array2<f32>) -> Array2<f32> {
    let peak = power.iter().fold(0.0f32, |m, &v| m.max(v));
    let reference = 10.0 * peak.max(AMIN).log10();

    let mut db = power.mapv(|p| 10.0 * p.max(AMIN).log10() - reference);
    let ceiling = db.iter().fold(f32::NEG_INFINITY, |m, &v| m.max(v));
    let floor = ceiling - TOP_DB;
    db.mapv_inplace(|v| v.max(floor));
    db
}
