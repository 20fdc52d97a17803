// src/core/windowing.rs
//
// Fixed-width, overlapping analysis windows over a spectrogram's time axis.

use log::debug;
use ndarray::{s, Array2, Array4, Axis};

use super::features::Spectrogram;
use crate::config::{FeatureConfig, WindowConfig};
use crate::error::{Result, TamperError};

/// One analysis window: a `(n_mels, width)` copy of spectrogram frames
#[derive(Debug, Clone, PartialEq)]
pub struct Window {
    /// Position in the window sequence
    pub index: usize,
    /// First spectrogram frame covered
    pub start_frame: usize,
    /// Window center in seconds (reporting only)
    pub center_secs: f64,
    pub data: Array2<f32>,
}

/// Ordered windows produced from one spectrogram
#[derive(Debug, Clone)]
pub struct WindowSet {
    pub windows: Vec<Window>,
    /// True when the spectrogram was shorter than one window and was
    /// right-zero-padded
    pub padded: bool,
    /// Frames after the last full window that no window covers
    pub dropped_tail_frames: usize,
}

impl WindowSet {
    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Window> {
        self.windows.iter()
    }

    /// Window center times in seconds, in window order
    pub fn center_times(&self) -> Vec<f64> {
        self.windows.iter().map(|w| w.center_secs).collect()
    }

    /// Stack windows `[start, end)` into a channel-last batch
    /// `(n, n_mels, width, 1)`
    pub fn batch(&self, start: usize, end: usize) -> Array4<f32> {
        let slice = &self.windows[start..end];
        let (height, width) = slice.first().map(|w| w.data.dim()).unwrap_or((0, 0));
        let mut batch = Array4::<f32>::zeros((slice.len(), height, width, 1));
        for (i, window) in slice.iter().enumerate() {
            batch
                .index_axis_mut(Axis(0), i)
                .index_axis_move(Axis(2), 0)
                .assign(&window.data);
        }
        batch
    }
}

/// Slices spectrograms into windows of `width` frames every `hop` frames
#[derive(Debug, Clone, Copy)]
pub struct Windower {
    width: usize,
    hop: usize,
    hop_length: usize,
    sample_rate: u32,
}

impl Windower {
    pub fn new(windowing: &WindowConfig, features: &FeatureConfig) -> Result<Self> {
        if windowing.width == 0 {
            return Err(TamperError::Config("window width must be positive".into()));
        }
        if windowing.hop == 0 || windowing.hop > windowing.width {
            return Err(TamperError::Config(format!(
                "window hop must be in 1..={}, got {}",
                windowing.width, windowing.hop
            )));
        }
        Ok(Self {
            width: windowing.width,
            hop: windowing.hop,
            hop_length: features.hop_length,
            sample_rate: features.sample_rate,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn hop(&self) -> usize {
        self.hop
    }

    /// Number of windows produced for a spectrogram of `frames` frames
    pub fn window_count(&self, frames: usize) -> usize {
        if frames < self.width {
            1
        } else {
            (frames - self.width) / self.hop + 1
        }
    }

    fn center_secs(&self, start_frame: usize) -> f64 {
        (start_frame as f64 + self.width as f64 / 2.0) * self.hop_length as f64
            / self.sample_rate as f64
    }

    /// Slice `spectrogram` into windows.
    ///
    /// Shorter than one window: a single right-zero-padded window centered
    /// at 0 s. Otherwise windows start at 0, hop, 2*hop, ... up to
    /// `frames - width`; a trailing remainder narrower than a window is not
    /// covered.
    pub fn slice(&self, spectrogram: &Spectrogram) -> WindowSet {
        let frames = spectrogram.frames();
        let data = spectrogram.data();

        if frames < self.width {
            let mut padded = Array2::<f32>::zeros((spectrogram.n_mels(), self.width));
            padded.slice_mut(s![.., ..frames]).assign(&data);
            return WindowSet {
                windows: vec![Window {
                    index: 0,
                    start_frame: 0,
                    center_secs: 0.0,
                    data: padded,
                }],
                padded: true,
                dropped_tail_frames: 0,
            };
        }

        let count = self.window_count(frames);
        let windows: Vec<Window> = (0..count)
            .map(|index| {
                let start = index * self.hop;
                Window {
                    index,
                    start_frame: start,
                    center_secs: self.center_secs(start),
                    data: data.slice(s![.., start..start + self.width]).to_owned(),
                }
            })
            .collect();

        let last_end = (count - 1) * self.hop + self.width;
        let dropped_tail_frames = frames - last_end;
        if dropped_tail_frames > 0 {
            debug!(
                "{} trailing frame(s) past the last full window are not scored",
                dropped_tail_frames
            );
        }

        WindowSet {
            windows,
            padded: false,
            dropped_tail_frames,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spectrogram(n_mels: usize, frames: usize) -> Spectrogram {
        let data = Array2::from_shape_fn((n_mels, frames), |(m, t)| -((m * 1000 + t) as f32));
        Spectrogram::new(data, &FeatureConfig::default())
    }

    fn windower(width: usize, hop: usize) -> Windower {
        Windower::new(&WindowConfig { width, hop }, &FeatureConfig::default()).unwrap()
    }

    #[test]
    fn test_rejects_invalid_hop() {
        let features = FeatureConfig::default();
        assert!(Windower::new(&WindowConfig { width: 40, hop: 0 }, &features).is_err());
        assert!(Windower::new(&WindowConfig { width: 40, hop: 41 }, &features).is_err());
    }

    #[test]
    fn test_window_count_formula() {
        let w = windower(40, 20);
        for frames in 40..400 {
            let set = w.slice(&spectrogram(4, frames));
            assert_eq!(set.len(), (frames - 40) / 20 + 1, "frames = {}", frames);
            for (i, window) in set.iter().enumerate() {
                assert_eq!(window.index, i);
                assert_eq!(window.start_frame, i * 20);
                assert_eq!(window.data.dim(), (4, 40));
            }
        }
    }

    #[test]
    fn test_short_spectrogram_is_padded() {
        let spec = spectrogram(128, 10);
        let set = windower(40, 20).slice(&spec);
        assert_eq!(set.len(), 1);
        assert!(set.padded);

        let window = &set.windows[0];
        assert_eq!(window.data.dim(), (128, 40));
        assert_eq!(window.center_secs, 0.0);
        assert_eq!(window.data.slice(s![.., ..10]), spec.data());
        assert!(window.data.slice(s![.., 10..]).iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_windows_copy_source_frames() {
        let spec = spectrogram(3, 100);
        let set = windower(40, 20).slice(&spec);
        let third = &set.windows[2];
        assert_eq!(third.data, spec.data().slice(s![.., 40..80]).to_owned());
    }

    #[test]
    fn test_tail_is_dropped() {
        // 157 frames: starts 0..=100 step 20 -> 6 windows ending at 140
        let set = windower(40, 20).slice(&spectrogram(2, 157));
        assert_eq!(set.len(), 6);
        assert_eq!(set.windows.last().unwrap().start_frame, 100);
        assert_eq!(set.dropped_tail_frames, 17);
        assert!(!set.padded);
    }

    #[test]
    fn test_exact_fit() {
        let set = windower(40, 20).slice(&spectrogram(2, 40));
        assert_eq!(set.len(), 1);
        assert!(!set.padded);
        assert_eq!(set.dropped_tail_frames, 0);
    }

    #[test]
    fn test_center_times() {
        let set = windower(40, 20).slice(&spectrogram(2, 80));
        let centers = set.center_times();
        assert_eq!(centers.len(), 3);
        assert!((centers[0] - 0.64).abs() < 1e-9);
        assert!((centers[1] - 1.28).abs() < 1e-9);
        assert!((centers[2] - 1.92).abs() < 1e-9);
    }

    #[test]
    fn test_deterministic() {
        let spec = spectrogram(5, 123);
        let w = windower(40, 7);
        let a = w.slice(&spec);
        let b = w.slice(&spec);
        assert_eq!(a.windows, b.windows);
    }

    #[test]
    fn test_batch_layout() {
        let spec = spectrogram(3, 60);
        let set = windower(40, 20).slice(&spec);
        let batch = set.batch(0, set.len());
        assert_eq!(batch.dim(), (2, 3, 40, 1));
        assert_eq!(batch[[1, 2, 5, 0]], spec.data()[[2, 25]]);
    }
}
