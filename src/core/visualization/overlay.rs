// src/core/visualization/overlay.rs
//
// Log-mel spectrogram image with a window vote strip underneath.

use image::{ImageBuffer, Rgb, RgbImage};
use log::debug;
use std::path::Path;

use crate::core::aggregator::ConfidenceBand;
use crate::core::analyzer::WindowScore;
use crate::core::features::{Spectrogram, TOP_DB};
use crate::error::{Result, TamperError};

const HIGH_VOTE: Rgb<u8> = Rgb([220, 40, 40]);
const MODERATE_VOTE: Rgb<u8> = Rgb([240, 170, 30]);
const NO_VOTE: Rgb<u8> = Rgb([30, 30, 36]);
const SEPARATOR: Rgb<u8> = Rgb([0, 0, 0]);

/// Overlay image geometry
#[derive(Debug, Clone)]
pub struct OverlayConfig {
    /// Horizontal pixels per spectrogram frame
    pub frame_px: u32,
    /// Vertical pixels per mel band
    pub band_px: u32,
    pub strip_height: u32,
    pub min_db: f32,
    pub max_db: f32,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            frame_px: 4,
            band_px: 3,
            strip_height: 24,
            min_db: -TOP_DB,
            max_db: 0.0,
        }
    }
}

/// Render the spectrogram and vote strip to an in-memory image.
///
/// Each strip column shows the strongest band of any window covering that
/// frame. Low mel bands are at the bottom of the spectrogram area.
pub fn overlay_image(
    spectrogram: &Spectrogram,
    windows: &[WindowScore],
    window_width: usize,
    config: &OverlayConfig,
) -> RgbImage {
    let frames = spectrogram.frames().max(1);
    let n_mels = spectrogram.n_mels();
    let spec_height = n_mels as u32 * config.band_px;
    let width = frames as u32 * config.frame_px;
    let height = spec_height + 1 + config.strip_height;

    let mut img: RgbImage = ImageBuffer::from_pixel(width, height, SEPARATOR);
    let data = spectrogram.data();
    let range = (config.max_db - config.min_db).max(f32::EPSILON);

    for t in 0..spectrogram.frames() {
        for m in 0..n_mels {
            let normalized = (data[[m, t]] - config.min_db) / range;
            let color = db_to_color(normalized);
            let y0 = (n_mels - 1 - m) as u32 * config.band_px;
            let x0 = t as u32 * config.frame_px;
            for dy in 0..config.band_px {
                for dx in 0..config.frame_px {
                    img.put_pixel(x0 + dx, y0 + dy, color);
                }
            }
        }
    }

    let mut strongest = vec![None::<ConfidenceBand>; frames];
    for window in windows {
        let end = (window.start_frame + window_width).min(frames);
        for slot in strongest.iter_mut().take(end).skip(window.start_frame) {
            *slot = (*slot).max(Some(window.band));
        }
    }

    let strip_top = spec_height + 1;
    for (t, band) in strongest.iter().enumerate() {
        let color = match band {
            Some(ConfidenceBand::High) => HIGH_VOTE,
            Some(ConfidenceBand::Moderate) => MODERATE_VOTE,
            _ => NO_VOTE,
        };
        let x0 = t as u32 * config.frame_px;
        for dy in 0..config.strip_height {
            for dx in 0..config.frame_px {
                img.put_pixel(x0 + dx, strip_top + dy, color);
            }
        }
    }

    img
}

/// Render the overlay and write it as a PNG
pub fn render_overlay(
    spectrogram: &Spectrogram,
    windows: &[WindowScore],
    window_width: usize,
    output_path: &Path,
) -> Result<()> {
    let img = overlay_image(spectrogram, windows, window_width, &OverlayConfig::default());
    img.save(output_path)
        .map_err(|e| TamperError::Io(std::io::Error::other(e.to_string())))?;
    debug!(
        "wrote {}x{} overlay to {}",
        img.width(),
        img.height(),
        output_path.display()
    );
    Ok(())
}

fn db_to_color(value: f32) -> Rgb<u8> {
    // Viridis-like
    let v = value.clamp(0.0, 1.0);

    let r = (68.0 + v * (235.0 - 68.0)) as u8;
    let g = (1.0 + v * (237.0 - 1.0)) as u8;
    let b = (84.0 + v * (32.0 - 84.0 + (1.0 - v) * 150.0)) as u8;

    Rgb([r, g, b])
}
