// src/dataset/tamper.rs
//
// Synthetic tampering for building labeled datasets: random deletion,
// duplicated-segment splicing and playback speed changes.

use log::debug;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::core::decoder::resample;
use crate::error::{Result, TamperError};

/// Shortest clip that can be tampered
pub const MIN_TAMPER_SAMPLES: usize = 100;

/// Kind of edit applied to a clean clip
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TamperKind {
    Deletion,
    Splice,
    Speed,
}

impl TamperKind {
    pub const ALL: [TamperKind; 3] = [TamperKind::Deletion, TamperKind::Splice, TamperKind::Speed];

    /// File name marker, also recognized by legacy grouping
    pub fn prefix(&self) -> &'static str {
        match self {
            TamperKind::Deletion => "del",
            TamperKind::Splice => "splice",
            TamperKind::Speed => "speed",
        }
    }

    /// `<prefix>_<stem>.wav` for a source file
    pub fn output_name(&self, source: &Path) -> String {
        let stem = source
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "clip".to_string());
        format!("{}_{}.wav", self.prefix(), stem)
    }
}

/// How strong the random edits are
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intensity {
    #[default]
    Standard,
    /// Shorter cuts and speed factors closer to 1
    Subtle,
}

/// Fractional ranges (of the clip length) and speed factor ranges
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TamperParams {
    pub deletion: (f64, f64),
    pub splice: (f64, f64),
    pub slow: (f64, f64),
    pub fast: (f64, f64),
}

impl From<Intensity> for TamperParams {
    fn from(intensity: Intensity) -> Self {
        match intensity {
            Intensity::Standard => Self {
                deletion: (0.05, 0.15),
                splice: (0.03, 0.08),
                slow: (0.7, 0.9),
                fast: (1.1, 1.3),
            },
            Intensity::Subtle => Self {
                deletion: (0.02, 0.06),
                splice: (0.02, 0.05),
                slow: (0.90, 0.97),
                fast: (1.03, 1.10),
            },
        }
    }
}

/// What was done to a clip, in samples of the source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TamperEdit {
    Deletion { start: usize, len: usize },
    Splice { source_start: usize, len: usize, insert_at: usize },
    Speed { factor: f64 },
}

impl TamperEdit {
    pub fn kind(&self) -> TamperKind {
        match self {
            TamperEdit::Deletion { .. } => TamperKind::Deletion,
            TamperEdit::Splice { .. } => TamperKind::Splice,
            TamperEdit::Speed { .. } => TamperKind::Speed,
        }
    }
}

/// Seeded random tampering generator
pub struct Tamperer {
    rng: StdRng,
    params: TamperParams,
}

impl Tamperer {
    /// `seed = None` draws from the OS; a fixed seed reproduces every edit
    pub fn new(seed: Option<u64>, intensity: Intensity) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self {
            rng,
            params: intensity.into(),
        }
    }

    pub fn params(&self) -> &TamperParams {
        &self.params
    }

    /// Apply one random edit of `kind` to mono `samples`
    pub fn apply(
        &mut self,
        kind: TamperKind,
        samples: &[f32],
        sample_rate: u32,
    ) -> Result<(Vec<f32>, TamperEdit)> {
        let n = samples.len();
        if n < MIN_TAMPER_SAMPLES {
            return Err(TamperError::Config(format!(
                "clip has {} samples, at least {} are needed to tamper",
                n, MIN_TAMPER_SAMPLES
            )));
        }
        let frac = |f: f64| (f * n as f64) as usize;

        let (out, edit) = match kind {
            TamperKind::Deletion => {
                let (lo, hi) = self.params.deletion;
                let len = self.rng.random_range(frac(lo)..=frac(hi));
                let start = self.rng.random_range(frac(0.1)..=n - len - 1);
                let mut out = Vec::with_capacity(n - len);
                out.extend_from_slice(&samples[..start]);
                out.extend_from_slice(&samples[start + len..]);
                (out, TamperEdit::Deletion { start, len })
            }
            TamperKind::Splice => {
                let (lo, hi) = self.params.splice;
                let len = self.rng.random_range(frac(lo)..=frac(hi));
                let source_start = self.rng.random_range(frac(0.1)..=n - len - 1);
                let insert_at = self.rng.random_range(frac(0.1)..=frac(0.9));
                let mut out = Vec::with_capacity(n + len);
                out.extend_from_slice(&samples[..insert_at]);
                out.extend_from_slice(&samples[source_start..source_start + len]);
                out.extend_from_slice(&samples[insert_at..]);
                (
                    out,
                    TamperEdit::Splice {
                        source_start,
                        len,
                        insert_at,
                    },
                )
            }
            TamperKind::Speed => {
                let (lo, hi) = if self.rng.random_bool(0.5) {
                    self.params.slow
                } else {
                    self.params.fast
                };
                // Two decimals keep the resampling ratio small
                let factor = (self.rng.random_range(lo..hi) * 100.0).round() / 100.0;
                let out = change_speed(samples, sample_rate, factor)?;
                (out, TamperEdit::Speed { factor })
            }
        };

        debug!("{:?}: {} -> {} samples", edit, n, out.len());
        Ok((out, edit))
    }
}

/// Play `samples` back `factor` times faster. Pitch moves with the speed.
pub fn change_speed(samples: &[f32], sample_rate: u32, factor: f64) -> Result<Vec<f32>> {
    if !(factor.is_finite() && factor > 0.0) {
        return Err(TamperError::Config(format!("invalid speed factor {}", factor)));
    }
    let from = (sample_rate as f64 * factor).round() as u32;
    resample(samples, from, sample_rate)
}

/// Pad with trailing zeros or truncate to `secs` seconds
pub fn fit_duration(samples: &[f32], sample_rate: u32, secs: f64) -> Vec<f32> {
    let target = (sample_rate as f64 * secs).round() as usize;
    let mut out = samples[..samples.len().min(target)].to_vec();
    out.resize(target, 0.0);
    out
}

/// Write mono samples as 16-bit PCM WAV
pub fn write_wav(path: &Path, samples: &[f32], sample_rate: u32) -> Result<()> {
    let to_io = |e: hound::Error| TamperError::Io(std::io::Error::other(e.to_string()));
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = hound::WavWriter::create(path, spec).map_err(to_io)?;
    for &s in samples {
        writer
            .write_sample((s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16)
            .map_err(to_io)?;
    }
    writer.finalize().map_err(to_io)?;
    Ok(())
}
