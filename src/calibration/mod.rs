//! Window threshold calibration
//!
//! Learns the window vote threshold from held-out `(score, label)` pairs by
//! maximizing Youden's J = TPR - FPR over the ROC curve. The result must be
//! recomputed whenever the classifier is retrained.

use chrono::{DateTime, Utc};
use log::info;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::config::PipelineConfig;
use crate::error::{Result, TamperError};

/// One held-out window score with its ground truth
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LabeledScore {
    pub score: f32,
    pub tampered: bool,
}

impl LabeledScore {
    pub fn new(score: f32, tampered: bool) -> Self {
        Self { score, tampered }
    }
}

/// Operating point for the vote rule `score > threshold`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RocPoint {
    pub threshold: f32,
    pub tpr: f32,
    pub fpr: f32,
}

impl RocPoint {
    pub fn youden_j(&self) -> f32 {
        self.tpr - self.fpr
    }
}

/// ROC curve with one point per distinct score, thresholds ascending
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RocCurve {
    pub points: Vec<RocPoint>,
    pub positives: usize,
    pub negatives: usize,
}

impl RocCurve {
    /// Index of the first point with maximal J
    pub fn best_index(&self) -> Option<usize> {
        let mut best: Option<(usize, f32)> = None;
        for (i, point) in self.points.iter().enumerate() {
            let j = point.youden_j();
            if best.map_or(true, |(_, b)| j > b) {
                best = Some((i, j));
            }
        }
        best.map(|(i, _)| i)
    }

    /// Area under the curve, closed with the (0, 0) and (1, 1) corners
    pub fn auc(&self) -> f32 {
        let mut curve: Vec<(f32, f32)> = Vec::with_capacity(self.points.len() + 2);
        curve.push((1.0, 1.0));
        curve.extend(self.points.iter().map(|p| (p.fpr, p.tpr)));
        curve.push((0.0, 0.0));

        curve
            .windows(2)
            .map(|w| (w[0].0 - w[1].0) * (w[0].1 + w[1].1) / 2.0)
            .sum()
    }
}

fn validate(samples: &[LabeledScore]) -> Result<(usize, usize)> {
    if samples.is_empty() {
        return Err(TamperError::Calibration("no labeled scores".into()));
    }
    if samples.iter().any(|s| s.score.is_nan()) {
        return Err(TamperError::Calibration("scores contain NaN".into()));
    }
    let positives = samples.iter().filter(|s| s.tampered).count();
    let negatives = samples.len() - positives;
    if positives == 0 || negatives == 0 {
        return Err(TamperError::Calibration(format!(
            "both classes are required, got {} tampered and {} authentic",
            positives, negatives
        )));
    }
    Ok((positives, negatives))
}

/// ROC curve over every distinct score in `samples`
pub fn roc_curve(samples: &[LabeledScore]) -> Result<RocCurve> {
    let (positives, negatives) = validate(samples)?;

    let mut sorted = samples.to_vec();
    sorted.sort_by(|a, b| a.score.total_cmp(&b.score));

    // Walk ascending; everything after the current group is above it
    let mut points = Vec::new();
    let (mut tp_at_or_below, mut fp_at_or_below) = (0usize, 0usize);
    let mut i = 0;
    while i < sorted.len() {
        let threshold = sorted[i].score;
        while i < sorted.len() && sorted[i].score == threshold {
            if sorted[i].tampered {
                tp_at_or_below += 1;
            } else {
                fp_at_or_below += 1;
            }
            i += 1;
        }
        points.push(RocPoint {
            threshold,
            tpr: (positives - tp_at_or_below) as f32 / positives as f32,
            fpr: (negatives - fp_at_or_below) as f32 / negatives as f32,
        });
    }

    Ok(RocCurve {
        points,
        positives,
        negatives,
    })
}

/// Learned window threshold and the operating point it was chosen at
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Calibration {
    pub threshold: f32,
    pub j: f32,
    pub tpr: f32,
    pub fpr: f32,
    pub auc: f32,
    pub samples: usize,
    pub positives: usize,
    pub negatives: usize,
    pub calibrated_at: DateTime<Utc>,
}

impl Calibration {
    /// Replace the window threshold of `config` with the learned one
    pub fn apply(&self, config: &PipelineConfig) -> Result<PipelineConfig> {
        config.clone().with_window_threshold(self.threshold)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)?;
        serde_json::from_str(&json)
            .map_err(|e| TamperError::Calibration(format!("{}: {}", path.display(), e)))
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| TamperError::Calibration(e.to_string()))?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

/// Pick the window threshold maximizing Youden's J.
///
/// Ties go to the lowest maximizing score. The reported threshold is the
/// midpoint between that score and the next distinct score, which gives the
/// same votes on the calibration data and sits strictly between separated
/// clusters.
pub fn calibrate(samples: &[LabeledScore]) -> Result<Calibration> {
    let curve = roc_curve(samples)?;
    let best = curve
        .best_index()
        .ok_or_else(|| TamperError::Calibration("empty ROC curve".into()))?;
    let point = curve.points[best];

    let threshold = match curve.points.get(best + 1) {
        Some(next) => point.threshold + (next.threshold - point.threshold) / 2.0,
        None => point.threshold,
    };

    let calibration = Calibration {
        threshold,
        j: point.youden_j(),
        tpr: point.tpr,
        fpr: point.fpr,
        auc: curve.auc(),
        samples: samples.len(),
        positives: curve.positives,
        negatives: curve.negatives,
        calibrated_at: Utc::now(),
    };
    info!(
        "calibrated window threshold {:.4} (J {:.3}, TPR {:.3}, FPR {:.3}, AUC {:.3}) from {} windows",
        calibration.threshold,
        calibration.j,
        calibration.tpr,
        calibration.fpr,
        calibration.auc,
        calibration.samples
    );
    Ok(calibration)
}
