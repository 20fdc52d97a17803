// src/core/aggregator.rs
//
// Window votes -> file verdict. A window votes when its score is strictly
// above the window threshold; a file is tampered when the vote ratio is at
// or above the file threshold.

use serde::{Deserialize, Serialize};

use crate::config::Thresholds;
use crate::error::{Result, TamperError};

/// Scores above this are reported as high confidence
pub const HIGH_CONFIDENCE: f32 = 0.8;

/// Reporting band for a single window score. Never affects the verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceBand {
    /// Did not vote
    Below,
    /// Voted, score at most 0.8
    Moderate,
    /// Score above 0.8
    High,
}

impl ConfidenceBand {
    pub fn symbol(&self) -> &'static str {
        match self {
            ConfidenceBand::Below => "·",
            ConfidenceBand::Moderate => "⚠",
            ConfidenceBand::High => "✗",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            ConfidenceBand::Below => "no vote",
            ConfidenceBand::Moderate => "moderate confidence",
            ConfidenceBand::High => "high confidence",
        }
    }
}

/// File-level decision derived from all window scores of one file
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FileVerdict {
    /// Fraction of windows voting tampered, in [0, 1]
    pub tampering_ratio: f32,
    pub is_tampered: bool,
    pub positive_votes: usize,
    pub total_windows: usize,
}

/// Applies a fixed threshold pair to window scores
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aggregator {
    thresholds: Thresholds,
}

impl Aggregator {
    pub fn new(thresholds: Thresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> Thresholds {
        self.thresholds
    }

    #[inline]
    pub fn vote(&self, score: f32) -> bool {
        score > self.thresholds.window
    }

    /// Reporting band. Only voting windows are banded, so a score above
    /// 0.8 that does not clear a stricter window threshold stays `Below`.
    pub fn band(&self, score: f32) -> ConfidenceBand {
        if !self.vote(score) {
            ConfidenceBand::Below
        } else if score > HIGH_CONFIDENCE {
            ConfidenceBand::High
        } else {
            ConfidenceBand::Moderate
        }
    }

    /// Aggregate the scores of every window of one file.
    ///
    /// Order does not matter. An empty slice means windowing was bypassed
    /// and is reported as [`TamperError::EmptyWindowSet`].
    pub fn aggregate(&self, scores: &[f32]) -> Result<FileVerdict> {
        if scores.is_empty() {
            return Err(TamperError::EmptyWindowSet);
        }

        let positive_votes = scores.iter().filter(|&&s| self.vote(s)).count();
        let tampering_ratio = positive_votes as f32 / scores.len() as f32;

        Ok(FileVerdict {
            tampering_ratio,
            is_tampered: tampering_ratio >= self.thresholds.file,
            positive_votes,
            total_windows: scores.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn aggregator(window: f32, file: f32) -> Aggregator {
        Aggregator::new(Thresholds { window, file })
    }

    #[test]
    fn test_half_positive_is_tampered() {
        let verdict = aggregator(0.695, 0.5).aggregate(&[0.9, 0.9, 0.1, 0.1]).unwrap();
        assert_eq!(verdict.positive_votes, 2);
        assert_eq!(verdict.total_windows, 4);
        assert_eq!(verdict.tampering_ratio, 0.5);
        assert!(verdict.is_tampered);
    }

    #[test]
    fn test_single_low_score() {
        let verdict = aggregator(0.695, 0.5).aggregate(&[0.6]).unwrap();
        assert_eq!(verdict.tampering_ratio, 0.0);
        assert!(!verdict.is_tampered);
    }

    #[test]
    fn test_threshold_boundaries() {
        let agg = aggregator(0.5, 1.0);
        // Equal to window threshold: no vote
        assert!(!agg.vote(0.5));
        let verdict = agg.aggregate(&[0.5]).unwrap();
        assert_eq!(verdict.positive_votes, 0);

        // Ratio equal to file threshold: tampered
        let verdict = agg.aggregate(&[0.7, 0.9]).unwrap();
        assert_eq!(verdict.tampering_ratio, 1.0);
        assert!(verdict.is_tampered);

        let verdict = aggregator(0.5, 0.25).aggregate(&[0.9, 0.1, 0.1, 0.1]).unwrap();
        assert!(verdict.is_tampered);
    }

    #[test]
    fn test_permutation_invariant() {
        let agg = aggregator(0.695, 0.5);
        let scores = [0.1, 0.72, 0.95, 0.3, 0.7, 0.694, 0.696];
        let base = agg.aggregate(&scores).unwrap();

        let mut reversed = scores;
        reversed.reverse();
        assert_eq!(agg.aggregate(&reversed).unwrap(), base);

        let mut sorted = scores;
        sorted.sort_by(|a, b| a.total_cmp(b));
        assert_eq!(agg.aggregate(&sorted).unwrap(), base);

        let rotated: Vec<f32> = scores.iter().cycle().skip(3).take(scores.len()).copied().collect();
        assert_eq!(agg.aggregate(&rotated).unwrap(), base);
    }

    #[test]
    fn test_idempotent() {
        let agg = aggregator(0.695, 0.5);
        let scores = [0.2, 0.8, 0.99];
        assert_eq!(agg.aggregate(&scores).unwrap(), agg.aggregate(&scores).unwrap());
    }

    #[test]
    fn test_empty_is_error() {
        assert!(matches!(
            aggregator(0.695, 0.5).aggregate(&[]),
            Err(TamperError::EmptyWindowSet)
        ));
    }

    #[test]
    fn test_confidence_bands() {
        let agg = aggregator(0.695, 0.5);
        assert_eq!(agg.band(0.95), ConfidenceBand::High);
        assert_eq!(agg.band(0.8), ConfidenceBand::Moderate);
        assert_eq!(agg.band(0.7), ConfidenceBand::Moderate);
        assert_eq!(agg.band(0.695), ConfidenceBand::Below);
        assert_eq!(agg.band(0.1), ConfidenceBand::Below);

        // A window threshold above 0.8 leaves no moderate band
        let strict = aggregator(0.9, 0.5);
        assert_eq!(strict.band(0.95), ConfidenceBand::High);
        assert_eq!(strict.band(0.9), ConfidenceBand::Below);
        assert_eq!(strict.band(0.75), ConfidenceBand::Below);
    }

    #[test]
    fn test_non_voting_window_is_never_high() {
        let strict = aggregator(0.9, 0.5);
        assert!(!strict.vote(0.85));
        assert_eq!(strict.band(0.85), ConfidenceBand::Below);
        for score in [0.0, 0.5, 0.81, 0.85, 0.9, 0.91, 1.0] {
            let band = strict.band(score);
            assert_eq!(band != ConfidenceBand::Below, strict.vote(score), "score {}", score);
        }
    }
}
