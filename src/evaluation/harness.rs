// src/evaluation/harness.rs
//
// File-level evaluation: pool window votes by file identity, aggregate each
// file and compare with its ground-truth label.

use chrono::{DateTime, Utc};
use indicatif::ParallelProgressIterator;
use log::{info, warn};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

use super::metrics::ConfusionMatrix;
use crate::calibration::LabeledScore;
use crate::config::{PipelineConfig, Thresholds};
use crate::core::analyzer::progress_bar;
use crate::core::{Aggregator, FeatureCache, FileVerdict, TamperAnalyzer, WindowClassifier};
use crate::dataset::{FileKey, Label, Manifest, ManifestEntry};
use crate::error::Result;

/// One scored window tagged with its file identity and ground truth
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowPrediction {
    pub key: FileKey,
    pub label: Label,
    pub probability: f32,
}

impl WindowPrediction {
    pub fn labeled_score(&self) -> LabeledScore {
        LabeledScore::new(self.probability, self.label.is_tampered())
    }
}

/// Window scores pooled under one file key
#[derive(Debug, Clone, PartialEq)]
pub struct FilePool {
    pub key: FileKey,
    pub label: Label,
    pub scores: Vec<f32>,
}

/// Group window predictions by key, in first-seen key order.
///
/// A key whose windows disagree on the label keeps the last label seen;
/// this only happens when legacy grouping pools differently labeled files.
pub fn pool_by_file<I>(predictions: I) -> Vec<FilePool>
where
    I: IntoIterator<Item = WindowPrediction>,
{
    let mut index: HashMap<FileKey, usize> = HashMap::new();
    let mut pools: Vec<FilePool> = Vec::new();

    for prediction in predictions {
        match index.get(&prediction.key) {
            Some(&i) => {
                let pool = &mut pools[i];
                if pool.label != prediction.label {
                    warn!(
                        "file key {} has conflicting labels {:?} and {:?}; using {:?}",
                        pool.key, pool.label, prediction.label, prediction.label
                    );
                    pool.label = prediction.label;
                }
                pool.scores.push(prediction.probability);
            }
            None => {
                index.insert(prediction.key.clone(), pools.len());
                pools.push(FilePool {
                    key: prediction.key,
                    label: prediction.label,
                    scores: vec![prediction.probability],
                });
            }
        }
    }
    pools
}

/// Verdict for one pooled file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileOutcome {
    pub key: FileKey,
    pub label: Label,
    pub verdict: FileVerdict,
}

impl FileOutcome {
    pub fn is_correct(&self) -> bool {
        self.verdict.is_tampered == self.label.is_tampered()
    }
}

/// A manifest entry that could not be scored
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationFailure {
    pub path: PathBuf,
    pub error: String,
}

/// File-level evaluation summary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub evaluated_at: DateTime<Utc>,
    pub thresholds: Thresholds,
    pub window_count: usize,
    pub files: Vec<FileOutcome>,
    pub confusion: ConfusionMatrix,
    pub accuracy: f32,
    pub precision: f32,
    pub recall: f32,
    pub failures: Vec<EvaluationFailure>,
}

/// Pool, aggregate and score window predictions against file labels
pub fn evaluate_predictions(
    predictions: Vec<WindowPrediction>,
    aggregator: &Aggregator,
) -> Result<EvaluationReport> {
    let window_count = predictions.len();
    let mut confusion = ConfusionMatrix::new();
    let mut files = Vec::new();

    for pool in pool_by_file(predictions) {
        let verdict = aggregator.aggregate(&pool.scores)?;
        confusion.add(pool.label.is_tampered(), verdict.is_tampered);
        files.push(FileOutcome {
            key: pool.key,
            label: pool.label,
            verdict,
        });
    }

    info!(
        "evaluated {} files ({} windows): accuracy {:.3}",
        files.len(),
        window_count,
        confusion.accuracy()
    );

    Ok(EvaluationReport {
        evaluated_at: Utc::now(),
        thresholds: aggregator.thresholds(),
        window_count,
        files,
        accuracy: confusion.accuracy(),
        precision: confusion.precision(),
        recall: confusion.recall(),
        confusion,
        failures: Vec::new(),
    })
}

/// Runs the analysis pipeline over a labeled manifest
pub struct Evaluator<'a> {
    analyzer: TamperAnalyzer<'a>,
    cache: Option<FeatureCache>,
    show_progress: bool,
}

impl<'a> Evaluator<'a> {
    pub fn new(config: &'a PipelineConfig, classifier: &'a dyn WindowClassifier) -> Result<Self> {
        Ok(Self {
            analyzer: TamperAnalyzer::new(config, classifier)?,
            cache: None,
            show_progress: false,
        })
    }

    /// Read spectrograms from a feature cache instead of decoding audio
    pub fn with_feature_cache(mut self, cache: FeatureCache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn show_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    fn entry_scores(&self, entry: &ManifestEntry) -> Result<Vec<f32>> {
        let spectrogram = match &self.cache {
            Some(cache) => {
                cache.load(&FileKey::from_path(&entry.path), &self.analyzer.config().features)?
            }
            None => self.analyzer.extractor().extract_file(&entry.path)?,
        };
        self.analyzer.score_spectrogram(&spectrogram)
    }

    /// Score every window of every manifest file. Files that fail are
    /// returned separately and contribute no windows.
    pub fn collect(&self, manifest: &Manifest) -> (Vec<WindowPrediction>, Vec<EvaluationFailure>) {
        let bar = progress_bar(manifest.len(), self.show_progress);
        let results: Vec<(&ManifestEntry, Result<Vec<f32>>)> = manifest
            .entries()
            .par_iter()
            .progress_with(bar.clone())
            .map(|entry| (entry, self.entry_scores(entry)))
            .collect();
        bar.finish_and_clear();

        let mut predictions = Vec::new();
        let mut failures = Vec::new();
        for (entry, result) in results {
            match result {
                Ok(scores) => predictions.extend(scores.into_iter().map(|probability| {
                    WindowPrediction {
                        key: entry.key.clone(),
                        label: entry.label,
                        probability,
                    }
                })),
                Err(e) => {
                    warn!("{}: {}", entry.path.display(), e);
                    failures.push(EvaluationFailure {
                        path: entry.path.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }
        (predictions, failures)
    }

    /// Held-out window scores for threshold calibration
    pub fn labeled_scores(&self, manifest: &Manifest) -> (Vec<LabeledScore>, Vec<EvaluationFailure>) {
        let (predictions, failures) = self.collect(manifest);
        (
            predictions.iter().map(WindowPrediction::labeled_score).collect(),
            failures,
        )
    }

    /// Full evaluation pass over `manifest`
    pub fn run(&self, manifest: &Manifest) -> Result<EvaluationReport> {
        let (predictions, failures) = self.collect(manifest);
        if !failures.is_empty() {
            warn!("{} of {} files could not be scored", failures.len(), manifest.len());
        }
        let mut report = evaluate_predictions(predictions, self.analyzer.aggregator())?;
        report.failures = failures;
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prediction(key: &str, label: Label, probability: f32) -> WindowPrediction {
        WindowPrediction {
            key: FileKey::new(key),
            label,
            probability,
        }
    }

    #[test]
    fn test_pool_keeps_first_seen_order() {
        let pools = pool_by_file(vec![
            prediction("b", Label::Tampered, 0.9),
            prediction("a", Label::Authentic, 0.1),
            prediction("b", Label::Tampered, 0.8),
        ]);
        assert_eq!(pools.len(), 2);
        assert_eq!(pools[0].key.as_str(), "b");
        assert_eq!(pools[0].scores, vec![0.9, 0.8]);
        assert_eq!(pools[1].key.as_str(), "a");
    }

    #[test]
    fn test_conflicting_labels_last_wins() {
        let pools = pool_by_file(vec![
            prediction("clip", Label::Authentic, 0.1),
            prediction("clip", Label::Tampered, 0.9),
        ]);
        assert_eq!(pools.len(), 1);
        assert_eq!(pools[0].label, Label::Tampered);
    }

    #[test]
    fn test_evaluate_predictions() {
        let aggregator = Aggregator::new(Thresholds::default());
        let report = evaluate_predictions(
            vec![
                // Authentic, correctly clean
                prediction("auth_01", Label::Authentic, 0.1),
                prediction("auth_01", Label::Authentic, 0.2),
                // Authentic, false alarm
                prediction("auth_02", Label::Authentic, 0.9),
                // Tampered, half the windows vote
                prediction("del_auth_01", Label::Tampered, 0.9),
                prediction("del_auth_01", Label::Tampered, 0.9),
                prediction("del_auth_01", Label::Tampered, 0.1),
                prediction("del_auth_01", Label::Tampered, 0.1),
                // Tampered, missed
                prediction("speed_auth_02", Label::Tampered, 0.6),
            ],
            &aggregator,
        )
        .unwrap();

        assert_eq!(report.window_count, 8);
        assert_eq!(report.files.len(), 4);
        assert_eq!(report.confusion.counts, [[1, 1], [1, 1]]);
        assert_eq!(report.accuracy, 0.5);
        assert!(report.files[2].verdict.is_tampered);
        assert!(report.files[2].is_correct());
        assert!(!report.files[3].is_correct());
    }

    #[test]
    fn test_labeled_score() {
        let p = prediction("x", Label::Tampered, 0.7);
        assert_eq!(p.labeled_score(), LabeledScore::new(0.7, true));
    }
}
