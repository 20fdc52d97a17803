// src/core/analyzer.rs
//
// End-to-end per-file analysis: extract -> window -> score -> aggregate.
// The classifier is borrowed; its lifecycle belongs to the caller.

use chrono::{DateTime, Utc};
use indicatif::{ParallelProgressIterator, ProgressBar, ProgressStyle};
use log::{debug, info, warn};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::aggregator::{Aggregator, ConfidenceBand, FileVerdict};
use super::classifier::WindowClassifier;
use super::features::{FeatureExtractor, Spectrogram};
use super::windowing::{WindowSet, Windower};
use crate::config::{PipelineConfig, Thresholds};
use crate::error::{Result, TamperError};

/// Shared flag a caller sets to stop an analysis between classifier batches
pub type CancelFlag = Arc<AtomicBool>;

/// Score and vote of one window, in time order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowScore {
    pub index: usize,
    pub start_frame: usize,
    pub center_secs: f64,
    pub probability: f32,
    pub vote: bool,
    pub band: ConfidenceBand,
}

/// Result of analyzing one clip
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub file: PathBuf,
    pub analyzed_at: DateTime<Utc>,
    pub duration_secs: f64,
    pub frame_count: usize,
    /// Clip was shorter than one window and was zero-padded
    pub padded: bool,
    pub dropped_tail_frames: usize,
    pub windows: Vec<WindowScore>,
    pub verdict: FileVerdict,
    pub thresholds: Thresholds,
}

impl AnalysisReport {
    pub fn scores(&self) -> Vec<f32> {
        self.windows.iter().map(|w| w.probability).collect()
    }

    /// Highest-scoring window, if any
    pub fn peak_window(&self) -> Option<&WindowScore> {
        self.windows
            .iter()
            .max_by(|a, b| a.probability.total_cmp(&b.probability))
    }
}

/// Builder for [`TamperAnalyzer`]
pub struct AnalyzerBuilder<'a> {
    config: &'a PipelineConfig,
    classifier: &'a dyn WindowClassifier,
    cancel: Option<CancelFlag>,
}

impl<'a> AnalyzerBuilder<'a> {
    pub fn new(config: &'a PipelineConfig, classifier: &'a dyn WindowClassifier) -> Self {
        Self {
            config,
            classifier,
            cancel: None,
        }
    }

    pub fn cancel_flag(mut self, flag: CancelFlag) -> Self {
        self.cancel = Some(flag);
        self
    }

    /// Validate the configuration and the classifier's input contract
    pub fn build(self) -> Result<TamperAnalyzer<'a>> {
        self.config.validate()?;
        let windower = Windower::new(&self.config.windowing, &self.config.features)?;

        let expected = vec![self.config.features.n_mels, windower.width(), 1];
        let actual = self.classifier.input_shape().dims();
        if expected != actual {
            return Err(TamperError::ShapeMismatch { expected, actual });
        }

        Ok(TamperAnalyzer {
            config: self.config,
            classifier: self.classifier,
            extractor: FeatureExtractor::new(&self.config.features),
            windower,
            aggregator: Aggregator::new(self.config.thresholds),
            cancel: self.cancel,
        })
    }
}

/// Windowed tampering analysis over a borrowed classifier
pub struct TamperAnalyzer<'a> {
    config: &'a PipelineConfig,
    classifier: &'a dyn WindowClassifier,
    extractor: FeatureExtractor,
    windower: Windower,
    aggregator: Aggregator,
    cancel: Option<CancelFlag>,
}

impl<'a> TamperAnalyzer<'a> {
    pub fn new(config: &'a PipelineConfig, classifier: &'a dyn WindowClassifier) -> Result<Self> {
        AnalyzerBuilder::new(config, classifier).build()
    }

    pub fn builder(
        config: &'a PipelineConfig,
        classifier: &'a dyn WindowClassifier,
    ) -> AnalyzerBuilder<'a> {
        AnalyzerBuilder::new(config, classifier)
    }

    pub fn config(&self) -> &PipelineConfig {
        self.config
    }

    pub fn extractor(&self) -> &FeatureExtractor {
        &self.extractor
    }

    pub fn windower(&self) -> &Windower {
        &self.windower
    }

    pub fn aggregator(&self) -> &Aggregator {
        &self.aggregator
    }

    pub fn analyze_file<P: AsRef<Path>>(&self, path: P) -> Result<AnalysisReport> {
        self.analyze_file_detailed(path).map(|(_, report)| report)
    }

    /// Like [`Self::analyze_file`] but also returns the spectrogram, for
    /// plotting
    pub fn analyze_file_detailed<P: AsRef<Path>>(
        &self,
        path: P,
    ) -> Result<(Spectrogram, AnalysisReport)> {
        let path = path.as_ref();
        let spectrogram = self.extractor.extract_file(path)?;
        let report = self.analyze_spectrogram(path, &spectrogram)?;
        Ok((spectrogram, report))
    }

    /// Analyze mono samples already at the configured sample rate
    pub fn analyze_samples(&self, samples: &[f32]) -> Result<AnalysisReport> {
        let spectrogram = self.extractor.extract(samples)?;
        self.analyze_spectrogram("<memory>", &spectrogram)
    }

    /// Window, score and aggregate a precomputed spectrogram
    pub fn analyze_spectrogram<P: AsRef<Path>>(
        &self,
        file: P,
        spectrogram: &Spectrogram,
    ) -> Result<AnalysisReport> {
        let file = file.as_ref();
        let set = self.windower.slice(spectrogram);
        let scores = self.score_windows(&set)?;
        let verdict = self.aggregator.aggregate(&scores)?;

        let windows = set
            .iter()
            .zip(&scores)
            .map(|(window, &probability)| WindowScore {
                index: window.index,
                start_frame: window.start_frame,
                center_secs: window.center_secs,
                probability,
                vote: self.aggregator.vote(probability),
                band: self.aggregator.band(probability),
            })
            .collect();

        info!(
            "{}: {}/{} windows voted, ratio {:.3} -> {}",
            file.display(),
            verdict.positive_votes,
            verdict.total_windows,
            verdict.tampering_ratio,
            if verdict.is_tampered { "tampered" } else { "authentic" }
        );

        Ok(AnalysisReport {
            file: file.to_path_buf(),
            analyzed_at: Utc::now(),
            duration_secs: spectrogram.duration_secs(),
            frame_count: spectrogram.frames(),
            padded: set.padded,
            dropped_tail_frames: set.dropped_tail_frames,
            windows,
            verdict,
            thresholds: self.config.thresholds,
        })
    }

    /// Raw classifier scores for every window of `spectrogram`, in order
    pub fn score_spectrogram(&self, spectrogram: &Spectrogram) -> Result<Vec<f32>> {
        self.score_windows(&self.windower.slice(spectrogram))
    }

    fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
    }

    fn score_windows(&self, set: &WindowSet) -> Result<Vec<f32>> {
        let mut scores = Vec::with_capacity(set.len());
        let mut start = 0;
        while start < set.len() {
            if self.is_cancelled() {
                return Err(TamperError::Cancelled);
            }

            let end = (start + self.config.batch_size).min(set.len());
            let batch = set.batch(start, end);
            self.classifier.check_batch_shape(&batch.view())?;

            let batch_scores = self.classifier.predict_batch(batch.view())?;
            if batch_scores.len() != end - start {
                return Err(TamperError::ShapeMismatch {
                    expected: vec![end - start],
                    actual: vec![batch_scores.len()],
                });
            }
            if let Some((offset, &score)) = batch_scores
                .iter()
                .enumerate()
                .find(|(_, s)| !(0.0..=1.0).contains(*s))
            {
                return Err(TamperError::InvalidScore {
                    window: start + offset,
                    score,
                });
            }
            debug!("scored windows {}..{}", start, end);

            scores.extend(batch_scores);
            start = end;
        }
        Ok(scores)
    }

    /// Analyze independent files in parallel. Results keep input order; a
    /// failure in one file does not stop the others.
    pub fn analyze_many(
        &self,
        paths: &[PathBuf],
        show_progress: bool,
    ) -> Vec<(PathBuf, Result<AnalysisReport>)> {
        let bar = progress_bar(paths.len(), show_progress);
        let results: Vec<(PathBuf, Result<AnalysisReport>)> = paths
            .par_iter()
            .progress_with(bar.clone())
            .map(|path| {
                let result = self.analyze_file(path);
                if let Err(ref e) = result {
                    warn!("{}: {}", path.display(), e);
                }
                (path.clone(), result)
            })
            .collect();

        bar.finish_and_clear();
        results
    }
}

/// File progress bar, hidden when `visible` is false
pub(crate) fn progress_bar(len: usize, visible: bool) -> ProgressBar {
    if !visible {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new(len as u64);
    if let Ok(style) = ProgressStyle::with_template("{spinner} [{bar:40}] {pos}/{len} files ({eta})")
    {
        bar.set_style(style.progress_chars("=> "));
    }
    bar
}
