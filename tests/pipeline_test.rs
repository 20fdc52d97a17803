// tests/pipeline_test.rs
//
// End-to-end analysis from WAV files on disk.

mod test_utils;

use tampercheckr::core::visualization::render_overlay;
use tampercheckr::{
    Aggregator, FeatureCache, FeatureExtractor, FileKey, PipelineConfig, TamperAnalyzer,
    TamperError, WindowClassifier,
};
use test_utils::*;

#[test]
fn test_five_second_clip_window_layout() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_wav(&dir.path().join("clip.wav"), &tone(440.0, 5.0, 16000), 16000, 1);

    let config = PipelineConfig::default();
    let analyzer = TamperAnalyzer::new(&config, &MeanLevelClassifier).unwrap();
    let report = analyzer.analyze_file(&path).unwrap();

    assert_eq!(report.file, path);
    assert_eq!(report.frame_count, 157);
    assert_eq!(report.windows.len(), 6);
    let starts: Vec<usize> = report.windows.iter().map(|w| w.start_frame).collect();
    assert_eq!(starts, vec![0, 20, 40, 60, 80, 100]);
    assert!(!report.verdict.is_tampered);
}

#[test]
fn test_stereo_44k_is_downmixed_and_resampled() {
    let dir = tempfile::tempdir().unwrap();
    let mono = tone(440.0, 2.0, 44100);
    let stereo: Vec<f32> = mono.iter().flat_map(|&s| [s, s]).collect();
    let path = write_wav(&dir.path().join("stereo.wav"), &stereo, 44100, 2);

    let config = PipelineConfig::default();
    let extractor = FeatureExtractor::new(&config.features);
    let spec = extractor.extract_file(&path).unwrap();

    // 2 s at 16 kHz: 32000 samples -> 1 + 32000 / 512 frames
    assert_eq!(spec.n_mels(), 128);
    assert_eq!(spec.frames(), 63);
}

#[test]
fn test_noise_scores_above_tone() {
    let dir = tempfile::tempdir().unwrap();
    let clean = write_wav(&dir.path().join("clean.wav"), &tone(300.0, 3.0, 16000), 16000, 1);
    let noisy = write_wav(&dir.path().join("noisy.wav"), &noise(3.0, 16000, 9), 16000, 1);

    let config = PipelineConfig::default();
    let analyzer = TamperAnalyzer::new(&config, &MeanLevelClassifier).unwrap();
    let results = analyzer.analyze_many(&[clean, noisy], false);

    let clean_report = results[0].1.as_ref().unwrap();
    let noisy_report = results[1].1.as_ref().unwrap();
    assert!(!clean_report.verdict.is_tampered);
    assert!(noisy_report.verdict.is_tampered);
    assert_eq!(noisy_report.verdict.tampering_ratio, 1.0);
}

#[test]
fn test_unreadable_file_is_reported_with_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.wav");
    std::fs::write(&path, b"not a wav file").unwrap();

    let config = PipelineConfig::default();
    let analyzer = TamperAnalyzer::new(&config, &MeanLevelClassifier).unwrap();
    match analyzer.analyze_file(&path) {
        Err(TamperError::AudioLoad { path: reported, .. }) => assert_eq!(reported, path),
        other => panic!("expected AudioLoad, got {:?}", other.map(|r| r.verdict)),
    }
}

#[test]
fn test_cnn_batched_matches_individual() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_wav(&dir.path().join("clip.wav"), &noise(4.0, 16000, 1), 16000, 1);
    let model = small_cnn();

    let batched = PipelineConfig::builder().batch_size(32).build().unwrap();
    let single = PipelineConfig::builder().batch_size(1).build().unwrap();
    let a = TamperAnalyzer::new(&batched, &model).unwrap().analyze_file(&path).unwrap();
    let b = TamperAnalyzer::new(&single, &model).unwrap().analyze_file(&path).unwrap();

    assert_eq!(a.scores(), b.scores());
    assert!(a.scores().iter().all(|s| (0.0..=1.0).contains(s)));
}

#[test]
fn test_cached_features_score_like_fresh_ones() {
    let dir = tempfile::tempdir().unwrap();
    // 300 frames exactly: (300 - 1) * 512 samples
    let samples = noise_samples(299 * 512, 4);
    let path = write_wav(&dir.path().join("clip.wav"), &samples, 16000, 1);

    let config = PipelineConfig::default();
    let analyzer = TamperAnalyzer::new(&config, &MeanLevelClassifier).unwrap();
    let fresh = analyzer.extractor().extract_file(&path).unwrap();
    assert_eq!(fresh.frames(), 300);

    let cache = FeatureCache::new(dir.path().join("features"));
    let key = FileKey::from_path(&path);
    cache.store(&key, &fresh, &config.features).unwrap();
    let cached = cache.load(&key, &config.features).unwrap();

    let a = analyzer.score_spectrogram(&fresh).unwrap();
    let b = analyzer.score_spectrogram(&cached).unwrap();
    assert_eq!(a.len(), b.len());
    for (x, y) in a.iter().zip(&b) {
        assert!((x - y).abs() < 1e-6);
    }
}

#[test]
fn test_two_threshold_configs_coexist() {
    let strict = PipelineConfig::builder().window_threshold(0.99).build().unwrap();
    let lenient = PipelineConfig::builder().window_threshold(0.01).build().unwrap();
    let samples = noise(2.0, 16000, 2);

    let strict_report = TamperAnalyzer::new(&strict, &MeanLevelClassifier)
        .unwrap()
        .analyze_samples(&samples)
        .unwrap();
    let lenient_report = TamperAnalyzer::new(&lenient, &MeanLevelClassifier)
        .unwrap()
        .analyze_samples(&samples)
        .unwrap();

    assert_eq!(strict_report.scores(), lenient_report.scores());
    assert!(!strict_report.verdict.is_tampered);
    assert!(lenient_report.verdict.is_tampered);

    // The verdict is a pure function of scores and thresholds
    let again = Aggregator::new(strict.thresholds).aggregate(&strict_report.scores()).unwrap();
    assert_eq!(again, strict_report.verdict);
}

#[test]
fn test_overlay_png() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_wav(&dir.path().join("clip.wav"), &noise(3.0, 16000, 3), 16000, 1);

    let config = PipelineConfig::default();
    let analyzer = TamperAnalyzer::new(&config, &MeanLevelClassifier).unwrap();
    let (spec, report) = analyzer.analyze_file_detailed(&path).unwrap();

    let png = dir.path().join("clip.png");
    render_overlay(&spec, &report.windows, config.windowing.width, &png).unwrap();
    let img = image::open(&png).unwrap();
    assert_eq!(img.width() as usize, spec.frames() * 4);
}

#[test]
fn test_classifier_shape_is_checked() {
    let model = small_cnn();
    let config = PipelineConfig::builder().n_mels(64).build().unwrap();
    assert!(matches!(
        TamperAnalyzer::new(&config, &model),
        Err(TamperError::ShapeMismatch { .. })
    ));
    assert_eq!(model.input_shape().dims(), vec![128, 40, 1]);
}
