// src/cli/commands.rs
//
// Subcommand handlers. Each returns whether every file succeeded.

use anyhow::{bail, Context, Result};
use colorful::Colorful;
use log::{info, warn};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use super::args::{
    AnalyzeArgs, CalibrateArgs, EvaluateArgs, ExtractArgs, ManifestArgs, PipelineArgs,
    PrepareArgs, TamperArgs,
};
use super::output::{
    format_calibration, format_evaluation, format_json, format_report, format_summary,
};
use crate::calibration::{calibrate, Calibration};
use crate::config::PipelineConfig;
use crate::core::decoder::{decode_audio, extract_mono, load_mono};
use crate::core::visualization::render_overlay;
use crate::core::{AnalysisReport, CnnClassifier, FeatureCache, FeatureExtractor, TamperAnalyzer};
use crate::dataset::{
    build_manifest, fit_duration, write_wav, FileKey, Grouping, Intensity, Manifest, Tamperer,
};
use crate::error::Result as TamperResult;
use crate::evaluation::Evaluator;

const AUDIO_EXTENSIONS: [&str; 6] = ["flac", "wav", "mp3", "ogg", "m4a", "aac"];

fn is_audio(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| AUDIO_EXTENSIONS.contains(&e.to_lowercase().as_str()))
}

/// Expand files and directories into a sorted list of audio files
pub fn collect_audio_files(inputs: &[PathBuf]) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for input in inputs {
        if input.is_file() {
            if is_audio(input) {
                files.push(input.clone());
            } else {
                warn!("skipping {}: not an audio file", input.display());
            }
        } else if input.is_dir() {
            let mut found: Vec<PathBuf> = WalkDir::new(input)
                .follow_links(true)
                .into_iter()
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_file() && is_audio(e.path()))
                .map(|e| e.into_path())
                .collect();
            found.sort();
            files.extend(found);
        } else {
            warn!("skipping {}: no such file or directory", input.display());
        }
    }
    files
}

/// Configuration from file, calibration and command-line overrides
fn load_config(config: Option<&Path>, args: Option<&PipelineArgs>) -> Result<PipelineConfig> {
    let mut config = match config {
        Some(path) => PipelineConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => PipelineConfig::default(),
    };

    if let Some(args) = args {
        if let Some(path) = &args.calibration {
            let calibration = Calibration::load(path)
                .with_context(|| format!("loading calibration {}", path.display()))?;
            config = calibration.apply(&config)?;
            info!("window threshold {:.4} from {}", calibration.threshold, path.display());
        }
        if let Some(threshold) = args.window_threshold {
            config.thresholds.window = threshold;
        }
        if let Some(threshold) = args.file_threshold {
            config.thresholds.file = threshold;
        }
    }

    config.validate()?;
    Ok(config)
}

fn load_model(path: &Path) -> Result<CnnClassifier> {
    Ok(CnnClassifier::load(path)?)
}

pub fn analyze(args: &AnalyzeArgs) -> Result<bool> {
    let config = load_config(args.pipeline.config.as_deref(), Some(&args.pipeline))?;
    let model = load_model(&args.pipeline.model)?;
    let analyzer = TamperAnalyzer::new(&config, &model)?;

    let files = collect_audio_files(&args.inputs);
    if files.is_empty() {
        bail!("no audio files found");
    }
    if !args.json {
        println!("Found {} audio file(s)\n", files.len());
    }

    let results: Vec<(PathBuf, TamperResult<AnalysisReport>)> = match &args.plot {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("creating {}", dir.display()))?;
            files
                .par_iter()
                .map(|path| {
                    let result = analyzer.analyze_file_detailed(path).and_then(|(spec, report)| {
                        let png = dir.join(format!("{}.png", FileKey::from_path(path)));
                        render_overlay(&spec, &report.windows, config.windowing.width, &png)?;
                        Ok(report)
                    });
                    (path.clone(), result)
                })
                .collect()
        }
        None => analyzer.analyze_many(&files, !args.json),
    };

    let mut reports = Vec::new();
    let mut failures = Vec::new();
    for (path, result) in results {
        match result {
            Ok(report) => reports.push(report),
            Err(e) => failures.push((path, e.to_string())),
        }
    }

    if args.json {
        println!("{}", format_json(&reports)?);
        for (path, error) in &failures {
            eprintln!("{}: {}", path.display(), error);
        }
    } else {
        for report in &reports {
            println!("{}", format_report(report, args.windows));
        }
        for (path, error) in &failures {
            println!("{} {}\n  {}\n", "! FAILED".yellow(), path.display().to_string().cyan(), error);
        }
        if files.len() > 1 {
            print!("{}", format_summary(&reports, failures.len()));
        }
    }

    Ok(failures.is_empty())
}

fn load_manifest(manifest: &Path, root: &Path, grouping: Grouping) -> Result<Manifest> {
    let manifest = Manifest::load(manifest, root, grouping)?;
    if manifest.is_empty() {
        bail!("manifest is empty");
    }
    Ok(manifest)
}

/// Files `calibrate` fits on: the train side of the holdout, if any
fn calibration_manifest(args: &CalibrateArgs) -> Result<Manifest> {
    let manifest = load_manifest(&args.source.manifest, &args.source.root, Grouping::Explicit)?;
    Ok(match args.split.holdout {
        Some(per_class) => manifest.balanced_holdout(per_class, args.split.seed).0,
        None => manifest,
    })
}

/// Files `evaluate` scores: the test side of the holdout, if any
fn evaluation_manifest(args: &EvaluateArgs) -> Result<Manifest> {
    let grouping = if args.legacy_grouping {
        Grouping::LegacyPrefix
    } else {
        Grouping::Explicit
    };
    let manifest = load_manifest(&args.source.manifest, &args.source.root, grouping)?;
    Ok(match args.split.holdout {
        Some(per_class) => manifest.balanced_holdout(per_class, args.split.seed).1,
        None => manifest,
    })
}

pub fn calibrate_command(args: &CalibrateArgs) -> Result<bool> {
    let config = load_config(args.pipeline.config.as_deref(), Some(&args.pipeline))?;
    let model = load_model(&args.pipeline.model)?;
    let manifest = calibration_manifest(args)?;
    if manifest.is_empty() {
        bail!("holdout leaves no files to calibrate on");
    }

    let mut evaluator = Evaluator::new(&config, &model)?.show_progress(true);
    if let Some(dir) = &args.features {
        evaluator = evaluator.with_feature_cache(FeatureCache::new(dir));
    }
    let (scores, failures) = evaluator.labeled_scores(&manifest);
    for failure in &failures {
        eprintln!("{}: {}", failure.path.display(), failure.error);
    }

    let calibration = calibrate(&scores)?;
    calibration
        .save(&args.out)
        .with_context(|| format!("writing {}", args.out.display()))?;

    print!("{}", format_calibration(&calibration));
    println!("  Saved to: {}", args.out.display());
    Ok(failures.is_empty())
}

pub fn evaluate(args: &EvaluateArgs) -> Result<bool> {
    let config = load_config(args.pipeline.config.as_deref(), Some(&args.pipeline))?;
    let model = load_model(&args.pipeline.model)?;
    let manifest = evaluation_manifest(args)?;

    let mut evaluator = Evaluator::new(&config, &model)?.show_progress(!args.json);
    if let Some(dir) = &args.features {
        evaluator = evaluator.with_feature_cache(FeatureCache::new(dir));
    }
    let report = evaluator.run(&manifest)?;

    if args.json {
        println!("{}", format_json(&report)?);
    } else {
        print!("{}", format_evaluation(&report, log::log_enabled!(log::Level::Info)));
    }
    Ok(report.failures.is_empty())
}

pub fn extract(args: &ExtractArgs) -> Result<bool> {
    let config = load_config(args.config.as_deref(), None)?;
    let manifest = load_manifest(&args.source.manifest, &args.source.root, Grouping::Explicit)?;
    let extractor = FeatureExtractor::new(&config.features);
    let cache = FeatureCache::new(&args.out);

    let failed: usize = manifest
        .entries()
        .par_iter()
        .map(|entry| {
            let result = extractor
                .extract_file(&entry.path)
                .and_then(|spec| cache.store(&FileKey::from_path(&entry.path), &spec, &config.features));
            match result {
                Ok(_) => 0,
                Err(e) => {
                    eprintln!("{}: {}", entry.path.display(), e);
                    1
                }
            }
        })
        .sum();

    println!(
        "Cached features for {}/{} files in {}",
        manifest.len() - failed,
        manifest.len(),
        args.out.display()
    );
    Ok(failed == 0)
}

pub fn tamper(args: &TamperArgs) -> Result<bool> {
    let files = collect_audio_files(&args.inputs);
    if files.is_empty() {
        bail!("no audio files found");
    }
    std::fs::create_dir_all(&args.out)
        .with_context(|| format!("creating {}", args.out.display()))?;

    let intensity = if args.subtle {
        Intensity::Subtle
    } else {
        Intensity::Standard
    };
    let mut tamperer = Tamperer::new(args.seed, intensity);
    let mut ok = true;

    for (idx, path) in files.iter().enumerate() {
        let audio = match decode_audio(path) {
            Ok(audio) => audio,
            Err(e) => {
                eprintln!("{}: {}", path.display(), e);
                ok = false;
                continue;
            }
        };
        let mono = extract_mono(&audio);

        for kind in args.kind.kinds() {
            let out_path = args.out.join(kind.output_name(path));
            let result = tamperer
                .apply(kind, &mono, audio.sample_rate)
                .and_then(|(samples, edit)| {
                    write_wav(&out_path, &samples, audio.sample_rate)?;
                    Ok(edit)
                });
            match result {
                Ok(edit) => info!("{} -> {}: {:?}", path.display(), out_path.display(), edit),
                Err(e) => {
                    eprintln!("{}: {}", path.display(), e);
                    ok = false;
                }
            }
        }
        println!("[{}/{}] processed {}", idx + 1, files.len(), path.display());
    }

    Ok(ok)
}

pub fn prepare(args: &PrepareArgs) -> Result<bool> {
    let files = collect_audio_files(std::slice::from_ref(&args.input));
    if files.is_empty() {
        bail!("no audio files found in {}", args.input.display());
    }
    std::fs::create_dir_all(&args.out)
        .with_context(|| format!("creating {}", args.out.display()))?;

    let failed: usize = files
        .par_iter()
        .map(|path| {
            let out_path = args.out.join(format!("{}.wav", FileKey::from_path(path)));
            let result = load_mono(path, args.sample_rate).and_then(|samples| {
                let fitted = fit_duration(&samples, args.sample_rate, args.seconds);
                write_wav(&out_path, &fitted, args.sample_rate)
            });
            match result {
                Ok(()) => 0,
                Err(e) => {
                    eprintln!("{}: {}", path.display(), e);
                    1
                }
            }
        })
        .sum();

    println!(
        "Fixed {}/{} clips to {:.1}s at {} Hz",
        files.len() - failed,
        files.len(),
        args.seconds,
        args.sample_rate
    );
    Ok(failed == 0)
}

pub fn manifest(args: &ManifestArgs) -> Result<bool> {
    let manifest = build_manifest(&args.root, &args.clean, &args.tampered, Grouping::Explicit)?;
    manifest
        .save(&args.out)
        .with_context(|| format!("writing {}", args.out.display()))?;

    let (clean, tampered) = manifest.label_counts();
    println!("{} {}", "✓ Manifest written:".green(), args.out.display());
    println!("  Clean samples: {}", clean);
    println!("  Tampered samples: {}", tampered);
    println!("  Total samples: {}", manifest.len());
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collect_audio_files() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("nested");
        std::fs::create_dir_all(&nested).unwrap();
        for name in ["b.wav", "a.FLAC", "notes.txt"] {
            std::fs::write(dir.path().join(name), b"").unwrap();
        }
        std::fs::write(nested.join("c.mp3"), b"").unwrap();

        let files = collect_audio_files(&[dir.path().to_path_buf()]);
        let names: Vec<String> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, ["a.FLAC", "b.wav", "c.mp3"]);
    }

    #[test]
    fn test_config_overrides() {
        let args = PipelineArgs {
            model: PathBuf::from("model.json"),
            config: None,
            calibration: None,
            window_threshold: Some(0.4),
            file_threshold: Some(0.3),
        };
        let config = load_config(None, Some(&args)).unwrap();
        assert_eq!(config.thresholds.window, 0.4);
        assert_eq!(config.thresholds.file, 0.3);

        let bad = PipelineArgs {
            window_threshold: Some(2.0),
            ..args
        };
        assert!(load_config(None, Some(&bad)).is_err());
    }

    #[test]
    fn test_calibrate_and_evaluate_use_disjoint_holdout_sides() {
        use crate::cli::args::{Cli, Command};
        use clap::Parser;
        use std::collections::HashSet;

        let dir = tempfile::tempdir().unwrap();
        let csv = dir.path().join("dataset.csv");
        let mut text = String::from("filepath,label\n");
        for i in 0..6 {
            text.push_str(&format!("clean/auth_{:02}.wav,0\n", i));
            text.push_str(&format!("tampered/del_auth_{:02}.wav,1\n", i));
        }
        std::fs::write(&csv, text).unwrap();

        let common = [
            "--manifest",
            csv.to_str().unwrap(),
            "--model",
            "m.json",
            "--holdout",
            "2",
            "--seed",
            "7",
        ];
        let calibrate = Cli::parse_from(["tampercheckr", "calibrate"].into_iter().chain(common));
        let evaluate = Cli::parse_from(["tampercheckr", "evaluate"].into_iter().chain(common));

        let train = match &calibrate.command {
            Command::Calibrate(args) => calibration_manifest(args).unwrap(),
            other => panic!("unexpected command {:?}", other),
        };
        let test = match &evaluate.command {
            Command::Evaluate(args) => evaluation_manifest(args).unwrap(),
            other => panic!("unexpected command {:?}", other),
        };

        assert_eq!(train.len(), 8);
        assert_eq!(test.len(), 4);
        assert_eq!(test.label_counts(), (2, 2));
        let train_files: HashSet<_> = train.iter().map(|e| e.filepath.clone()).collect();
        let test_files: HashSet<_> = test.iter().map(|e| e.filepath.clone()).collect();
        assert!(train_files.is_disjoint(&test_files));
        assert_eq!(train_files.len() + test_files.len(), 12);
    }
}
