//! Command-line arguments

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::dataset::TamperKind;

#[derive(Parser, Debug)]
#[command(name = "tampercheckr", version)]
#[command(about = "Detect deletion, splicing and speed tampering in short audio clips")]
pub struct Cli {
    /// Increase log verbosity (-v info, -vv debug); RUST_LOG overrides
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Analyze audio files and report a verdict per file
    Analyze(AnalyzeArgs),
    /// Learn the window threshold from a labeled manifest
    Calibrate(CalibrateArgs),
    /// Evaluate file-level accuracy on a labeled manifest
    Evaluate(EvaluateArgs),
    /// Write the feature cache for every file of a manifest
    Extract(ExtractArgs),
    /// Generate tampered copies of clean clips
    Tamper(TamperArgs),
    /// Resample clean clips to mono and pad or trim them to a fixed length
    Prepare(PrepareArgs),
    /// Build a dataset manifest from a clean and a tampered directory
    Manifest(ManifestArgs),
}

/// Pipeline configuration shared by the model-driven commands
#[derive(Args, Debug, Clone)]
pub struct PipelineArgs {
    /// Model weights (JSON)
    #[arg(short, long, env = "TAMPERCHECKR_MODEL")]
    pub model: PathBuf,

    /// Pipeline configuration file (JSON); defaults when omitted
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Calibration file whose learned window threshold replaces the configured one
    #[arg(long)]
    pub calibration: Option<PathBuf>,

    /// Override the window vote threshold
    #[arg(long)]
    pub window_threshold: Option<f32>,

    /// Override the file verdict threshold
    #[arg(long)]
    pub file_threshold: Option<f32>,
}

/// Manifest location and how its paths resolve
#[derive(Args, Debug, Clone)]
pub struct ManifestSource {
    /// Dataset manifest (CSV with `filepath,label`)
    #[arg(long)]
    pub manifest: PathBuf,

    /// Directory manifest paths are relative to
    #[arg(long, default_value = ".")]
    pub root: PathBuf,
}

#[derive(Args, Debug)]
pub struct AnalyzeArgs {
    /// Audio files or directories
    #[arg(required = true)]
    pub inputs: Vec<PathBuf>,

    #[command(flatten)]
    pub pipeline: PipelineArgs,

    /// Print JSON instead of text
    #[arg(long)]
    pub json: bool,

    /// Write a spectrogram and vote overlay PNG per file into this directory
    #[arg(long, value_name = "DIR")]
    pub plot: Option<PathBuf>,

    /// Show per-window scores
    #[arg(long)]
    pub windows: bool,
}

#[derive(Args, Debug)]
pub struct CalibrateArgs {
    #[command(flatten)]
    pub source: ManifestSource,

    #[command(flatten)]
    pub pipeline: PipelineArgs,

    /// Read spectrograms from this feature cache instead of decoding audio
    #[arg(long, value_name = "DIR")]
    pub features: Option<PathBuf>,

    #[command(flatten)]
    pub split: HoldoutArgs,

    /// Where to write the calibration
    #[arg(short, long, default_value = "calibration.json")]
    pub out: PathBuf,
}

/// Balanced holdout shared by `calibrate` and `evaluate`. With the same
/// `--holdout` and `--seed`, calibrate fits on the files evaluate leaves out.
#[derive(Args, Debug, Clone, Copy)]
pub struct HoldoutArgs {
    /// Hold out up to N files per label for testing
    #[arg(long, value_name = "N")]
    pub holdout: Option<usize>,

    /// Seed for the holdout shuffle
    #[arg(long, default_value = "42")]
    pub seed: u64,
}

#[derive(Args, Debug)]
pub struct EvaluateArgs {
    #[command(flatten)]
    pub source: ManifestSource,

    #[command(flatten)]
    pub pipeline: PipelineArgs,

    /// Read spectrograms from this feature cache instead of decoding audio
    #[arg(long, value_name = "DIR")]
    pub features: Option<PathBuf>,

    /// Pool files by legacy name markers (del_, splice_, speed_)
    #[arg(long)]
    pub legacy_grouping: bool,

    #[command(flatten)]
    pub split: HoldoutArgs,

    /// Print JSON instead of text
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct ExtractArgs {
    #[command(flatten)]
    pub source: ManifestSource,

    /// Feature cache directory
    #[arg(short, long)]
    pub out: PathBuf,

    /// Pipeline configuration file (JSON)
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

/// Which edit `tamper` applies
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum KindArg {
    Del,
    Splice,
    Speed,
    /// One of each
    All,
}

impl KindArg {
    pub fn kinds(&self) -> Vec<TamperKind> {
        match self {
            KindArg::Del => vec![TamperKind::Deletion],
            KindArg::Splice => vec![TamperKind::Splice],
            KindArg::Speed => vec![TamperKind::Speed],
            KindArg::All => TamperKind::ALL.to_vec(),
        }
    }
}

#[derive(Args, Debug)]
pub struct TamperArgs {
    /// Clean audio files or directories
    #[arg(required = true)]
    pub inputs: Vec<PathBuf>,

    #[arg(short, long, value_enum, default_value = "all")]
    pub kind: KindArg,

    /// Output directory
    #[arg(short, long)]
    pub out: PathBuf,

    /// RNG seed for reproducible edits
    #[arg(long)]
    pub seed: Option<u64>,

    /// Smaller edits, closer to the original
    #[arg(long)]
    pub subtle: bool,
}

#[derive(Args, Debug)]
pub struct PrepareArgs {
    /// Directory of clean clips
    pub input: PathBuf,

    /// Output directory
    #[arg(short, long)]
    pub out: PathBuf,

    /// Target clip length in seconds
    #[arg(long, default_value = "5.0")]
    pub seconds: f64,

    /// Target sample rate
    #[arg(long, default_value = "16000")]
    pub sample_rate: u32,
}

#[derive(Args, Debug)]
pub struct ManifestArgs {
    /// Directory manifest paths are written relative to
    #[arg(long, default_value = ".")]
    pub root: PathBuf,

    /// Directory of authentic clips (label 0)
    #[arg(long)]
    pub clean: PathBuf,

    /// Directory of tampered clips (label 1)
    #[arg(long)]
    pub tampered: PathBuf,

    /// Output CSV
    #[arg(short, long, default_value = "dataset.csv")]
    pub out: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_analyze() {
        let cli = Cli::try_parse_from([
            "tampercheckr",
            "-vv",
            "analyze",
            "clip.wav",
            "more/",
            "--model",
            "model.json",
            "--window-threshold",
            "0.6",
            "--json",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        let Command::Analyze(args) = cli.command else {
            panic!("expected analyze");
        };
        assert_eq!(args.inputs.len(), 2);
        assert_eq!(args.pipeline.window_threshold, Some(0.6));
        assert!(args.json);
        assert!(args.plot.is_none());
    }

    #[test]
    fn test_parse_tamper_kinds() {
        let cli = Cli::try_parse_from([
            "tampercheckr", "tamper", "a.wav", "--kind", "splice", "--out", "out", "--seed", "7",
        ])
        .unwrap();
        let Command::Tamper(args) = cli.command else {
            panic!("expected tamper");
        };
        assert_eq!(args.kind.kinds(), vec![TamperKind::Splice]);
        assert_eq!(args.seed, Some(7));
        assert_eq!(KindArg::All.kinds().len(), 3);
    }
}
