// src/cli/mod.rs
//
// Command-line interface module

mod args;
mod commands;
mod output;

pub use args::{Cli, Command, KindArg};
pub use commands::collect_audio_files;
pub use output::{format_calibration, format_evaluation, format_json, format_report, format_summary};

/// Dispatch a parsed command line. `Ok(false)` means some files failed.
pub fn run(cli: &Cli) -> anyhow::Result<bool> {
    match &cli.command {
        Command::Analyze(args) => commands::analyze(args),
        Command::Calibrate(args) => commands::calibrate_command(args),
        Command::Evaluate(args) => commands::evaluate(args),
        Command::Extract(args) => commands::extract(args),
        Command::Tamper(args) => commands::tamper(args),
        Command::Prepare(args) => commands::prepare(args),
        Command::Manifest(args) => commands::manifest(args),
    }
}
