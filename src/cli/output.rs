//! Output formatting for CLI results

use colorful::Colorful;
use serde::Serialize;

use crate::calibration::Calibration;
use crate::core::{AnalysisReport, ConfidenceBand};
use crate::evaluation::EvaluationReport;

fn verdict_label(is_tampered: bool) -> String {
    if is_tampered {
        "✗ TAMPERED".red().bold().to_string()
    } else {
        "✓ AUTHENTIC".green().bold().to_string()
    }
}

fn band_label(band: ConfidenceBand) -> String {
    let text = format!("{} {}", band.symbol(), band.description());
    match band {
        ConfidenceBand::High => text.red().to_string(),
        ConfidenceBand::Moderate => text.yellow().to_string(),
        ConfidenceBand::Below => text.dim().to_string(),
    }
}

/// Format one analysis report for the terminal
pub fn format_report(report: &AnalysisReport, show_windows: bool) -> String {
    let mut output = String::new();
    let verdict = &report.verdict;

    output.push_str(&format!(
        "{} {}\n",
        verdict_label(verdict.is_tampered),
        report.file.display().to_string().cyan()
    ));
    output.push_str(&format!(
        "  Tampering ratio: {:.1}% ({}/{} windows, file threshold {:.0}%)\n",
        verdict.tampering_ratio * 100.0,
        verdict.positive_votes,
        verdict.total_windows,
        report.thresholds.file * 100.0
    ));
    output.push_str(&format!(
        "  Duration: {:.2}s, {} frames\n",
        report.duration_secs, report.frame_count
    ));

    if let Some(peak) = report.peak_window() {
        output.push_str(&format!(
            "  Peak window: {:.3} at {:.2}s {}\n",
            peak.probability,
            peak.center_secs,
            band_label(peak.band)
        ));
    }
    if report.padded {
        output.push_str(&format!(
            "  {}\n",
            "Clip shorter than one window; scored zero-padded".dim()
        ));
    }
    if report.dropped_tail_frames > 0 {
        output.push_str(&format!(
            "  {}\n",
            format!("Last {} frame(s) not covered by a window", report.dropped_tail_frames).dim()
        ));
    }

    if show_windows {
        output.push_str(&format!(
            "\n  Windows (threshold {:.3}):\n",
            report.thresholds.window
        ));
        for window in &report.windows {
            output.push_str(&format!(
                "    #{:<3} {:>7.2}s  {:.3}  {}\n",
                window.index,
                window.center_secs,
                window.probability,
                band_label(window.band)
            ));
        }
    }

    output
}

/// Summary line for a batch of files
pub fn format_summary(reports: &[AnalysisReport], failed: usize) -> String {
    let tampered = reports.iter().filter(|r| r.verdict.is_tampered).count();
    let authentic = reports.len() - tampered;

    let mut output = format!("\n{}\n", "Summary:".bold());
    output.push_str(&format!("  {} files analyzed\n", reports.len() + failed));
    if authentic > 0 {
        output.push_str(&format!("  {}\n", format!("✓ {} authentic", authentic).green()));
    }
    if tampered > 0 {
        output.push_str(&format!("  {}\n", format!("✗ {} tampered", tampered).red()));
    }
    if failed > 0 {
        output.push_str(&format!("  {}\n", format!("! {} failed", failed).yellow()));
    }
    output
}

pub fn format_calibration(calibration: &Calibration) -> String {
    format!(
        "{} {:.4}\n  Youden J: {:.3} (TPR {:.3}, FPR {:.3})\n  AUC: {:.3}\n  Windows: {} ({} tampered, {} authentic)\n",
        "Window threshold:".bold(),
        calibration.threshold,
        calibration.j,
        calibration.tpr,
        calibration.fpr,
        calibration.auc,
        calibration.samples,
        calibration.positives,
        calibration.negatives
    )
}

pub fn format_evaluation(report: &EvaluationReport, verbose: bool) -> String {
    let cm = &report.confusion;
    let mut output = String::new();

    output.push_str(&format!(
        "{} {:.1}% ({}/{} files, {} windows)\n",
        "File-level accuracy:".bold(),
        report.accuracy * 100.0,
        cm.correct(),
        cm.total(),
        report.window_count
    ));
    output.push_str(&format!(
        "  Precision {:.3}, recall {:.3} (tampered class)\n",
        report.precision, report.recall
    ));
    output.push_str(&format!(
        "  Thresholds: window {:.3}, file {:.2}\n",
        report.thresholds.window, report.thresholds.file
    ));
    output.push_str("\n  Confusion matrix (rows truth, columns predicted):\n");
    output.push_str("                 authentic  tampered\n");
    output.push_str(&format!(
        "    authentic   {:>9}  {:>8}\n",
        cm.counts[0][0], cm.counts[0][1]
    ));
    output.push_str(&format!(
        "    tampered    {:>9}  {:>8}\n",
        cm.counts[1][0], cm.counts[1][1]
    ));

    if verbose {
        let wrong: Vec<_> = report.files.iter().filter(|f| !f.is_correct()).collect();
        if !wrong.is_empty() {
            output.push_str("\n  Misclassified:\n");
            for file in wrong {
                output.push_str(&format!(
                    "    {} {:?} (ratio {:.2})\n",
                    file.key.to_string().yellow(),
                    file.label,
                    file.verdict.tampering_ratio
                ));
            }
        }
    }

    if !report.failures.is_empty() {
        output.push_str(&format!(
            "\n  {}\n",
            format!("{} file(s) failed:", report.failures.len()).yellow()
        ));
        for failure in &report.failures {
            output.push_str(&format!("    {}: {}\n", failure.path.display(), failure.error));
        }
    }

    output
}

/// Pretty JSON for any report type
pub fn format_json<T: Serialize + ?Sized>(value: &T) -> serde_json::Result<String> {
    serde_json::to_string_pretty(value)
}
