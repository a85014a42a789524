pub mod analyze;
pub mod checkpoints;
pub mod resolve;
pub mod stats;

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::time::Duration;

use crate::config::DistillConfig;
use crate::engine::report::{Finding, RunReport};

/// Write a run report as pretty-printed JSON into the configured report
/// directory. Returns the path written.
pub(crate) fn write_report(
    config: &DistillConfig,
    prefix: &str,
    report: &RunReport,
) -> Result<PathBuf> {
    let dir = config.resolved_report_dir();
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create report dir: {}", dir.display()))?;

    let name = format!(
        "{prefix}_report_{}.json",
        chrono::Utc::now().format("%Y%m%d_%H%M%S")
    );
    let path = dir.join(name);
    let json = serde_json::to_string_pretty(report)?;
    std::fs::write(&path, json)
        .with_context(|| format!("failed to write report: {}", path.display()))?;
    Ok(path)
}

/// Spinner shown while a batch is being scored.
pub(crate) fn scoring_spinner(message: &'static str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("  {spinner} {msg}")
            .expect("valid template"),
    );
    pb.set_message(message);
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// First line of a record's content, truncated for table display.
pub(crate) fn preview(content: &str, max: usize) -> String {
    let line = content.lines().next().unwrap_or("");
    if line.chars().count() > max {
        let truncated: String = line.chars().take(max.saturating_sub(3)).collect();
        format!("{truncated}...")
    } else {
        line.to_string()
    }
}

/// Print findings and recommendations, the shared tail of every run summary.
pub(crate) fn print_report_tail(report: &RunReport) {
    if !report.findings.is_empty() {
        println!();
        println!("Findings:");
        for finding in &report.findings {
            match finding {
                Finding::MalformedRecord { id, reason } => {
                    let id = id.as_deref().unwrap_or("<missing id>");
                    println!("  malformed record {id}: {reason}");
                }
                Finding::ResolutionConflict {
                    representative,
                    detail,
                } => {
                    println!("  conflict in group of {representative}: {detail}");
                }
                Finding::ApplyFailed {
                    representative,
                    detail,
                } => {
                    println!("  apply failed for group of {representative}: {detail}");
                }
            }
        }
    }

    println!();
    println!("Recommendations:");
    for rec in &report.recommendations {
        println!("  - {rec}");
    }
}
