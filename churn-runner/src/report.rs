//! Run reporting
//!
//! Logs job and run summaries as an aligned table and optionally writes
//! the full report as JSON.

use anyhow::{Context, Result};
use churn_core::domain::report::RunReport;
use churn_core::domain::summary::RunSummary;
use std::path::Path;
use tracing::info;

/// Renders a summary as aligned `label value` lines
pub fn format_summary(summary: &RunSummary) -> Vec<String> {
    let mut lines = vec![format!(
        "{:<25} {}",
        "Total Time Spent (ms):", summary.total_elapsed_ms
    )];

    if summary.has_data() {
        lines.push(format!(
            "{:<25} {:.2}",
            "Average CPU Load (%):", summary.mean_cpu_load
        ));
        lines.push(format!(
            "{:<25} {:.2}",
            "Average Memory Load (%):", summary.mean_memory_load
        ));
    } else {
        lines.push(format!("{:<25} n/a (no runs)", "Average CPU Load (%):"));
        lines.push(format!("{:<25} n/a (no runs)", "Average Memory Load (%):"));
    }

    lines.push(format!("{:<25} {}", "Successful Runs:", summary.success_count));
    lines.push(format!("{:<25} {}", "Failed Runs:", summary.failure_count));
    lines
}

/// Logs every job summary followed by the run summary
pub fn log_run_report(report: &RunReport) {
    for job in &report.jobs {
        info!("Job {} ({}):", job.index, job.status);
        for line in format_summary(&job.summary) {
            info!("  {}", line);
        }
    }

    info!("Results Summary (run {}, {}):", report.run_id, report.status);
    for line in format_summary(&report.summary) {
        info!("{}", line);
    }
}

/// Writes the report as pretty-printed JSON
pub async fn write_report(path: &Path, report: &RunReport) -> Result<()> {
    let json = serde_json::to_string_pretty(report).context("Failed to serialize run report")?;

    tokio::fs::write(path, json)
        .await
        .with_context(|| format!("Failed to write run report to {}", path.display()))?;

    info!("Run report written to {}", path.display());
    Ok(())
}
