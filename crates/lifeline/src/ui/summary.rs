//! Run report rendering.
//!
//! Text mode writes a per-stage table to stdout, JSON mode writes exactly one
//! JSON document. Logs always go to stderr.

use console::style;
use lifeline_core::report::{RunReport, Status};

pub fn render_json(report: &RunReport) -> String {
    serde_json::to_string_pretty(report).unwrap_or_else(|_| "{}".to_string())
}

/// Render the report as human-readable text.
///
/// ```text
/// Lifecycle run (started 2026-10-18T09:12:01Z)
///   [OK] 1. install (2310 ms)
///   [X]  2. login (10021 ms)
///          FAILED log in (UI): Timed out after 10000 ms waiting for ...
///   [--] 3. upload-index
///
/// 2 passed, 1 failed, 26 skipped in 12331 ms
/// ```
pub fn render_text(report: &RunReport) -> String {
    let mut output = String::new();
    output.push_str(&format!(
        "{}\n",
        style(format!(
            "Lifecycle run (started {})",
            report.started_at.format("%Y-%m-%dT%H:%M:%SZ")
        ))
        .bold()
    ));

    for stage in &report.stages {
        let (icon, timing) = match stage.status {
            Status::Passed => (
                style("[OK]").green().to_string(),
                format!(" ({} ms)", stage.duration_ms),
            ),
            Status::Failed => (
                style("[X] ").red().to_string(),
                format!(" ({} ms)", stage.duration_ms),
            ),
            Status::Skipped => (style("[--]").dim().to_string(), String::new()),
        };
        output.push_str(&format!("  {} {}. {}{}\n", icon, stage.index, stage.name, timing));

        if stage.status == Status::Failed {
            if let Some(failure) = &report.failure {
                output.push_str(&format!(
                    "         {} {}: {}\n",
                    style("FAILED").red().bold(),
                    failure.step,
                    failure.message
                ));
            }
        }
    }

    if let Some(handle) = &report.final_handle {
        output.push_str(&format!(
            "\nApp left installed: {} ({})\n",
            handle.fqdn, handle.id
        ));
    }
    if let Some(release_error) = &report.release_error {
        output.push_str(&format!(
            "\n{} {}\n",
            style("Browser session was not released:").yellow(),
            release_error
        ));
    }

    let counts = format!(
        "{} passed, {} failed, {} skipped in {} ms",
        report.count(Status::Passed),
        report.count(Status::Failed),
        report.count(Status::Skipped),
        report.duration_ms
    );
    let counts = if report.success {
        style(counts).green()
    } else {
        style(counts).red()
    };
    output.push_str(&format!("\n{}\n", counts));
    output
}
