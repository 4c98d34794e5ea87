use super::{PipelineReport, PipelineStatus, StageStatus};
use std::fmt::Write;

/// Generate a markdown summary of the pipeline report.
///
/// Written to the job summary on GitHub Actions.
#[must_use]
pub fn generate_summary(report: &PipelineReport) -> String {
    let mut md = String::new();

    let (status_emoji, status_text) = match report.status {
        PipelineStatus::Success => ("✅", "published"),
        PipelineStatus::Failed => ("❌", "failed"),
        PipelineStatus::Pending => ("⏳", "pending"),
    };

    let _ = writeln!(md, "## {status_emoji} Documentation {status_text}\n");

    let duration = report
        .duration_ms
        .map_or_else(|| "-".to_string(), format_duration);
    let cache = match (&report.cache_key, &report.cache_restore) {
        (Some(key), Some(restore)) => format!("`{key}` ({restore})"),
        (Some(key), None) => format!("`{key}`"),
        _ => "-".to_string(),
    };

    md.push_str("| Branch | Status | Cache | Duration |\n");
    md.push_str("|--------|--------|-------|----------|\n");
    let _ = writeln!(
        md,
        "| `{}` | {} | {} | {} |\n",
        report.context.branch, status_emoji, cache, duration
    );

    if !report.stages.is_empty() {
        md.push_str("### Stages\n\n");
        md.push_str("| Stage | Status | Duration | Detail |\n");
        md.push_str("|-------|--------|----------|--------|\n");

        for stage in &report.stages {
            let stage_emoji = match stage.status {
                StageStatus::Success => "✅",
                StageStatus::Failed => "❌",
                StageStatus::Warning => "⚠️",
                StageStatus::Skipped => "⏭️",
            };
            let detail = stage
                .detail
                .as_deref()
                .map(|d| d.replace('|', "\\|").replace('\n', " "))
                .unwrap_or_default();
            let _ = writeln!(
                md,
                "| `{}` | {} | {} | {} |",
                stage.stage,
                stage_emoji,
                format_duration(stage.duration_ms),
                detail
            );
        }
        md.push('\n');
    }

    md.push_str("### Details\n\n");
    let sha = &report.context.sha;
    let _ = writeln!(md, "- **Commit:** `{}`", sha.get(..8).unwrap_or(sha));
    let _ = writeln!(
        md,
        "- **Event:** `{}` via {}",
        report.context.event, report.context.provider
    );
    let _ = writeln!(
        md,
        "- **Changed files:** {}",
        report.context.changed_files.len()
    );

    let _ = write!(md, "\n---\n*docpub v{}*\n", env!("CARGO_PKG_VERSION"));

    md
}

/// Format duration in milliseconds to a human-readable string.
#[allow(clippy::cast_precision_loss)]
pub(crate) fn format_duration(ms: u64) -> String {
    if ms < 1000 {
        format!("{}ms", ms)
    } else if ms < 60_000 {
        format!("{:.1}s", ms as f64 / 1000.0)
    } else {
        let minutes = ms / 60_000;
        let seconds = (ms % 60_000) / 1000;
        format!("{}m {}s", minutes, seconds)
    }
}
