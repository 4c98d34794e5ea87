use super::PipelineReport;
use docpub_core::{Error, Result};
use std::path::Path;

/// Writes the pipeline report to a JSON file
///
/// # Errors
/// Returns error if file creation or JSON serialization fails
pub fn write_report(report: &PipelineReport, path: &Path) -> Result<()> {
    let file = std::fs::File::create(path).map_err(|e| Error::io(e, path, "create"))?;
    serde_json::to_writer_pretty(file, report)
        .map_err(|e| Error::io(e.into(), path, "write_report"))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::TriggerEvent;
    use crate::report::{PipelineStatus, Stage, StageStatus};
    use tempfile::TempDir;

    fn create_test_report() -> PipelineReport {
        let event = TriggerEvent::push("main", ["docs/index.md"])
            .with_sha("abc123")
            .with_provider("github");
        let mut report = PipelineReport::start(&event);
        report.cache_key = Some("mkdocs-material-27".to_string());
        report.cache_restore = Some("fallback".to_string());
        report.record(Stage::Checkout, StageStatus::Success, 120, None);
        report.record(
            Stage::Deploy,
            StageStatus::Success,
            4_500,
            Some("published to gh-pages".to_string()),
        );
        report.finish(PipelineStatus::Success);
        report
    }

    #[test]
    fn test_write_report_creates_valid_json() {
        let temp_dir = TempDir::new().unwrap();
        let report_path = temp_dir.path().join("report.json");

        write_report(&create_test_report(), &report_path).unwrap();

        let content = std::fs::read_to_string(&report_path).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&content).unwrap();
        assert_eq!(parsed["version"], "1");
        assert_eq!(parsed["status"], "success");
        assert_eq!(parsed["cache_key"], "mkdocs-material-27");
        assert_eq!(parsed["cache_restore"], "fallback");
        // Pretty-printed
        assert!(content.contains("\n  "));
    }

    #[test]
    fn test_write_report_includes_context_and_stages() {
        let temp_dir = TempDir::new().unwrap();
        let report_path = temp_dir.path().join("report.json");

        write_report(&create_test_report(), &report_path).unwrap();

        let parsed: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&report_path).unwrap()).unwrap();
        assert_eq!(parsed["context"]["provider"], "github");
        assert_eq!(parsed["context"]["branch"], "main");
        assert_eq!(parsed["context"]["changed_files"][0], "docs/index.md");

        let stages = parsed["stages"].as_array().unwrap();
        assert_eq!(stages.len(), 2);
        assert_eq!(stages[1]["stage"], "deploy");
        assert_eq!(stages[1]["duration_ms"], 4500);
    }

    #[test]
    fn test_write_report_failed_stage() {
        let temp_dir = TempDir::new().unwrap();
        let report_path = temp_dir.path().join("report.json");
        let mut report = create_test_report();
        report.stages[1].status = StageStatus::Failed;
        report.status = PipelineStatus::Failed;

        write_report(&report, &report_path).unwrap();

        let parsed: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&report_path).unwrap()).unwrap();
        assert_eq!(parsed["status"], "failed");
        assert_eq!(parsed["stages"][1]["status"], "failed");
    }

    #[test]
    fn test_write_report_invalid_path_fails() {
        let invalid_path = Path::new("/nonexistent/dir/report.json");
        let err = write_report(&create_test_report(), invalid_path).unwrap_err();
        assert!(matches!(err, Error::Io { .. }));
    }
}
