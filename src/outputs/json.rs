//! JSON run reports.
//!
//! Each run writes its [`WorkflowResult`] under a per-date directory:
//!
//! ```text
//! report_dir/
//! └── 2025-05-06/
//!     ├── run-081500.json
//!     └── run-201503.json
//! ```
//!
//! Paths are derived from the run's UTC start time.

use crate::error::StageError;
use crate::pipeline::WorkflowResult;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{error, info, instrument};

/// Where the report for `result` goes under `report_dir`.
pub fn report_path(result: &WorkflowResult, report_dir: &Path) -> PathBuf {
    report_dir
        .join(result.started_at.format("%Y-%m-%d").to_string())
        .join(format!("run-{}.json", result.started_at.format("%H%M%S")))
}

/// Write `result` as pretty JSON, creating directories as needed.
#[instrument(level = "info", skip_all, fields(report_dir = %report_dir.display()))]
pub async fn write_report(result: &WorkflowResult, report_dir: &Path) -> Result<PathBuf, StageError> {
    let json = serde_json::to_string_pretty(result)?;
    let path = report_path(result, report_dir);

    if let Some(parent) = path.parent() {
        if let Err(e) = fs::create_dir_all(parent).await {
            error!(dir = %parent.display(), error = %e, "Failed to create report dir");
            return Err(e.into());
        }
    }

    fs::write(&path, json).await?;
    info!(path = %path.display(), "Wrote run report");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::StageOutputs;
    use chrono::{TimeZone, Utc};
    use tempfile::TempDir;

    fn result() -> WorkflowResult {
        let started = Utc.with_ymd_and_hms(2025, 5, 6, 8, 15, 0).unwrap();
        WorkflowResult::from_outputs(StageOutputs::default(), started, started)
    }

    #[test]
    fn test_report_path_layout() {
        let p = report_path(&result(), Path::new("/var/reports"));
        assert_eq!(p, PathBuf::from("/var/reports/2025-05-06/run-081500.json"));
    }

    #[tokio::test]
    async fn test_write_report_round_trips() {
        let dir = TempDir::new().unwrap();
        let path = write_report(&result(), dir.path()).await.unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        let parsed: WorkflowResult = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed, result());
        assert!(text.contains("\"total_collected\": 0"));
    }
}
