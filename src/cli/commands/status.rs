//! Status command implementation
//!
//! Handles `revloop status`: what is waiting to be applied and what was
//! handed to manual review.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;

use super::common::system_pipeline;
use crate::{Config, CorrectionManager, CorrectionStatus, ExitCode, StatusEntry, emit_jcs};

/// Summary of the correction logs.
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub pending: Vec<PendingCorrection>,
    /// Latest status entry of every file whose most recent outcome is
    /// needs-review
    pub needs_review: Vec<StatusEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PendingCorrection {
    pub id: String,
    pub file_path: PathBuf,
    pub requirements: Vec<String>,
    pub fixes: usize,
    pub timestamp: DateTime<Utc>,
}

impl StatusReport {
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.pending.is_empty() && self.needs_review.is_empty()
    }
}

/// Build the report from the manager's active set and its status log.
#[must_use]
pub fn build_status_report(manager: &CorrectionManager) -> StatusReport {
    let pending = manager
        .get_pending_corrections()
        .into_iter()
        .map(|c| PendingCorrection {
            fixes: c.fixes.iter().filter(|f| f.is_pending()).count(),
            requirements: c.requirements.into_iter().collect(),
            id: c.id,
            file_path: c.file_path,
            timestamp: c.timestamp,
        })
        .collect();

    let mut latest: BTreeMap<PathBuf, StatusEntry> = BTreeMap::new();
    for entry in manager.status_log().entries() {
        latest.insert(entry.file.clone(), entry);
    }
    let needs_review = latest
        .into_values()
        .filter(|entry| entry.status == CorrectionStatus::NeedsReview)
        .collect();

    StatusReport {
        pending,
        needs_review,
    }
}

/// Human-readable rendering shared by `status`, `review` and `apply`.
pub fn print_status_report(report: &StatusReport) {
    if report.is_clean() {
        println!("✓ No pending corrections and nothing needs review");
        return;
    }

    if !report.pending.is_empty() {
        println!("Pending corrections: {}", report.pending.len());
        for pending in &report.pending {
            println!(
                "  {} ({} fixes): {}",
                pending.file_path.display(),
                pending.fixes,
                pending.requirements.join(", ")
            );
        }
    }

    if !report.needs_review.is_empty() {
        println!("Needs review: {}", report.needs_review.len());
        for entry in &report.needs_review {
            println!(
                "  {}: {} ({} attempts, last {})",
                entry.file.display(),
                entry.issue,
                entry.fix_attempts,
                entry.last_attempt.format("%Y-%m-%d %H:%M:%S UTC")
            );
        }
    }
}

/// Execute the status command
pub fn execute_status_command(json: bool, config: &Config) -> Result<ExitCode> {
    let manager = system_pipeline(config).correction_manager();
    let report = build_status_report(&manager);

    if json {
        let output = emit_jcs(&report).context("Failed to emit status JSON")?;
        println!("{output}");
    } else {
        print_status_report(&report);
    }

    Ok(ExitCode::SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SystemClock;
    use revloop_utils::json_log::JsonLog;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn entry(file: &str, status: CorrectionStatus, secs: i64) -> StatusEntry {
        StatusEntry {
            file: PathBuf::from(file),
            issue: "Reindent to 4-space levels".to_string(),
            fix_attempts: 3,
            status,
            last_attempt: DateTime::<Utc>::from_timestamp(1_760_000_000 + secs, 0).unwrap_or_default(),
        }
    }

    #[test]
    fn test_needs_review_uses_latest_entry_per_file() -> Result<()> {
        let temp = TempDir::new()?;
        let config = Config::defaults_at(temp.path());
        let paths = config.log_paths();
        let log: JsonLog<StatusEntry> = JsonLog::new(&paths.correction_status, "corrections");
        log.append(&entry("/p/a.py", CorrectionStatus::NeedsReview, 0))?;
        log.append(&entry("/p/b.py", CorrectionStatus::NeedsReview, 1))?;
        log.append(&entry("/p/a.py", CorrectionStatus::Applied, 2))?;

        let manager = crate::Pipeline::new(config, Arc::new(SystemClock)).correction_manager();
        let report = build_status_report(&manager);

        assert!(report.pending.is_empty());
        assert_eq!(report.needs_review.len(), 1);
        assert_eq!(report.needs_review[0].file, PathBuf::from("/p/b.py"));
        Ok(())
    }

    #[test]
    fn test_empty_logs_report_clean() -> Result<()> {
        let temp = TempDir::new()?;
        let manager = system_pipeline(&Config::defaults_at(temp.path())).correction_manager();
        let report = build_status_report(&manager);
        assert!(report.is_clean());

        let json = emit_jcs(&report)?;
        assert_eq!(json, r#"{"needs_review":[],"pending":[]}"#);
        Ok(())
    }
}
