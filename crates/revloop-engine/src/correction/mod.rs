//! Correction generation, application and verification
//!
//! The manager owns the set of active (pending) corrections, at most one per
//! file, and two whole-file logs: the correction history, updated in place
//! by correction id, and the append-only status log used for duplicate
//! suppression and manual review.

pub mod edit;
pub mod plan;

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use revloop_config::ValidationConfig;
use revloop_model::{Correction, CorrectionStatus, Fix, StatusEntry, ValidationResult};
use revloop_utils::clock::{Clock, elapsed_between};
use revloop_utils::content::{ReadOutcome, content_hash};
use revloop_utils::json_log::JsonLog;

use crate::validator::ChangeValidator;

pub use edit::{apply_edits, apply_fix, reindent};
pub use plan::{plan_docstrings, plan_fix};

#[derive(Debug)]
pub struct CorrectionManager {
    log: JsonLog<Correction>,
    status_log: JsonLog<StatusEntry>,
    active: Vec<Correction>,
    config: ValidationConfig,
    duplicate_window: Duration,
    clock: Arc<dyn Clock>,
}

impl CorrectionManager {
    /// Create a manager and restore outstanding work from the correction
    /// log: the latest pending entry per file becomes active again.
    pub fn new(
        corrections_log: impl Into<PathBuf>,
        status_log: impl Into<PathBuf>,
        config: ValidationConfig,
        duplicate_window: Duration,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let log: JsonLog<Correction> = JsonLog::new(corrections_log, "corrections");

        let mut active: Vec<Correction> = Vec::new();
        for entry in log.entries() {
            active.retain(|c| c.file_path != entry.file_path);
            if entry.is_pending() {
                active.push(entry);
            }
        }
        if !active.is_empty() {
            info!(count = active.len(), "Restored pending corrections");
        }

        Self {
            log,
            status_log: JsonLog::new(status_log, "corrections"),
            active,
            config,
            duplicate_window,
            clock,
        }
    }

    #[must_use]
    pub fn log(&self) -> &JsonLog<Correction> {
        &self.log
    }

    #[must_use]
    pub fn status_log(&self) -> &JsonLog<StatusEntry> {
        &self.status_log
    }

    #[must_use]
    pub fn duplicate_window(&self) -> Duration {
        self.duplicate_window
    }

    /// Active correction for `file`, if any.
    #[must_use]
    pub fn active_for(&self, file: &Path) -> Option<&Correction> {
        self.active.iter().find(|c| c.file_path == file)
    }

    /// Build a correction for a failed validation.
    ///
    /// Returns None for a valid result or an unreadable file. An active
    /// correction for the same file absorbs the new requirements and is
    /// re-planned against the current content. A correction with nothing to
    /// automate goes straight to manual review.
    pub fn generate_correction(&mut self, result: &ValidationResult) -> Option<Correction> {
        if result.valid {
            return None;
        }

        let content = match ReadOutcome::read(&result.file_path) {
            ReadOutcome::Content(content) => content,
            ReadOutcome::NotFound => {
                debug!(file = %result.file_path.display(), "No correction for a missing file");
                return None;
            }
            ReadOutcome::IoError(reason) => {
                warn!(file = %result.file_path.display(), error = %reason, "Cannot read file to plan a correction");
                return None;
            }
        };

        let now = self.clock.now();
        let existing = self
            .active
            .iter()
            .position(|c| c.file_path == result.file_path);

        let mut requirements: BTreeSet<String> = existing
            .map(|index| self.active[index].requirements.clone())
            .unwrap_or_default();
        requirements.extend(result.missing_requirements.iter().cloned());

        let fixes: Vec<Fix> = requirements
            .iter()
            .map(|requirement| plan_fix(requirement, &content, &self.config))
            .collect();

        let mut correction = match existing {
            Some(index) => {
                let mut merged = self.active.remove(index);
                merged.requirements = requirements;
                merged.fixes = fixes;
                merged.timestamp = now;
                merged.status = CorrectionStatus::Pending;
                merged.content_hash = Some(content_hash(&content));
                debug!(file = %result.file_path.display(), id = %merged.id, "Merged into active correction");
                merged
            }
            None => Correction::new(&result.file_path, now, requirements, fixes, &content),
        };

        if correction.has_automated_fixes() {
            info!(
                file = %correction.file_path.display(),
                id = %correction.id,
                fixes = correction.fixes.len(),
                "Generated correction"
            );
            self.active.push(correction.clone());
        } else {
            correction.status = CorrectionStatus::NeedsReview;
            self.record_status(&correction, 0);
            warn!(
                file = %correction.file_path.display(),
                requirements = ?correction.requirements,
                "No automated fix available; manual review required"
            );
        }

        self.persist(&correction);
        Some(correction)
    }

    /// Apply every pending automated fix of `correction` to its file.
    ///
    /// The history entry is written before the file is touched. Per-fix
    /// errors are recorded on the fix and do not stop its siblings. Returns
    /// true when every automated fix is applied.
    pub fn apply_correction(&mut self, correction: &mut Correction) -> bool {
        self.persist(correction);

        let now = self.clock.now();
        let path = correction.file_path.clone();
        let mut all_applied = true;

        for fix in correction.fixes.iter_mut().filter(|fix| fix.is_pending()) {
            match apply_fix(&path, fix) {
                Ok(()) => {
                    fix.applied = true;
                    fix.applied_at = Some(now);
                    fix.error = None;
                    debug!(file = %path.display(), fix = %fix.description, "Applied fix");
                }
                Err(e) => {
                    warn!(file = %path.display(), fix = %fix.description, error = %e, "Fix failed");
                    fix.error = Some(e.to_string());
                    all_applied = false;
                }
            }
        }

        if all_applied {
            correction.applied_at = Some(now);
            correction.status = if correction.has_manual_fixes() {
                CorrectionStatus::NeedsReview
            } else {
                CorrectionStatus::Applied
            };
            self.active.retain(|c| c.id != correction.id);
            info!(file = %path.display(), id = %correction.id, status = %correction.status, "Correction applied");
        } else if let Some(slot) = self.active.iter_mut().find(|c| c.id == correction.id) {
            *slot = correction.clone();
        }

        self.persist(correction);
        all_applied
    }

    /// Verify an applied correction, unless it was applied within the
    /// duplicate window, in which case it is reported successful without
    /// re-validating.
    pub fn verify_correction(&mut self, correction: &mut Correction, validator: &ChangeValidator) -> bool {
        let now = self.clock.now();
        let just_applied = correction
            .applied_at
            .is_some_and(|at| elapsed_between(at, now) < self.duplicate_window);
        if just_applied || self.was_recently_applied(&correction.file_path) {
            debug!(file = %correction.file_path.display(), "Skipping verification of a just-applied correction");
            return true;
        }
        self.verify_correction_now(correction, validator)
    }

    /// Re-validate the file and compare against this correction's own
    /// requirements only. Records the outcome on the history entry.
    pub fn verify_correction_now(&mut self, correction: &mut Correction, validator: &ChangeValidator) -> bool {
        let result = validator.validate_file(&correction.file_path);
        let missing: BTreeSet<&str> = result
            .missing_requirements
            .iter()
            .map(String::as_str)
            .collect();

        let (remaining, fixed): (Vec<String>, Vec<String>) = correction
            .requirements
            .iter()
            .cloned()
            .partition(|requirement| missing.contains(requirement.as_str()));

        let success = remaining.is_empty();
        correction.verified_at = Some(self.clock.now());
        correction.fixed_requirements = Some(fixed);
        correction.remaining_requirements = Some(remaining);
        correction.verification_success = Some(success);

        if success {
            info!(file = %correction.file_path.display(), id = %correction.id, "Correction verified");
        } else {
            warn!(
                file = %correction.file_path.display(),
                id = %correction.id,
                remaining = ?correction.remaining_requirements,
                "Correction verification found remaining requirements"
            );
        }

        self.persist(correction);
        success
    }

    /// Give up on `correction` after `attempts` failed attempts.
    pub fn mark_correction_failed(&mut self, correction: &mut Correction, attempts: u32) {
        correction.status = CorrectionStatus::NeedsReview;
        self.active.retain(|c| c.id != correction.id);
        self.record_status(correction, attempts);
        self.persist(correction);

        warn!(
            "Manual review required for {}:\n  - Issue: {}\n  - Failed after {} attempts\n  - Check {} for details",
            correction.file_path.display(),
            correction.headline(),
            attempts,
            self.status_log.path().display()
        );
    }

    /// Append a status entry for `file` and bring the active and history
    /// entries to `status`.
    pub fn update_correction_status(&mut self, file: &Path, status: CorrectionStatus, fix_attempts: u32) {
        let issue = self
            .active_for(file)
            .map(Correction::headline)
            .or_else(|| {
                self.log
                    .entries()
                    .into_iter()
                    .rev()
                    .find(|c| c.file_path == file)
                    .map(|c| c.headline())
            })
            .unwrap_or_else(|| "unknown issue".to_string());

        self.append_status(StatusEntry {
            file: file.to_path_buf(),
            issue,
            fix_attempts,
            status,
            last_attempt: self.clock.now(),
        });

        for correction in self.active.iter_mut().filter(|c| c.file_path == file) {
            correction.status = status;
        }
        self.active.retain(Correction::is_pending);

        if let Err(e) = self
            .log
            .update_last(|c| c.file_path == file, |c| c.status = status)
        {
            warn!(error = %e, "Failed to update correction log");
        }
    }

    /// Active corrections with at least one automated fix left.
    #[must_use]
    pub fn get_pending_corrections(&self) -> Vec<Correction> {
        self.active.iter().filter(|c| c.is_pending()).cloned().collect()
    }

    /// True when the status log shows `file` was corrected within the
    /// duplicate window.
    #[must_use]
    pub fn was_recently_applied(&self, file: &Path) -> bool {
        let now = self.clock.now();
        self.status_log.entries().iter().rev().any(|entry| {
            entry.file == file
                && entry.status == CorrectionStatus::Applied
                && elapsed_between(entry.last_attempt, now) < self.duplicate_window
        })
    }

    fn record_status(&self, correction: &Correction, fix_attempts: u32) {
        self.append_status(StatusEntry {
            file: correction.file_path.clone(),
            issue: correction.headline(),
            fix_attempts,
            status: correction.status,
            last_attempt: self.clock.now(),
        });
    }

    fn append_status(&self, entry: StatusEntry) {
        if let Err(e) = self.status_log.append(&entry) {
            warn!(error = %e, "Failed to record correction status");
        }
    }

    fn persist(&self, correction: &Correction) {
        if let Err(e) = self.log.upsert(correction, |c| c.id == correction.id) {
            warn!(id = %correction.id, error = %e, "Failed to record correction");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::requirements::RequirementStore;
    use revloop_model::{EditInstruction, EventType};
    use revloop_utils::clock::ManualClock;
    use revloop_utils::test_support::{MIXED_INDENT_SOURCE, write_file};
    use tempfile::TempDir;

    struct Fixture {
        _temp: TempDir,
        dir: PathBuf,
        clock: Arc<ManualClock>,
    }

    impl Fixture {
        fn new() -> Self {
            let temp = TempDir::new().unwrap();
            let dir = temp.path().to_path_buf();
            Self {
                _temp: temp,
                dir,
                clock: Arc::new(ManualClock::starting_now()),
            }
        }

        fn manager(&self) -> CorrectionManager {
            CorrectionManager::new(
                self.dir.join("logs/corrections.json"),
                self.dir.join("logs/correction_status.json"),
                ValidationConfig::default(),
                Duration::from_secs(2),
                self.clock.clone(),
            )
        }

        fn validator(&self, requirements: &str) -> ChangeValidator {
            let path = write_file(&self.dir, "requirements.md", requirements);
            ChangeValidator::new(
                RequirementStore::new(path),
                self.dir.join("logs/validation_log.json"),
                ValidationConfig::default(),
                self.clock.clone(),
            )
        }

        fn failed(&self, file: &Path, missing: &[&str]) -> ValidationResult {
            ValidationResult {
                file_path: file.to_path_buf(),
                event_type: EventType::Modified,
                timestamp: self.clock.now(),
                valid: false,
                missing_requirements: missing.iter().map(|s| s.to_string()).collect(),
                notes: "Missing requirements found".to_string(),
            }
        }
    }

    #[test]
    fn test_valid_result_or_missing_file_yields_nothing() {
        let fx = Fixture::new();
        let mut manager = fx.manager();

        let mut valid = fx.failed(&fx.dir.join("a.py"), &[]);
        valid.valid = true;
        assert!(manager.generate_correction(&valid).is_none());

        let missing = fx.failed(&fx.dir.join("gone.py"), &["Use consistent indentation"]);
        assert!(manager.generate_correction(&missing).is_none());
        assert!(manager.get_pending_corrections().is_empty());
    }

    #[test]
    fn test_second_failure_merges_into_active_correction() {
        let fx = Fixture::new();
        let mut manager = fx.manager();
        let file = write_file(&fx.dir, "a.py", MIXED_INDENT_SOURCE);

        let first = manager
            .generate_correction(&fx.failed(&file, &["Use consistent indentation"]))
            .unwrap();
        fx.clock.advance(Duration::from_secs(1));
        let second = manager
            .generate_correction(&fx.failed(&file, &["Add docstrings to all functions"]))
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.requirements.len(), 2);
        assert_eq!(second.fixes.len(), 2);
        assert!(second.timestamp > first.timestamp);
        assert_eq!(manager.get_pending_corrections().len(), 1);
        assert_eq!(manager.log().load().unwrap().len(), 1);
    }

    #[test]
    fn test_manual_only_correction_needs_review() {
        let fx = Fixture::new();
        let mut manager = fx.manager();
        let file = write_file(&fx.dir, "a.py", "x = 1\n");

        let correction = manager
            .generate_correction(&fx.failed(&file, &["Support multiple projects"]))
            .unwrap();

        assert_eq!(correction.status, CorrectionStatus::NeedsReview);
        assert!(manager.get_pending_corrections().is_empty());
        let status = manager.status_log().load().unwrap();
        assert_eq!(status.len(), 1);
        assert_eq!(status[0].status, CorrectionStatus::NeedsReview);
    }

    #[test]
    fn test_apply_records_per_fix_errors() {
        let fx = Fixture::new();
        let mut manager = fx.manager();
        let file = write_file(&fx.dir, "a.py", "x = 1  \n");

        let mut correction = manager
            .generate_correction(&fx.failed(&file, &["Follow PEP 8 guidelines"]))
            .unwrap();
        correction.fixes.push(Fix::new(
            "Broken",
            "Broken substitution",
            vec![EditInstruction::Substitute {
                pattern: "(".to_string(),
                replacement: String::new(),
            }],
        ));

        assert!(!manager.apply_correction(&mut correction));
        assert!(correction.fixes[0].applied);
        assert!(correction.fixes[1].error.is_some());
        assert_eq!(std::fs::read_to_string(&file).unwrap(), "x = 1\n");
        assert_eq!(manager.get_pending_corrections().len(), 1);
    }

    #[test]
    fn test_verification_scoped_to_own_requirements() {
        let fx = Fixture::new();
        let validator = fx.validator(
            "## Code Style\n- Use consistent indentation\n- Add docstrings to all functions\n",
        );
        let mut manager = fx.manager();
        let file = write_file(&fx.dir, "a.py", "def f():\n    if x:\n      pass\n");

        let mut correction = manager
            .generate_correction(&fx.failed(&file, &["Use consistent indentation"]))
            .unwrap();
        assert!(manager.apply_correction(&mut correction));

        fx.clock.advance(Duration::from_secs(3));
        assert!(manager.verify_correction(&mut correction, &validator));
        assert_eq!(
            correction.fixed_requirements,
            Some(vec!["Use consistent indentation".to_string()])
        );
        assert_eq!(correction.remaining_requirements, Some(vec![]));
    }

    #[test]
    fn test_verification_skipped_inside_duplicate_window() {
        let fx = Fixture::new();
        let validator = fx.validator("## Code Style\n- Use consistent indentation\n");
        let mut manager = fx.manager();
        let file = write_file(&fx.dir, "a.py", "if a:\n  b\n   c\n");

        let mut correction = manager
            .generate_correction(&fx.failed(&file, &["Use consistent indentation"]))
            .unwrap();
        correction.applied_at = Some(fx.clock.now());

        assert!(manager.verify_correction(&mut correction, &validator));
        assert!(correction.verified_at.is_none());

        assert!(!manager.verify_correction_now(&mut correction, &validator));
        assert_eq!(
            correction.remaining_requirements,
            Some(vec!["Use consistent indentation".to_string()])
        );
    }

    #[test]
    fn test_mark_failed_and_status_updates() {
        let fx = Fixture::new();
        let mut manager = fx.manager();
        let file = write_file(&fx.dir, "a.py", "if a:\n  b\n   c\n");

        let mut correction = manager
            .generate_correction(&fx.failed(&file, &["Use consistent indentation"]))
            .unwrap();
        manager.mark_correction_failed(&mut correction, 3);

        assert_eq!(correction.status, CorrectionStatus::NeedsReview);
        assert!(manager.get_pending_corrections().is_empty());
        let status = manager.status_log().load().unwrap();
        assert_eq!(status.last().map(|s| s.fix_attempts), Some(3));

        manager.update_correction_status(&file, CorrectionStatus::Applied, 1);
        assert!(manager.was_recently_applied(&file));
        fx.clock.advance(Duration::from_secs(2));
        assert!(!manager.was_recently_applied(&file));
        assert_eq!(
            manager.log().load().unwrap()[0].status,
            CorrectionStatus::Applied
        );
    }

    #[test]
    fn test_pending_set_restored_on_restart() {
        let fx = Fixture::new();
        let a = write_file(&fx.dir, "a.py", "if a:\n  b\n   c\n");
        let b = write_file(&fx.dir, "b.py", "if a:\n  b\n   c\n");
        {
            let mut manager = fx.manager();
            manager.generate_correction(&fx.failed(&a, &["Use consistent indentation"]));
            let mut done = manager
                .generate_correction(&fx.failed(&b, &["Use consistent indentation"]))
                .unwrap();
            assert!(manager.apply_correction(&mut done));
        }

        let restored = fx.manager();
        let pending = restored.get_pending_corrections();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].file_path, a);
    }
}
