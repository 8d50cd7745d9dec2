//! Validation of changed files against the requirements document

pub mod checks;
pub mod indentation;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

use revloop_config::ValidationConfig;
use revloop_model::{ChangeEvent, EventType, ValidationResult};
use revloop_utils::clock::Clock;
use revloop_utils::content::ReadOutcome;
use revloop_utils::json_log::JsonLog;

use crate::requirements::RequirementStore;

pub use checks::{requirement_met, style_guide_issues};
pub use indentation::{IndentIssue, check_indentation};

pub const NOTE_NO_REQUIREMENTS: &str = "No requirements found to validate against";
pub const NOTE_ALL_MET: &str = "All requirements met";
pub const NOTE_MISSING: &str = "Missing requirements found";

/// Validates file contents against the current requirements and records
/// every result in the validation log.
#[derive(Debug)]
pub struct ChangeValidator {
    requirements: RequirementStore,
    log: JsonLog<ValidationResult>,
    config: ValidationConfig,
    clock: Arc<dyn Clock>,
}

impl ChangeValidator {
    pub fn new(
        requirements: RequirementStore,
        log_path: impl Into<PathBuf>,
        config: ValidationConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            requirements,
            log: JsonLog::new(log_path, "validations"),
            config,
            clock,
        }
    }

    #[must_use]
    pub fn requirements(&self) -> &RequirementStore {
        &self.requirements
    }

    #[must_use]
    pub fn log(&self) -> &JsonLog<ValidationResult> {
        &self.log
    }

    #[must_use]
    pub fn config(&self) -> &ValidationConfig {
        &self.config
    }

    /// Validate the file named by `event`.
    ///
    /// Never fails: a deleted, missing or unreadable file is validated as
    /// empty content, and a missing requirements document passes everything.
    pub fn validate_change(&self, event: &ChangeEvent) -> ValidationResult {
        let requirements = self.requirements.load();
        let timestamp = self.clock.now();

        let result = if requirements.is_empty() {
            ValidationResult {
                file_path: event.file_path.clone(),
                event_type: event.event_type,
                timestamp,
                valid: true,
                missing_requirements: Vec::new(),
                notes: NOTE_NO_REQUIREMENTS.to_string(),
            }
        } else {
            let content = self.content_for(event);
            let mut missing: Vec<String> = Vec::new();
            for requirement in &requirements {
                if !requirement_met(requirement, &content, &self.config)
                    && !missing.contains(&requirement.text)
                {
                    missing.push(requirement.text.clone());
                }
            }

            let valid = missing.is_empty();
            ValidationResult {
                file_path: event.file_path.clone(),
                event_type: event.event_type,
                timestamp,
                valid,
                missing_requirements: missing,
                notes: if valid { NOTE_ALL_MET } else { NOTE_MISSING }.to_string(),
            }
        };

        debug!(
            file = %event.file_path.display(),
            valid = result.valid,
            missing = result.missing_requirements.len(),
            "Validated change"
        );
        if let Err(e) = self.log.append(&result) {
            warn!(error = %e, "Failed to record validation result");
        }
        result
    }

    /// Validate a batch of events in order.
    pub fn validate_changes(&self, events: &[ChangeEvent]) -> Vec<ValidationResult> {
        events.iter().map(|event| self.validate_change(event)).collect()
    }

    /// Validate the current content of `path` as a modification.
    pub fn validate_file(&self, path: &Path) -> ValidationResult {
        let event = ChangeEvent::new(path, EventType::Modified, self.clock.now());
        self.validate_change(&event)
    }

    fn content_for(&self, event: &ChangeEvent) -> String {
        if event.event_type == EventType::Deleted {
            return String::new();
        }
        match ReadOutcome::read(&event.file_path) {
            ReadOutcome::Content(content) => content,
            ReadOutcome::NotFound => {
                debug!(file = %event.file_path.display(), "File vanished before validation");
                String::new()
            }
            ReadOutcome::IoError(reason) => {
                warn!(file = %event.file_path.display(), error = %reason, "Failed to read file for validation");
                String::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use revloop_utils::clock::ManualClock;
    use revloop_utils::test_support::{MIXED_INDENT_SOURCE, SAMPLE_REQUIREMENTS, write_file};
    use tempfile::TempDir;

    fn validator(dir: &Path, requirements: Option<&str>) -> ChangeValidator {
        let req_path = match requirements {
            Some(doc) => write_file(dir, "requirements.md", doc),
            None => dir.join("requirements.md"),
        };
        ChangeValidator::new(
            RequirementStore::new(req_path),
            dir.join("logs/validation_log.json"),
            ValidationConfig::default(),
            Arc::new(ManualClock::starting_now()),
        )
    }

    #[test]
    fn test_missing_requirements_are_listed_in_document_order() {
        let temp = TempDir::new().unwrap();
        let validator = validator(temp.path(), Some(SAMPLE_REQUIREMENTS));
        let file = write_file(temp.path(), "app.py", MIXED_INDENT_SOURCE);

        let result = validator.validate_file(&file);

        assert!(!result.valid);
        assert_eq!(result.notes, NOTE_MISSING);
        assert_eq!(
            result.missing_requirements,
            vec![
                "Use consistent indentation",
                "Add docstrings to all functions",
                "Implement file watching",
                "Support multiple projects",
                "Enable local validation",
            ]
        );
    }

    #[test]
    fn test_deleted_event_validates_empty_content() {
        let temp = TempDir::new().unwrap();
        let validator = validator(temp.path(), Some("## Code Style\n- Use consistent indentation\n"));
        let file = write_file(temp.path(), "app.py", "if a:\n  b\n   c\n");

        let event = ChangeEvent::new(&file, EventType::Deleted, validator.clock.now());
        let result = validator.validate_change(&event);
        assert!(result.valid);
        assert_eq!(result.notes, NOTE_ALL_MET);
        assert_eq!(result.event_type, EventType::Deleted);
    }

    #[test]
    fn test_every_result_is_logged() {
        let temp = TempDir::new().unwrap();
        let validator = validator(temp.path(), Some(SAMPLE_REQUIREMENTS));
        let a = write_file(temp.path(), "a.py", "x = 1\n");
        let b = temp.path().join("missing.py");

        let now = validator.clock.now();
        let results = validator.validate_changes(&[
            ChangeEvent::new(&a, EventType::Created, now),
            ChangeEvent::new(&b, EventType::Modified, now),
        ]);

        assert_eq!(results.len(), 2);
        let logged = validator.log().load().unwrap();
        assert_eq!(logged, results);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn prop_no_requirements_document_passes_everything(content in ".{0,200}") {
            let temp = TempDir::new().unwrap();
            let validator = validator(temp.path(), None);
            let file = write_file(temp.path(), "any.py", &content);

            let result = validator.validate_file(&file);
            prop_assert!(result.valid);
            prop_assert!(result.missing_requirements.is_empty());
            prop_assert_eq!(result.notes.as_str(), NOTE_NO_REQUIREMENTS);
        }
    }
}
