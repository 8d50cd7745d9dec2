//! Records shared across revloop
//!
//! Every record that reaches a JSON log is defined here with an explicit
//! shape. Timestamps serialize as RFC 3339.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use revloop_utils::content::content_hash;

/// A single bullet of the requirements document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Requirement {
    /// Section header the bullet appears under (e.g. "Code Style")
    pub section: String,
    /// Bullet text without the leading "- "
    pub text: String,
}

impl Requirement {
    pub fn new(section: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            section: section.into(),
            text: text.into(),
        }
    }
}

/// Kind of file system change.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum EventType {
    Created,
    Modified,
    Deleted,
}

/// A file change observed by the watcher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    /// Absolute path of the changed file
    pub file_path: PathBuf,
    pub event_type: EventType,
    pub timestamp: DateTime<Utc>,
}

impl ChangeEvent {
    pub fn new(file_path: impl Into<PathBuf>, event_type: EventType, timestamp: DateTime<Utc>) -> Self {
        Self {
            file_path: file_path.into(),
            event_type,
            timestamp,
        }
    }
}

/// Outcome of checking one file against the requirements document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub file_path: PathBuf,
    pub event_type: EventType,
    pub timestamp: DateTime<Utc>,
    /// True when no requirement is missing
    pub valid: bool,
    /// Texts of the requirements the file does not satisfy
    pub missing_requirements: Vec<String>,
    /// Human-readable summary
    pub notes: String,
}

/// Indentation character used by reindent fixes.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Default,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum IndentStyle {
    #[default]
    Spaces,
    Tabs,
}

impl IndentStyle {
    /// One indentation level: `width` spaces, or a single tab.
    #[must_use]
    pub fn unit(self, width: usize) -> String {
        match self {
            Self::Spaces => " ".repeat(width),
            Self::Tabs => "\t".to_string(),
        }
    }
}

/// A concrete, replayable text transformation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EditInstruction {
    /// Rewrite leading whitespace to multiples of one unit
    Reindent { width: usize, style: IndentStyle },
    /// Insert `text` as a new line before 0-based line index `line`
    Insert { line: usize, text: String },
    /// Regex substitution over the whole file
    Substitute { pattern: String, replacement: String },
    /// No automated edit exists; a person has to act
    Manual { reason: String },
}

impl EditInstruction {
    #[must_use]
    pub const fn is_manual(&self) -> bool {
        matches!(self, Self::Manual { .. })
    }
}

/// One proposed remedy for one missing requirement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fix {
    /// Requirement text this fix addresses
    pub requirement: String,
    pub description: String,
    pub edit_instructions: Vec<EditInstruction>,
    #[serde(default)]
    pub applied: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub applied_at: Option<DateTime<Utc>>,
    /// Last error recorded while applying this fix
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Fix {
    pub fn new(
        requirement: impl Into<String>,
        description: impl Into<String>,
        edit_instructions: Vec<EditInstruction>,
    ) -> Self {
        Self {
            requirement: requirement.into(),
            description: description.into(),
            edit_instructions,
            applied: false,
            applied_at: None,
            error: None,
        }
    }

    /// True when the fix can be carried out without a person.
    #[must_use]
    pub fn is_automated(&self) -> bool {
        !self.edit_instructions.iter().any(EditInstruction::is_manual)
    }

    /// True when the fix is automated and has not been applied yet.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        !self.applied && self.is_automated()
    }
}

/// Lifecycle state of a correction.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum CorrectionStatus {
    /// Waiting for the applier
    Pending,
    /// Every automated fix was applied
    Applied,
    /// Retries exhausted or manual fixes outstanding; never retried automatically
    NeedsReview,
}

/// A bundle of fixes for one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Correction {
    /// Stable identity used to update the history log in place
    pub id: String,
    pub file_path: PathBuf,
    /// Creation time, refreshed when a later failure is merged in
    pub timestamp: DateTime<Utc>,
    /// Requirement texts this correction is accountable for
    pub requirements: BTreeSet<String>,
    pub fixes: Vec<Fix>,
    pub status: CorrectionStatus,
    /// Hash prefix of the content the fixes were planned against
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub applied_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verified_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fixed_requirements: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remaining_requirements: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verification_success: Option<bool>,
}

impl Correction {
    pub fn new(
        file_path: impl Into<PathBuf>,
        timestamp: DateTime<Utc>,
        requirements: BTreeSet<String>,
        fixes: Vec<Fix>,
        content: &str,
    ) -> Self {
        let file_path = file_path.into();
        Self {
            id: correction_id(&file_path, timestamp),
            file_path,
            timestamp,
            requirements,
            fixes,
            status: CorrectionStatus::Pending,
            content_hash: Some(content_hash(content)),
            applied_at: None,
            verified_at: None,
            fixed_requirements: None,
            remaining_requirements: None,
            verification_success: None,
        }
    }

    /// Pending with at least one automated fix left to apply.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.status == CorrectionStatus::Pending && self.fixes.iter().any(Fix::is_pending)
    }

    #[must_use]
    pub fn has_manual_fixes(&self) -> bool {
        self.fixes.iter().any(|fix| !fix.is_automated())
    }

    #[must_use]
    pub fn has_automated_fixes(&self) -> bool {
        self.fixes.iter().any(Fix::is_automated)
    }

    /// Description of the first fix, used as the headline in status logs.
    #[must_use]
    pub fn headline(&self) -> String {
        self.fixes
            .first()
            .map_or_else(|| "unknown issue".to_string(), |fix| fix.description.clone())
    }
}

fn correction_id(file_path: &Path, timestamp: DateTime<Utc>) -> String {
    content_hash(&format!(
        "{}|{}",
        file_path.display(),
        timestamp.timestamp_nanos_opt().unwrap_or_default()
    ))
}

/// Entry of the correction status log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusEntry {
    pub file: PathBuf,
    pub issue: String,
    pub fix_attempts: u32,
    pub status: CorrectionStatus,
    pub last_attempt: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_760_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn test_edit_instruction_wire_format() {
        let edit = EditInstruction::Reindent {
            width: 4,
            style: IndentStyle::Spaces,
        };
        assert_eq!(
            serde_json::to_value(&edit).unwrap(),
            json!({"type": "reindent", "width": 4, "style": "spaces"})
        );
    }

    #[test]
    fn test_status_and_event_names() {
        assert_eq!(CorrectionStatus::NeedsReview.to_string(), "needs-review");
        assert_eq!(
            serde_json::to_value(CorrectionStatus::NeedsReview).unwrap(),
            json!("needs-review")
        );
        assert_eq!(EventType::Deleted.to_string(), "deleted");
        assert_eq!("modified".parse::<EventType>().unwrap(), EventType::Modified);
    }

    #[test]
    fn test_manual_fix_is_never_pending() {
        let manual = Fix::new(
            "Support multiple projects",
            "Manual review required",
            vec![EditInstruction::Manual {
                reason: "no automated fix".to_string(),
            }],
        );
        assert!(!manual.is_automated());
        assert!(!manual.is_pending());

        let correction = Correction::new("/p/a.py", at(0), BTreeSet::new(), vec![manual], "");
        assert!(!correction.is_pending());
        assert!(correction.has_manual_fixes());
        assert!(!correction.has_automated_fixes());
    }

    #[test]
    fn test_correction_pending_until_all_automated_fixes_applied() {
        let fix = Fix::new(
            "Use consistent indentation",
            "Reindent",
            vec![EditInstruction::Reindent {
                width: 4,
                style: IndentStyle::Spaces,
            }],
        );
        let mut correction = Correction::new("/p/a.py", at(0), BTreeSet::new(), vec![fix], "x");
        assert!(correction.is_pending());

        correction.fixes[0].applied = true;
        assert!(!correction.is_pending());
    }

    #[test]
    fn test_correction_ids_differ_by_time_and_path() {
        let a = Correction::new("/p/a.py", at(0), BTreeSet::new(), vec![], "");
        let b = Correction::new("/p/a.py", at(1), BTreeSet::new(), vec![], "");
        let c = Correction::new("/p/b.py", at(0), BTreeSet::new(), vec![], "");
        assert_ne!(a.id, b.id);
        assert_ne!(a.id, c.id);
        assert_eq!(a.id.len(), 16);
    }

    #[test]
    fn test_optional_verification_fields_are_omitted() {
        let correction = Correction::new("/p/a.py", at(0), BTreeSet::new(), vec![], "");
        let value = serde_json::to_value(&correction).unwrap();
        assert!(value.get("verified_at").is_none());
        assert_eq!(value["status"], "pending");
    }
}
