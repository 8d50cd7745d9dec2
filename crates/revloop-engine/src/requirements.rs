//! Requirements document loading
//!
//! The document is markdown, but only two constructs are interpreted:
//! `##` headers open a section and `- ` bullets beneath a section become
//! requirements. Everything else is ignored.

use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::SystemTime;
use tracing::{debug, warn};

use revloop_model::Requirement;
use revloop_utils::content::ReadOutcome;

/// Parse requirements out of a markdown document.
#[must_use]
pub fn parse_requirements(markdown: &str) -> Vec<Requirement> {
    let mut requirements = Vec::new();
    let mut section: Option<String> = None;

    for line in markdown.lines() {
        let line = line.trim();
        if line.starts_with("##") {
            let name = line.trim_start_matches('#').trim();
            section = (!name.is_empty()).then(|| name.to_string());
        } else if let Some(text) = line.strip_prefix("- ")
            && let Some(section) = &section
        {
            let text = text.trim();
            if !text.is_empty() {
                requirements.push(Requirement::new(section.clone(), text));
            }
        }
    }

    requirements
}

/// Loads the requirements document, caching the parse until its mtime changes.
#[derive(Debug)]
pub struct RequirementStore {
    path: PathBuf,
    cache: Mutex<Option<(SystemTime, Vec<Requirement>)>>,
}

impl RequirementStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cache: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current requirements. A missing, unreadable or empty document yields
    /// an empty list.
    pub fn load(&self) -> Vec<Requirement> {
        let modified = std::fs::metadata(&self.path)
            .and_then(|meta| meta.modified())
            .ok();

        let mut cache = self
            .cache
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        if let (Some(modified), Some((cached_at, cached))) = (modified, cache.as_ref())
            && *cached_at == modified
        {
            return cached.clone();
        }

        let requirements = match ReadOutcome::read(&self.path) {
            ReadOutcome::Content(content) => parse_requirements(&content),
            ReadOutcome::NotFound => {
                warn!(path = %self.path.display(), "Requirements document not found");
                Vec::new()
            }
            ReadOutcome::IoError(reason) => {
                warn!(path = %self.path.display(), error = %reason, "Failed to read requirements document");
                Vec::new()
            }
        };

        debug!(path = %self.path.display(), count = requirements.len(), "Loaded requirements");
        *cache = modified.map(|at| (at, requirements.clone()));
        requirements
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use revloop_utils::test_support::{SAMPLE_REQUIREMENTS, write_file};
    use tempfile::TempDir;

    #[test]
    fn test_parses_sections_and_bullets() {
        let requirements = parse_requirements(SAMPLE_REQUIREMENTS);

        assert_eq!(requirements.len(), 6);
        assert_eq!(
            requirements[0],
            Requirement::new("Code Style", "Use consistent indentation")
        );
        assert_eq!(
            requirements[5],
            Requirement::new("Features", "Enable local validation")
        );
    }

    #[test]
    fn test_bullets_before_any_section_are_ignored() {
        let requirements = parse_requirements("# Title\n- orphan\n## Docs\n- kept\n");
        assert_eq!(requirements, vec![Requirement::new("Docs", "kept")]);
    }

    #[test]
    fn test_deeper_headers_open_sections_too() {
        let requirements = parse_requirements("### Nested Section\n- item\n");
        assert_eq!(requirements, vec![Requirement::new("Nested Section", "item")]);
    }

    #[test]
    fn test_other_markdown_is_ignored() {
        let doc = "## Code Style\n\nSome prose.\n* star bullet\n  - indented bullet\n1. numbered\n";
        let requirements = parse_requirements(doc);
        assert_eq!(
            requirements,
            vec![Requirement::new("Code Style", "indented bullet")]
        );
    }

    #[test]
    fn test_missing_document_is_empty() {
        let temp = TempDir::new().unwrap();
        let store = RequirementStore::new(temp.path().join("absent.md"));
        assert!(store.load().is_empty());
    }

    #[test]
    fn test_reload_after_edit() {
        let temp = TempDir::new().unwrap();
        let path = write_file(temp.path(), "reqs.md", "## A\n- one\n");
        let store = RequirementStore::new(&path);
        assert_eq!(store.load().len(), 1);

        std::fs::write(&path, "## A\n- one\n- two\n").unwrap();
        // Force a distinct mtime on coarse-grained filesystems.
        let later = SystemTime::now() + std::time::Duration::from_secs(5);
        std::fs::File::options()
            .write(true)
            .open(&path)
            .unwrap()
            .set_modified(later)
            .unwrap();

        assert_eq!(store.load().len(), 2);
    }
}
