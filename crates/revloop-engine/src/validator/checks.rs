//! Per-section requirement checks
//!
//! Checks are heuristics over file text. A requirement whose text is not
//! recognized by its section falls back to keyword overlap.

use once_cell::sync::Lazy;
use regex::Regex;

use revloop_config::ValidationConfig;
use revloop_model::Requirement;

use super::indentation::check_indentation;

static MULTI_IMPORT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*import\s+[\w.]+(\s+as\s+\w+)?\s*,").expect("valid regex"));

const DOC_MARKERS: [&str; 2] = ["\"\"\"", "'''"];

/// Whether `content` satisfies `requirement`.
pub fn requirement_met(requirement: &Requirement, content: &str, config: &ValidationConfig) -> bool {
    let section = requirement.section.to_lowercase();
    let text = requirement.text.to_lowercase();

    let specific = match section.as_str() {
        "code style" => code_style_check(&text, content, config),
        "features" => feature_check(&text, content),
        _ => None,
    };

    specific.unwrap_or_else(|| keyword_overlap(&text, content))
}

fn code_style_check(text: &str, content: &str, config: &ValidationConfig) -> Option<bool> {
    if text.contains("docstring") {
        Some(has_doc_markers(content))
    } else if text.contains("indentation") {
        Some(check_indentation(content).is_ok())
    } else if is_style_guide_text(text) {
        Some(style_guide_issues(content, config.max_line_length).is_empty())
    } else {
        None
    }
}

fn feature_check(text: &str, content: &str) -> Option<bool> {
    let lower = content.to_lowercase();
    if text.contains("file watching") {
        Some(
            ["watchdog", "observer", "file_watcher", "notify"]
                .iter()
                .any(|needle| lower.contains(needle)),
        )
    } else if text.contains("multiple projects") {
        Some(lower.contains("project") && (lower.contains("list") || lower.contains('[')))
    } else if text.contains("local validation") {
        Some(
            ["validate", "check", "verify"]
                .iter()
                .any(|needle| lower.contains(needle)),
        )
    } else {
        None
    }
}

/// True for requirement texts asking for PEP 8 or a style guide.
#[must_use]
pub fn is_style_guide_text(text: &str) -> bool {
    let text = text.to_lowercase();
    text.contains("pep 8") || text.contains("pep8") || text.contains("style guide")
}

/// True when the content carries at least one documentation marker.
#[must_use]
pub fn has_doc_markers(content: &str) -> bool {
    DOC_MARKERS.iter().any(|marker| content.contains(marker))
}

/// True when the trimmed line opens with a documentation marker.
#[must_use]
pub fn is_doc_line(line: &str) -> bool {
    let trimmed = line.trim_start();
    DOC_MARKERS.iter().any(|marker| trimmed.starts_with(marker))
}

/// Style guide violations, one message per offending line.
#[must_use]
pub fn style_guide_issues(content: &str, max_line_length: usize) -> Vec<String> {
    let mut issues = Vec::new();
    for (index, line) in content.lines().enumerate() {
        let number = index + 1;
        let line = line.strip_suffix('\r').unwrap_or(line);
        if line.ends_with([' ', '\t']) {
            issues.push(format!("line {number}: trailing whitespace"));
        }
        if MULTI_IMPORT.is_match(line) {
            issues.push(format!("line {number}: multiple imports on one line"));
        }
        let length = line.chars().count();
        if length > max_line_length {
            issues.push(format!(
                "line {number}: {length} characters exceeds {max_line_length}"
            ));
        }
    }
    issues
}

fn keyword_overlap(text: &str, content: &str) -> bool {
    let lower = content.to_lowercase();
    text.split_whitespace().any(|word| lower.contains(word))
}
