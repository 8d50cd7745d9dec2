//! Fix planning: one fix per unmet requirement, planned against the
//! file's current content.

use once_cell::sync::Lazy;
use regex::Regex;

use revloop_config::ValidationConfig;
use revloop_model::{EditInstruction, Fix};

use crate::validator::checks::{is_doc_line, is_style_guide_text};

static DEF_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\s*)(?:async\s+)?def\s+(\w+)\s*\(").expect("valid regex"));

/// Pattern removing trailing spaces and tabs while keeping CRLF endings.
pub const TRAILING_WHITESPACE: &str = r"(?m)[ \t]+(\r?)$";

/// Signature lines scanned for the closing `:` of a definition.
const MAX_SIGNATURE_LINES: usize = 10;

/// Plan the fix for one requirement.
#[must_use]
pub fn plan_fix(requirement: &str, content: &str, config: &ValidationConfig) -> Fix {
    let lower = requirement.to_lowercase();

    if lower.contains("indentation") {
        Fix::new(
            requirement,
            "Fix inconsistent indentation",
            vec![EditInstruction::Reindent {
                width: config.indent_size,
                style: config.indent_style,
            }],
        )
    } else if lower.contains("docstring") {
        let inserts = plan_docstrings(content, config);
        if inserts.is_empty() {
            Fix::new(
                requirement,
                format!("Manual review required: {requirement}"),
                vec![EditInstruction::Manual {
                    reason: "no undocumented function found".to_string(),
                }],
            )
        } else {
            Fix::new(requirement, "Add missing docstrings", inserts)
        }
    } else if is_style_guide_text(&lower) {
        Fix::new(
            requirement,
            "Remove trailing whitespace",
            vec![EditInstruction::Substitute {
                pattern: TRAILING_WHITESPACE.to_string(),
                replacement: "$1".to_string(),
            }],
        )
    } else {
        Fix::new(
            requirement,
            format!("Manual review required: {requirement}"),
            vec![EditInstruction::Manual {
                reason: format!("no automated fix for '{requirement}'"),
            }],
        )
    }
}

/// One insertion per function definition without a docstring. The
/// docstring becomes the first line of the body, one level deeper than the
/// definition.
#[must_use]
pub fn plan_docstrings(content: &str, config: &ValidationConfig) -> Vec<EditInstruction> {
    let lines: Vec<&str> = content.lines().collect();
    let mut edits = Vec::new();

    for (index, line) in lines.iter().enumerate() {
        let Some(caps) = DEF_LINE.captures(line) else {
            continue;
        };
        let indent = caps.get(1).map_or("", |m| m.as_str());
        let name = caps.get(2).map_or("", |m| m.as_str());

        let Some(signature_end) = signature_end(&lines, index) else {
            continue;
        };
        let documented = previous_non_blank(&lines, index).is_some_and(is_doc_line)
            || next_non_blank(&lines, signature_end + 1).is_some_and(is_doc_line);
        if documented {
            continue;
        }

        let unit = if indent.contains('\t') {
            "\t".to_string()
        } else {
            config.indent_style.unit(config.indent_size)
        };
        edits.push(EditInstruction::Insert {
            line: signature_end + 1,
            text: format!("{indent}{unit}\"\"\"Add docstring for {name}.\"\"\""),
        });
    }

    edits
}

/// Index of the line closing the signature that starts at `start`, or None
/// for one-line bodies and signatures that never close.
fn signature_end(lines: &[&str], start: usize) -> Option<usize> {
    let mut depth: i64 = 0;
    for (index, line) in lines.iter().enumerate().skip(start).take(MAX_SIGNATURE_LINES) {
        let code = line.split('#').next().unwrap_or_default();
        for c in code.chars() {
            match c {
                '(' | '[' | '{' => depth += 1,
                ')' | ']' | '}' => depth -= 1,
                _ => {}
            }
        }
        if depth <= 0 {
            return code.trim_end().ends_with(':').then_some(index);
        }
    }
    None
}

fn previous_non_blank<'a>(lines: &[&'a str], index: usize) -> Option<&'a str> {
    lines[..index].iter().rev().find(|l| !l.trim().is_empty()).copied()
}

fn next_non_blank<'a>(lines: &[&'a str], from: usize) -> Option<&'a str> {
    lines.get(from..)?.iter().find(|l| !l.trim().is_empty()).copied()
}

#[cfg(test)]
mod tests {
    use super::*;
    use revloop_utils::test_support::MIXED_INDENT_SOURCE;

    fn config() -> ValidationConfig {
        ValidationConfig::default()
    }

    #[test]
    fn test_docstrings_for_each_def() {
        let edits = plan_docstrings(MIXED_INDENT_SOURCE, &config());
        assert_eq!(
            edits,
            vec![
                EditInstruction::Insert {
                    line: 1,
                    text: "    \"\"\"Add docstring for test.\"\"\"".to_string(),
                },
                EditInstruction::Insert {
                    line: 3,
                    text: "        \"\"\"Add docstring for inner.\"\"\"".to_string(),
                },
            ]
        );
    }

    #[test]
    fn test_documented_defs_are_skipped() {
        let src = "def a():\n    \"\"\"Doc.\"\"\"\n    pass\n\n'''Doc for b.'''\ndef b():\n    pass\n";
        assert!(plan_docstrings(src, &config()).is_empty());
    }

    #[test]
    fn test_multiline_signature_and_async() {
        let src = "async def fetch(\n    url,\n    timeout,\n):  # io\n    return url\n";
        assert_eq!(
            plan_docstrings(src, &config()),
            vec![EditInstruction::Insert {
                line: 4,
                text: "    \"\"\"Add docstring for fetch.\"\"\"".to_string(),
            }]
        );
    }

    #[test]
    fn test_one_line_body_is_skipped() {
        assert!(plan_docstrings("def f(): return 1\n", &config()).is_empty());
    }

    #[test]
    fn test_tab_indented_def_uses_tab() {
        let src = "class A:\n\tdef m(self):\n\t\tpass\n";
        assert_eq!(
            plan_docstrings(src, &config()),
            vec![EditInstruction::Insert {
                line: 2,
                text: "\t\t\"\"\"Add docstring for m.\"\"\"".to_string(),
            }]
        );
    }

    #[test]
    fn test_fix_kinds_by_requirement_text() {
        let cfg = config();
        assert!(matches!(
            plan_fix("Use consistent indentation", "", &cfg).edit_instructions.as_slice(),
            [EditInstruction::Reindent { width: 4, .. }]
        ));
        assert!(matches!(
            plan_fix("Follow PEP 8 guidelines", "", &cfg).edit_instructions.as_slice(),
            [EditInstruction::Substitute { .. }]
        ));

        let manual = plan_fix("Support multiple projects", "", &cfg);
        assert!(!manual.is_automated());
        assert_eq!(manual.requirement, "Support multiple projects");
    }

    #[test]
    fn test_docstring_fix_without_functions_is_manual() {
        let fix = plan_fix("Add docstrings to all functions", "x = 1\n", &config());
        assert!(!fix.is_automated());
        assert!(!fix.is_pending());
        assert!(matches!(
            fix.edit_instructions.as_slice(),
            [EditInstruction::Manual { reason }] if reason == "no undocumented function found"
        ));

        let fix = plan_fix("Add docstrings to all functions", "def f():\n    pass\n", &config());
        assert!(fix.is_automated());
        assert_eq!(fix.edit_instructions.len(), 1);
    }
}
