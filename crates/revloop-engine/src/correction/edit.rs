//! Text transformations behind edit instructions
//!
//! Every transformation is a pure function of the file text. Line endings
//! of existing lines are preserved; inserted lines use the file's dominant
//! ending.

use regex::Regex;
use std::path::Path;

use revloop_model::{EditInstruction, Fix, IndentStyle};
use revloop_utils::atomic_write::write_file_atomic;
use revloop_utils::content::ReadOutcome;
use revloop_utils::error::CorrectionError;

use crate::validator::indentation::{check_indentation, leading_whitespace};

/// Apply `edits` to `content`. Insertions are grouped and spliced in
/// descending line order so planned indices stay valid.
pub fn apply_edits(content: &str, edits: &[EditInstruction]) -> Result<String, CorrectionError> {
    let mut text = content.to_string();
    let mut inserts: Vec<(usize, &str)> = Vec::new();

    for edit in edits {
        match edit {
            EditInstruction::Reindent { width, style } => {
                text = reindent(&text, *width, *style);
            }
            EditInstruction::Insert { line, text: line_text } => {
                inserts.push((*line, line_text.as_str()));
            }
            EditInstruction::Substitute {
                pattern,
                replacement,
            } => {
                text = substitute(&text, pattern, replacement)?;
            }
            EditInstruction::Manual { reason } => {
                return Err(CorrectionError::ManualOnly {
                    requirement: reason.clone(),
                });
            }
        }
    }

    if !inserts.is_empty() {
        text = insert_lines(&text, &inserts)?;
    }
    Ok(text)
}

/// Read the target, apply the fix and write the result back atomically.
/// Unchanged content is not rewritten.
pub fn apply_fix(path: &Path, fix: &Fix) -> Result<(), CorrectionError> {
    let content = match ReadOutcome::read(path) {
        ReadOutcome::Content(content) => content,
        ReadOutcome::NotFound => {
            return Err(CorrectionError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
        ReadOutcome::IoError(reason) => {
            return Err(CorrectionError::Read {
                path: path.to_path_buf(),
                reason,
            });
        }
    };

    let updated = apply_edits(&content, &fix.edit_instructions)?;
    if updated != content {
        write_file_atomic(path, &updated).map_err(|e| CorrectionError::Write {
            path: path.to_path_buf(),
            reason: format!("{e:#}"),
        })?;
    }
    Ok(())
}

/// Rewrite leading whitespace to whole multiples of one unit.
///
/// Content that already passes the indentation check is returned as is.
/// Otherwise each indented line's width (a tab counts as `width` columns)
/// is rounded to the nearest level, half up, and the shallowest indented
/// level becomes level one.
#[must_use]
pub fn reindent(content: &str, width: usize, style: IndentStyle) -> String {
    if check_indentation(content).is_ok() || width == 0 {
        return content.to_string();
    }
    let unit = style.unit(width);

    let levels: Vec<Option<usize>> = content
        .split_inclusive('\n')
        .map(|line| {
            let (body, _) = split_ending(line);
            if body.trim().is_empty() {
                return None;
            }
            let columns: usize = leading_whitespace(body)
                .chars()
                .map(|c| if c == '\t' { width } else { 1 })
                .sum();
            Some((columns + width / 2) / width)
        })
        .collect();

    let shift = levels
        .iter()
        .flatten()
        .copied()
        .filter(|level| *level > 0)
        .min()
        .map_or(0, |min| min - 1);

    let mut out = String::with_capacity(content.len());
    for (line, level) in content.split_inclusive('\n').zip(levels) {
        let Some(level) = level else {
            out.push_str(line);
            continue;
        };
        let (body, ending) = split_ending(line);
        let level = if level > 0 { level - shift } else { 0 };
        out.push_str(&unit.repeat(level));
        out.push_str(body.trim_start_matches([' ', '\t']));
        out.push_str(ending);
    }
    out
}

/// Insert each `(index, text)` as a new line before the 0-based line
/// `index`. An index equal to the line count appends.
pub fn insert_lines(content: &str, inserts: &[(usize, &str)]) -> Result<String, CorrectionError> {
    let newline = if content.contains("\r\n") { "\r\n" } else { "\n" };
    let mut lines: Vec<String> = content.split_inclusive('\n').map(str::to_string).collect();
    let line_count = lines.len();

    let mut ordered = inserts.to_vec();
    ordered.sort_by(|a, b| b.0.cmp(&a.0));

    for (index, text) in ordered {
        if index > line_count {
            return Err(CorrectionError::LineOutOfRange {
                line: index,
                line_count,
            });
        }
        if index == lines.len()
            && let Some(last) = lines.last_mut()
            && !last.ends_with('\n')
        {
            last.push_str(newline);
        }
        lines.insert(index, format!("{text}{newline}"));
    }
    Ok(lines.concat())
}

/// Regex substitution over the whole text.
pub fn substitute(content: &str, pattern: &str, replacement: &str) -> Result<String, CorrectionError> {
    let regex = Regex::new(pattern).map_err(|e| CorrectionError::InvalidPattern {
        pattern: pattern.to_string(),
        reason: e.to_string(),
    })?;
    Ok(regex.replace_all(content, replacement).into_owned())
}

fn split_ending(line: &str) -> (&str, &str) {
    if let Some(body) = line.strip_suffix("\r\n") {
        (body, "\r\n")
    } else if let Some(body) = line.strip_suffix('\n') {
        (body, "\n")
    } else {
        (line, "")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use revloop_utils::test_support::MIXED_INDENT_SOURCE;

    #[test]
    fn test_reindent_mixed_source_to_four_spaces() {
        let out = reindent(MIXED_INDENT_SOURCE, 4, IndentStyle::Spaces);
        assert_eq!(
            out,
            "def test():\n    pass  # 2 spaces\n    def inner():  # 4 spaces\n    return True  # 3 spaces\n"
        );
        assert!(check_indentation(&out).is_ok());
    }

    #[test]
    fn test_reindent_leaves_consistent_content_untouched() {
        let src = "def f():\n  if x:\n    return 1\n";
        assert_eq!(reindent(src, 4, IndentStyle::Spaces), src);
    }

    #[test]
    fn test_reindent_to_tabs_preserves_crlf() {
        let src = "if a:\r\n    b\r\n      c\r\n";
        assert_eq!(reindent(src, 4, IndentStyle::Tabs), "if a:\r\n\tb\r\n\t\tc\r\n");
    }

    #[test]
    fn test_reindent_shifts_shallowest_level_to_one() {
        let src = "a\n        b\n            c\n";
        let out = reindent(src, 4, IndentStyle::Spaces);
        assert_eq!(out, "a\n    b\n        c\n");
    }

    #[test]
    fn test_insert_lines_descending() {
        let out = insert_lines("a\nb\nc\n", &[(1, "x"), (3, "y")]).unwrap();
        assert_eq!(out, "a\nx\nb\nc\ny\n");
    }

    #[test]
    fn test_insert_at_end_without_trailing_newline() {
        let out = insert_lines("a\nb", &[(2, "c")]).unwrap();
        assert_eq!(out, "a\nb\nc\n");
    }

    #[test]
    fn test_insert_out_of_range() {
        match insert_lines("a\n", &[(5, "x")]) {
            Err(CorrectionError::LineOutOfRange { line: 5, line_count: 1 }) => {}
            other => panic!("Expected LineOutOfRange, got: {other:?}"),
        }
    }

    #[test]
    fn test_substitute_strips_trailing_whitespace() {
        let out = substitute("a = 1  \r\nb = 2\t\n", r"(?m)[ \t]+(\r?)$", "$1").unwrap();
        assert_eq!(out, "a = 1\r\nb = 2\n");
    }

    #[test]
    fn test_invalid_pattern_is_reported() {
        match substitute("x", "(", "") {
            Err(CorrectionError::InvalidPattern { pattern, .. }) => assert_eq!(pattern, "("),
            other => panic!("Expected InvalidPattern, got: {other:?}"),
        }
    }

    #[test]
    fn test_manual_edit_is_rejected() {
        let edits = [EditInstruction::Manual {
            reason: "Support multiple projects".to_string(),
        }];
        match apply_edits("x\n", &edits) {
            Err(CorrectionError::ManualOnly { requirement }) => {
                assert_eq!(requirement, "Support multiple projects");
            }
            other => panic!("Expected ManualOnly, got: {other:?}"),
        }
    }

    fn indented_source() -> impl Strategy<Value = String> {
        let line = (prop::collection::vec(prop_oneof![Just(' '), Just('\t')], 0..10), "[a-z]{0,5}")
            .prop_map(|(ws, body)| format!("{}{}\n", ws.into_iter().collect::<String>(), body));
        prop::collection::vec(line, 0..20).prop_map(|lines| lines.concat())
    }

    proptest! {
        #[test]
        fn prop_reindent_output_is_consistent_and_stable(
            src in indented_source(),
            width in 1usize..9,
            tabs in any::<bool>(),
        ) {
            let style = if tabs { IndentStyle::Tabs } else { IndentStyle::Spaces };
            let once = reindent(&src, width, style);
            prop_assert!(check_indentation(&once).is_ok());
            prop_assert_eq!(reindent(&once, width, style), once);
        }

        #[test]
        fn prop_reindent_is_noop_on_consistent_files(
            levels in prop::collection::vec(0usize..5, 1..20),
        ) {
            let src: String = std::iter::once("    head\n".to_string())
                .chain(levels.iter().map(|level| format!("{}x\n", "    ".repeat(*level))))
                .collect();
            prop_assert_eq!(reindent(&src, 4, IndentStyle::Spaces), src);
        }
    }
}
