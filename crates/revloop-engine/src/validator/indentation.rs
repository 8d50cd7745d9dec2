//! Indentation consistency
//!
//! A file is consistently indented when every indented line's leading
//! whitespace is made of one character and is a whole multiple of the
//! shortest such run in the file.

use std::fmt;

/// Why a file fails the indentation check. Line numbers are 1-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndentIssue {
    /// Tabs and spaces in the same leading run
    MixedRun { line: usize },
    /// Run length is not a multiple of the unit
    NotMultiple { line: usize, width: usize, unit: usize },
    /// Run uses a different character than the unit
    WrongCharacter { line: usize },
}

impl fmt::Display for IndentIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MixedRun { line } => write!(f, "line {line} mixes tabs and spaces"),
            Self::NotMultiple { line, width, unit } => write!(
                f,
                "line {line} is indented by {width}, not a multiple of {unit}"
            ),
            Self::WrongCharacter { line } => {
                write!(f, "line {line} indents with a different character")
            }
        }
    }
}

/// Leading run of spaces and tabs.
#[must_use]
pub fn leading_whitespace(line: &str) -> &str {
    let end = line
        .find(|c: char| c != ' ' && c != '\t')
        .unwrap_or(line.len());
    &line[..end]
}

/// Check `content` for consistent indentation.
pub fn check_indentation(content: &str) -> Result<(), IndentIssue> {
    let mut runs: Vec<(usize, &str)> = Vec::new();

    for (index, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let run = leading_whitespace(line);
        if run.is_empty() {
            continue;
        }
        if run.contains(' ') && run.contains('\t') {
            return Err(IndentIssue::MixedRun { line: index + 1 });
        }
        runs.push((index + 1, run));
    }

    let Some(&(_, base)) = runs.iter().min_by_key(|(_, run)| run.len()) else {
        return Ok(());
    };
    let unit_char = base.as_bytes()[0];

    for &(line, run) in &runs {
        if run.as_bytes()[0] != unit_char {
            return Err(IndentIssue::WrongCharacter { line });
        }
        if run.len() % base.len() != 0 {
            return Err(IndentIssue::NotMultiple {
                line,
                width: run.len(),
                unit: base.len(),
            });
        }
    }

    Ok(())
}
