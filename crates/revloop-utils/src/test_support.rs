//! Shared fixtures for unit and integration tests.

use std::path::{Path, PathBuf};

/// Requirements document with both checked sections.
pub const SAMPLE_REQUIREMENTS: &str = "\
# Project Requirements

## Code Style
- Use consistent indentation
- Follow PEP 8 guidelines
- Add docstrings to all functions

## Features
- Implement file watching
- Support multiple projects
- Enable local validation
";

/// Requirements document with only the indentation requirement.
pub const INDENTATION_ONLY: &str = "## Code Style\n- Use consistent indentation\n";

/// Python source indented with 2, 4 and 3 spaces on successive lines.
pub const MIXED_INDENT_SOURCE: &str = "\
def test():
  pass  # 2 spaces
    def inner():  # 4 spaces
   return True  # 3 spaces
";

/// Write `content` to `dir/name` and return the path.
pub fn write_file(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("create fixture parent");
    }
    std::fs::write(&path, content).expect("write fixture");
    path
}
