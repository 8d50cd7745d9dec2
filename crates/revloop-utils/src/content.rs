//! Reading target files without treating absence as an error.

use std::io;
use std::path::Path;

/// Outcome of reading a target file.
///
/// Absence is an ordinary state in a watcher: a file can be deleted between
/// the notification and the read. Callers decide per case whether `NotFound`
/// means "empty content" or "nothing to do".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    Content(String),
    NotFound,
    IoError(String),
}

impl ReadOutcome {
    /// Read `path` as UTF-8. Invalid UTF-8 is reported as an I/O error.
    pub fn read(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => Self::Content(content),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Self::NotFound,
            Err(e) => Self::IoError(e.to_string()),
        }
    }
}

/// First 16 hex characters of the BLAKE3 hash of `content`.
#[must_use]
pub fn content_hash(content: &str) -> String {
    let hash = blake3::hash(content.as_bytes());
    hash.to_hex()[..16].to_string()
}
