//! Common helper functions used across CLI commands

use anyhow::{Context, Result};
use camino::Utf8PathBuf;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use revloop_lock::LogDirLock;
use revloop_utils::error::{ConfigError, RevloopError};

use crate::{Config, Pipeline, SystemClock};

/// Pipeline on the wall clock, as every command runs it.
#[must_use]
pub fn system_pipeline(config: &Config) -> Pipeline {
    Pipeline::new(config.clone(), Arc::new(SystemClock))
}

/// Take the single-writer lock on the configured log directory.
///
/// Held for the lifetime of the returned guard.
pub fn acquire_log_lock(config: &Config, command: &str, force: bool) -> Result<LogDirLock> {
    let log_dir = Utf8PathBuf::from_path_buf(config.log_dir()).map_err(|path| {
        RevloopError::Config(ConfigError::InvalidValue {
            key: "logs.dir".to_string(),
            value: format!("path is not valid UTF-8: {}", path.display()),
        })
    })?;
    let lock = LogDirLock::acquire(&log_dir, command, force).map_err(RevloopError::from)?;
    tracing::debug!(log_dir = %log_dir, command, "Acquired log directory lock");
    Ok(lock)
}

/// Absolute form of a user-supplied path: canonical when it exists, joined
/// to the working directory otherwise.
///
/// Corrections are keyed by path, so the CLI and the watcher must agree on
/// one spelling per file.
pub fn absolute_path(path: &Path) -> Result<PathBuf> {
    if let Ok(canonical) = path.canonicalize() {
        return Ok(canonical);
    }
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    let cwd = std::env::current_dir().context("Failed to get current directory")?;
    Ok(cwd.join(path))
}
