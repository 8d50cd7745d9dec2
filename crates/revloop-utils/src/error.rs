use std::fmt;
use std::io;
use std::path::PathBuf;
use thiserror::Error;
pub use revloop_lock::LockError;

/// Library-level error type with rich context and user-friendly reporting.
///
/// `RevloopError` is returned by the operations that are allowed to fail
/// outright: configuration loading, starting a watch, acquiring the log
/// directory lock and one-shot CLI corrections. The long-running loops never
/// surface it; they log and continue.
///
/// # Exit Code Mapping
///
/// | Exit Code | Error Type |
/// |-----------|------------|
/// | 2 | Configuration/CLI argument errors |
/// | 3 | Watch setup failures |
/// | 9 | Log directory lock held |
/// | 1 | Other errors |
///
/// # Example
///
/// ```rust
/// use revloop_utils::error::{RevloopError, WatchError};
/// use revloop_utils::exit_codes::ExitCode;
///
/// let err = RevloopError::Watch(WatchError::DirectoryNotFound {
///     path: "missing".into(),
/// });
/// assert_eq!(err.to_exit_code(), ExitCode::WATCH_FAILED);
/// assert!(err.display_for_user().contains("Suggestions:"));
/// ```
#[derive(Error, Debug)]
pub enum RevloopError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Log error: {0}")]
    Log(#[from] LogError),

    #[error("Correction error: {0}")]
    Correction(#[from] CorrectionError),

    #[error("Watch error: {0}")]
    Watch(#[from] WatchError),

    #[error("Log directory lock error: {0}")]
    Lock(#[from] LockError),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Trait for providing user-friendly error reporting with context and suggestions
pub trait UserFriendlyError {
    /// Get a user-friendly error message
    fn user_message(&self) -> String;

    /// Get contextual information about the error
    fn context(&self) -> Option<String>;

    /// Get suggested actions to resolve the error
    fn suggestions(&self) -> Vec<String>;

    /// Get the error category for grouping similar errors
    fn category(&self) -> ErrorCategory;
}

/// Categories of errors for better organization and handling
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    FileSystem,
    Watching,
    Correction,
    Concurrency,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configuration => write!(f, "Configuration"),
            Self::FileSystem => write!(f, "File System"),
            Self::Watching => write!(f, "Watching"),
            Self::Correction => write!(f, "Correction"),
            Self::Concurrency => write!(f, "Concurrency"),
        }
    }
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid configuration file: {0}")]
    InvalidFile(String),

    #[error("Invalid configuration value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("Configuration file not found at {path}")]
    NotFound { path: String },

    #[error("Configuration validation failed: {error_count} errors")]
    ValidationFailed {
        errors: Vec<String>,
        error_count: usize,
    },
}

impl UserFriendlyError for ConfigError {
    fn user_message(&self) -> String {
        match self {
            Self::InvalidFile(reason) => {
                format!("Configuration file has invalid format: {reason}")
            }
            Self::InvalidValue { key, value } => {
                format!("Configuration '{key}' has invalid value: {value}")
            }
            Self::NotFound { path } => format!("Configuration file not found: {path}"),
            Self::ValidationFailed { errors, .. } => format!(
                "Configuration validation failed with {} errors: {}",
                errors.len(),
                errors.join(", ")
            ),
        }
    }

    fn context(&self) -> Option<String> {
        match self {
            Self::InvalidFile(_) => Some(
                "Configuration files are TOML with optional [requirements], [logs], [watch], \
                 [validation] and [timing] sections."
                    .to_string(),
            ),
            Self::InvalidValue { key, .. } => Some(format!(
                "The '{key}' configuration option has specific format requirements."
            )),
            Self::NotFound { .. } => Some(
                "revloop searches upward from the working directory for .revloop/config.toml."
                    .to_string(),
            ),
            Self::ValidationFailed { .. } => None,
        }
    }

    fn suggestions(&self) -> Vec<String> {
        match self {
            Self::InvalidFile(_) => vec![
                "Check the TOML syntax of the configuration file".to_string(),
                "Remove unknown keys or fix their value types".to_string(),
            ],
            Self::InvalidValue { key, .. } => vec![format!(
                "Fix the value of '{key}' in .revloop/config.toml or the matching CLI flag"
            )],
            Self::NotFound { .. } => vec![
                "Pass an existing file with --config".to_string(),
                "Or omit --config to use discovery and built-in defaults".to_string(),
            ],
            Self::ValidationFailed { .. } => {
                vec!["Fix each listed value and run the command again".to_string()]
            }
        }
    }

    fn category(&self) -> ErrorCategory {
        ErrorCategory::Configuration
    }
}

/// Errors raised by the whole-file JSON logs.
#[derive(Error, Debug)]
pub enum LogError {
    #[error("Failed to read log {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Log {path} is not valid JSON: {reason}")]
    Parse { path: PathBuf, reason: String },

    #[error("Failed to serialize log {path}: {reason}")]
    Serialize { path: PathBuf, reason: String },

    #[error("Failed to write log {path}: {reason}")]
    Write { path: PathBuf, reason: String },
}

impl UserFriendlyError for LogError {
    fn user_message(&self) -> String {
        self.to_string()
    }

    fn context(&self) -> Option<String> {
        Some("Logs are rewritten whole on every append.".to_string())
    }

    fn suggestions(&self) -> Vec<String> {
        match self {
            Self::Parse { path, .. } => vec![format!(
                "Move {} aside; a fresh log is started on the next write",
                path.display()
            )],
            _ => vec!["Check permissions and free space for the log directory".to_string()],
        }
    }

    fn category(&self) -> ErrorCategory {
        ErrorCategory::FileSystem
    }
}

/// Errors raised while turning an edit instruction into file content.
///
/// These are recorded on the individual fix rather than propagated; a failed
/// fix never aborts its siblings.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CorrectionError {
    #[error("file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("failed to read {path}: {reason}")]
    Read { path: PathBuf, reason: String },

    #[error("failed to write {path}: {reason}")]
    Write { path: PathBuf, reason: String },

    #[error("invalid substitution pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("insertion line {line} is past the end of a {line_count}-line file")]
    LineOutOfRange { line: usize, line_count: usize },

    #[error("no automated fix for requirement: {requirement}")]
    ManualOnly { requirement: String },
}

impl UserFriendlyError for CorrectionError {
    fn user_message(&self) -> String {
        self.to_string()
    }

    fn context(&self) -> Option<String> {
        match self {
            Self::ManualOnly { .. } => {
                Some("Only indentation, docstring and style fixes are automated.".to_string())
            }
            _ => None,
        }
    }

    fn suggestions(&self) -> Vec<String> {
        match self {
            Self::FileNotFound { .. } => vec!["Check that the file was not moved or deleted".to_string()],
            Self::ManualOnly { .. } => vec!["Edit the file by hand to satisfy the requirement".to_string()],
            Self::InvalidPattern { .. } => vec!["Report the pattern; it was generated internally".to_string()],
            _ => vec!["Run `revloop status` to see the correction log".to_string()],
        }
    }

    fn category(&self) -> ErrorCategory {
        ErrorCategory::Correction
    }
}

/// Errors raised while registering directories with the OS notification layer.
#[derive(Error, Debug)]
pub enum WatchError {
    #[error("Directory not found: {path}")]
    DirectoryNotFound { path: PathBuf },

    #[error("Not a directory: {path}")]
    NotADirectory { path: PathBuf },

    #[error("File notification backend failed: {reason}")]
    Backend { reason: String },
}

impl UserFriendlyError for WatchError {
    fn user_message(&self) -> String {
        self.to_string()
    }

    fn context(&self) -> Option<String> {
        match self {
            Self::Backend { .. } => Some(
                "revloop relies on the platform file notification API (inotify, FSEvents, \
                 ReadDirectoryChangesW)."
                    .to_string(),
            ),
            _ => None,
        }
    }

    fn suggestions(&self) -> Vec<String> {
        match self {
            Self::DirectoryNotFound { .. } | Self::NotADirectory { .. } => {
                vec!["Pass an existing directory to watch".to_string()]
            }
            Self::Backend { .. } => vec![
                "On Linux, raise fs.inotify.max_user_watches if the tree is large".to_string(),
            ],
        }
    }

    fn category(&self) -> ErrorCategory {
        ErrorCategory::Watching
    }
}

impl UserFriendlyError for LockError {
    fn user_message(&self) -> String {
        match self {
            LockError::ConcurrentExecution { log_dir, pid, created_ago } => format!(
                "Another revloop process (PID {pid}) has been writing to {log_dir} for {created_ago}"
            ),
            other => other.to_string(),
        }
    }

    fn context(&self) -> Option<String> {
        Some("Only one revloop process may write to a log directory at a time.".to_string())
    }

    fn suggestions(&self) -> Vec<String> {
        match self {
            LockError::ConcurrentExecution { .. } => vec![
                "Wait for the other process to go idle".to_string(),
                "Use --log-dir to point this run at a different log directory".to_string(),
                "Use --force if the other process is known to be gone".to_string(),
            ],
            LockError::CorruptedLock { .. } => {
                vec!["Remove the .lock file in the log directory".to_string()]
            }
            _ => vec![],
        }
    }

    fn category(&self) -> ErrorCategory {
        ErrorCategory::Concurrency
    }
}

impl UserFriendlyError for RevloopError {
    fn user_message(&self) -> String {
        match self {
            Self::Config(e) => e.user_message(),
            Self::Log(e) => e.user_message(),
            Self::Correction(e) => e.user_message(),
            Self::Watch(e) => e.user_message(),
            Self::Lock(e) => e.user_message(),
            Self::Io(e) => format!("File system operation failed: {e}"),
        }
    }

    fn context(&self) -> Option<String> {
        match self {
            Self::Config(e) => e.context(),
            Self::Log(e) => e.context(),
            Self::Correction(e) => e.context(),
            Self::Watch(e) => e.context(),
            Self::Lock(e) => e.context(),
            Self::Io(_) => None,
        }
    }

    fn suggestions(&self) -> Vec<String> {
        match self {
            Self::Config(e) => e.suggestions(),
            Self::Log(e) => e.suggestions(),
            Self::Correction(e) => e.suggestions(),
            Self::Watch(e) => e.suggestions(),
            Self::Lock(e) => e.suggestions(),
            Self::Io(_) => vec!["Check file permissions and available disk space".to_string()],
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::Config(e) => e.category(),
            Self::Log(e) => e.category(),
            Self::Correction(e) => e.category(),
            Self::Watch(e) => e.category(),
            Self::Lock(e) => e.category(),
            Self::Io(_) => ErrorCategory::FileSystem,
        }
    }
}

impl RevloopError {
    /// Format the error with context and suggestions for terminal output.
    ///
    /// ```text
    /// Error: <user message>
    ///
    /// Context: <context if available>
    ///
    /// Suggestions:
    ///   • <suggestion>
    /// ```
    #[must_use]
    pub fn display_for_user(&self) -> String {
        let mut output = format!("Error: {}\n", self.user_message());

        if let Some(ctx) = self.context() {
            output.push_str(&format!("\nContext: {ctx}\n"));
        }

        let suggestions = self.suggestions();
        if !suggestions.is_empty() {
            output.push_str("\nSuggestions:\n");
            for suggestion in suggestions {
                output.push_str(&format!("  • {suggestion}\n"));
            }
        }

        output
    }

    /// Map this error to the CLI exit code.
    #[must_use]
    pub fn to_exit_code(&self) -> crate::exit_codes::ExitCode {
        use crate::exit_codes::ExitCode;

        match self {
            RevloopError::Config(_) => ExitCode::CLI_ARGS,
            RevloopError::Watch(_) => ExitCode::WATCH_FAILED,
            RevloopError::Lock(_) => ExitCode::LOCK_HELD,
            RevloopError::Log(_) | RevloopError::Correction(_) | RevloopError::Io(_) => {
                ExitCode::INTERNAL
            }
        }
    }
}
