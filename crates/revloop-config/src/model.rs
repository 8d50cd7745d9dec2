use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub use revloop_model::IndentStyle;

/// Name of the per-project configuration directory.
pub const CONFIG_DIR_NAME: &str = ".revloop";

/// Effective configuration after merging CLI, file and defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory relative paths are resolved against: the project root
    /// holding `.revloop/`, or the discovery start directory
    pub base_dir: PathBuf,
    pub requirements: RequirementsConfig,
    pub logs: LogsConfig,
    pub watch: WatchConfig,
    pub validation: ValidationConfig,
    pub timing: TimingConfig,
    /// Where each effective value came from
    pub source_attribution: HashMap<String, ConfigSource>,
}

impl Config {
    /// Built-in defaults rooted at `base_dir`.
    #[must_use]
    pub fn defaults_at(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            requirements: RequirementsConfig::default(),
            logs: LogsConfig::default(),
            watch: WatchConfig::default(),
            validation: ValidationConfig::default(),
            timing: TimingConfig::default(),
            source_attribution: HashMap::new(),
        }
    }

    /// Absolute path of the requirements document.
    #[must_use]
    pub fn requirements_path(&self) -> PathBuf {
        self.resolve(self.requirements.path.as_std_path())
    }

    /// Absolute path of the log directory.
    #[must_use]
    pub fn log_dir(&self) -> PathBuf {
        self.resolve(self.logs.dir.as_std_path())
    }

    /// Paths of the four JSON logs inside [`log_dir`](Self::log_dir).
    #[must_use]
    pub fn log_paths(&self) -> LogPaths {
        LogPaths::in_dir(&self.log_dir())
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }
}

/// Source of a configuration value for attribution
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    Cli,
    ConfigFile(PathBuf),
    Defaults,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cli => write!(f, "CLI"),
            Self::ConfigFile(path) => write!(f, "config file ({})", path.display()),
            Self::Defaults => write!(f, "defaults"),
        }
    }
}

/// `[requirements]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequirementsConfig {
    pub path: Utf8PathBuf,
}

impl Default for RequirementsConfig {
    fn default() -> Self {
        Self {
            path: Utf8PathBuf::from("docs/requirements.md"),
        }
    }
}

/// `[logs]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogsConfig {
    pub dir: Utf8PathBuf,
}

impl Default for LogsConfig {
    fn default() -> Self {
        Self {
            dir: Utf8PathBuf::from(".revloop/logs"),
        }
    }
}

/// Locations of the JSON logs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogPaths {
    pub dir: PathBuf,
    /// Every change event seen, key `changes`
    pub review_log: PathBuf,
    /// Every validation result, key `validations`
    pub validation_log: PathBuf,
    /// Correction history, key `corrections`
    pub corrections: PathBuf,
    /// Applied and needs-review outcomes, key `corrections`
    pub correction_status: PathBuf,
}

impl LogPaths {
    #[must_use]
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
            review_log: dir.join("review_log.json"),
            validation_log: dir.join("validation_log.json"),
            corrections: dir.join("corrections.json"),
            correction_status: dir.join("correction_status.json"),
        }
    }
}

/// `[watch]`: which paths produce change events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchConfig {
    /// File extensions including the leading dot
    pub extensions: Vec<String>,
    /// Path segment names that exclude everything beneath them
    pub exclude_dirs: Vec<String>,
    /// Glob patterns matched against file names and relative paths
    pub exclude_files: Vec<String>,
    /// When non-empty, only paths under one of these directories pass
    pub include_dirs: Vec<String>,
    /// Skip any path with a segment starting with '.'
    pub ignore_hidden: bool,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            extensions: [".py", ".json", ".md", ".yml", ".yaml"]
                .map(String::from)
                .to_vec(),
            exclude_dirs: [".git", "__pycache__", "node_modules", "venv", "env", ".env"]
                .map(String::from)
                .to_vec(),
            exclude_files: ["*.pyc", "*.pyo", "*.pyd", "*.so", "*.dll", "*.dylib"]
                .map(String::from)
                .to_vec(),
            include_dirs: Vec::new(),
            ignore_hidden: true,
        }
    }
}

/// `[validation]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationConfig {
    pub max_line_length: usize,
    pub indent_size: usize,
    pub indent_style: IndentStyle,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            max_line_length: 100,
            indent_size: 4,
            indent_style: IndentStyle::Spaces,
        }
    }
}

/// `[timing]`: cooldowns, windows and retry policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimingConfig {
    /// Minimum gap between two handled changes of the same file
    pub file_cooldown_secs: u64,
    /// Minimum gap between two successful correction batches
    pub apply_cooldown_secs: u64,
    /// Minimum gap between repeated idle log messages
    pub log_cooldown_secs: u64,
    /// Stop after this long without activity
    pub idle_timeout_secs: u64,
    /// Stop after this many consecutive polls without work
    pub max_empty_polls: u32,
    /// Re-applying or re-verifying the same file within this window is skipped
    pub duplicate_window_secs: u64,
    /// Sleep between monitoring loop iterations
    pub poll_interval_ms: u64,
    /// Sleep between correction attempts
    pub retry_backoff_ms: u64,
    /// Attempts before a correction is marked needs-review
    pub max_retries: u32,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            file_cooldown_secs: 5,
            apply_cooldown_secs: 5,
            log_cooldown_secs: 15,
            idle_timeout_secs: 300,
            max_empty_polls: 5,
            duplicate_window_secs: 2,
            poll_interval_ms: 100,
            retry_backoff_ms: 1000,
            max_retries: 3,
        }
    }
}

impl TimingConfig {
    #[must_use]
    pub const fn file_cooldown(&self) -> Duration {
        Duration::from_secs(self.file_cooldown_secs)
    }

    #[must_use]
    pub const fn apply_cooldown(&self) -> Duration {
        Duration::from_secs(self.apply_cooldown_secs)
    }

    #[must_use]
    pub const fn log_cooldown(&self) -> Duration {
        Duration::from_secs(self.log_cooldown_secs)
    }

    #[must_use]
    pub const fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    #[must_use]
    pub const fn duplicate_window(&self) -> Duration {
        Duration::from_secs(self.duplicate_window_secs)
    }

    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    #[must_use]
    pub const fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}
