use std::path::PathBuf;

/// CLI values that take precedence over the config file.
#[derive(Debug, Clone, Default)]
pub struct CliArgs {
    /// Explicit config file (skips discovery)
    pub config_path: Option<PathBuf>,
    pub requirements: Option<PathBuf>,
    pub log_dir: Option<PathBuf>,
    pub idle_timeout_secs: Option<u64>,
    pub verbose: Option<bool>,
}
