use anyhow::{Context, Result};
use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use revloop_utils::error::ConfigError;

use super::{CONFIG_DIR_NAME, CliArgs, Config, ConfigSource, IndentStyle};

/// TOML configuration file structure
#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
struct TomlConfig {
    requirements: Option<TomlRequirements>,
    logs: Option<TomlLogs>,
    watch: Option<TomlWatch>,
    validation: Option<TomlValidation>,
    timing: Option<TomlTiming>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
struct TomlRequirements {
    path: Option<Utf8PathBuf>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
struct TomlLogs {
    dir: Option<Utf8PathBuf>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
struct TomlWatch {
    extensions: Option<Vec<String>>,
    exclude_dirs: Option<Vec<String>>,
    exclude_files: Option<Vec<String>>,
    include_dirs: Option<Vec<String>>,
    ignore_hidden: Option<bool>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
struct TomlValidation {
    max_line_length: Option<usize>,
    indent_size: Option<usize>,
    indent_style: Option<IndentStyle>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
struct TomlTiming {
    file_cooldown_secs: Option<u64>,
    apply_cooldown_secs: Option<u64>,
    log_cooldown_secs: Option<u64>,
    idle_timeout_secs: Option<u64>,
    max_empty_polls: Option<u32>,
    duplicate_window_secs: Option<u64>,
    poll_interval_ms: Option<u64>,
    retry_backoff_ms: Option<u64>,
    max_retries: Option<u32>,
}

/// Copy `$file.$field` into `$target.$field` when present and record the source.
macro_rules! take {
    ($target:expr, $file:expr, $field:ident, $key:literal, $source:expr, $attribution:expr) => {
        if let Some(value) = $file.$field {
            $target.$field = value;
            $attribution.insert($key.to_string(), $source.clone());
        }
    };
}

const ATTRIBUTED_KEYS: &[&str] = &[
    "requirements.path",
    "logs.dir",
    "watch.extensions",
    "watch.exclude_dirs",
    "watch.exclude_files",
    "watch.include_dirs",
    "watch.ignore_hidden",
    "validation.max_line_length",
    "validation.indent_size",
    "validation.indent_style",
    "timing.file_cooldown_secs",
    "timing.apply_cooldown_secs",
    "timing.log_cooldown_secs",
    "timing.idle_timeout_secs",
    "timing.max_empty_polls",
    "timing.duplicate_window_secs",
    "timing.poll_interval_ms",
    "timing.retry_backoff_ms",
    "timing.max_retries",
];

impl Config {
    /// Discover and load configuration with precedence: CLI > file > defaults
    ///
    /// Uses the current working directory for config file discovery when no
    /// explicit path is provided in `cli_args`.
    pub fn discover(cli_args: &CliArgs) -> Result<Self> {
        let start_dir = std::env::current_dir().context("Failed to get current directory")?;
        Self::discover_from(&start_dir, cli_args)
    }

    /// Discover and load configuration starting from a specific directory
    ///
    /// This is the path-driven variant used by tests to avoid process-global
    /// state.
    pub fn discover_from(start_dir: &Path, cli_args: &CliArgs) -> Result<Self> {
        let config_path = match &cli_args.config_path {
            Some(explicit) => {
                if !explicit.exists() {
                    return Err(ConfigError::NotFound {
                        path: explicit.display().to_string(),
                    }
                    .into());
                }
                Some(explicit.clone())
            }
            None => Self::discover_config_file_from(start_dir)?,
        };

        let base_dir = config_path
            .as_deref()
            .and_then(project_root_of)
            .unwrap_or_else(|| start_dir.to_path_buf());

        let mut config = Config::defaults_at(base_dir);
        for key in ATTRIBUTED_KEYS {
            config
                .source_attribution
                .insert((*key).to_string(), ConfigSource::Defaults);
        }

        if let Some(path) = &config_path {
            let file_config = Self::load_config_file(path)
                .with_context(|| format!("Failed to load config file: {}", path.display()))?;
            config.apply_file(file_config, ConfigSource::ConfigFile(path.clone()));
        }

        config.apply_cli(cli_args)?;
        config.validate()?;

        Ok(config)
    }

    fn apply_file(&mut self, file: TomlConfig, source: ConfigSource) {
        let attribution = &mut self.source_attribution;

        if let Some(section) = file.requirements {
            take!(self.requirements, section, path, "requirements.path", source, attribution);
        }
        if let Some(section) = file.logs {
            take!(self.logs, section, dir, "logs.dir", source, attribution);
        }
        if let Some(section) = file.watch {
            take!(self.watch, section, extensions, "watch.extensions", source, attribution);
            take!(self.watch, section, exclude_dirs, "watch.exclude_dirs", source, attribution);
            take!(self.watch, section, exclude_files, "watch.exclude_files", source, attribution);
            take!(self.watch, section, include_dirs, "watch.include_dirs", source, attribution);
            take!(self.watch, section, ignore_hidden, "watch.ignore_hidden", source, attribution);
        }
        if let Some(section) = file.validation {
            take!(self.validation, section, max_line_length, "validation.max_line_length", source, attribution);
            take!(self.validation, section, indent_size, "validation.indent_size", source, attribution);
            take!(self.validation, section, indent_style, "validation.indent_style", source, attribution);
        }
        if let Some(section) = file.timing {
            take!(self.timing, section, file_cooldown_secs, "timing.file_cooldown_secs", source, attribution);
            take!(self.timing, section, apply_cooldown_secs, "timing.apply_cooldown_secs", source, attribution);
            take!(self.timing, section, log_cooldown_secs, "timing.log_cooldown_secs", source, attribution);
            take!(self.timing, section, idle_timeout_secs, "timing.idle_timeout_secs", source, attribution);
            take!(self.timing, section, max_empty_polls, "timing.max_empty_polls", source, attribution);
            take!(self.timing, section, duplicate_window_secs, "timing.duplicate_window_secs", source, attribution);
            take!(self.timing, section, poll_interval_ms, "timing.poll_interval_ms", source, attribution);
            take!(self.timing, section, retry_backoff_ms, "timing.retry_backoff_ms", source, attribution);
            take!(self.timing, section, max_retries, "timing.max_retries", source, attribution);
        }
    }

    fn apply_cli(&mut self, cli_args: &CliArgs) -> Result<(), ConfigError> {
        if let Some(path) = &cli_args.requirements {
            self.requirements.path = utf8(path, "requirements.path")?;
            self.source_attribution
                .insert("requirements.path".to_string(), ConfigSource::Cli);
        }
        if let Some(dir) = &cli_args.log_dir {
            self.logs.dir = utf8(dir, "logs.dir")?;
            self.source_attribution
                .insert("logs.dir".to_string(), ConfigSource::Cli);
        }
        if let Some(secs) = cli_args.idle_timeout_secs {
            self.timing.idle_timeout_secs = secs;
            self.source_attribution
                .insert("timing.idle_timeout_secs".to_string(), ConfigSource::Cli);
        }
        Ok(())
    }

    /// Search upward from `start_dir` for `.revloop/config.toml`, stopping at
    /// the filesystem root or the first repository root.
    pub fn discover_config_file_from(start_dir: &Path) -> Result<Option<PathBuf>> {
        let mut current_dir = start_dir.to_path_buf();

        loop {
            let config_path = current_dir.join(CONFIG_DIR_NAME).join("config.toml");
            if config_path.exists() {
                return Ok(Some(config_path));
            }

            if current_dir.join(".git").exists()
                || current_dir.join(".hg").exists()
                || current_dir.join(".svn").exists()
            {
                break;
            }

            match current_dir.parent() {
                Some(parent) => current_dir = parent.to_path_buf(),
                None => break,
            }
        }

        Ok(None)
    }

    fn load_config_file(path: &Path) -> Result<TomlConfig> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content)
                .map_err(|e| ConfigError::InvalidFile(format!("{}: {e}", path.display())).into()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(TomlConfig::default()),
            Err(e) => Err(anyhow::anyhow!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            )),
        }
    }
}

/// `<root>/.revloop/config.toml` resolves relative paths against `<root>`;
/// any other config file against its own directory.
fn project_root_of(config_path: &Path) -> Option<PathBuf> {
    let parent = config_path.parent()?;
    if parent.file_name().is_some_and(|name| name == CONFIG_DIR_NAME) {
        parent.parent().map(Path::to_path_buf)
    } else {
        Some(parent.to_path_buf())
    }
}

fn utf8(path: &Path, key: &str) -> Result<Utf8PathBuf, ConfigError> {
    Utf8PathBuf::from_path_buf(path.to_path_buf()).map_err(|p| ConfigError::InvalidValue {
        key: key.to_string(),
        value: format!("path is not valid UTF-8: {}", p.display()),
    })
}
