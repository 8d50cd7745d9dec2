use globset::Glob;

use revloop_utils::error::ConfigError;

use super::Config;

impl Config {
    /// Reject values the engine cannot work with. All problems are reported
    /// together.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();

        if self.validation.indent_size == 0 || self.validation.indent_size > 16 {
            errors.push(format!(
                "validation.indent_size must be between 1 and 16, got {}",
                self.validation.indent_size
            ));
        }
        if self.validation.max_line_length == 0 {
            errors.push("validation.max_line_length must be greater than 0".to_string());
        }
        if self.timing.max_retries == 0 {
            errors.push("timing.max_retries must be at least 1".to_string());
        }
        if self.timing.max_empty_polls == 0 {
            errors.push("timing.max_empty_polls must be at least 1".to_string());
        }
        if self.timing.poll_interval_ms == 0 {
            errors.push("timing.poll_interval_ms must be greater than 0".to_string());
        }
        if self.timing.idle_timeout_secs == 0 {
            errors.push("timing.idle_timeout_secs must be greater than 0".to_string());
        }
        for ext in &self.watch.extensions {
            if !ext.starts_with('.') || ext.len() < 2 {
                errors.push(format!(
                    "watch.extensions entries need a leading dot, got '{ext}'"
                ));
            }
        }
        for pattern in &self.watch.exclude_files {
            if let Err(e) = Glob::new(pattern) {
                errors.push(format!("watch.exclude_files pattern '{pattern}' is invalid: {e}"));
            }
        }
        if self.requirements.path.as_str().is_empty() {
            errors.push("requirements.path must not be empty".to_string());
        }

        match errors.len() {
            0 => Ok(()),
            1 => {
                let message = errors.remove(0);
                let key = message
                    .split_whitespace()
                    .next()
                    .unwrap_or_default()
                    .to_string();
                Err(ConfigError::InvalidValue {
                    key,
                    value: message,
                })
            }
            error_count => Err(ConfigError::ValidationFailed {
                errors,
                error_count,
            }),
        }
    }
}
