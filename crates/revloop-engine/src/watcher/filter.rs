//! Path filtering for watched trees
//!
//! Paths are judged relative to the watched root, so a root that itself
//! lives under a hidden or excluded directory is still watched. Absolute
//! exclusions (the log directory) are matched against resolved paths.

use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::{Component, Path, PathBuf};
use tracing::warn;

use revloop_config::WatchConfig;

#[derive(Debug, Clone)]
pub struct WatchFilter {
    extensions: Vec<String>,
    exclude_dirs: Vec<String>,
    exclude_files: GlobSet,
    include_dirs: Vec<PathBuf>,
    ignore_hidden: bool,
    excluded_trees: Vec<PathBuf>,
}

impl WatchFilter {
    /// Build a filter from configuration. Invalid globs are skipped with a
    /// warning; configuration validation rejects them earlier.
    #[must_use]
    pub fn from_config(config: &WatchConfig) -> Self {
        let mut builder = GlobSetBuilder::new();
        for pattern in &config.exclude_files {
            match Glob::new(pattern) {
                Ok(glob) => {
                    builder.add(glob);
                }
                Err(e) => warn!(pattern = %pattern, error = %e, "Ignoring invalid exclude pattern"),
            }
        }
        let exclude_files = builder.build().unwrap_or_else(|e| {
            warn!(error = %e, "Failed to build exclude patterns, excluding nothing");
            GlobSet::empty()
        });

        Self {
            extensions: config
                .extensions
                .iter()
                .map(|ext| ext.to_lowercase())
                .collect(),
            exclude_dirs: config.exclude_dirs.clone(),
            exclude_files,
            include_dirs: config.include_dirs.iter().map(PathBuf::from).collect(),
            ignore_hidden: config.ignore_hidden,
            excluded_trees: Vec::new(),
        }
    }

    /// Exclude everything under `dir`, which need not exist yet.
    #[must_use]
    pub fn excluding_tree(mut self, dir: &Path) -> Self {
        let resolved = resolve_lenient(dir);
        if !self.excluded_trees.contains(&resolved) {
            self.excluded_trees.push(resolved);
        }
        self
    }

    /// Whether an absolute event path lies under an excluded tree.
    #[must_use]
    pub fn excludes(&self, absolute: &Path) -> bool {
        self.excluded_trees
            .iter()
            .any(|tree| absolute.starts_with(tree))
    }

    /// Whether a path relative to its watched root should be reported.
    #[must_use]
    pub fn accepts(&self, relative: &Path) -> bool {
        let Some(name) = relative.file_name().and_then(|n| n.to_str()) else {
            return false;
        };

        if !self.extensions.is_empty() {
            let extension = relative
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| format!(".{}", e.to_lowercase()));
            match extension {
                Some(ext) if self.extensions.contains(&ext) => {}
                _ => return false,
            }
        }

        if self.ignore_hidden && name.starts_with('.') {
            return false;
        }

        if let Some(parent) = relative.parent() {
            for component in parent.components() {
                let Component::Normal(segment) = component else {
                    continue;
                };
                let segment = segment.to_string_lossy();
                if self.exclude_dirs.iter().any(|dir| *dir == segment) {
                    return false;
                }
                if self.ignore_hidden && segment.starts_with('.') {
                    return false;
                }
            }
        }

        if self.exclude_files.is_match(name) || self.exclude_files.is_match(relative) {
            return false;
        }

        self.include_dirs.is_empty()
            || self.include_dirs.iter().any(|dir| relative.starts_with(dir))
    }
}

/// Canonicalize the deepest existing ancestor of `path` and re-append the
/// missing tail, so a directory created later still matches event paths.
fn resolve_lenient(path: &Path) -> PathBuf {
    let mut existing = path;
    let mut tail = Vec::new();
    loop {
        if let Ok(resolved) = existing.canonicalize() {
            return tail.iter().rev().fold(resolved, |acc, part| acc.join(part));
        }
        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                tail.push(name.to_os_string());
                existing = parent;
            }
            _ => return path.to_path_buf(),
        }
    }
}

impl Default for WatchFilter {
    fn default() -> Self {
        Self::from_config(&WatchConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter() {
        let filter = WatchFilter::default();
        assert!(filter.accepts(Path::new("src/app.py")));
        assert!(filter.accepts(Path::new("docs/README.MD")));
        assert!(!filter.accepts(Path::new("src/app.rs")));
        assert!(!filter.accepts(Path::new("Makefile")));
        assert!(!filter.accepts(Path::new("__pycache__/app.py")));
        assert!(!filter.accepts(Path::new("pkg/node_modules/x/index.json")));
        assert!(!filter.accepts(Path::new(".git/config.yml")));
        assert!(!filter.accepts(Path::new("src/.hidden.py")));
    }

    #[test]
    fn test_exclude_globs_and_include_dirs() {
        let config = WatchConfig {
            extensions: Vec::new(),
            exclude_files: vec!["*.pyc".to_string(), "generated_*".to_string()],
            include_dirs: vec!["src".to_string()],
            ..WatchConfig::default()
        };
        let filter = WatchFilter::from_config(&config);

        assert!(filter.accepts(Path::new("src/main.py")));
        assert!(filter.accepts(Path::new("src/Makefile")));
        assert!(!filter.accepts(Path::new("src/main.pyc")));
        assert!(!filter.accepts(Path::new("src/generated_api.py")));
        assert!(!filter.accepts(Path::new("tests/test_main.py")));
    }

    #[test]
    fn test_hidden_allowed_when_configured() {
        let config = WatchConfig {
            ignore_hidden: false,
            ..WatchConfig::default()
        };
        let filter = WatchFilter::from_config(&config);
        assert!(filter.accepts(Path::new(".config/settings.json")));
        assert!(!filter.accepts(Path::new(".git/settings.json")));
    }

    #[test]
    fn test_excluded_tree_resolves_missing_directories() {
        let temp = tempfile::TempDir::new().unwrap();
        let filter = WatchFilter::default().excluding_tree(&temp.path().join("logs/nested"));

        let root = temp.path().canonicalize().unwrap();
        assert!(filter.excludes(&root.join("logs/nested/review_log.json")));
        assert!(!filter.excludes(&root.join("logs/other.json")));
        assert!(!filter.excludes(&root.join("logs-nested/app.py")));
    }
}
