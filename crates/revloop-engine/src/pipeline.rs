//! Wiring of engine components from one configuration
//!
//! Every component receives its settings and log paths explicitly; nothing
//! is looked up globally.

use std::sync::Arc;

use revloop_config::{Config, LogPaths};
use revloop_utils::clock::Clock;
use revloop_utils::shutdown::ShutdownSignal;

use crate::applier::CorrectionApplier;
use crate::coordinator::ReviewCoordinator;
use crate::correction::CorrectionManager;
use crate::requirements::RequirementStore;
use crate::validator::ChangeValidator;
use crate::watcher::{ChangeTracker, WatchFilter};

#[derive(Debug, Clone)]
pub struct Pipeline {
    config: Config,
    paths: LogPaths,
    clock: Arc<dyn Clock>,
    shutdown: ShutdownSignal,
}

impl Pipeline {
    pub fn new(config: Config, clock: Arc<dyn Clock>) -> Self {
        Self {
            paths: config.log_paths(),
            config,
            clock,
            shutdown: ShutdownSignal::new(),
        }
    }

    #[must_use]
    pub fn with_shutdown(mut self, shutdown: ShutdownSignal) -> Self {
        self.shutdown = shutdown;
        self
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    #[must_use]
    pub fn log_paths(&self) -> &LogPaths {
        &self.paths
    }

    #[must_use]
    pub fn shutdown(&self) -> &ShutdownSignal {
        &self.shutdown
    }

    #[must_use]
    pub fn requirement_store(&self) -> RequirementStore {
        RequirementStore::new(self.config.requirements_path())
    }

    #[must_use]
    pub fn validator(&self) -> ChangeValidator {
        ChangeValidator::new(
            self.requirement_store(),
            &self.paths.validation_log,
            self.config.validation.clone(),
            Arc::clone(&self.clock),
        )
    }

    #[must_use]
    pub fn correction_manager(&self) -> CorrectionManager {
        CorrectionManager::new(
            &self.paths.corrections,
            &self.paths.correction_status,
            self.config.validation.clone(),
            self.config.timing.duplicate_window(),
            Arc::clone(&self.clock),
        )
    }

    #[must_use]
    pub fn applier(&self, validator: Arc<ChangeValidator>) -> CorrectionApplier {
        CorrectionApplier::new(
            self.correction_manager(),
            validator,
            &self.config.timing,
            Arc::clone(&self.clock),
        )
        .with_shutdown(self.shutdown.clone())
    }

    /// Configured filter that also drops the log directory, whose writes
    /// would otherwise feed back into the review log.
    #[must_use]
    pub fn watch_filter(&self) -> WatchFilter {
        WatchFilter::from_config(&self.config.watch).excluding_tree(&self.paths.dir)
    }

    #[must_use]
    pub fn coordinator(&self) -> ReviewCoordinator {
        let validator = Arc::new(self.validator());
        let applier = self.applier(Arc::clone(&validator));
        ReviewCoordinator::new(
            validator,
            applier,
            &self.paths.review_log,
            self.watch_filter(),
            &self.config.timing,
            Arc::clone(&self.clock),
            self.shutdown.clone(),
        )
    }

    #[must_use]
    pub fn change_tracker(&self) -> ChangeTracker {
        ChangeTracker::new(&self.paths.review_log)
    }
}
