use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{info, warn};

use revloop_model::ChangeEvent;
use revloop_utils::json_log::JsonLog;

use super::ChangeSink;

/// Records every accepted change in the review log without validating it.
#[derive(Debug)]
pub struct ChangeTracker {
    log: JsonLog<ChangeEvent>,
    recorded: AtomicUsize,
}

impl ChangeTracker {
    pub fn new(review_log: impl Into<PathBuf>) -> Self {
        Self {
            log: JsonLog::new(review_log, "changes"),
            recorded: AtomicUsize::new(0),
        }
    }

    /// Changes recorded by this tracker since it was created.
    #[must_use]
    pub fn recorded(&self) -> usize {
        self.recorded.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn log(&self) -> &JsonLog<ChangeEvent> {
        &self.log
    }
}

impl ChangeSink for ChangeTracker {
    fn on_change(&self, event: ChangeEvent) {
        info!(file = %event.file_path.display(), event = %event.event_type, "Change detected");
        match self.log.append(&event) {
            Ok(()) => {
                self.recorded.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => warn!(error = %e, "Failed to record change"),
        }
    }
}
