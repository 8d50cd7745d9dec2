//! Watch command implementation
//!
//! Handles `revloop watch`: record accepted changes to the review log
//! without validating them.

use anyhow::Result;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use revloop_engine::IdleTracker;
use revloop_utils::clock::{Clock, elapsed_between};
use revloop_utils::error::RevloopError;

use super::common::{acquire_log_lock, system_pipeline};
use crate::{ActivityState, ChangeSink, Config, ExitCode, FileWatcher, SystemClock};

/// Execute the watch command
///
/// Stops after `duration_secs` when given, otherwise once no change has been
/// recorded for the idle timeout.
pub fn execute_watch_command(
    dirs: &[PathBuf],
    duration_secs: Option<u64>,
    config: &Config,
    force: bool,
) -> Result<ExitCode> {
    let _lock = acquire_log_lock(config, "watch", force)?;

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let pipeline = system_pipeline(config);
    let tracker = Arc::new(pipeline.change_tracker());
    let sink: Arc<dyn ChangeSink> = tracker.clone();

    let mut watcher = FileWatcher::start(pipeline.watch_filter(), sink, Arc::clone(&clock))
        .map_err(RevloopError::from)?;
    for dir in dirs {
        watcher.watch(dir).map_err(RevloopError::from)?;
    }

    let started = clock.now();
    let limit = duration_secs.map(Duration::from_secs);
    let mut idle = IdleTracker::new(
        started,
        config.timing.idle_timeout(),
        config.timing.max_empty_polls,
    );
    info!(roots = ?watcher.roots(), ?limit, "Recording changes");

    let mut seen = 0;
    loop {
        clock.sleep(config.timing.poll_interval());
        let now = clock.now();

        let recorded = tracker.recorded();
        if recorded != seen {
            seen = recorded;
            idle.record_activity(now);
        }

        let done = match limit {
            Some(limit) => elapsed_between(started, now) >= limit,
            None => idle.check_timeout(now) != ActivityState::Active,
        };
        if done {
            break;
        }
    }
    watcher.stop();

    println!(
        "✓ Recorded {seen} changes to {}",
        tracker.log().path().display()
    );
    Ok(ExitCode::SUCCESS)
}
