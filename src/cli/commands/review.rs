//! Review command implementation
//!
//! Handles `revloop review`: the full watch, validate, correct loop.

use anyhow::Result;
use std::path::PathBuf;
use tracing::info;

use super::common::{acquire_log_lock, system_pipeline};
use super::status::{build_status_report, print_status_report};
use crate::{Config, ExitCode};

/// Execute the review command
///
/// Returns once the coordinator goes idle. A directory that cannot be
/// watched aborts the command before the loop starts.
pub fn execute_review_command(dirs: &[PathBuf], config: &Config, force: bool) -> Result<ExitCode> {
    let _lock = acquire_log_lock(config, "review", force)?;

    let pipeline = system_pipeline(config);
    let coordinator = pipeline.coordinator();
    for dir in dirs {
        coordinator.add_directory(dir)?;
    }

    info!(
        dirs = ?coordinator.monitored_directories(),
        requirements = %config.requirements_path().display(),
        idle_timeout_secs = config.timing.idle_timeout_secs,
        "Review started"
    );
    coordinator.run();
    coordinator.stop_monitoring();

    let report = build_status_report(coordinator.applier().manager());
    println!("Review finished");
    print_status_report(&report);
    Ok(ExitCode::SUCCESS)
}
