//! Apply command implementation
//!
//! Handles `revloop apply`: drain the corrections left pending in the log
//! by an earlier run.

use anyhow::Result;
use std::sync::Arc;
use tracing::info;

use super::common::{acquire_log_lock, system_pipeline};
use super::status::{build_status_report, print_status_report};
use crate::{Config, ExitCode};

/// Execute the apply command
pub fn execute_apply_command(config: &Config, force: bool) -> Result<ExitCode> {
    let _lock = acquire_log_lock(config, "apply", force)?;

    let pipeline = system_pipeline(config);
    let validator = Arc::new(pipeline.validator());
    let mut applier = pipeline.applier(validator);

    let pending = applier.manager().get_pending_corrections().len();
    if pending == 0 {
        println!("✓ No pending corrections");
        return Ok(ExitCode::SUCCESS);
    }

    info!(pending, "Applying pending corrections");
    applier.run();

    print_status_report(&build_status_report(applier.manager()));
    Ok(ExitCode::SUCCESS)
}
