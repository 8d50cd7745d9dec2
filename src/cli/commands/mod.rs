//! CLI command implementations (facade).
//!
//! This module re-exports the command surface used by `run.rs` and CLI tests.
//! Implementations live in `commands/*`.

mod apply;
mod common;
mod correct;
mod requirements;
mod review;
mod status;
mod validate;
mod watch;

pub use apply::execute_apply_command;
pub use correct::execute_correct_command;
pub use requirements::execute_requirements_command;
pub use review::execute_review_command;
pub use status::{PendingCorrection, StatusReport, build_status_report, execute_status_command};
pub use validate::execute_validate_command;
pub use watch::execute_watch_command;

pub use common::{absolute_path, acquire_log_lock, system_pipeline};
