//! revloop - watch source trees, validate changes against a requirements
//! document and apply mechanical corrections
//!
//! revloop can be used in two ways:
//! - **CLI**: `revloop review <DIR>` runs the full loop until the tree goes idle
//! - **Library**: build a [`Pipeline`] from a [`Config`] and drive the
//!   components directly
//!
//! # Quick Start (CLI)
//!
//! ```bash
//! # Review a project until it has been quiet for the idle timeout
//! revloop review src/
//!
//! # One-shot validation with canonical JSON output
//! revloop validate src/app.py --json
//!
//! # Show corrections waiting to be applied or reviewed
//! revloop status
//! ```
//!
//! # Quick Start (Library)
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use revloop::{CliArgs, Config, Pipeline, SystemClock};
//!
//! # fn main() -> anyhow::Result<()> {
//! let config = Config::discover(&CliArgs::default())?;
//! let pipeline = Pipeline::new(config, Arc::new(SystemClock));
//! let result = pipeline.validator().validate_file("src/app.py".as_ref());
//! println!("{}", result.notes);
//! # Ok(())
//! # }
//! ```
//!
//! # JSON Contracts
//!
//! `--json` output is emitted in JCS (RFC 8785) canonical form; see
//! [`emit_jcs`].
//!
//! # Stable Public API
//!
//! - [`Config`], [`CliArgs`] - configuration management
//! - [`Pipeline`] and the components it builds
//! - [`RevloopError`] - library error type
//! - [`ExitCode`] - CLI exit codes
//! - [`emit_jcs`] - canonical JSON emission

pub use revloop_config::{CliArgs, Config, ConfigSource, LogPaths};
pub use revloop_engine::{
    ActivityState, ChangeSink, ChangeTracker, ChangeValidator, CorrectionApplier,
    CorrectionManager, FileWatcher, HandleOutcome, Pipeline, RequirementStore, ReviewCoordinator,
    WatchFilter, parse_requirements,
};
pub use revloop_model::{
    ChangeEvent, Correction, CorrectionStatus, EditInstruction, EventType, Fix, Requirement,
    StatusEntry, ValidationResult,
};
pub use revloop_utils::canonicalization::emit_jcs;
pub use revloop_utils::clock::{Clock, SystemClock};
pub use revloop_utils::error::RevloopError;
pub use revloop_utils::exit_codes::ExitCode;
pub use revloop_utils::shutdown::ShutdownSignal;

pub mod cli;
