//! Change validation, correction and review coordination
//!
//! Components, leaf first:
//!
//! - [`RequirementStore`] parses the requirements document
//! - [`ChangeValidator`] checks file content against it
//! - [`CorrectionManager`] plans, applies and verifies corrections
//! - [`CorrectionApplier`] schedules application with retries, cooldown and
//!   idle detection
//! - [`ReviewCoordinator`] ties file events to all of the above
//!
//! [`Pipeline`] builds them from a [`revloop_config::Config`].

pub mod applier;
pub mod coordinator;
pub mod correction;
pub mod idle;
pub mod pipeline;
pub mod requirements;
pub mod validator;
pub mod watcher;

pub use applier::CorrectionApplier;
pub use coordinator::{HandleOutcome, ReviewCoordinator};
pub use correction::CorrectionManager;
pub use idle::{ActivityState, IdleTracker};
pub use pipeline::Pipeline;
pub use requirements::{RequirementStore, parse_requirements};
pub use validator::ChangeValidator;
pub use watcher::{ChangeSink, ChangeTracker, FileWatcher, WatchFilter};
