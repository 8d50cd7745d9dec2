//! Polling scheduler for pending corrections
//!
//! Each poll applies the pending corrections with bounded retries, honors a
//! cooldown between applications and goes idle after a run of empty polls
//! or a stretch without activity. Applied corrections are verified once the
//! duplicate window has passed.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use revloop_config::TimingConfig;
use revloop_model::Correction;
use revloop_utils::clock::{Clock, elapsed_between};
use revloop_utils::shutdown::ShutdownSignal;

use crate::correction::CorrectionManager;
use crate::idle::{ActivityState, IdleTracker, LogThrottle};
use crate::validator::ChangeValidator;

#[derive(Debug)]
pub struct CorrectionApplier {
    manager: CorrectionManager,
    validator: Arc<ChangeValidator>,
    clock: Arc<dyn Clock>,
    apply_cooldown: Duration,
    retry_backoff: Duration,
    max_retries: u32,
    idle: IdleTracker,
    last_applied_at: Option<DateTime<Utc>>,
    log_throttle: LogThrottle,
    shutdown: Option<ShutdownSignal>,
    awaiting_verification: Vec<Correction>,
}

impl CorrectionApplier {
    pub fn new(
        manager: CorrectionManager,
        validator: Arc<ChangeValidator>,
        timing: &TimingConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let now = clock.now();
        Self {
            manager,
            validator,
            apply_cooldown: timing.apply_cooldown(),
            retry_backoff: timing.retry_backoff(),
            max_retries: timing.max_retries.max(1),
            idle: IdleTracker::new(now, timing.idle_timeout(), timing.max_empty_polls),
            last_applied_at: None,
            log_throttle: LogThrottle::new(timing.log_cooldown()),
            shutdown: None,
            awaiting_verification: Vec::new(),
            clock,
        }
    }

    /// Stop polling when `signal` is requested.
    #[must_use]
    pub fn with_shutdown(mut self, signal: ShutdownSignal) -> Self {
        self.shutdown = Some(signal);
        self
    }

    #[must_use]
    pub fn manager(&self) -> &CorrectionManager {
        &self.manager
    }

    pub fn manager_mut(&mut self) -> &mut CorrectionManager {
        &mut self.manager
    }

    #[must_use]
    pub fn state(&self) -> ActivityState {
        self.idle.state()
    }

    /// True until the applier goes idle or is shut down.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.idle.is_active() && !self.shutdown_requested()
    }

    /// Revive an idle applier because new work was queued.
    pub fn wake(&mut self) {
        if self.idle.state() == ActivityState::Idle {
            debug!("Waking correction applier");
        }
        self.idle.wake(self.clock.now());
    }

    pub fn stop(&mut self) {
        self.idle.stop();
    }

    /// Corrections applied but not yet verified.
    #[must_use]
    pub fn awaiting_verification(&self) -> &[Correction] {
        &self.awaiting_verification
    }

    /// One poll. Returns true when pending work existed, even if the
    /// cooldown kept it from being applied.
    pub fn apply_pending_corrections(&mut self) -> bool {
        let now = self.clock.now();
        if self.shutdown_requested() {
            self.idle.stop();
        }
        if !self.idle.is_active() || self.idle.check_timeout(now) != ActivityState::Active {
            return false;
        }

        self.verify_due_corrections();

        let mut pending = self.manager.get_pending_corrections();
        if pending.is_empty() {
            let polls = self.idle.empty_polls() + 1;
            if self.idle.record_empty_poll(now) == ActivityState::Active {
                if self.log_throttle.ready(now) {
                    debug!("No pending corrections");
                }
            } else {
                info!(empty_polls = polls, "No corrections found, correction applier going idle");
            }
            return false;
        }

        self.idle.record_work_found();

        if let Some(last) = self.last_applied_at
            && elapsed_between(last, now) < self.apply_cooldown
        {
            if self.log_throttle.ready(now) {
                debug!(pending = pending.len(), "Apply cooldown active, deferring corrections");
            }
            return true;
        }

        for correction in &mut pending {
            if self.retry_correction(correction) {
                let applied_at = self.clock.now();
                self.last_applied_at = Some(applied_at);
                self.idle.record_activity(applied_at);
                self.awaiting_verification.push(correction.clone());
            }
        }
        true
    }

    /// Apply `correction` with up to `max_retries` attempts and a fixed
    /// backoff between them. A correction suppressed as a duplicate is left
    /// pending for a later poll. Exhaustion hands it to manual review.
    pub fn retry_correction(&mut self, correction: &mut Correction) -> bool {
        if self.manager.was_recently_applied(&correction.file_path) {
            debug!(file = %correction.file_path.display(), "Recently corrected, deferring");
            return false;
        }

        for attempt in 1..=self.max_retries {
            if self.apply_attempt(correction, attempt) {
                return true;
            }
            if attempt < self.max_retries {
                debug!(
                    file = %correction.file_path.display(),
                    attempt,
                    max_retries = self.max_retries,
                    "Correction attempt failed, retrying"
                );
                self.clock.sleep(self.retry_backoff);
            }
        }

        self.manager.mark_correction_failed(correction, self.max_retries);
        false
    }

    /// Apply `correction` once unless its file was corrected within the
    /// duplicate window.
    pub fn apply_correction(&mut self, correction: &mut Correction) -> bool {
        if self.manager.was_recently_applied(&correction.file_path) {
            debug!(file = %correction.file_path.display(), "Skipping duplicate correction");
            return false;
        }
        self.apply_attempt(correction, 1)
    }

    /// Standalone loop: poll, then sleep one cooldown after work or two
    /// after an empty poll, until idle or shut down.
    pub fn run(&mut self) {
        info!("Correction applier started");
        while self.is_running() {
            let worked = self.apply_pending_corrections();
            if !self.is_running() {
                break;
            }
            let pause = if worked {
                self.apply_cooldown
            } else {
                self.apply_cooldown * 2
            };
            self.clock.sleep(pause);
        }
        self.flush_verifications();
        info!(state = %self.idle.state(), "Correction applier stopped");
    }

    /// Verify every applied correction still waiting, without waiting for
    /// the duplicate window.
    pub fn flush_verifications(&mut self) {
        for mut correction in std::mem::take(&mut self.awaiting_verification) {
            self.manager
                .verify_correction_now(&mut correction, &self.validator);
        }
    }

    fn apply_attempt(&mut self, correction: &mut Correction, attempt: u32) -> bool {
        if !self.manager.apply_correction(correction) {
            return false;
        }
        let file = correction.file_path.clone();
        self.manager
            .update_correction_status(&file, correction.status, attempt);
        true
    }

    /// Verify applied corrections whose duplicate window has passed.
    pub fn verify_due_corrections(&mut self) {
        if self.awaiting_verification.is_empty() {
            return;
        }
        let now = self.clock.now();
        let window = self.manager.duplicate_window();
        let (due, waiting): (Vec<Correction>, Vec<Correction>) =
            std::mem::take(&mut self.awaiting_verification)
                .into_iter()
                .partition(|c| {
                    c.applied_at
                        .is_none_or(|at| elapsed_between(at, now) >= window)
                });
        self.awaiting_verification = waiting;

        for mut correction in due {
            if !self.manager.verify_correction(&mut correction, &self.validator) {
                warn!(file = %correction.file_path.display(), "Applied correction did not resolve all requirements");
            }
        }
    }

    fn shutdown_requested(&self) -> bool {
        self.shutdown.as_ref().is_some_and(ShutdownSignal::is_requested)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::requirements::RequirementStore;
    use revloop_config::ValidationConfig;
    use revloop_model::{CorrectionStatus, StatusEntry};
    use revloop_utils::clock::ManualClock;
    use revloop_utils::test_support::{INDENTATION_ONLY, write_file};
    use std::path::{Path, PathBuf};
    use tempfile::TempDir;

    fn applier(dir: &Path, clock: &Arc<ManualClock>) -> CorrectionApplier {
        let requirements = write_file(dir, "requirements.md", INDENTATION_ONLY);
        let validator = Arc::new(ChangeValidator::new(
            RequirementStore::new(requirements),
            dir.join("logs/validation_log.json"),
            ValidationConfig::default(),
            clock.clone(),
        ));
        let manager = CorrectionManager::new(
            dir.join("logs/corrections.json"),
            dir.join("logs/correction_status.json"),
            ValidationConfig::default(),
            Duration::from_secs(2),
            clock.clone(),
        );
        CorrectionApplier::new(manager, validator, &TimingConfig::default(), clock.clone())
    }

    fn queue(applier: &mut CorrectionApplier, dir: &Path, name: &str) -> PathBuf {
        let file = write_file(dir, name, "if a:\n  b\n   c\n");
        let result = applier.validator.validate_file(&file);
        assert!(!result.valid);
        applier.manager_mut().generate_correction(&result);
        file
    }

    #[test]
    fn test_empty_polls_stop_the_applier() {
        let temp = TempDir::new().unwrap();
        let clock = Arc::new(ManualClock::starting_now());
        let mut applier = applier(temp.path(), &clock);

        for _ in 0..5 {
            assert!(applier.is_running());
            assert!(!applier.apply_pending_corrections());
            clock.advance(Duration::from_secs(6));
        }
        assert!(!applier.is_running());

        let throttled_at = applier.log_throttle.last_emitted();
        assert!(!applier.apply_pending_corrections());
        assert_eq!(applier.log_throttle.last_emitted(), throttled_at);
    }

    #[test]
    fn test_applies_then_honors_cooldown() {
        let temp = TempDir::new().unwrap();
        let clock = Arc::new(ManualClock::starting_now());
        let mut applier = applier(temp.path(), &clock);

        let a = queue(&mut applier, temp.path(), "a.py");
        assert!(applier.apply_pending_corrections());
        assert_eq!(std::fs::read_to_string(&a).unwrap(), "if a:\n    b\n    c\n");
        assert_eq!(applier.awaiting_verification().len(), 1);

        queue(&mut applier, temp.path(), "b.py");
        clock.advance(Duration::from_secs(1));
        assert!(applier.apply_pending_corrections());
        assert_eq!(applier.manager().get_pending_corrections().len(), 1);

        clock.advance(Duration::from_secs(5));
        assert!(applier.apply_pending_corrections());
        assert!(applier.manager().get_pending_corrections().is_empty());
    }

    #[test]
    fn test_applied_corrections_are_verified_after_the_window() {
        let temp = TempDir::new().unwrap();
        let clock = Arc::new(ManualClock::starting_now());
        let mut applier = applier(temp.path(), &clock);

        queue(&mut applier, temp.path(), "a.py");
        assert!(applier.apply_pending_corrections());

        clock.advance(Duration::from_secs(3));
        assert!(!applier.apply_pending_corrections());
        assert!(applier.awaiting_verification().is_empty());

        let logged = applier.manager().log().load().unwrap();
        assert_eq!(logged[0].status, CorrectionStatus::Applied);
        assert_eq!(logged[0].verification_success, Some(true));
    }

    #[test]
    fn test_exhausted_retries_need_review() {
        let temp = TempDir::new().unwrap();
        let clock = Arc::new(ManualClock::starting_now());
        let mut applier = applier(temp.path(), &clock);

        let file = queue(&mut applier, temp.path(), "a.py");
        std::fs::remove_file(&file).unwrap();

        let start = clock.now();
        assert!(applier.apply_pending_corrections());
        assert_eq!(elapsed_between(start, clock.now()), Duration::from_secs(2));

        let status = applier.manager().status_log().load().unwrap();
        assert_eq!(status.len(), 1);
        assert_eq!(status[0].status, CorrectionStatus::NeedsReview);
        assert_eq!(status[0].fix_attempts, 3);
        assert!(applier.manager().get_pending_corrections().is_empty());
    }

    #[test]
    fn test_recent_correction_defers_instead_of_failing() {
        let temp = TempDir::new().unwrap();
        let clock = Arc::new(ManualClock::starting_now());
        let mut applier = applier(temp.path(), &clock);

        let file = queue(&mut applier, temp.path(), "a.py");
        applier
            .manager()
            .status_log()
            .append(&StatusEntry {
                file: file.clone(),
                issue: "Fix inconsistent indentation".to_string(),
                fix_attempts: 1,
                status: CorrectionStatus::Applied,
                last_attempt: clock.now(),
            })
            .unwrap();

        let mut pending = applier.manager().get_pending_corrections();
        assert!(!applier.retry_correction(&mut pending[0]));
        assert_eq!(applier.manager().get_pending_corrections().len(), 1);
    }

    #[test]
    fn test_wake_and_shutdown() {
        let temp = TempDir::new().unwrap();
        let clock = Arc::new(ManualClock::starting_now());
        let signal = ShutdownSignal::new();
        let mut applier = applier(temp.path(), &clock).with_shutdown(signal.clone());

        clock.advance(Duration::from_secs(301));
        assert!(!applier.apply_pending_corrections());
        assert_eq!(applier.state(), ActivityState::Idle);

        applier.wake();
        assert!(applier.is_running());

        signal.request();
        assert!(!applier.is_running());
        assert!(!applier.apply_pending_corrections());
        assert_eq!(applier.state(), ActivityState::Stopped);
    }

    #[test]
    fn test_run_returns_once_idle() {
        let temp = TempDir::new().unwrap();
        let clock = Arc::new(ManualClock::starting_now());
        let mut applier = applier(temp.path(), &clock);
        let file = queue(&mut applier, temp.path(), "a.py");

        applier.run();

        assert!(!applier.is_running());
        assert_eq!(std::fs::read_to_string(&file).unwrap(), "if a:\n    b\n    c\n");
        let logged = applier.manager().log().load().unwrap();
        assert_eq!(logged[0].verification_success, Some(true));
    }
}
