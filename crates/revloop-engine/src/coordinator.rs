//! Review coordination
//!
//! The coordinator receives change events from the file watcher, serializes
//! work per file, debounces rapid repeats and drives validation, correction
//! and application. The shared state lives in [`CoordinatorCore`] so the
//! watcher's dispatcher thread can hold it without owning the watcher.

use chrono::{DateTime, Utc};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::{debug, info, warn};

use revloop_config::TimingConfig;
use revloop_model::{ChangeEvent, EventType};
use revloop_utils::clock::{Clock, elapsed_between};
use revloop_utils::error::{RevloopError, WatchError};
use revloop_utils::json_log::JsonLog;
use revloop_utils::logging::file_span;
use revloop_utils::shutdown::ShutdownSignal;

use crate::applier::CorrectionApplier;
use crate::idle::{ActivityState, IdleTracker};
use crate::validator::ChangeValidator;
use crate::watcher::{ChangeSink, FileWatcher, WatchFilter};

/// What `handle_change` did with an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleOutcome {
    /// Coordinator stopped or idle; the event was ignored
    Stopped,
    /// Another handler holds the file
    Locked,
    /// The file was handled too recently
    CoolingDown,
    /// Deletions are logged but not validated
    Deleted,
    Processed { valid: bool, work_found: bool },
}

/// Per-file lock, released on drop.
#[derive(Debug)]
pub struct FileGuard<'a> {
    locks: &'a Mutex<HashSet<PathBuf>>,
    path: PathBuf,
}

impl Drop for FileGuard<'_> {
    fn drop(&mut self) {
        lock(self.locks).remove(&self.path);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug)]
pub struct CoordinatorCore {
    validator: Arc<ChangeValidator>,
    applier: Mutex<CorrectionApplier>,
    review_log: JsonLog<ChangeEvent>,
    clock: Arc<dyn Clock>,
    file_cooldown: Duration,
    poll_interval: Duration,
    file_locks: Mutex<HashSet<PathBuf>>,
    last_handled: Mutex<HashMap<PathBuf, DateTime<Utc>>>,
    idle: Mutex<IdleTracker>,
    shutdown: ShutdownSignal,
}

impl CoordinatorCore {
    /// Process one change event.
    pub fn handle_change(&self, event: &ChangeEvent) -> HandleOutcome {
        let _span = file_span(&event.file_path).entered();
        let now = self.clock.now();
        if !self.is_running_at(now) {
            return HandleOutcome::Stopped;
        }

        if let Err(e) = self.review_log.append(event) {
            warn!(error = %e, "Failed to record change");
        }

        let Some(_guard) = self.try_lock_file(&event.file_path) else {
            debug!(file = %event.file_path.display(), "File is being processed, skipping");
            return HandleOutcome::Locked;
        };

        lock(&self.idle).record_activity(now);

        {
            let mut last_handled = lock(&self.last_handled);
            if let Some(last) = last_handled.get(&event.file_path)
                && elapsed_between(*last, now) < self.file_cooldown
            {
                debug!(file = %event.file_path.display(), "File cooldown active, skipping");
                return HandleOutcome::CoolingDown;
            }
            if event.event_type == EventType::Deleted {
                debug!(file = %event.file_path.display(), "File deleted");
                return HandleOutcome::Deleted;
            }
            last_handled.insert(event.file_path.clone(), now);
        }

        let result = self.validator.validate_change(event);
        let work_found = {
            let mut applier = lock(&self.applier);
            if !result.valid {
                info!(
                    file = %event.file_path.display(),
                    missing = ?result.missing_requirements,
                    "Requirements not met"
                );
                if applier.manager_mut().generate_correction(&result).is_some() {
                    applier.wake();
                }
            }
            applier.apply_pending_corrections()
        };

        let mut idle = lock(&self.idle);
        if work_found {
            idle.record_activity(self.clock.now());
        } else if idle.record_empty_poll(self.clock.now()) != ActivityState::Active {
            info!("No activity, review coordinator going idle");
        }

        HandleOutcome::Processed {
            valid: result.valid,
            work_found,
        }
    }

    /// Claim `path` for processing. None when another handler holds it.
    pub fn try_lock_file(&self, path: &Path) -> Option<FileGuard<'_>> {
        let mut locks = lock(&self.file_locks);
        if !locks.insert(path.to_path_buf()) {
            return None;
        }
        Some(FileGuard {
            locks: &self.file_locks,
            path: path.to_path_buf(),
        })
    }

    fn is_running_at(&self, now: DateTime<Utc>) -> bool {
        if self.shutdown.is_requested() {
            return false;
        }
        lock(&self.idle).check_timeout(now) == ActivityState::Active
    }
}

impl ChangeSink for CoordinatorCore {
    fn on_change(&self, event: ChangeEvent) {
        let outcome = self.handle_change(&event);
        debug!(file = %event.file_path.display(), ?outcome, "Handled change");
    }
}

#[derive(Debug)]
pub struct ReviewCoordinator {
    core: Arc<CoordinatorCore>,
    filter: WatchFilter,
    monitored: Mutex<BTreeSet<PathBuf>>,
    observer: Mutex<Option<FileWatcher>>,
    loop_active: AtomicBool,
}

impl ReviewCoordinator {
    pub fn new(
        validator: Arc<ChangeValidator>,
        applier: CorrectionApplier,
        review_log: impl Into<PathBuf>,
        filter: WatchFilter,
        timing: &TimingConfig,
        clock: Arc<dyn Clock>,
        shutdown: ShutdownSignal,
    ) -> Self {
        let idle = IdleTracker::new(clock.now(), timing.idle_timeout(), timing.max_empty_polls);
        Self {
            core: Arc::new(CoordinatorCore {
                validator,
                applier: Mutex::new(applier),
                review_log: JsonLog::new(review_log, "changes"),
                clock,
                file_cooldown: timing.file_cooldown(),
                poll_interval: timing.poll_interval(),
                file_locks: Mutex::new(HashSet::new()),
                last_handled: Mutex::new(HashMap::new()),
                idle: Mutex::new(idle),
                shutdown,
            }),
            filter,
            monitored: Mutex::new(BTreeSet::new()),
            observer: Mutex::new(None),
            loop_active: AtomicBool::new(false),
        }
    }

    pub fn handle_change(&self, event: &ChangeEvent) -> HandleOutcome {
        self.core.handle_change(event)
    }

    pub fn try_lock_file(&self, path: &Path) -> Option<FileGuard<'_>> {
        self.core.try_lock_file(path)
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.core.is_running_at(self.core.clock.now())
    }

    #[must_use]
    pub fn validator(&self) -> &ChangeValidator {
        &self.core.validator
    }

    /// Exclusive access to the applier.
    pub fn applier(&self) -> MutexGuard<'_, CorrectionApplier> {
        lock(&self.core.applier)
    }

    #[must_use]
    pub fn review_log(&self) -> &JsonLog<ChangeEvent> {
        &self.core.review_log
    }

    #[must_use]
    pub fn shutdown_signal(&self) -> &ShutdownSignal {
        &self.core.shutdown
    }

    #[must_use]
    pub fn monitored_directories(&self) -> Vec<PathBuf> {
        lock(&self.monitored).iter().cloned().collect()
    }

    /// Register `dir` with the observer, starting the observer on first use.
    ///
    /// Returns false when the directory is already monitored.
    pub fn add_directory(&self, dir: &Path) -> Result<bool, RevloopError> {
        if !dir.exists() {
            return Err(WatchError::DirectoryNotFound {
                path: dir.to_path_buf(),
            }
            .into());
        }
        let root = dir.canonicalize()?;

        let mut monitored = lock(&self.monitored);
        if monitored.contains(&root) {
            warn!(dir = %root.display(), "Directory is already being monitored");
            return Ok(false);
        }

        let mut observer = lock(&self.observer);
        if observer.is_none() {
            let sink: Arc<dyn ChangeSink> = self.core.clone();
            *observer = Some(FileWatcher::start(
                self.filter.clone(),
                sink,
                Arc::clone(&self.core.clock),
            )?);
        }
        if let Some(watcher) = observer.as_mut() {
            watcher.watch(&root)?;
        }

        monitored.insert(root);
        lock(&self.core.idle).reset(self.core.clock.now());
        Ok(true)
    }

    /// Monitor `dir` and, unless a loop is already running, run the
    /// monitoring loop until idle or shutdown. Monitoring is stopped when
    /// the loop exits.
    pub fn start_monitoring(&self, dir: &Path) -> Result<(), RevloopError> {
        if !self.add_directory(dir)? {
            return Ok(());
        }
        if self.loop_active.load(Ordering::SeqCst) {
            return Ok(());
        }
        let _stop = StopOnExit(self);
        self.run();
        Ok(())
    }

    /// The monitoring loop. Sleeps one poll interval per iteration, stops on
    /// idle timeout or shutdown and drains pending corrections between
    /// events.
    pub fn run(&self) {
        if self.loop_active.swap(true, Ordering::SeqCst) {
            warn!("Monitoring loop already running");
            return;
        }
        info!(dirs = ?self.monitored_directories(), "Monitoring started");

        loop {
            self.core.clock.sleep(self.core.poll_interval);
            let now = self.core.clock.now();

            if self.core.shutdown.is_requested() {
                info!("Shutdown requested, stopping monitoring");
                break;
            }
            if lock(&self.core.idle).check_timeout(now) != ActivityState::Active {
                info!("Idle timeout reached, stopping monitoring");
                break;
            }

            let mut applier = lock(&self.core.applier);
            applier.verify_due_corrections();
            let pending: BTreeSet<PathBuf> = applier
                .manager()
                .get_pending_corrections()
                .into_iter()
                .map(|c| c.file_path)
                .collect();
            if pending.is_empty() {
                continue;
            }
            // A handler holding one of the files drains the queue itself.
            let guards: Option<Vec<FileGuard<'_>>> =
                pending.iter().map(|path| self.core.try_lock_file(path)).collect();
            let Some(_guards) = guards else {
                debug!("Pending file is being handled, deferring drain");
                continue;
            };
            applier.wake();
            if applier.apply_pending_corrections() {
                lock(&self.core.idle).record_activity(self.core.clock.now());
            }
        }

        self.loop_active.store(false, Ordering::SeqCst);
    }

    /// Stop the observer, forget monitored directories and mark the
    /// coordinator stopped. Safe to call more than once.
    pub fn stop_monitoring(&self) {
        lock(&self.core.idle).stop();

        let mut monitored = lock(&self.monitored);
        if let Some(mut watcher) = lock(&self.observer).take() {
            watcher.stop();
            info!("Monitoring stopped");
        }
        monitored.clear();
        drop(monitored);

        lock(&self.core.applier).flush_verifications();
    }
}

impl Drop for ReviewCoordinator {
    fn drop(&mut self) {
        if let Some(mut watcher) = lock(&self.observer).take() {
            watcher.stop();
        }
    }
}

struct StopOnExit<'a>(&'a ReviewCoordinator);

impl Drop for StopOnExit<'_> {
    fn drop(&mut self) {
        self.0.stop_monitoring();
    }
}
