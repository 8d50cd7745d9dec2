//! OS file notifications
//!
//! [`FileWatcher`] registers directories with the platform backend through
//! `notify`, receives raw events on a channel and hands filtered
//! [`ChangeEvent`]s to a [`ChangeSink`] from a dedicated dispatcher thread.

pub mod filter;
pub mod tracker;

use notify::event::{CreateKind, ModifyKind, RemoveKind, RenameMode};
use notify::{Config as NotifyConfig, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use revloop_model::{ChangeEvent, EventType};
use revloop_utils::clock::Clock;
use revloop_utils::error::WatchError;
use revloop_utils::shutdown::ShutdownSignal;

pub use filter::WatchFilter;
pub use tracker::ChangeTracker;

const DISPATCH_POLL: Duration = Duration::from_millis(250);

/// Receiver of accepted change events.
pub trait ChangeSink: Send + Sync {
    fn on_change(&self, event: ChangeEvent);
}

/// Recursive watcher over one or more directory trees.
pub struct FileWatcher {
    watcher: Option<RecommendedWatcher>,
    roots: Arc<Mutex<Vec<PathBuf>>>,
    stop: ShutdownSignal,
    dispatcher: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for FileWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileWatcher")
            .field("roots", &self.roots())
            .field("running", &self.watcher.is_some())
            .finish()
    }
}

impl FileWatcher {
    /// Create the backend watcher and start the dispatcher thread. No
    /// directory is watched until [`watch`](Self::watch) is called.
    pub fn start(
        filter: WatchFilter,
        sink: Arc<dyn ChangeSink>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, WatchError> {
        let (tx, rx) = mpsc::channel::<notify::Result<Event>>();
        let watcher = RecommendedWatcher::new(tx, NotifyConfig::default()).map_err(|e| {
            WatchError::Backend {
                reason: e.to_string(),
            }
        })?;

        let roots: Arc<Mutex<Vec<PathBuf>>> = Arc::new(Mutex::new(Vec::new()));
        let stop = ShutdownSignal::new();

        let dispatcher = {
            let roots = Arc::clone(&roots);
            let stop = stop.clone();
            std::thread::Builder::new()
                .name("revloop-watch".to_string())
                .spawn(move || {
                    loop {
                        if stop.is_requested() {
                            break;
                        }
                        match rx.recv_timeout(DISPATCH_POLL) {
                            Ok(Ok(event)) => dispatch(&event, &roots, &filter, sink.as_ref(), clock.as_ref()),
                            Ok(Err(e)) => warn!(error = %e, "File watcher error"),
                            Err(RecvTimeoutError::Timeout) => continue,
                            Err(RecvTimeoutError::Disconnected) => break,
                        }
                    }
                    debug!("Watch dispatcher exited");
                })
                .map_err(|e| WatchError::Backend {
                    reason: format!("failed to spawn dispatcher: {e}"),
                })?
        };

        Ok(Self {
            watcher: Some(watcher),
            roots,
            stop,
            dispatcher: Some(dispatcher),
        })
    }

    /// Watch `dir` recursively.
    pub fn watch(&mut self, dir: &Path) -> Result<PathBuf, WatchError> {
        if !dir.exists() {
            return Err(WatchError::DirectoryNotFound {
                path: dir.to_path_buf(),
            });
        }
        if !dir.is_dir() {
            return Err(WatchError::NotADirectory {
                path: dir.to_path_buf(),
            });
        }
        let root = dir.canonicalize().map_err(|e| WatchError::Backend {
            reason: format!("cannot resolve {}: {e}", dir.display()),
        })?;

        let Some(watcher) = self.watcher.as_mut() else {
            return Err(WatchError::Backend {
                reason: "watcher already stopped".to_string(),
            });
        };
        watcher
            .watch(&root, RecursiveMode::Recursive)
            .map_err(|e| WatchError::Backend {
                reason: e.to_string(),
            })?;

        info!(dir = %root.display(), "Watching directory");
        self.roots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(root.clone());
        Ok(root)
    }

    #[must_use]
    pub fn roots(&self) -> Vec<PathBuf> {
        self.roots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Stop the backend and join the dispatcher. Idempotent.
    pub fn stop(&mut self) {
        self.stop.request();
        // Dropping the backend closes the channel and wakes the dispatcher.
        drop(self.watcher.take());
        if let Some(handle) = self.dispatcher.take()
            && handle.join().is_err()
        {
            error!("Watch dispatcher panicked");
        }
        self.roots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl Drop for FileWatcher {
    fn drop(&mut self) {
        self.stop();
    }
}

fn dispatch(
    event: &Event,
    roots: &Mutex<Vec<PathBuf>>,
    filter: &WatchFilter,
    sink: &dyn ChangeSink,
    clock: &dyn Clock,
) {
    let roots = roots.lock().unwrap_or_else(PoisonError::into_inner).clone();
    for (path, event_type) in map_event(event) {
        let Some(relative) = roots.iter().find_map(|root| path.strip_prefix(root).ok()) else {
            continue;
        };
        if filter.excludes(&path) || !filter.accepts(relative) {
            continue;
        }
        let change = ChangeEvent::new(&path, event_type, clock.now());
        if catch_unwind(AssertUnwindSafe(|| sink.on_change(change))).is_err() {
            error!(file = %path.display(), "Change handler panicked");
        }
    }
}

/// Translate a backend event into change events. Directory and access
/// events produce nothing.
#[must_use]
pub fn map_event(event: &Event) -> Vec<(PathBuf, EventType)> {
    let each = |event_type: EventType| -> Vec<(PathBuf, EventType)> {
        event
            .paths
            .iter()
            .filter(|path| event_type == EventType::Deleted || !path.is_dir())
            .map(|path| (path.clone(), event_type))
            .collect()
    };

    match event.kind {
        EventKind::Create(CreateKind::Folder)
        | EventKind::Remove(RemoveKind::Folder)
        | EventKind::Access(_)
        | EventKind::Modify(ModifyKind::Metadata(_)) => Vec::new(),
        EventKind::Create(_) => each(EventType::Created),
        EventKind::Remove(_) => each(EventType::Deleted),
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => each(EventType::Deleted),
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => each(EventType::Created),
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
            let mut changes = Vec::new();
            if let Some(from) = event.paths.first() {
                changes.push((from.clone(), EventType::Deleted));
            }
            if let Some(to) = event.paths.get(1)
                && !to.is_dir()
            {
                changes.push((to.clone(), EventType::Created));
            }
            changes
        }
        EventKind::Modify(ModifyKind::Name(_)) => event
            .paths
            .iter()
            .filter(|path| !path.is_dir())
            .map(|path| {
                let event_type = if path.exists() {
                    EventType::Created
                } else {
                    EventType::Deleted
                };
                (path.clone(), event_type)
            })
            .collect(),
        EventKind::Modify(_) => each(EventType::Modified),
        EventKind::Any | EventKind::Other => event
            .paths
            .iter()
            .filter(|path| path.is_file())
            .map(|path| (path.clone(), EventType::Modified))
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{AccessKind, DataChange, MetadataKind};

    fn event(kind: EventKind, paths: &[&str]) -> Event {
        paths
            .iter()
            .fold(Event::new(kind), |event, path| event.add_path(PathBuf::from(path)))
    }

    #[test]
    fn test_basic_kinds() {
        assert_eq!(
            map_event(&event(EventKind::Create(CreateKind::File), &["/w/a.py"])),
            vec![(PathBuf::from("/w/a.py"), EventType::Created)]
        );
        assert_eq!(
            map_event(&event(
                EventKind::Modify(ModifyKind::Data(DataChange::Content)),
                &["/w/a.py"]
            )),
            vec![(PathBuf::from("/w/a.py"), EventType::Modified)]
        );
        assert_eq!(
            map_event(&event(EventKind::Remove(RemoveKind::File), &["/w/a.py"])),
            vec![(PathBuf::from("/w/a.py"), EventType::Deleted)]
        );
    }

    #[test]
    fn test_renames() {
        assert_eq!(
            map_event(&event(
                EventKind::Modify(ModifyKind::Name(RenameMode::Both)),
                &["/w/old.py", "/w/new.py"]
            )),
            vec![
                (PathBuf::from("/w/old.py"), EventType::Deleted),
                (PathBuf::from("/w/new.py"), EventType::Created),
            ]
        );
        assert_eq!(
            map_event(&event(
                EventKind::Modify(ModifyKind::Name(RenameMode::From)),
                &["/w/old.py"]
            )),
            vec![(PathBuf::from("/w/old.py"), EventType::Deleted)]
        );
    }

    #[test]
    fn test_ignored_kinds() {
        for kind in [
            EventKind::Create(CreateKind::Folder),
            EventKind::Access(AccessKind::Any),
            EventKind::Modify(ModifyKind::Metadata(MetadataKind::Any)),
        ] {
            assert!(map_event(&event(kind, &["/w/a.py"])).is_empty());
        }
    }
}
