//! Real file notifications through the platform backend.

use anyhow::Result;
use serial_test::serial;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tempfile::TempDir;

use revloop_config::Config;
use revloop_engine::{ChangeSink, ChangeTracker, FileWatcher, Pipeline, WatchFilter};
use revloop_model::{ChangeEvent, EventType};
use revloop_utils::clock::SystemClock;
use revloop_utils::error::WatchError;

#[derive(Default)]
struct Collector {
    events: Mutex<Vec<ChangeEvent>>,
}

impl ChangeSink for Collector {
    fn on_change(&self, event: ChangeEvent) {
        self.events.lock().unwrap().push(event);
    }
}

impl Collector {
    fn wait_for(&self, predicate: impl Fn(&[ChangeEvent]) -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(10);
        while Instant::now() < deadline {
            if predicate(&self.events.lock().unwrap()) {
                return true;
            }
            std::thread::sleep(Duration::from_millis(50));
        }
        false
    }
}

fn saw(events: &[ChangeEvent], name: &str, kinds: &[EventType]) -> bool {
    events.iter().any(|e| {
        e.file_path.file_name().and_then(|n| n.to_str()) == Some(name) && kinds.contains(&e.event_type)
    })
}

#[test]
#[serial]
fn test_created_file_is_reported_and_filtered() -> Result<()> {
    let temp = TempDir::new()?;
    let collector = Arc::new(Collector::default());
    let mut watcher = FileWatcher::start(WatchFilter::default(), collector.clone(), Arc::new(SystemClock))?;
    let root = watcher.watch(temp.path())?;

    std::fs::write(root.join("ignored.rs"), "fn main() {}\n")?;
    std::fs::create_dir_all(root.join("__pycache__"))?;
    std::fs::write(root.join("__pycache__/cached.py"), "x = 1\n")?;
    std::fs::write(root.join("app.py"), "x = 1\n")?;

    assert!(collector.wait_for(|events| saw(events, "app.py", &[EventType::Created, EventType::Modified])));
    watcher.stop();

    let events = collector.events.lock().unwrap();
    assert!(!saw(&events, "ignored.rs", &[EventType::Created, EventType::Modified]));
    assert!(!saw(&events, "cached.py", &[EventType::Created, EventType::Modified]));
    assert!(events.iter().all(|e| e.file_path.starts_with(&root)));
    Ok(())
}

#[test]
#[serial]
fn test_removed_file_is_reported_as_deleted() -> Result<()> {
    let temp = TempDir::new()?;
    let target = temp.path().join("gone.py");
    std::fs::write(&target, "x = 1\n")?;

    let collector = Arc::new(Collector::default());
    let mut watcher = FileWatcher::start(WatchFilter::default(), collector.clone(), Arc::new(SystemClock))?;
    watcher.watch(temp.path())?;

    std::fs::remove_file(&target)?;
    assert!(collector.wait_for(|events| saw(events, "gone.py", &[EventType::Deleted])));
    Ok(())
}

#[test]
#[serial]
fn test_tracker_records_changes_to_review_log() -> Result<()> {
    let temp = TempDir::new()?;
    let watched = temp.path().join("project");
    std::fs::create_dir_all(&watched)?;
    let tracker = Arc::new(ChangeTracker::new(temp.path().join("logs/review_log.json")));

    let mut watcher = FileWatcher::start(WatchFilter::default(), tracker.clone(), Arc::new(SystemClock))?;
    watcher.watch(&watched)?;
    std::fs::write(watched.join("notes.md"), "# Notes\n")?;

    let deadline = Instant::now() + Duration::from_secs(10);
    while tracker.recorded() == 0 && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(50));
    }
    watcher.stop();

    let logged = tracker.log().load()?;
    assert!(!logged.is_empty());
    assert!(logged.iter().all(|e| e.file_path.ends_with("notes.md")));
    Ok(())
}

#[test]
#[serial]
fn test_log_dir_inside_watched_root_does_not_feed_back() -> Result<()> {
    let temp = TempDir::new()?;
    let mut config = Config::defaults_at(temp.path());
    config.logs.dir = "logs".into();
    let pipeline = Pipeline::new(config, Arc::new(SystemClock));
    let tracker = Arc::new(pipeline.change_tracker());

    let mut watcher = FileWatcher::start(pipeline.watch_filter(), tracker.clone(), Arc::new(SystemClock))?;
    watcher.watch(temp.path())?;
    std::fs::write(temp.path().join("app.py"), "x = 1\n")?;

    let deadline = Instant::now() + Duration::from_secs(10);
    while tracker.recorded() == 0 && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(50));
    }
    // Give any echo of the review log write time to arrive.
    std::thread::sleep(Duration::from_millis(1500));
    watcher.stop();

    let logged = tracker.log().load()?;
    assert!(!logged.is_empty());
    assert!(
        logged.iter().all(|e| e.file_path.ends_with("app.py")),
        "logged: {logged:?}"
    );
    assert!(logged.len() <= 3, "logged {} events", logged.len());
    Ok(())
}

#[test]
fn test_watching_missing_or_file_path_fails() -> Result<()> {
    let temp = TempDir::new()?;
    let file = temp.path().join("plain.py");
    std::fs::write(&file, "")?;
    let mut watcher = FileWatcher::start(
        WatchFilter::default(),
        Arc::new(Collector::default()),
        Arc::new(SystemClock),
    )?;

    match watcher.watch(&temp.path().join("absent")) {
        Err(WatchError::DirectoryNotFound { .. }) => {}
        other => panic!("Expected DirectoryNotFound, got: {other:?}"),
    }
    match watcher.watch(Path::new(&file)) {
        Err(WatchError::NotADirectory { .. }) => {}
        other => panic!("Expected NotADirectory, got: {other:?}"),
    }
    Ok(())
}
