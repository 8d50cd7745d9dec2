//! Scheduling behavior of the coordinator and applier under a manual clock.

use anyhow::Result;
use std::path::Path;
use std::sync::{Arc, Barrier};
use std::time::Duration;
use tempfile::TempDir;

use revloop_config::{Config, TimingConfig};
use revloop_engine::{ActivityState, HandleOutcome, Pipeline};
use revloop_model::{ChangeEvent, EventType};
use revloop_utils::clock::{Clock, ManualClock};
use revloop_utils::shutdown::ShutdownSignal;
use revloop_utils::test_support::{INDENTATION_ONLY, write_file};

fn pipeline(dir: &Path, timing: TimingConfig) -> (Pipeline, Arc<ManualClock>) {
    write_file(dir, "docs/requirements.md", INDENTATION_ONLY);
    let mut config = Config::defaults_at(dir);
    config.timing = timing;
    let clock = Arc::new(ManualClock::starting_now());
    (Pipeline::new(config, clock.clone()), clock)
}

#[test]
fn test_concurrent_changes_to_one_file_validate_once() -> Result<()> {
    let temp = TempDir::new()?;
    let (pipeline, clock) = pipeline(temp.path(), TimingConfig::default());
    let coordinator = Arc::new(pipeline.coordinator());
    let file = write_file(temp.path(), "src/app.py", "if a:\n  b\n   c\n");

    let barrier = Arc::new(Barrier::new(2));
    let handles: Vec<_> = (0..2)
        .map(|_| {
            let coordinator = Arc::clone(&coordinator);
            let barrier = Arc::clone(&barrier);
            let event = ChangeEvent::new(&file, EventType::Modified, clock.now());
            std::thread::spawn(move || {
                barrier.wait();
                coordinator.handle_change(&event)
            })
        })
        .collect();

    let outcomes: Vec<HandleOutcome> = handles
        .into_iter()
        .map(|h| h.join().map_err(|_| anyhow::anyhow!("handler panicked")))
        .collect::<Result<_>>()?;

    let processed = outcomes
        .iter()
        .filter(|o| matches!(o, HandleOutcome::Processed { .. }))
        .count();
    assert_eq!(processed, 1, "outcomes: {outcomes:?}");
    assert!(
        outcomes
            .iter()
            .any(|o| matches!(o, HandleOutcome::Locked | HandleOutcome::CoolingDown)),
        "outcomes: {outcomes:?}"
    );
    assert_eq!(coordinator.validator().log().load()?.len(), 1);
    assert_eq!(coordinator.review_log().load()?.len(), 2);
    Ok(())
}

#[test]
fn test_applier_goes_idle_after_empty_polls() -> Result<()> {
    let temp = TempDir::new()?;
    let timing = TimingConfig {
        max_empty_polls: 3,
        ..TimingConfig::default()
    };
    let (pipeline, clock) = pipeline(temp.path(), timing);
    let mut applier = pipeline.applier(Arc::new(pipeline.validator()));

    for poll in 0..3 {
        assert!(applier.is_running(), "stopped early at poll {poll}");
        assert!(!applier.apply_pending_corrections());
        clock.advance(Duration::from_secs(6));
    }

    assert_eq!(applier.state(), ActivityState::Idle);
    assert!(!applier.apply_pending_corrections());
    assert_eq!(applier.state(), ActivityState::Idle);
    Ok(())
}

#[test]
fn test_new_correction_wakes_idle_applier() -> Result<()> {
    let temp = TempDir::new()?;
    let timing = TimingConfig {
        max_empty_polls: 1,
        ..TimingConfig::default()
    };
    let (pipeline, clock) = pipeline(temp.path(), timing);
    let coordinator = pipeline.coordinator();

    assert!(!coordinator.applier().apply_pending_corrections());
    assert_eq!(coordinator.applier().state(), ActivityState::Idle);

    clock.advance(Duration::from_secs(1));
    let file = write_file(temp.path(), "app.py", "if a:\n  b\n   c\n");
    let outcome = coordinator.handle_change(&ChangeEvent::new(&file, EventType::Created, clock.now()));

    assert_eq!(
        outcome,
        HandleOutcome::Processed {
            valid: false,
            work_found: true
        }
    );
    assert_eq!(std::fs::read_to_string(&file)?, "if a:\n    b\n    c\n");
    Ok(())
}

#[test]
fn test_shutdown_ends_monitoring_loop() -> Result<()> {
    let temp = TempDir::new()?;
    let (pipeline, _clock) = pipeline(temp.path(), TimingConfig::default());
    let signal = ShutdownSignal::new();
    let pipeline = pipeline.with_shutdown(signal.clone());
    let coordinator = pipeline.coordinator();

    let watched = temp.path().join("project");
    std::fs::create_dir_all(&watched)?;
    signal.request();
    coordinator.start_monitoring(&watched)?;

    assert!(!coordinator.is_running());
    assert!(coordinator.monitored_directories().is_empty());
    Ok(())
}
