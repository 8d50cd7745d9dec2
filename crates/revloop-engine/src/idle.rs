//! Activity state machine shared by the applier and the coordinator
//!
//! A loop is idle once `idle_timeout` passes without activity or after
//! `max_empty_polls` consecutive polls found nothing to do. Time comes from
//! the caller so tests can drive it with a manual clock.

use chrono::{DateTime, Utc};
use std::fmt;
use std::time::Duration;

use revloop_utils::clock::elapsed_between;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityState {
    Active,
    /// Timed out or ran out of work; [`IdleTracker::wake`] revives it
    Idle,
    /// Terminal
    Stopped,
}

impl fmt::Display for ActivityState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Active => "active",
            Self::Idle => "idle",
            Self::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone)]
pub struct IdleTracker {
    state: ActivityState,
    last_activity: DateTime<Utc>,
    empty_polls: u32,
    max_empty_polls: u32,
    idle_timeout: Duration,
}

impl IdleTracker {
    #[must_use]
    pub fn new(now: DateTime<Utc>, idle_timeout: Duration, max_empty_polls: u32) -> Self {
        Self {
            state: ActivityState::Active,
            last_activity: now,
            empty_polls: 0,
            max_empty_polls,
            idle_timeout,
        }
    }

    #[must_use]
    pub fn state(&self) -> ActivityState {
        self.state
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.state == ActivityState::Active
    }

    #[must_use]
    pub fn empty_polls(&self) -> u32 {
        self.empty_polls
    }

    #[must_use]
    pub fn last_activity(&self) -> DateTime<Utc> {
        self.last_activity
    }

    /// Useful work happened: refresh the activity time and the poll count.
    pub fn record_activity(&mut self, now: DateTime<Utc>) {
        self.last_activity = now;
        self.empty_polls = 0;
    }

    /// A poll found work, whether or not it could act on it yet.
    pub fn record_work_found(&mut self) {
        self.empty_polls = 0;
    }

    /// A poll found nothing. Returns the resulting state.
    pub fn record_empty_poll(&mut self, now: DateTime<Utc>) -> ActivityState {
        if self.state == ActivityState::Active {
            self.empty_polls = self.empty_polls.saturating_add(1);
            if self.empty_polls >= self.max_empty_polls {
                self.state = ActivityState::Idle;
            }
        }
        self.check_timeout(now)
    }

    /// Go idle if the timeout has elapsed. Returns the resulting state.
    pub fn check_timeout(&mut self, now: DateTime<Utc>) -> ActivityState {
        if self.state == ActivityState::Active
            && elapsed_between(self.last_activity, now) >= self.idle_timeout
        {
            self.state = ActivityState::Idle;
        }
        self.state
    }

    /// Revive an idle tracker. A stopped tracker stays stopped.
    pub fn wake(&mut self, now: DateTime<Utc>) {
        if self.state == ActivityState::Idle {
            self.state = ActivityState::Active;
        }
        if self.state == ActivityState::Active {
            self.record_activity(now);
        }
    }

    /// Back to active from any state.
    pub fn reset(&mut self, now: DateTime<Utc>) {
        self.state = ActivityState::Active;
        self.record_activity(now);
    }

    pub fn stop(&mut self) {
        self.state = ActivityState::Stopped;
    }
}

/// Rate limiter for repeated log messages. The first message always passes.
#[derive(Debug, Clone)]
pub struct LogThrottle {
    cooldown: Duration,
    last: Option<DateTime<Utc>>,
}

impl LogThrottle {
    #[must_use]
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            last: None,
        }
    }

    /// True when a message may be emitted now; records the emission.
    pub fn ready(&mut self, now: DateTime<Utc>) -> bool {
        match self.last {
            Some(last) if elapsed_between(last, now) < self.cooldown => false,
            _ => {
                self.last = Some(now);
                true
            }
        }
    }

    #[must_use]
    pub fn last_emitted(&self) -> Option<DateTime<Utc>> {
        self.last
    }
}
