//! Cooperative cancellation shared between loops.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Flag checked by the monitoring and polling loops once per iteration.
///
/// Setting it never interrupts a write in progress; the loop finishes the
/// current iteration and exits.
#[derive(Debug, Clone, Default)]
pub struct ShutdownSignal {
    requested: Arc<AtomicBool>,
}

impl ShutdownSignal {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&self) {
        self.requested.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }
}
