//! Scoped in-flight guard: a two-state Idle/Running flag.
//!
//! Components that must never run two batteries at once (diagnostics,
//! the passive monitor) acquire the flag before their first suspension
//! point. The guard returns the flag to `Idle` on drop, which covers
//! every exit path including early returns and panics.

use std::sync::atomic::{AtomicBool, Ordering};

/// Two-state Idle/Running flag with scoped acquisition.
#[derive(Debug, Default)]
pub struct InFlightFlag(AtomicBool);

impl InFlightFlag {
    /// Create a flag in the `Idle` state.
    pub const fn new() -> Self {
        Self(AtomicBool::new(false))
    }

    /// Transition `Idle -> Running`; `None` when already running.
    pub fn try_acquire(&self) -> Option<InFlightGuard<'_>> {
        self.0
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Acquire)
            .ok()
            .map(|_| InFlightGuard { flag: self })
    }

    /// Whether an operation currently holds the flag.
    pub fn is_running(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Guard that returns the flag to `Idle` when dropped.
#[derive(Debug)]
pub struct InFlightGuard<'a> {
    flag: &'a InFlightFlag,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.flag.0.store(false, Ordering::Release);
    }
}
