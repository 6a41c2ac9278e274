//! Monotonic millisecond tick sources.
//!
//! Deadlines for delayed tasks and the event loop's one-shot timer are both
//! expressed as integer milliseconds read from a [`Clock`]. The scheduler and
//! its loop share a single clock so that `due_time` and timer deadlines are
//! always comparable.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// A monotonically non-decreasing millisecond counter.
pub trait Clock: Send + Sync {
    /// Current tick count in milliseconds.
    fn now_ms(&self) -> u64;
}

/// Real clock backed by [`Instant`], counting from its construction.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    /// Create a clock whose tick zero is now.
    #[must_use]
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now_ms(&self) -> u64 {
        u64::try_from(self.origin.elapsed().as_millis()).unwrap_or(u64::MAX)
    }
}

/// Manually driven clock for tests and simulations.
///
/// Time only moves when [`ManualClock::advance`] or [`ManualClock::set`] is
/// called. `set` never moves the clock backwards.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    /// Create a clock starting at `start_ms`.
    #[must_use]
    pub const fn new(start_ms: u64) -> Self {
        Self {
            now: AtomicU64::new(start_ms),
        }
    }

    /// Move the clock forward by `ms` milliseconds, saturating at `u64::MAX`.
    pub fn advance(&self, ms: u64) {
        let _ = self
            .now
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |now| {
                Some(now.saturating_add(ms))
            });
    }

    /// Jump to `ms` if it is ahead of the current reading.
    pub fn set(&self, ms: u64) {
        self.now.fetch_max(ms, Ordering::AcqRel);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now.load(Ordering::Acquire)
    }
}
