//! Clock abstraction for timestamp validation.
//!
//! Freshness checks and TTL arithmetic all read time through `ClockSource`
//! so tests can pin the clock instead of sleeping.

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Source of the current Unix time in seconds.
pub trait ClockSource: Send + Sync {
    /// Current wall-clock time as Unix seconds.
    fn now_unix(&self) -> i64;
}

/// Production clock backed by `SystemTime`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl ClockSource for SystemClock {
    fn now_unix(&self) -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs() as i64
    }
}

/// Settable clock for tests.
///
/// # Example
///
/// ```
/// use zito_protocol::clock::{ClockSource, ManualClock};
///
/// let clock = ManualClock::new(1_768_763_180);
/// clock.advance(300);
/// assert_eq!(clock.now_unix(), 1_768_763_480);
/// ```
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    /// Create a clock pinned at `now` Unix seconds.
    pub fn new(now: i64) -> Self {
        Self {
            now: AtomicI64::new(now),
        }
    }

    /// Move the clock forward (or backward, with a negative delta).
    pub fn advance(&self, secs: i64) {
        self.now.fetch_add(secs, Ordering::SeqCst);
    }

    /// Pin the clock at an absolute time.
    pub fn set(&self, now: i64) {
        self.now.store(now, Ordering::SeqCst);
    }
}

impl ClockSource for ManualClock {
    fn now_unix(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}
