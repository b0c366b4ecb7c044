//! Environment abstraction for deterministic testing.
//!
//! The `Environment` trait decouples queue logic from the system clock. Every
//! timestamp the engine records (join time, serve time) and every trailing
//! window it evaluates (daily cap, estimate window) is measured against
//! `env.now()`, so tests can drive a 24 hour window in microseconds.
//!
//! # Invariants
//!
//! - Wall clock: `now()` returns UTC wall-clock time because tickets are
//!   persisted and must survive restarts. Unlike a monotonic clock it MAY go
//!   backwards; callers clamp where ordering matters.
//! - Isolation: implementations must not share global state

use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use parking_lot::Mutex;

/// Abstract environment providing the current time.
pub trait Environment: Clone + Send + Sync + 'static {
    /// Returns the current UTC time.
    fn now(&self) -> DateTime<Utc>;
}

/// Manually driven clock.
///
/// Clones share the same time source, so a test can hand one clone to a
/// `QueueStore` and keep another to advance time.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl ManualClock {
    /// Create a clock frozen at `start`.
    pub fn new(start: DateTime<Utc>) -> Self {
        Self { now: Arc::new(Mutex::new(start)) }
    }

    /// Create a clock frozen at the Unix epoch.
    pub fn at_epoch() -> Self {
        Self::new(DateTime::<Utc>::UNIX_EPOCH)
    }

    /// Move the clock forward (or backward, for a negative delta).
    pub fn advance(&self, delta: TimeDelta) {
        let mut now = self.now.lock();
        *now += delta;
    }

    /// Jump to an absolute time.
    pub fn set(&self, to: DateTime<Utc>) {
        *self.now.lock() = to;
    }
}

impl Environment for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}
