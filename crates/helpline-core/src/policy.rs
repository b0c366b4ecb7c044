//! Queue admission and statistics policy.

use std::num::NonZeroUsize;

use chrono::TimeDelta;

/// Default daily help cap.
pub const DEFAULT_MAX_TIMES_HELPED: usize = 5;

/// Policy knobs for a [`crate::QueueStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueuePolicy {
    /// A join is rejected once a student was served this many times within
    /// `help_window`
    pub max_times_helped: NonZeroUsize,
    /// Trailing window for the help cap
    pub help_window: TimeDelta,
    /// Trailing window for the wait estimate, `None` for all history
    pub estimate_window: Option<TimeDelta>,
}

impl Default for QueuePolicy {
    fn default() -> Self {
        Self {
            max_times_helped: NonZeroUsize::new(DEFAULT_MAX_TIMES_HELPED)
                .unwrap_or(NonZeroUsize::MIN),
            help_window: TimeDelta::hours(24),
            estimate_window: Some(TimeDelta::minutes(30)),
        }
    }
}

impl QueuePolicy {
    /// Default policy with a different help cap.
    pub fn with_max_times_helped(max_times_helped: NonZeroUsize) -> Self {
        Self { max_times_helped, ..Self::default() }
    }
}
