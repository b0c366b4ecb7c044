//! Daily help cap.

use chrono::{DateTime, TimeDelta, Utc};

use crate::ticket::Ticket;

/// Number of times `student_id` was served within `window` before `now`.
pub fn times_helped_in_window(
    tickets: &[Ticket],
    student_id: &str,
    now: DateTime<Utc>,
    window: TimeDelta,
) -> usize {
    let cutoff = now - window;
    tickets
        .iter()
        .filter(|t| t.student_id == student_id && t.is_served())
        .filter(|t| t.served_at().is_some_and(|served_at| served_at > cutoff))
        .count()
}

/// Whether a student with `times_helped` recent serves may join again.
pub fn may_join(times_helped: usize, max_times_helped: usize) -> bool {
    times_helped < max_times_helped
}
