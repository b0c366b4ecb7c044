//! Wait-time estimate.
//!
//! Pure function over a ticket snapshot: the caller takes the queue lock,
//! passes the slice, and gets the mean join-to-serve time of recently served
//! tickets.

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};

use crate::ticket::Ticket;

/// Mean wait of tickets served within `window` before `now`.
///
/// `window = None` averages over the whole history. Returns `None` when no
/// served ticket qualifies: there is no estimate, which is different from an
/// estimate of zero.
pub fn estimated_wait(
    tickets: &[Ticket],
    now: DateTime<Utc>,
    window: Option<TimeDelta>,
) -> Option<Duration> {
    let cutoff = window.map(|w| now - w);

    let (total_secs, count) = tickets
        .iter()
        .filter(|t| t.is_served())
        .filter(|t| match (cutoff, t.served_at()) {
            (Some(cutoff), Some(served_at)) => served_at > cutoff,
            (None, Some(_)) => true,
            (_, None) => false,
        })
        .filter_map(|t| t.wait_time()?.to_std().ok())
        .fold((0.0_f64, 0_u32), |(total, count), wait| (total + wait.as_secs_f64(), count + 1));

    if count == 0 {
        return None;
    }

    let mean = total_secs / f64::from(count);
    Some(Duration::from_secs_f64(mean))
}
