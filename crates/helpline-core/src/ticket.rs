//! Ticket: one request for help.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single help request.
///
/// A student accumulates one ticket per visit. Served tickets are kept so the
/// daily cap and the wait estimate can be derived from history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
    /// Student account identifier
    pub student_id: String,
    /// Display name given at join time
    pub name: String,
    /// What the student needs help with (may be empty)
    pub task_info: String,
    /// When the ticket was created
    pub joined_at: DateTime<Utc>,
    served: bool,
    served_at: Option<DateTime<Utc>>,
}

impl Ticket {
    /// Create an unserved ticket.
    pub fn new(
        student_id: impl Into<String>,
        name: impl Into<String>,
        task_info: impl Into<String>,
        joined_at: DateTime<Utc>,
    ) -> Self {
        Self {
            student_id: student_id.into(),
            name: name.into(),
            task_info: task_info.into(),
            joined_at,
            served: false,
            served_at: None,
        }
    }

    /// Whether staff has served this ticket.
    pub fn is_served(&self) -> bool {
        self.served
    }

    /// When the ticket was served, if it was.
    pub fn served_at(&self) -> Option<DateTime<Utc>> {
        self.served_at
    }

    /// Time between joining and being served.
    pub fn wait_time(&self) -> Option<chrono::TimeDelta> {
        self.served_at.map(|served_at| served_at - self.joined_at)
    }

    /// Transition to served.
    ///
    /// Returns `false` without touching anything if the ticket was already
    /// served. The recorded serve time never precedes `joined_at`, even if the
    /// wall clock stepped backwards in between.
    pub fn mark_served(&mut self, at: DateTime<Utc>) -> bool {
        if self.served {
            return false;
        }

        self.served_at = Some(at.max(self.joined_at));
        self.served = true;
        true
    }
}
