//! Queue Store
//!
//! The single waiting line: an ordered, lock-guarded sequence of tickets with
//! an open/closed gate and write-through persistence.
//!
//! ## Responsibilities
//!
//! - Admission: Gate, daily cap and duplicate checks, then append
//! - Service: Mark a student's waiting ticket served
//! - Statistics: Position, wait estimate, help counts over locked snapshots
//! - Persistence: Rewrite the stored document after every mutation
//!
//! ## Design
//!
//! - One lock over the whole store: lock acquisition order is FIFO order
//! - Write-through: the document is saved before the lock is released, so
//!   memory and disk only diverge if the process dies mid-call or the write
//!   fails
//! - Storage failures never reach callers: they are logged and the in-memory
//!   state stays authoritative for the running process
//! - Estimator and limiter are pure functions over the locked ticket slice

use parking_lot::Mutex;

use crate::{
    env::Environment,
    error::StorageError,
    estimator, limiter,
    policy::QueuePolicy,
    storage::{QueueState, Storage},
    ticket::Ticket,
};

/// Result of a join attempt.
///
/// Only `Joined` changes the queue. The other variants are ordinary policy
/// outcomes, not errors.
#[derive(Debug, Clone, PartialEq)]
pub enum JoinOutcome {
    /// Ticket appended
    Joined {
        /// Unserved tickets that were already waiting
        ahead_of_me: usize,
        /// Current wait estimate, `None` if no recent serves
        estimated_wait: Option<std::time::Duration>,
    },

    /// Student already holds an unserved ticket
    AlreadyQueued {
        /// Position of the existing ticket
        position: usize,
    },

    /// Student reached the daily help cap
    RateLimited {
        /// Serves within the help window
        times_helped: usize,
    },

    /// Queue is not accepting joins
    Closed,
}

impl JoinOutcome {
    /// Whether a ticket was appended.
    pub fn is_joined(&self) -> bool {
        matches!(self, Self::Joined { .. })
    }
}

/// The help desk queue.
///
/// Every method takes `&self`; share it between threads with `Arc`.
pub struct QueueStore<E, S>
where
    E: Environment,
    S: Storage,
{
    state: Mutex<QueueState>,
    env: E,
    storage: S,
    policy: QueuePolicy,
}

impl<E, S> QueueStore<E, S>
where
    E: Environment,
    S: Storage,
{
    /// Create an empty, open queue without reading storage.
    pub fn new(env: E, storage: S, policy: QueuePolicy) -> Self {
        Self { state: Mutex::new(QueueState::default()), env, storage, policy }
    }

    /// Create a queue restored from storage.
    ///
    /// A missing document is a first run. An unreadable or malformed document
    /// is logged and replaced by an empty queue; data loss is accepted here
    /// rather than refusing to start.
    pub fn open(env: E, storage: S, policy: QueuePolicy) -> Self {
        let state = match storage.load() {
            Ok(Some(document)) => match QueueState::decode(&document) {
                Ok(state) => {
                    tracing::info!(
                        "Restored queue with {} tickets ({} waiting)",
                        state.tickets.len(),
                        state.tickets.iter().filter(|t| !t.is_served()).count()
                    );
                    state
                },
                Err(e) => {
                    tracing::error!("Stored queue is corrupt, starting empty: {}", e);
                    QueueState::default()
                },
            },
            Ok(None) => {
                tracing::info!("No stored queue found, starting empty");
                QueueState::default()
            },
            Err(e) => {
                tracing::error!("Failed to read stored queue, starting empty: {}", e);
                QueueState::default()
            },
        };

        Self { state: Mutex::new(state), env, storage, policy }
    }

    /// The policy this queue enforces.
    pub fn policy(&self) -> &QueuePolicy {
        &self.policy
    }

    /// Add a ticket for `student_id`.
    ///
    /// Checks run in order: gate, daily cap, existing ticket. The checks and
    /// the append happen under one lock acquisition, so two concurrent joins
    /// for the same student cannot both succeed.
    pub fn join(&self, student_id: &str, name: &str, task_info: &str) -> JoinOutcome {
        let now = self.env.now();
        let mut state = self.state.lock();

        if !state.is_open {
            return JoinOutcome::Closed;
        }

        let times_helped = limiter::times_helped_in_window(
            &state.tickets,
            student_id,
            now,
            self.policy.help_window,
        );
        if !limiter::may_join(times_helped, self.policy.max_times_helped.get()) {
            tracing::debug!("Join rejected for {}: helped {} times", student_id, times_helped);
            return JoinOutcome::RateLimited { times_helped };
        }

        if let Some(position) = position_in(&state.tickets, student_id) {
            return JoinOutcome::AlreadyQueued { position };
        }

        let ahead_of_me = state.tickets.iter().filter(|t| !t.is_served()).count();
        state.tickets.push(Ticket::new(student_id, name, task_info, now));
        self.persist(&state);

        let estimated_wait =
            estimator::estimated_wait(&state.tickets, now, self.policy.estimate_window);

        tracing::debug!("{} joined with {} ahead", student_id, ahead_of_me);
        JoinOutcome::Joined { ahead_of_me, estimated_wait }
    }

    /// Whether `student_id` has a ticket still waiting.
    pub fn has_open_ticket(&self, student_id: &str) -> bool {
        let state = self.state.lock();
        state.tickets.iter().any(|t| t.student_id == student_id && !t.is_served())
    }

    /// Mark every waiting ticket of `student_id` as served.
    ///
    /// Returns how many tickets changed. Serving a student with no waiting
    /// ticket is a no-op.
    pub fn serve(&self, student_id: &str) -> usize {
        let now = self.env.now();
        let mut state = self.state.lock();

        let served = state
            .tickets
            .iter_mut()
            .filter(|t| t.student_id == student_id)
            .map(|t| t.mark_served(now))
            .filter(|&changed| changed)
            .count();

        if served > 0 {
            self.persist(&state);
            tracing::debug!("Served {}", student_id);
        }

        served
    }

    /// Waiting tickets in arrival order.
    pub fn unserved_entries(&self) -> Vec<Ticket> {
        let state = self.state.lock();
        state.tickets.iter().filter(|t| !t.is_served()).cloned().collect()
    }

    /// Zero-based rank of `student_id` among waiting tickets.
    ///
    /// Returns `None` if the student is not waiting.
    pub fn position_of(&self, student_id: &str) -> Option<usize> {
        let state = self.state.lock();
        position_in(&state.tickets, student_id)
    }

    /// Mean wait of recently served tickets, `None` if there is no estimate.
    pub fn estimated_wait(&self) -> Option<std::time::Duration> {
        let now = self.env.now();
        let state = self.state.lock();
        estimator::estimated_wait(&state.tickets, now, self.policy.estimate_window)
    }

    /// Times `student_id` was served within the help window.
    pub fn times_helped(&self, student_id: &str) -> usize {
        let now = self.env.now();
        let state = self.state.lock();
        limiter::times_helped_in_window(&state.tickets, student_id, now, self.policy.help_window)
    }

    /// Waiting tickets in arrival order, each with its student's help count.
    ///
    /// Taken under one lock, so every count matches the listed queue.
    pub fn unserved_with_help_counts(&self) -> Vec<(Ticket, usize)> {
        let now = self.env.now();
        let state = self.state.lock();
        state
            .tickets
            .iter()
            .filter(|t| !t.is_served())
            .map(|ticket| {
                let helped = limiter::times_helped_in_window(
                    &state.tickets,
                    &ticket.student_id,
                    now,
                    self.policy.help_window,
                );
                (ticket.clone(), helped)
            })
            .collect()
    }

    /// Served tickets over the queue's whole history.
    pub fn total_served(&self) -> usize {
        let state = self.state.lock();
        state.tickets.iter().filter(|t| t.is_served()).count()
    }

    /// Whether new joins are accepted.
    pub fn is_open(&self) -> bool {
        self.state.lock().is_open
    }

    /// Open or close the queue. Closing keeps waiting tickets.
    pub fn set_open(&self, open: bool) {
        let mut state = self.state.lock();
        if state.is_open == open {
            return;
        }

        state.is_open = open;
        self.persist(&state);
        tracing::info!("Queue is now {}", if open { "open" } else { "closed" });
    }

    /// Copy of the full state.
    pub fn snapshot(&self) -> QueueState {
        self.state.lock().clone()
    }

    /// Encoded document for the current state, as it would be persisted.
    pub fn dump(&self) -> Result<Vec<u8>, StorageError> {
        self.state.lock().encode()
    }

    /// Drop every ticket and delete the stored document.
    ///
    /// Irreversible. The queue reopens empty. If the document cannot be
    /// deleted it is overwritten with the empty state.
    pub fn reset(&self) {
        let mut state = self.state.lock();
        let dropped = state.tickets.len();
        *state = QueueState::default();

        if let Err(e) = self.storage.remove() {
            tracing::error!("Failed to delete stored queue, overwriting it instead: {}", e);
            self.persist(&state);
        }
        tracing::warn!("Queue reset, {} tickets dropped", dropped);
    }

    /// Save `state`. Called with the lock held.
    fn persist(&self, state: &QueueState) {
        let result = state.encode().and_then(|document| self.storage.store(&document));
        if let Err(e) = result {
            tracing::error!("Failed to persist queue: {}", e);
        }
    }
}

fn position_in(tickets: &[Ticket], student_id: &str) -> Option<usize> {
    tickets.iter().filter(|t| !t.is_served()).position(|t| t.student_id == student_id)
}

impl<E, S> std::fmt::Debug for QueueStore<E, S>
where
    E: Environment,
    S: Storage,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("QueueStore")
            .field("ticket_count", &state.tickets.len())
            .field("is_open", &state.is_open)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}
