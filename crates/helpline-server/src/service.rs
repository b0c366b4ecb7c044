//! Help Desk Service
//!
//! Glue between the HTTP surface and the queue engine.
//!
//! ## Responsibilities
//!
//! - Validation: Reject malformed ids and names before they reach the store
//! - Identity: Hand out self-service secrets on join, check them on leave
//! - Authorization: Staff credentials and the network access filter
//! - Delegation: Every queue operation is a single `QueueStore` call
//!
//! ## Design
//!
//! The service holds no queue state of its own. It is transport-agnostic:
//! handlers pass in the already extracted caller address and credentials, and
//! mapping `ServiceError` to a status code is the router's job.

use std::{net::IpAddr, sync::Arc, time::Duration};

use helpline_core::{
    Environment, JoinOutcome, QueueStore, SecretIssuer, Storage, StorageError, Ticket,
    ValidationError, is_valid_id, validate_join,
};
use thiserror::Error;

use crate::{access::AccessFilter, config::Credentials};

/// Errors returned to service callers.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Request failed input validation
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Missing or wrong credentials or secret
    #[error("unauthorized")]
    Unauthorized,

    /// Caller's network is not allowed
    #[error("forbidden")]
    Forbidden,

    /// State could not be encoded
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// A student's request to join.
#[derive(Debug, Clone)]
pub struct JoinRequest {
    /// Account id
    pub student_id: String,
    /// Display name
    pub name: String,
    /// What they need help with
    pub task_info: String,
}

/// Result of a validated join.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinReceipt {
    /// Queue decision
    pub outcome: JoinOutcome,
    /// Self-service secret, only when a ticket was created
    pub secret: Option<String>,
}

/// Public view of the queue.
#[derive(Debug, Clone, PartialEq)]
pub struct QueueStatus {
    /// Waiting tickets in order
    pub waiting: Vec<Ticket>,
    /// Served tickets over all time
    pub total_served: usize,
    /// Whether joins are accepted
    pub is_open: bool,
    /// Current wait estimate
    pub estimated_wait: Option<Duration>,
}

/// Where a student stands.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionReport {
    /// Zero-based rank, `None` if not waiting
    pub position: Option<usize>,
    /// Current wait estimate
    pub estimated_wait: Option<Duration>,
}

/// Waiting ticket annotated for staff.
#[derive(Debug, Clone, PartialEq)]
pub struct StaffEntry {
    /// The waiting ticket
    pub ticket: Ticket,
    /// Serves of this student within the help window
    pub times_helped: usize,
}

/// The help desk service.
pub struct HelpDesk<E, S>
where
    E: Environment,
    S: Storage,
{
    store: Arc<QueueStore<E, S>>,
    issuer: SecretIssuer,
    credentials: Credentials,
    access: Option<AccessFilter>,
}

impl<E, S> HelpDesk<E, S>
where
    E: Environment,
    S: Storage,
{
    /// Create a service over `store`. `access: None` disables network filtering.
    pub fn new(
        store: Arc<QueueStore<E, S>>,
        issuer: SecretIssuer,
        credentials: Credentials,
        access: Option<AccessFilter>,
    ) -> Self {
        Self { store, issuer, credentials, access }
    }

    /// The underlying queue.
    pub fn store(&self) -> &Arc<QueueStore<E, S>> {
        &self.store
    }

    /// Check the caller's network against the access filter.
    pub async fn check_network(&self, ip: IpAddr) -> Result<(), ServiceError> {
        match &self.access {
            Some(filter) if !filter.is_authorized(ip).await => Err(ServiceError::Forbidden),
            _ => Ok(()),
        }
    }

    /// Check staff credentials.
    pub fn check_staff(&self, username: &str, password: &str) -> Result<(), ServiceError> {
        if self.credentials.verify(username, password) {
            Ok(())
        } else {
            tracing::warn!("Rejected staff login for {:?}", username);
            Err(ServiceError::Unauthorized)
        }
    }

    /// Validate and enqueue.
    pub fn join(&self, request: &JoinRequest) -> Result<JoinReceipt, ServiceError> {
        let name = request.name.trim();
        validate_join(&request.student_id, name)?;

        let outcome = self.store.join(&request.student_id, name, &request.task_info);
        let secret = outcome.is_joined().then(|| self.issuer.issue(&request.student_id));

        Ok(JoinReceipt { outcome, secret })
    }

    /// Public queue status.
    pub fn status(&self) -> QueueStatus {
        QueueStatus {
            waiting: self.store.unserved_entries(),
            total_served: self.store.total_served(),
            is_open: self.store.is_open(),
            estimated_wait: self.store.estimated_wait(),
        }
    }

    /// Position and estimate for one student.
    pub fn position(&self, student_id: &str) -> Result<PositionReport, ServiceError> {
        if !is_valid_id(student_id) {
            return Err(ValidationError::InvalidId(student_id.to_string()).into());
        }
        Ok(PositionReport {
            position: self.store.position_of(student_id),
            estimated_wait: self.store.estimated_wait(),
        })
    }

    /// Leave the queue early with a self-service secret.
    ///
    /// Returns how many tickets were closed; 0 if the student was not waiting.
    pub fn leave(&self, student_id: &str, secret: &str) -> Result<usize, ServiceError> {
        if !self.issuer.verify(secret, student_id) {
            tracing::warn!("Rejected leave for {} with bad secret", student_id);
            return Err(ServiceError::Unauthorized);
        }
        let left = self.store.serve(student_id);
        if left > 0 {
            tracing::info!("{} left the queue", student_id);
        }
        Ok(left)
    }

    /// Mark a student served.
    pub fn serve(&self, staff: &str, student_id: &str) -> usize {
        let served = self.store.serve(student_id);
        tracing::info!("{} served {} ({} tickets)", staff, student_id, served);
        served
    }

    /// Open or close the queue.
    pub fn set_open(&self, staff: &str, open: bool) {
        tracing::info!("{} set queue open={}", staff, open);
        self.store.set_open(open);
    }

    /// Wipe the queue and its stored document.
    pub fn reset(&self, staff: &str) {
        tracing::warn!("Queue reset requested by {}", staff);
        self.store.reset();
    }

    /// The encoded queue document.
    pub fn dump(&self) -> Result<Vec<u8>, ServiceError> {
        Ok(self.store.dump()?)
    }

    /// Waiting tickets with each student's recent help count.
    pub fn staff_queue(&self) -> Vec<StaffEntry> {
        self.store
            .unserved_with_help_counts()
            .into_iter()
            .map(|(ticket, times_helped)| StaffEntry { ticket, times_helped })
            .collect()
    }
}

impl<E, S> std::fmt::Debug for HelpDesk<E, S>
where
    E: Environment,
    S: Storage,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HelpDesk")
            .field("store", &self.store)
            .field("staff_accounts", &self.credentials.len())
            .field("access", &self.access)
            .finish_non_exhaustive()
    }
}
