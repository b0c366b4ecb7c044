//! Helpline queue engine.
//!
//! A single shared waiting line for a walk-in help desk. Students join,
//! staff serve, and the engine reports positions and wait estimates while
//! enforcing a daily help cap per student.
//!
//! ## Architecture
//!
//! ```text
//! helpline-core
//!   ├─ QueueStore     (lock-guarded tickets, admission, write-through)
//!   │    ├─ estimator (mean wait over a snapshot)
//!   │    └─ limiter   (daily cap over a snapshot)
//!   ├─ Storage        (file / memory / fault-injecting backends)
//!   ├─ Environment    (wall clock, manual clock for tests)
//!   └─ identity       (id format, self-service secrets)
//! ```
//!
//! The engine is synchronous and owns no threads. The service layer wraps a
//! `QueueStore` in an `Arc` and calls it from whatever executor it runs.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod env;
mod error;
pub mod estimator;
pub mod identity;
pub mod limiter;
mod policy;
mod queue;
pub mod storage;
mod ticket;

pub use env::{Environment, ManualClock};
pub use error::{IdentityError, StorageError, ValidationError};
pub use identity::{SecretIssuer, is_valid_id, validate_join};
pub use policy::{DEFAULT_MAX_TIMES_HELPED, QueuePolicy};
pub use queue::{JoinOutcome, QueueStore};
pub use storage::{ChaoticStorage, FileStorage, MemoryStorage, QueueState, Storage};
pub use ticket::Ticket;
