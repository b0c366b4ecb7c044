//! Core error types.

use thiserror::Error;

/// Errors from the persistence layer.
///
/// The queue itself never surfaces these to callers of mutating operations;
/// they are logged and the in-memory state stays authoritative.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Reading, writing or deleting the backing store failed.
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The stored document could not be encoded or decoded.
    #[error("malformed queue document: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// User-correctable input problems, caught before the store is touched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Student identifier does not match the account format.
    #[error("invalid student id: {0:?}")]
    InvalidId(String),

    /// Display name was empty or whitespace.
    #[error("name must not be empty")]
    EmptyName,
}

/// Errors from setting up self-service identity.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentityError {
    /// The derivation seed was empty.
    #[error("secret derivation seed must not be empty")]
    EmptySeed,
}
