//! Persistence for the queue.
//!
//! The queue is stored as one JSON document holding every ticket plus the
//! open/closed flag. The document is rewritten wholesale after each mutation
//! (write-through); there is no append log and no version field.
//!
//! # Implementations
//!
//! - [`FileStorage`]: a single file on local disk (production)
//! - [`MemoryStorage`]: an in-memory slot; clones share state
//! - [`ChaoticStorage`]: wraps another storage and fails writes or removes on demand

use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::{error::StorageError, ticket::Ticket};

/// Full persisted state of a queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueState {
    /// Every ticket ever created, in arrival order
    pub tickets: Vec<Ticket>,
    /// Whether new joins are accepted
    pub is_open: bool,
}

impl Default for QueueState {
    fn default() -> Self {
        Self { tickets: Vec::new(), is_open: true }
    }
}

impl QueueState {
    /// Encode as the persisted JSON document.
    pub fn encode(&self) -> Result<Vec<u8>, StorageError> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Decode a persisted JSON document.
    pub fn decode(bytes: &[u8]) -> Result<Self, StorageError> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// Backing store for the encoded queue document.
///
/// Implementations only move bytes; encoding is the queue's concern.
pub trait Storage: Send + Sync + 'static {
    /// Read the stored document. `Ok(None)` means nothing was ever stored.
    fn load(&self) -> Result<Option<Vec<u8>>, StorageError>;

    /// Replace the stored document.
    fn store(&self, document: &[u8]) -> Result<(), StorageError>;

    /// Delete the stored document. Deleting nothing succeeds.
    fn remove(&self) -> Result<(), StorageError>;
}

/// Queue document kept in a single local file.
#[derive(Debug, Clone)]
pub struct FileStorage {
    path: PathBuf,
}

impl FileStorage {
    /// Storage backed by `path`. The file need not exist yet.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Storage for FileStorage {
    fn load(&self) -> Result<Option<Vec<u8>>, StorageError> {
        match std::fs::read(&self.path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn store(&self, document: &[u8]) -> Result<(), StorageError> {
        std::fs::write(&self.path, document)?;
        Ok(())
    }

    fn remove(&self) -> Result<(), StorageError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// In-memory storage.
///
/// Cloning yields a handle to the same slot, so a test can keep one clone
/// while the queue owns another and then inspect what was written.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    document: Arc<Mutex<Option<Vec<u8>>>>,
}

impl MemoryStorage {
    /// Empty storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Storage pre-seeded with a document, as if written by a prior run.
    pub fn with_document(document: impl Into<Vec<u8>>) -> Self {
        Self { document: Arc::new(Mutex::new(Some(document.into()))) }
    }

    /// Number of bytes currently stored, `None` if empty.
    pub fn stored_len(&self) -> Option<usize> {
        self.document.lock().as_ref().map(Vec::len)
    }
}

impl Storage for MemoryStorage {
    fn load(&self) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self.document.lock().clone())
    }

    fn store(&self, document: &[u8]) -> Result<(), StorageError> {
        *self.document.lock() = Some(document.to_vec());
        Ok(())
    }

    fn remove(&self) -> Result<(), StorageError> {
        *self.document.lock() = None;
        Ok(())
    }
}

/// Storage wrapper that fails writes while tripped.
///
/// Reads always pass through. Clones share the trip switch.
#[derive(Debug, Clone)]
pub struct ChaoticStorage<S> {
    inner: S,
    fail_writes: Arc<AtomicBool>,
    fail_removes: Arc<AtomicBool>,
}

impl<S: Storage> ChaoticStorage<S> {
    /// Wrap `inner`; writes succeed until [`Self::set_fail_writes`] is called.
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            fail_writes: Arc::new(AtomicBool::new(false)),
            fail_removes: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Make subsequent `store` and `remove` calls fail (or succeed again).
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Make subsequent `remove` calls fail while `store` keeps working.
    pub fn set_fail_removes(&self, fail: bool) {
        self.fail_removes.store(fail, Ordering::SeqCst);
    }

    /// The wrapped storage.
    pub fn inner(&self) -> &S {
        &self.inner
    }

    fn check(&self) -> Result<(), StorageError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(std::io::Error::other("injected write failure").into());
        }
        Ok(())
    }
}

impl<S: Storage> Storage for ChaoticStorage<S> {
    fn load(&self) -> Result<Option<Vec<u8>>, StorageError> {
        self.inner.load()
    }

    fn store(&self, document: &[u8]) -> Result<(), StorageError> {
        self.check()?;
        self.inner.store(document)
    }

    fn remove(&self) -> Result<(), StorageError> {
        self.check()?;
        if self.fail_removes.load(Ordering::SeqCst) {
            return Err(std::io::Error::other("injected remove failure").into());
        }
        self.inner.remove()
    }
}
