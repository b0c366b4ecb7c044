//! Production Environment implementation using the system clock.
//!
//! This module provides `SystemEnv`, the production implementation of the
//! `Environment` trait that reads real UTC wall-clock time.

use chrono::{DateTime, Utc};
use helpline_core::Environment;

/// Production environment using the system wall clock.
///
/// Wall-clock time is used rather than `Instant` because ticket timestamps
/// are persisted and compared across restarts.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemEnv;

impl SystemEnv {
    /// Create a new system environment.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Environment for SystemEnv {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
