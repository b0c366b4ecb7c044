//! Student identity: account id format and self-service secrets.
//!
//! A student who joins receives a secret bound to their id. Presenting it
//! later lets them leave the queue without staff credentials.
//!
//! # Security
//!
//! - Secrets are HMAC-SHA256 of the student id under a server seed, so they
//!   cannot be forged without the seed and survive restarts without storage.
//! - Verification compares MACs in constant time.
//! - **Debug Redaction**: `SecretIssuer`'s `Debug` impl never prints key
//!   material.

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::{IdentityError, ValidationError};

type HmacSha256 = Hmac<Sha256>;

/// Accepted student id lengths.
pub const VALID_ID_LENGTHS: [usize; 2] = [4, 5];

/// Whether `id` looks like a student account id.
///
/// Letters at even positions, digits at odd positions (`a1b2`, `r3a1b`).
pub fn is_valid_id(id: &str) -> bool {
    let len = id.chars().count();
    if !VALID_ID_LENGTHS.contains(&len) {
        return false;
    }

    id.chars().enumerate().all(|(i, c)| {
        if i % 2 == 0 { c.is_ascii_alphabetic() } else { c.is_ascii_digit() }
    })
}

/// Check a join request's id and name before it reaches the store.
pub fn validate_join(student_id: &str, name: &str) -> Result<(), ValidationError> {
    if !is_valid_id(student_id) {
        return Err(ValidationError::InvalidId(student_id.to_string()));
    }
    if name.trim().is_empty() {
        return Err(ValidationError::EmptyName);
    }
    Ok(())
}

/// Issues and verifies per-student secrets.
#[derive(Clone)]
pub struct SecretIssuer {
    mac: HmacSha256,
}

impl SecretIssuer {
    /// Create an issuer keyed by `seed`.
    pub fn new(seed: &[u8]) -> Result<Self, IdentityError> {
        if seed.is_empty() {
            return Err(IdentityError::EmptySeed);
        }
        // HMAC accepts keys of any length.
        let mac = HmacSha256::new_from_slice(seed).map_err(|_| IdentityError::EmptySeed)?;
        Ok(Self { mac })
    }

    /// Secret for `student_id`, hex encoded.
    pub fn issue(&self, student_id: &str) -> String {
        let mut mac = self.mac.clone();
        mac.update(student_id.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    /// Whether `secret` was issued for `student_id`.
    pub fn verify(&self, secret: &str, student_id: &str) -> bool {
        let Ok(tag) = hex::decode(secret.trim()) else {
            return false;
        };
        let mut mac = self.mac.clone();
        mac.update(student_id.as_bytes());
        mac.verify_slice(&tag).is_ok()
    }
}

impl std::fmt::Debug for SecretIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretIssuer").field("key", &"<redacted>").finish()
    }
}
