//! Opaque password hashes.
//!
//! The engine never sees a password. Clients derive a [`CredentialHash`] with
//! the djb2 string hash and send the decimal value; the engine only compares
//! hashes for equality.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Seed of the djb2 hash.
const DJB2_SEED: u64 = 5381;

/// 64-bit hash derived from a password.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CredentialHash(pub u64);

impl CredentialHash {
    /// Hashes a password with djb2 (`hash * 33 + byte`, wrapping at 64 bits).
    ///
    /// Not a cryptographic hash. It matches what existing clients send, which
    /// is all the engine needs since it compares values and nothing else.
    pub fn from_password(password: &str) -> Self {
        let hash = password.bytes().fold(DJB2_SEED, |hash, byte| {
            (hash << 5).wrapping_add(hash).wrapping_add(u64::from(byte))
        });
        CredentialHash(hash)
    }
}

impl fmt::Display for CredentialHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
