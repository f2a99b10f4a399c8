//! Stable account identifier.
//!
//! [`AccountId`] is a newtype over `u64` so an identifier cannot be confused
//! with a credential hash, which shares the same wire representation.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Numeric key of an account slot.
///
/// Identifier 0 is reserved: it never names an account and stands for
/// "no identifier available".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AccountId(pub u64);

impl AccountId {
    /// The reserved sentinel identifier.
    pub const RESERVED: AccountId = AccountId(0);

    /// Returns true for the reserved sentinel.
    pub fn is_reserved(self) -> bool {
        self == Self::RESERVED
    }

    /// Slot index of this identifier, if it fits in `usize`.
    pub fn index(self) -> Option<usize> {
        usize::try_from(self.0).ok()
    }
}

// Display prints the bare number; replies prefix it with '#'.
impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<usize> for AccountId {
    fn from(index: usize) -> Self {
        AccountId(index as u64)
    }
}
