//! Core error types for userdb-core.
//!
//! Uses `thiserror` for structured, matchable error variants covering the
//! failure modes of the account data model and the slot store.

use thiserror::Error;

use crate::id::AccountId;

/// Errors produced by the userdb-core crate.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// The store needs one reserved slot plus at least one usable slot.
    #[error("invalid capacity {capacity}: must be at least 2")]
    InvalidCapacity { capacity: usize },

    /// Identifier 0 names no account.
    #[error("identifier 0 is reserved")]
    ReservedIdentifier,

    /// The identifier does not fit the store's fixed capacity.
    #[error("identifier {id} out of range (capacity {capacity})")]
    IdentifierOutOfRange { id: AccountId, capacity: usize },

    /// Another account already lives in this slot.
    #[error("slot {id} is already occupied")]
    SlotOccupied { id: AccountId },

    /// The username violates the length or character rules.
    #[error("invalid username '{name}': {reason}")]
    InvalidUsername { name: String, reason: &'static str },
}
