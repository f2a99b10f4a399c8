//! The [`RecordCodec`] trait: the seam between accounts and snapshot bytes.
//!
//! The snapshot protocol reads and writes records one at a time through this
//! trait and never looks inside them, so the on-disk layout can change
//! (a version byte, a wider checksum) without touching the store or engine.

use userdb_core::Account;

use crate::error::StorageError;

/// Fixed-width account serialization.
pub trait RecordCodec {
    /// Width in bytes of every encoded record.
    fn record_size(&self) -> usize;

    /// Encodes `account` into `out`, which is exactly `record_size()` bytes.
    fn encode(&self, account: &Account, out: &mut [u8]);

    /// Decodes one record of exactly `record_size()` bytes.
    ///
    /// Errors must be record-local (see [`StorageError::is_record_error`]) so
    /// a loader can skip the record and continue.
    fn decode(&self, bytes: &[u8]) -> Result<Account, StorageError>;
}
