//! Storage error types for userdb-storage.
//!
//! [`StorageError`] covers I/O on the snapshot files and the ways a single
//! snapshot record can fail to decode.

use std::path::PathBuf;

use thiserror::Error;

/// Errors produced by snapshot operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Underlying file I/O failed.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// A snapshot file could not be opened or created.
    #[error("cannot open snapshot file {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The record buffer does not have the codec's fixed width.
    #[error("record length {found}, expected {expected}")]
    RecordLength { expected: usize, found: usize },

    /// The stored checksum does not match the record bytes.
    #[error("record checksum mismatch: stored {stored:#010x}, computed {computed:#010x}")]
    ChecksumMismatch { stored: u32, computed: u32 },

    /// The record decoded but its contents are not a valid account.
    #[error("invalid record: {reason}")]
    InvalidRecord { reason: String },
}

impl StorageError {
    pub(crate) fn open(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StorageError::Open {
            path: path.into(),
            source,
        }
    }

    /// True for errors confined to one record; loading skips such records.
    pub fn is_record_error(&self) -> bool {
        matches!(
            self,
            StorageError::RecordLength { .. }
                | StorageError::ChecksumMismatch { .. }
                | StorageError::InvalidRecord { .. }
        )
    }
}
