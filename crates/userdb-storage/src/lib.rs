//! Snapshot persistence for the userdb account store.
//!
//! Provides the [`RecordCodec`] trait defining how one account becomes a
//! fixed-width record, the default [`ChecksummedCodec`], and
//! [`SnapshotFiles`], which runs the primary/backup startup and shutdown
//! protocol.
//!
//! # Modules
//!
//! - [`error`]: StorageError enum with all failure modes
//! - [`format`]: record layout constants
//! - [`traits`]: RecordCodec trait definition
//! - [`record`]: ChecksummedCodec implementation
//! - [`snapshot`]: SnapshotFiles load/save protocol

pub mod error;
pub mod format;
pub mod record;
pub mod snapshot;
pub mod traits;

// Re-export key types for ergonomic use.
pub use error::StorageError;
pub use record::ChecksummedCodec;
pub use snapshot::{LoadReport, LoadSource, SnapshotFiles};
pub use traits::RecordCodec;
