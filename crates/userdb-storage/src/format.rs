//! Snapshot record layout.
//!
//! A snapshot file is a bare sequence of fixed-width records: no header, no
//! count. End of file is the only terminator.
//!
//! ```text
//! Offset  Size  Field
//! ------  ----  -----
//! 0       8     identifier (u64 LE)
//! 8       1     username length (u8)
//! 9       16    username bytes, zero padded
//! 25      8     credential hash (u64 LE)
//! 33      1     flags (bit 0 = online)
//! 34      4     crc32 over bytes 0..34 (u32 LE)
//! ```

use userdb_core::USERNAME_MAX_LEN;

pub const ID_OFFSET: usize = 0;
pub const NAME_LEN_OFFSET: usize = 8;
pub const NAME_OFFSET: usize = 9;
pub const HASH_OFFSET: usize = NAME_OFFSET + USERNAME_MAX_LEN;
pub const FLAGS_OFFSET: usize = HASH_OFFSET + 8;
pub const CRC_OFFSET: usize = FLAGS_OFFSET + 1;

/// Width of one encoded record.
pub const RECORD_SIZE: usize = CRC_OFFSET + 4;

/// Flag bit marking an account as online.
pub const FLAG_ONLINE: u8 = 0b0000_0001;
