//! The default [`RecordCodec`]: fixed 38-byte records sealed with CRC32.
//!
//! See [`crate::format`] for the byte layout.

use userdb_core::{Account, AccountId, CredentialHash, Username};

use crate::error::StorageError;
use crate::format::{
    CRC_OFFSET, FLAGS_OFFSET, FLAG_ONLINE, HASH_OFFSET, ID_OFFSET, NAME_LEN_OFFSET, NAME_OFFSET,
    RECORD_SIZE,
};
use crate::traits::RecordCodec;

/// Checksummed fixed-width account records.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChecksummedCodec;

impl RecordCodec for ChecksummedCodec {
    fn record_size(&self) -> usize {
        RECORD_SIZE
    }

    fn encode(&self, account: &Account, out: &mut [u8]) {
        debug_assert_eq!(out.len(), RECORD_SIZE);
        out.fill(0);

        out[ID_OFFSET..ID_OFFSET + 8].copy_from_slice(&account.id.0.to_le_bytes());

        // Username::new caps the length at 16, so it fits the u8 and the field.
        let name = account.username.as_str().as_bytes();
        out[NAME_LEN_OFFSET] = name.len() as u8;
        out[NAME_OFFSET..NAME_OFFSET + name.len()].copy_from_slice(name);

        out[HASH_OFFSET..HASH_OFFSET + 8].copy_from_slice(&account.credential.0.to_le_bytes());
        out[FLAGS_OFFSET] = if account.online { FLAG_ONLINE } else { 0 };

        let crc = crc32fast::hash(&out[..CRC_OFFSET]);
        out[CRC_OFFSET..RECORD_SIZE].copy_from_slice(&crc.to_le_bytes());
    }

    fn decode(&self, bytes: &[u8]) -> Result<Account, StorageError> {
        if bytes.len() != RECORD_SIZE {
            return Err(StorageError::RecordLength {
                expected: RECORD_SIZE,
                found: bytes.len(),
            });
        }

        let stored = u32::from_le_bytes(read_array(bytes, CRC_OFFSET));
        let computed = crc32fast::hash(&bytes[..CRC_OFFSET]);
        if stored != computed {
            return Err(StorageError::ChecksumMismatch { stored, computed });
        }

        let id = AccountId(u64::from_le_bytes(read_array(bytes, ID_OFFSET)));

        let name_len = usize::from(bytes[NAME_LEN_OFFSET]);
        if name_len > HASH_OFFSET - NAME_OFFSET {
            return Err(StorageError::InvalidRecord {
                reason: format!("username length {name_len} exceeds field width"),
            });
        }
        let name = std::str::from_utf8(&bytes[NAME_OFFSET..NAME_OFFSET + name_len]).map_err(|e| {
            StorageError::InvalidRecord {
                reason: format!("username is not utf-8: {e}"),
            }
        })?;
        let username = Username::new(name).map_err(|e| StorageError::InvalidRecord {
            reason: e.to_string(),
        })?;

        let credential = CredentialHash(u64::from_le_bytes(read_array(bytes, HASH_OFFSET)));
        let online = bytes[FLAGS_OFFSET] & FLAG_ONLINE != 0;

        Ok(Account {
            id,
            username,
            credential,
            online,
        })
    }
}

fn read_array<const N: usize>(bytes: &[u8], offset: usize) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&bytes[offset..offset + N]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alice() -> Account {
        Account {
            id: AccountId(42),
            username: Username::new("alice").unwrap(),
            credential: CredentialHash(123_456_789),
            online: true,
        }
    }

    fn encoded(account: &Account) -> Vec<u8> {
        let mut buf = vec![0u8; RECORD_SIZE];
        ChecksummedCodec.encode(account, &mut buf);
        buf
    }

    #[test]
    fn encode_writes_fields_at_layout_offsets() {
        let buf = encoded(&alice());
        assert_eq!(&buf[0..8], &42u64.to_le_bytes());
        assert_eq!(buf[8], 5);
        assert_eq!(&buf[9..14], b"alice");
        assert!(buf[14..25].iter().all(|&b| b == 0));
        assert_eq!(&buf[25..33], &123_456_789u64.to_le_bytes());
        assert_eq!(buf[33], FLAG_ONLINE);
    }

    #[test]
    fn decode_restores_encoded_account() {
        let account = alice();
        let decoded = ChecksummedCodec.decode(&encoded(&account)).unwrap();
        assert_eq!(decoded, account);
    }

    #[test]
    fn flipped_bit_fails_checksum() {
        let mut buf = encoded(&alice());
        buf[26] ^= 0x01;
        let err = ChecksummedCodec.decode(&buf).unwrap_err();
        assert!(matches!(err, StorageError::ChecksumMismatch { .. }));
        assert!(err.is_record_error());
    }

    #[test]
    fn wrong_length_is_rejected() {
        let err = ChecksummedCodec.decode(&[0u8; 10]).unwrap_err();
        assert!(matches!(
            err,
            StorageError::RecordLength {
                expected: RECORD_SIZE,
                found: 10
            }
        ));
    }

    #[test]
    fn invalid_username_with_valid_checksum_is_rejected() {
        let mut buf = encoded(&alice());
        buf[NAME_LEN_OFFSET] = 0;
        let crc = crc32fast::hash(&buf[..CRC_OFFSET]);
        buf[CRC_OFFSET..].copy_from_slice(&crc.to_le_bytes());
        let err = ChecksummedCodec.decode(&buf).unwrap_err();
        assert!(matches!(err, StorageError::InvalidRecord { .. }));
    }

    #[test]
    fn all_zero_record_is_rejected() {
        // A zero-filled hole from a crashed write must not load as an account.
        assert!(ChecksummedCodec.decode(&[0u8; RECORD_SIZE]).is_err());
    }
}
