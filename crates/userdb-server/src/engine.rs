//! RequestEngine: the only writer of the account store.
//!
//! Each operation is one check-then-mutate step. A rejected operation returns
//! an [`EngineError`] and leaves the store exactly as it was.
//!
//! | operation | checks, in order | effect |
//! |---|---|---|
//! | create | store not full | new offline account |
//! | delete | exists, hash matches | account removed |
//! | login | exists, hash matches, offline | online |
//! | logout | exists, hash matches, online | offline |
//! | password | exists, old hash matches | hash replaced |
//! | list | none | online usernames |

use tracing::{debug, info};

use userdb_core::{Account, AccountId, AccountStore, CredentialHash, Username};
use userdb_storage::{ChecksummedCodec, SnapshotFiles, StorageError};

use crate::config::EngineConfig;
use crate::error::{EngineError, ServerError};

/// Separator between usernames in a `list` reply.
pub const LIST_SEPARATOR: &str = ",";

/// Account operations over an exclusively owned store.
pub struct RequestEngine {
    store: AccountStore,
    /// `None` for engines that never touch disk.
    snapshot: Option<SnapshotFiles>,
    codec: ChecksummedCodec,
}

impl RequestEngine {
    /// Creates the store and restores it from the configured snapshot files.
    pub fn open(config: &EngineConfig) -> Result<Self, ServerError> {
        let mut store = AccountStore::with_capacity(config.capacity)?;
        let snapshot = SnapshotFiles::new(&config.primary_path, &config.backup_path);
        let codec = ChecksummedCodec;
        snapshot.load_into(&mut store, &codec)?;

        info!(
            accounts = store.len(),
            capacity = store.capacity(),
            "request engine ready"
        );
        Ok(RequestEngine {
            store,
            snapshot: Some(snapshot),
            codec,
        })
    }

    /// Creates an engine with no persistence (for testing).
    pub fn in_memory(capacity: usize) -> Result<Self, ServerError> {
        Ok(RequestEngine {
            store: AccountStore::with_capacity(capacity)?,
            snapshot: None,
            codec: ChecksummedCodec,
        })
    }

    pub fn store(&self) -> &AccountStore {
        &self.store
    }

    /// Registers a new offline account under the lowest free identifier.
    pub fn create(
        &mut self,
        username: Username,
        credential: CredentialHash,
    ) -> Result<AccountId, EngineError> {
        let id = self
            .store
            .allocate_identifier()
            .ok_or(EngineError::CapacityExhausted {
                usable: self.store.capacity() - 1,
            })?;
        self.store
            .insert(Account::new(id, username, credential))
            .map_err(|e| EngineError::Internal(e.to_string()))?;
        debug!(id = %id, "account created");
        Ok(id)
    }

    /// Removes an account after checking its credentials.
    pub fn delete(&mut self, id: AccountId, credential: CredentialHash) -> Result<(), EngineError> {
        self.authenticate(id, credential)?;
        self.store
            .remove(id)
            .ok_or_else(|| EngineError::Internal(format!("slot {id} emptied during delete")))?;
        debug!(id = %id, "account deleted");
        Ok(())
    }

    /// Marks an offline account online.
    pub fn login(&mut self, id: AccountId, credential: CredentialHash) -> Result<(), EngineError> {
        let account = self.authenticate(id, credential)?;
        if account.online {
            return Err(EngineError::AlreadyConnected { id });
        }
        account.online = true;
        debug!(id = %id, "account logged in");
        Ok(())
    }

    /// Marks an online account offline.
    pub fn logout(&mut self, id: AccountId, credential: CredentialHash) -> Result<(), EngineError> {
        let account = self.authenticate(id, credential)?;
        if !account.online {
            return Err(EngineError::NotConnected { id });
        }
        account.online = false;
        debug!(id = %id, "account logged out");
        Ok(())
    }

    /// Replaces the stored hash when `old` matches it.
    pub fn password(
        &mut self,
        id: AccountId,
        old: CredentialHash,
        new: CredentialHash,
    ) -> Result<(), EngineError> {
        let account = self.authenticate(id, old)?;
        account.credential = new;
        debug!(id = %id, "password changed");
        Ok(())
    }

    /// Usernames of online accounts in ascending identifier order, joined by
    /// [`LIST_SEPARATOR`]. Empty when nobody is online.
    pub fn list(&self) -> String {
        self.store
            .online()
            .map(|account| account.username.as_str())
            .collect::<Vec<_>>()
            .join(LIST_SEPARATOR)
    }

    /// Writes the store to the primary snapshot, every account offline.
    ///
    /// Returns the number of accounts written, or `None` for an in-memory
    /// engine. The in-memory store is left as it was.
    pub fn persist(&self) -> Result<Option<usize>, StorageError> {
        match &self.snapshot {
            Some(snapshot) => snapshot.save(&self.store, &self.codec).map(Some),
            None => Ok(None),
        }
    }

    /// Persists the store and releases it.
    pub fn close(self) -> Result<Option<usize>, StorageError> {
        self.persist()
    }

    /// Resolves `id` and compares `credential` with the stored hash.
    ///
    /// "Not found" and "wrong hash" stay distinct.
    fn authenticate(
        &mut self,
        id: AccountId,
        credential: CredentialHash,
    ) -> Result<&mut Account, EngineError> {
        let account = self
            .store
            .get_mut(id)
            .ok_or(EngineError::NotExists { id })?;
        if !account.credential_matches(credential) {
            return Err(EngineError::InvalidCredentials { id });
        }
        Ok(account)
    }
}
