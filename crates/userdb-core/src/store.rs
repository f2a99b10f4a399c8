//! Fixed-capacity slot table of accounts.
//!
//! [`AccountStore`] maps identifiers to accounts with O(1) lookup. Slot 0 is
//! reserved, so a store of capacity `n` holds at most `n - 1` accounts with
//! identifiers `1..n`.
//!
//! Allocation always returns the lowest free identifier. The store keeps the
//! index of the lowest slot that may be free so scans after a run of creations
//! start where the last one stopped; `remove` pulls the hint back down, which
//! keeps the choice identical to a full scan from 1.

use crate::account::Account;
use crate::error::CoreError;
use crate::id::AccountId;

/// The authoritative in-memory set of accounts.
#[derive(Debug, Clone)]
pub struct AccountStore {
    slots: Vec<Option<Account>>,
    len: usize,
    /// Every slot in `1..free_hint` is occupied.
    free_hint: usize,
}

impl AccountStore {
    /// Creates an empty store with `capacity` slots, slot 0 included.
    pub fn with_capacity(capacity: usize) -> Result<Self, CoreError> {
        if capacity < 2 {
            return Err(CoreError::InvalidCapacity { capacity });
        }
        Ok(AccountStore {
            slots: vec![None; capacity],
            len: 0,
            free_hint: 1,
        })
    }

    /// Total number of slots, reserved slot included.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of live accounts.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// True when every usable slot is occupied.
    pub fn is_full(&self) -> bool {
        self.len == self.capacity() - 1
    }

    /// Returns the lowest free identifier, or `None` when the store is full.
    pub fn allocate_identifier(&mut self) -> Option<AccountId> {
        let start = self.free_hint.max(1);
        let index = (start..self.slots.len()).find(|&i| self.slots[i].is_none())?;
        self.free_hint = index;
        Some(AccountId::from(index))
    }

    /// Places `account` in the slot named by its identifier.
    pub fn insert(&mut self, account: Account) -> Result<(), CoreError> {
        let index = self.slot_index(account.id)?;
        if self.slots[index].is_some() {
            return Err(CoreError::SlotOccupied { id: account.id });
        }
        self.slots[index] = Some(account);
        self.len += 1;
        if index == self.free_hint {
            self.free_hint += 1;
        }
        Ok(())
    }

    pub fn get(&self, id: AccountId) -> Option<&Account> {
        let index = id.index().filter(|&i| i != 0)?;
        self.slots.get(index)?.as_ref()
    }

    pub fn get_mut(&mut self, id: AccountId) -> Option<&mut Account> {
        let index = id.index().filter(|&i| i != 0)?;
        self.slots.get_mut(index)?.as_mut()
    }

    pub fn contains(&self, id: AccountId) -> bool {
        self.get(id).is_some()
    }

    /// Frees the slot and hands back the account it held.
    ///
    /// Removing an empty slot returns `None` and changes nothing.
    pub fn remove(&mut self, id: AccountId) -> Option<Account> {
        let index = id.index().filter(|&i| i != 0)?;
        let removed = self.slots.get_mut(index)?.take()?;
        self.len -= 1;
        self.free_hint = self.free_hint.min(index);
        Some(removed)
    }

    /// Occupied slots in ascending identifier order.
    pub fn iter(&self) -> impl Iterator<Item = &Account> {
        self.slots.iter().filter_map(Option::as_ref)
    }

    /// Occupied slots in ascending identifier order, mutably.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Account> {
        self.slots.iter_mut().filter_map(Option::as_mut)
    }

    /// Accounts whose session flag is set, in ascending identifier order.
    pub fn online(&self) -> impl Iterator<Item = &Account> {
        self.iter().filter(|account| account.online)
    }

    fn slot_index(&self, id: AccountId) -> Result<usize, CoreError> {
        if id.is_reserved() {
            return Err(CoreError::ReservedIdentifier);
        }
        id.index()
            .filter(|&i| i < self.slots.len())
            .ok_or(CoreError::IdentifierOutOfRange {
                id,
                capacity: self.slots.len(),
            })
    }
}
