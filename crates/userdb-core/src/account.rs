//! The account record and its username type.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::credential::CredentialHash;
use crate::error::CoreError;
use crate::id::AccountId;

/// Maximum username length in bytes.
pub const USERNAME_MAX_LEN: usize = 16;

/// A validated display name.
///
/// 1..=[`USERNAME_MAX_LEN`] bytes of UTF-8 without whitespace or control
/// characters. Uniqueness is not enforced.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Username(String);

impl Username {
    /// Validates and wraps a username.
    pub fn new(name: &str) -> Result<Self, CoreError> {
        let reject = |reason| CoreError::InvalidUsername {
            name: name.to_string(),
            reason,
        };
        if name.is_empty() {
            return Err(reject("empty"));
        }
        if name.len() > USERNAME_MAX_LEN {
            return Err(reject("longer than 16 bytes"));
        }
        if name.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(reject("contains whitespace or control characters"));
        }
        Ok(Username(name.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Username {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Username::new(&value)
    }
}

impl From<Username> for String {
    fn from(name: Username) -> Self {
        name.0
    }
}

impl fmt::Display for Username {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One registered user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Slot key, assigned at creation.
    pub id: AccountId,
    pub username: Username,
    /// Hash of the current password.
    pub credential: CredentialHash,
    /// Session flag. False after creation and after every restart.
    pub online: bool,
}

impl Account {
    /// Creates a logged-out account.
    pub fn new(id: AccountId, username: Username, credential: CredentialHash) -> Self {
        Account {
            id,
            username,
            credential,
            online: false,
        }
    }

    /// True if `hash` equals the stored credential.
    pub fn credential_matches(&self, hash: CredentialHash) -> bool {
        self.credential == hash
    }
}
