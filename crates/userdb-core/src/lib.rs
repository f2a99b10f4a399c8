//! Account data model and slot store for the userdb engine.
//!
//! # Modules
//!
//! - [`id`]: `AccountId`, the slot key (0 reserved)
//! - [`credential`]: `CredentialHash` and the client-side djb2 hash
//! - [`account`]: `Account` record and validated `Username`
//! - [`store`]: `AccountStore`, the fixed-capacity slot table
//! - [`error`]: `CoreError`

pub mod account;
pub mod credential;
pub mod error;
pub mod id;
pub mod store;

pub use account::{Account, Username, USERNAME_MAX_LEN};
pub use credential::CredentialHash;
pub use error::CoreError;
pub use id::AccountId;
pub use store::AccountStore;
