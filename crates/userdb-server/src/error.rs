//! Error types for the engine, the protocol adapter, the relay, and startup.
//!
//! [`EngineError`] is the closed set of Request Engine result codes: every
//! variant is a normal, user-visible outcome that the protocol adapter turns
//! into a reply. [`ProtocolError`] covers malformed requests, also answered
//! with a reply. Only [`ServerError`] ends the process.

use std::time::Duration;

use userdb_core::{AccountId, CoreError};
use userdb_storage::StorageError;

/// Rejected account operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    /// No account lives under this identifier.
    #[error("user #{id} not found")]
    NotExists { id: AccountId },

    /// The account exists but the supplied hash does not match.
    #[error("invalid credentials for user #{id}")]
    InvalidCredentials { id: AccountId },

    /// Login on an account that is already online.
    #[error("user #{id} is already connected")]
    AlreadyConnected { id: AccountId },

    /// Logout on an account that is offline.
    #[error("user #{id} is not connected")]
    NotConnected { id: AccountId },

    /// Every usable identifier is taken.
    #[error("store full: all {usable} identifiers in use")]
    CapacityExhausted { usable: usize },

    /// A store invariant was violated.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Requests the adapter cannot turn into an engine call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    /// Blank request line.
    #[error("empty request")]
    Empty,

    /// The request exceeds the message size limit.
    #[error("request too long")]
    TooLong,

    /// The first token is not a known verb.
    #[error("unknown command: {verb}")]
    UnknownCommand { verb: String },

    /// A required argument is absent.
    #[error("{command} requires <{argument}>")]
    MissingArgument {
        command: &'static str,
        argument: &'static str,
    },

    /// A numeric argument is not an unsigned decimal.
    #[error("<{argument}> must be an unsigned integer, got '{value}'")]
    InvalidNumber {
        argument: &'static str,
        value: String,
    },

    /// The username argument failed validation.
    #[error("{0}")]
    InvalidUsername(CoreError),

    /// Tokens left over after the last expected argument.
    #[error("unexpected argument '{token}' after {command}")]
    UnexpectedArgument { command: &'static str, token: String },
}

/// Failures forwarding a request from the front end to the engine.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// The engine address did not resolve.
    #[error("cannot resolve engine address {addr}")]
    Resolve { addr: String },

    /// Socket I/O failed.
    #[error("relay i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// The engine did not answer in time.
    #[error("engine did not reply within {after:?}")]
    Timeout { after: Duration },
}

/// Fatal errors that abort startup or a serving loop.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// The configuration is unreadable or invalid.
    #[error("configuration error: {0}")]
    Config(String),

    /// The store could not be created.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Snapshot load or save failed.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// A listening socket could not be bound.
    #[error("cannot bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// Other socket I/O.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}
