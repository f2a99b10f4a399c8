//! Text protocol adapter.
//!
//! One request line becomes exactly one [`RequestEngine`] call, and the
//! outcome is rendered back into the same [`MessageBuffer`]:
//!
//! ```text
//! create <username> <password>
//! delete <id> <password>
//! login <id> <password>
//! logout <id> <password>
//! password <id> <old_password> <new_password>
//! list
//! ```
//!
//! Verbs are case-insensitive. Passwords arrive already hashed as unsigned
//! decimals and are forwarded untouched. Malformed input always produces a
//! reply.

use std::borrow::Cow;

use userdb_core::{AccountId, CredentialHash, Username};

use crate::engine::RequestEngine;
use crate::error::{EngineError, ProtocolError};

/// Largest request or reply, in bytes. Longer requests are rejected; longer
/// replies are truncated.
pub const MAX_MESSAGE_LEN: usize = 1023;

/// Reply sent when no engine is available to answer.
pub const SERVICE_UNAVAILABLE: &str = "Service unavailable.";

/// The single buffer a request arrives in and its reply leaves in.
#[derive(Clone)]
pub struct MessageBuffer {
    // One byte past the limit, so an over-long request is seen as such
    // instead of arriving cut down to something parseable.
    data: [u8; MAX_MESSAGE_LEN + 1],
    len: usize,
}

impl MessageBuffer {
    pub fn new() -> Self {
        MessageBuffer {
            data: [0u8; MAX_MESSAGE_LEN + 1],
            len: 0,
        }
    }

    /// A buffer holding the request `text`.
    pub fn from_text(text: &str) -> Self {
        let mut buffer = MessageBuffer::new();
        buffer.load_request(text.as_bytes());
        buffer
    }

    /// Copies in a raw request. Bytes past the limit are not kept, but the
    /// buffer stays [oversized](MessageBuffer::is_oversized).
    pub fn load_request(&mut self, bytes: &[u8]) {
        let len = bytes.len().min(self.data.len());
        self.data[..len].copy_from_slice(&bytes[..len]);
        self.len = len;
    }

    /// The whole backing array, for a transport to receive into.
    /// Follow with [`MessageBuffer::set_len`].
    pub fn spare(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Marks the first `len` bytes as the current message.
    pub fn set_len(&mut self, len: usize) {
        self.len = len.min(self.data.len());
    }

    /// True when the request did not fit in [`MAX_MESSAGE_LEN`] bytes.
    pub fn is_oversized(&self) -> bool {
        self.len > MAX_MESSAGE_LEN
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data[..self.len]
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The message as text. Invalid UTF-8 is replaced and trailing NULs
    /// (sent by C clients) are dropped.
    pub fn text(&self) -> Cow<'_, str> {
        match String::from_utf8_lossy(self.as_bytes()) {
            Cow::Borrowed(s) => Cow::Borrowed(s.trim_end_matches('\0')),
            Cow::Owned(s) => Cow::Owned(s.trim_end_matches('\0').to_string()),
        }
    }

    /// Replaces the contents with `text`, cut at a character boundary if it
    /// exceeds [`MAX_MESSAGE_LEN`].
    pub fn overwrite(&mut self, text: &str) {
        let mut end = text.len().min(MAX_MESSAGE_LEN);
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        self.data[..end].copy_from_slice(&text.as_bytes()[..end]);
        self.len = end;
    }
}

impl Default for MessageBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MessageBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("MessageBuffer").field(&self.text()).finish()
    }
}

/// A parsed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Create {
        username: Username,
        credential: CredentialHash,
    },
    Delete {
        id: AccountId,
        credential: CredentialHash,
    },
    Login {
        id: AccountId,
        credential: CredentialHash,
    },
    Logout {
        id: AccountId,
        credential: CredentialHash,
    },
    Password {
        id: AccountId,
        old: CredentialHash,
        new: CredentialHash,
    },
    List,
}

impl Command {
    /// Parses one whitespace-separated request line.
    pub fn parse(line: &str) -> Result<Command, ProtocolError> {
        let mut tokens = line.split_whitespace();
        let verb = tokens.next().ok_or(ProtocolError::Empty)?;
        let mut args = Args {
            command: "",
            tokens,
        };

        let command = match verb.to_ascii_lowercase().as_str() {
            "create" => {
                args.command = "create";
                let username = Username::new(args.next("username")?)
                    .map_err(ProtocolError::InvalidUsername)?;
                Command::Create {
                    username,
                    credential: args.credential("password")?,
                }
            }
            "delete" => {
                args.command = "delete";
                Command::Delete {
                    id: args.id()?,
                    credential: args.credential("password")?,
                }
            }
            "login" => {
                args.command = "login";
                Command::Login {
                    id: args.id()?,
                    credential: args.credential("password")?,
                }
            }
            "logout" => {
                args.command = "logout";
                Command::Logout {
                    id: args.id()?,
                    credential: args.credential("password")?,
                }
            }
            "password" => {
                args.command = "password";
                Command::Password {
                    id: args.id()?,
                    old: args.credential("old_password")?,
                    new: args.credential("new_password")?,
                }
            }
            "list" => {
                args.command = "list";
                Command::List
            }
            _ => {
                return Err(ProtocolError::UnknownCommand {
                    verb: verb.to_string(),
                })
            }
        };

        args.finish()?;
        Ok(command)
    }
}

/// Cursor over the arguments of one command.
struct Args<'a> {
    command: &'static str,
    tokens: std::str::SplitWhitespace<'a>,
}

impl<'a> Args<'a> {
    fn next(&mut self, argument: &'static str) -> Result<&'a str, ProtocolError> {
        self.tokens.next().ok_or(ProtocolError::MissingArgument {
            command: self.command,
            argument,
        })
    }

    fn number(&mut self, argument: &'static str) -> Result<u64, ProtocolError> {
        let token = self.next(argument)?;
        token.parse().map_err(|_| ProtocolError::InvalidNumber {
            argument,
            value: token.to_string(),
        })
    }

    fn id(&mut self) -> Result<AccountId, ProtocolError> {
        self.number("id").map(AccountId)
    }

    fn credential(&mut self, argument: &'static str) -> Result<CredentialHash, ProtocolError> {
        self.number(argument).map(CredentialHash)
    }

    fn finish(mut self) -> Result<(), ProtocolError> {
        match self.tokens.next() {
            Some(token) => Err(ProtocolError::UnexpectedArgument {
                command: self.command,
                token: token.to_string(),
            }),
            None => Ok(()),
        }
    }
}

/// Applies `command` to `engine` and renders the reply text.
pub fn execute(engine: &mut RequestEngine, command: Command) -> String {
    let outcome = match command {
        Command::Create {
            username,
            credential,
        } => {
            let reply_name = username.clone();
            engine
                .create(username, credential)
                .map(|id| format!("User {reply_name}#{id} created."))
        }
        Command::Delete { id, credential } => engine
            .delete(id, credential)
            .map(|()| format!("User #{id} deleted.")),
        Command::Login { id, credential } => engine
            .login(id, credential)
            .map(|()| format!("User #{id} logged in.")),
        Command::Logout { id, credential } => engine
            .logout(id, credential)
            .map(|()| format!("User #{id} logged out.")),
        Command::Password { id, old, new } => engine
            .password(id, old, new)
            .map(|()| format!("Password changed for user #{id}.")),
        Command::List => Ok(engine.list()),
    };
    outcome.unwrap_or_else(|e| render_engine_error(&e))
}

/// Reply text for a rejected operation.
pub fn render_engine_error(err: &EngineError) -> String {
    match err {
        EngineError::NotExists { id } => format!("User #{id} not found."),
        EngineError::InvalidCredentials { id } => format!("Invalid credentials for user #{id}."),
        EngineError::AlreadyConnected { id } => format!("User #{id} is already connected."),
        EngineError::NotConnected { id } => format!("User #{id} is not connected."),
        EngineError::CapacityExhausted { .. } => "User database is full.".to_string(),
        EngineError::Internal(_) => "Internal error.".to_string(),
    }
}

/// Reply text for a malformed request.
pub fn render_protocol_error(err: &ProtocolError) -> String {
    match err {
        ProtocolError::UnknownCommand { verb } => format!("Unknown command: {verb}"),
        other => format!("Malformed command: {other}"),
    }
}

/// Runs the request held in `buffer` and overwrites it with the reply.
pub fn dispatch(engine: &mut RequestEngine, buffer: &mut MessageBuffer) {
    let parsed = if buffer.is_oversized() {
        Err(ProtocolError::TooLong)
    } else {
        Command::parse(&buffer.text())
    };
    let reply = match parsed {
        Ok(command) => execute(engine, command),
        Err(e) => {
            tracing::debug!(error = %e, "rejected malformed request");
            render_protocol_error(&e)
        }
    };
    buffer.overwrite(&reply);
}
