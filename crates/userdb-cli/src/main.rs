//! Account store client.
//!
//! Provides the `userdb` binary. Each invocation sends exactly one request to
//! the front end, prints the reply line, and exits. Passwords are hashed
//! locally so only the credential hash crosses the wire.

use std::io::{BufRead, BufReader, Write};
use std::net::TcpStream;
use std::process;
use std::time::Duration;

use clap::{Parser, Subcommand};
use thiserror::Error;

use userdb_core::CredentialHash;

/// Account store client.
#[derive(Parser)]
#[command(name = "userdb", about = "Account store client")]
struct Cli {
    /// Front-end address.
    #[arg(short, long, global = true, default_value = "127.0.0.1:24020")]
    server: String,

    /// Seconds to wait for a reply.
    #[arg(short, long, global = true, default_value_t = 10)]
    timeout: u64,

    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Create an account and print its identifier.
    Register { username: String, password: String },
    /// Delete an account.
    Delete { id: u64, password: String },
    /// Mark an account online.
    Login { id: u64, password: String },
    /// Mark an account offline.
    Logout { id: u64, password: String },
    /// Replace an account's password.
    Passwd {
        id: u64,
        old_password: String,
        new_password: String,
    },
    /// List the names of online accounts.
    List,
}

#[derive(Debug, Error)]
enum ClientError {
    #[error("cannot connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("connection closed before a reply arrived")]
    NoReply,
}

impl Commands {
    /// Renders the request line sent to the front end.
    fn request_line(&self) -> String {
        let hash = |password: &str| CredentialHash::from_password(password);
        match self {
            Commands::Register { username, password } => {
                format!("create {username} {}", hash(password))
            }
            Commands::Delete { id, password } => format!("delete {id} {}", hash(password)),
            Commands::Login { id, password } => format!("login {id} {}", hash(password)),
            Commands::Logout { id, password } => format!("logout {id} {}", hash(password)),
            Commands::Passwd {
                id,
                old_password,
                new_password,
            } => format!(
                "password {id} {} {}",
                hash(old_password),
                hash(new_password)
            ),
            Commands::List => "list".to_string(),
        }
    }
}

fn main() {
    let cli = Cli::parse();
    let line = cli.command.request_line();

    match send(&cli.server, Duration::from_secs(cli.timeout), &line) {
        Ok(reply) => println!("{reply}"),
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    }
}

/// Sends one request line and reads one reply line.
fn send(addr: &str, timeout: Duration, line: &str) -> Result<String, ClientError> {
    let mut stream = TcpStream::connect(addr).map_err(|source| ClientError::Connect {
        addr: addr.to_string(),
        source,
    })?;
    stream.set_read_timeout(Some(timeout))?;
    stream.write_all(format!("{line}\n").as_bytes())?;

    let mut reply = String::new();
    if BufReader::new(stream).read_line(&mut reply)? == 0 {
        return Err(ClientError::NoReply);
    }
    Ok(reply.trim_end_matches(['\r', '\n']).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passwords_are_hashed_before_sending() {
        let cmd = Commands::Register {
            username: "alice".into(),
            password: "a".into(),
        };
        assert_eq!(cmd.request_line(), "create alice 177670");

        let cmd = Commands::Passwd {
            id: 3,
            old_password: "a".into(),
            new_password: "ab".into(),
        };
        assert_eq!(cmd.request_line(), "password 3 177670 5863208");
    }

    #[test]
    fn list_has_no_arguments() {
        assert_eq!(Commands::List.request_line(), "list");
    }

    #[test]
    fn cli_parses_global_server_flag() {
        let cli = Cli::try_parse_from(["userdb", "login", "7", "pw", "--server", "10.0.0.1:1"])
            .unwrap();
        assert_eq!(cli.server, "10.0.0.1:1");
        assert_eq!(
            cli.command.request_line(),
            format!("login 7 {}", CredentialHash::from_password("pw"))
        );
    }
}
