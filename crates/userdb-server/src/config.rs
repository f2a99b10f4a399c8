//! Process configuration.
//!
//! Values are resolved in three layers: built-in defaults, an optional JSON
//! file, then `USERDB_*` environment variables:
//!
//! - `USERDB_BIND_ADDR`: engine datagram address (default "0.0.0.0:24030")
//! - `USERDB_CAPACITY`: slot count including reserved slot 0 (default 10000)
//! - `USERDB_PRIMARY_PATH`: primary snapshot (default "./users.dat")
//! - `USERDB_BACKUP_PATH`: backup snapshot (default "./users.dat.bak")
//! - `USERDB_FRONTEND_ADDR`: front-end listen address (default "0.0.0.0:24020")
//! - `USERDB_ENGINE_ADDR`: where the front end relays to (default "127.0.0.1:24030")
//! - `USERDB_RELAY_TIMEOUT_MS`: relay reply timeout (default 5000)

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ServerError;

/// Backend engine settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct EngineConfig {
    pub bind_addr: String,
    /// Fixed for the life of the process.
    pub capacity: usize,
    pub primary_path: PathBuf,
    pub backup_path: PathBuf,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            bind_addr: "0.0.0.0:24030".to_string(),
            capacity: 10_000,
            primary_path: PathBuf::from("./users.dat"),
            backup_path: PathBuf::from("./users.dat.bak"),
        }
    }
}

/// Front-end relay settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct FrontendConfig {
    pub bind_addr: String,
    pub engine_addr: String,
    pub relay_timeout_ms: u64,
}

impl FrontendConfig {
    pub fn relay_timeout(&self) -> Duration {
        Duration::from_millis(self.relay_timeout_ms)
    }
}

impl Default for FrontendConfig {
    fn default() -> Self {
        FrontendConfig {
            bind_addr: "0.0.0.0:24020".to_string(),
            engine_addr: "127.0.0.1:24030".to_string(),
            relay_timeout_ms: 5_000,
        }
    }
}

/// Full configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub engine: EngineConfig,
    pub frontend: FrontendConfig,
}

impl Config {
    /// Loads defaults, then `path` if given, then the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ServerError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Config::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self, ServerError> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            ServerError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        serde_json::from_str(&text)
            .map_err(|e| ServerError::Config(format!("cannot parse {}: {}", path.display(), e)))
    }

    /// Overrides fields from `lookup`, which maps a variable name to its value.
    pub fn apply_env(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ServerError> {
        if let Some(v) = lookup("USERDB_BIND_ADDR") {
            self.engine.bind_addr = v;
        }
        if let Some(v) = lookup("USERDB_CAPACITY") {
            self.engine.capacity = parse_var("USERDB_CAPACITY", &v)?;
        }
        if let Some(v) = lookup("USERDB_PRIMARY_PATH") {
            self.engine.primary_path = PathBuf::from(v);
        }
        if let Some(v) = lookup("USERDB_BACKUP_PATH") {
            self.engine.backup_path = PathBuf::from(v);
        }
        if let Some(v) = lookup("USERDB_FRONTEND_ADDR") {
            self.frontend.bind_addr = v;
        }
        if let Some(v) = lookup("USERDB_ENGINE_ADDR") {
            self.frontend.engine_addr = v;
        }
        if let Some(v) = lookup("USERDB_RELAY_TIMEOUT_MS") {
            self.frontend.relay_timeout_ms = parse_var("USERDB_RELAY_TIMEOUT_MS", &v)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ServerError> {
        if self.engine.capacity < 2 {
            return Err(ServerError::Config(format!(
                "capacity must be at least 2, got {}",
                self.engine.capacity
            )));
        }
        if self.engine.primary_path == self.engine.backup_path {
            return Err(ServerError::Config(
                "primary and backup snapshot paths must differ".to_string(),
            ));
        }
        if self.frontend.relay_timeout_ms == 0 {
            return Err(ServerError::Config(
                "relay timeout must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

fn parse_var<T: FromStr>(name: &str, value: &str) -> Result<T, ServerError>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| ServerError::Config(format!("{name}='{value}': {e}")))
}
