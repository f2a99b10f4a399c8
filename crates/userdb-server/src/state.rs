//! Shared engine handle.
//!
//! [`AppState`] wraps the [`RequestEngine`] in `Arc<tokio::sync::Mutex<>>`.
//! Every request holds the lock for its whole parse-apply-render step, so
//! operations never interleave no matter how many tasks submit requests.
//!
//! The engine sits in an `Option`: a successful shutdown persists it and
//! leaves `None` behind, so a second shutdown has nothing to write. A failed
//! save leaves the engine in place for another attempt.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{error, info, warn};

use userdb_storage::StorageError;

use crate::engine::RequestEngine;
use crate::protocol::{dispatch, MessageBuffer, SERVICE_UNAVAILABLE};

/// Shared state for the engine server.
#[derive(Clone)]
pub struct AppState {
    engine: Arc<Mutex<Option<RequestEngine>>>,
}

impl AppState {
    pub fn new(engine: RequestEngine) -> Self {
        AppState {
            engine: Arc::new(Mutex::new(Some(engine))),
        }
    }

    /// Creates state around an in-memory engine (for testing).
    pub fn in_memory(capacity: usize) -> Result<Self, crate::error::ServerError> {
        Ok(AppState::new(RequestEngine::in_memory(capacity)?))
    }

    /// Runs the request in `buffer` and leaves the reply in its place.
    pub async fn handle(&self, buffer: &mut MessageBuffer) {
        let mut guard = self.engine.lock().await;
        match guard.as_mut() {
            Some(engine) => dispatch(engine, buffer),
            None => {
                warn!("request received after shutdown");
                buffer.overwrite(SERVICE_UNAVAILABLE);
            }
        }
    }

    /// Reads the engine under the lock. `None` once shut down.
    pub async fn inspect<R>(&self, f: impl FnOnce(&RequestEngine) -> R) -> Option<R> {
        self.engine.lock().await.as_ref().map(f)
    }

    /// Persists and releases the engine.
    ///
    /// Returns `true` if this call performed the shutdown and `false` if an
    /// earlier call already had. On error the engine keeps serving and the
    /// shutdown can be retried.
    pub async fn shutdown(&self) -> Result<bool, StorageError> {
        let mut guard = self.engine.lock().await;
        let Some(engine) = guard.as_ref() else {
            return Ok(false);
        };
        match engine.persist() {
            Ok(written) => {
                *guard = None;
                info!(accounts = ?written, "engine shut down");
                Ok(true)
            }
            Err(e) => {
                error!(
                    error = %e,
                    accounts = engine.store().len(),
                    "shutdown save failed, engine kept"
                );
                Err(e)
            }
        }
    }
}
