//! Datagram engine server.
//!
//! A single receive-process-reply loop: one request is parsed, applied, and
//! answered before the next is received. The receive is raced against the
//! shutdown future, so a stop request is noticed between requests and never
//! interrupts one. When the loop ends the engine is persisted exactly once.
//!
//! Datagrams are received into a buffer one byte larger than the message
//! limit, so an over-long request is rejected rather than run truncated.

use std::future::Future;
use std::net::SocketAddr;

use tokio::net::UdpSocket;
use tracing::{debug, info, warn};

use crate::error::ServerError;
use crate::protocol::MessageBuffer;
use crate::state::AppState;

/// The backend process: owns the socket and the shared engine.
pub struct EngineServer {
    socket: UdpSocket,
    state: AppState,
}

impl EngineServer {
    /// Binds the datagram socket.
    pub async fn bind(addr: &str, state: AppState) -> Result<Self, ServerError> {
        let socket = UdpSocket::bind(addr)
            .await
            .map_err(|source| ServerError::Bind {
                addr: addr.to_string(),
                source,
            })?;
        Ok(EngineServer { socket, state })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.socket.local_addr()?)
    }

    /// Serves requests until `shutdown` resolves, then persists the store.
    pub async fn serve(self, shutdown: impl Future<Output = ()>) -> Result<(), ServerError> {
        tokio::pin!(shutdown);
        info!(addr = %self.local_addr()?, "engine listening");

        let mut buffer = MessageBuffer::new();
        loop {
            let (len, peer) = tokio::select! {
                biased;
                () = &mut shutdown => {
                    info!("stop requested");
                    break;
                }
                received = self.socket.recv_from(buffer.spare()) => match received {
                    Ok(received) => received,
                    Err(e) => {
                        warn!(error = %e, "receive failed");
                        continue;
                    }
                },
            };
            buffer.set_len(len);
            debug!(%peer, request = %buffer.text(), "request received");

            self.state.handle(&mut buffer).await;

            if let Err(e) = self.socket.send_to(buffer.as_bytes(), peer).await {
                warn!(%peer, error = %e, "reply failed");
            }
        }

        self.state.shutdown().await?;
        Ok(())
    }
}
