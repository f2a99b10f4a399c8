//! Datagram relay from the front end to the engine.
//!
//! [`UdpRelay`] forwards a raw request line and hands back the raw reply in
//! the same buffer. It does not parse the command grammar.

use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;

use tokio::net::{lookup_host, UdpSocket};
use tracing::debug;

use crate::error::RelayError;
use crate::protocol::MessageBuffer;

/// A connected datagram socket to the engine.
///
/// Each front-end connection owns one, so concurrent connections never read
/// each other's replies. A forward that times out or fails drops its socket,
/// and the next forward opens a fresh one: a late reply is addressed to a
/// port nobody reads and can never answer a later request.
pub struct UdpRelay {
    target: SocketAddr,
    socket: Option<UdpSocket>,
    timeout: Duration,
}

impl UdpRelay {
    /// Resolves `engine_addr` and connects a fresh ephemeral socket to it.
    pub async fn connect(engine_addr: &str, timeout: Duration) -> Result<Self, RelayError> {
        let target = lookup_host(engine_addr)
            .await?
            .next()
            .ok_or_else(|| RelayError::Resolve {
                addr: engine_addr.to_string(),
            })?;
        let socket = open_socket(target).await?;
        Ok(UdpRelay {
            target,
            socket: Some(socket),
            timeout,
        })
    }

    /// Sends the request held in `buffer` and overwrites it with the reply.
    pub async fn forward(&mut self, buffer: &mut MessageBuffer) -> Result<(), RelayError> {
        let socket = match self.socket.take() {
            Some(socket) => socket,
            None => {
                debug!(engine = %self.target, "reopening relay socket");
                open_socket(self.target).await?
            }
        };
        socket.send(buffer.as_bytes()).await?;

        let received = tokio::time::timeout(self.timeout, socket.recv(buffer.spare()))
            .await
            .map_err(|_| RelayError::Timeout {
                after: self.timeout,
            })??;
        buffer.set_len(received);
        self.socket = Some(socket);
        Ok(())
    }
}

async fn open_socket(target: SocketAddr) -> Result<UdpSocket, RelayError> {
    let local = if target.is_ipv4() {
        SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0))
    } else {
        SocketAddr::from((Ipv6Addr::UNSPECIFIED, 0))
    };
    let socket = UdpSocket::bind(local).await?;
    socket.connect(target).await?;
    Ok(socket)
}
