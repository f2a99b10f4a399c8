//! Connection-accepting front end.
//!
//! Accepts stream connections and spawns one task per client. Each task reads
//! newline-terminated request lines, relays them verbatim to the engine, and
//! writes each reply back followed by a newline. The newline is framing only:
//! it lets an empty reply (an empty `list`) reach the client.
//!
//! A line longer than [`MAX_MESSAGE_LEN`] is answered with a malformed reply
//! and skipped up to its newline; it is never buffered whole or relayed.

use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, warn};

use crate::config::FrontendConfig;
use crate::error::{ProtocolError, ServerError};
use crate::protocol::{render_protocol_error, MessageBuffer, MAX_MESSAGE_LEN, SERVICE_UNAVAILABLE};
use crate::relay::UdpRelay;

/// The client-facing relay process.
pub struct Frontend {
    listener: TcpListener,
    engine_addr: String,
    relay_timeout: Duration,
}

impl Frontend {
    pub async fn bind(config: &FrontendConfig) -> Result<Self, ServerError> {
        let listener = TcpListener::bind(&config.bind_addr)
            .await
            .map_err(|source| ServerError::Bind {
                addr: config.bind_addr.clone(),
                source,
            })?;
        Ok(Frontend {
            listener,
            engine_addr: config.engine_addr.clone(),
            relay_timeout: config.relay_timeout(),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.listener.local_addr()?)
    }

    /// Accepts clients until `shutdown` resolves.
    pub async fn serve(self, shutdown: impl Future<Output = ()>) -> Result<(), ServerError> {
        tokio::pin!(shutdown);
        info!(
            addr = %self.local_addr()?,
            engine = %self.engine_addr,
            "front end listening"
        );

        loop {
            tokio::select! {
                biased;
                () = &mut shutdown => {
                    info!("front end stopping");
                    break;
                }
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        tokio::spawn(handle_connection(
                            stream,
                            peer,
                            self.engine_addr.clone(),
                            self.relay_timeout,
                        ));
                    }
                    Err(e) => warn!(error = %e, "accept failed"),
                },
            }
        }
        Ok(())
    }
}

async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    engine_addr: String,
    relay_timeout: Duration,
) {
    info!(%peer, "client connected");
    let mut relay = match UdpRelay::connect(&engine_addr, relay_timeout).await {
        Ok(relay) => relay,
        Err(e) => {
            warn!(%peer, error = %e, "cannot open relay, dropping client");
            return;
        }
    };

    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    let mut line = Vec::with_capacity(LINE_LIMIT);
    let mut buffer = MessageBuffer::new();

    loop {
        let request = match read_request(&mut reader, &mut line).await {
            Ok(Some(request)) => request,
            Ok(None) => break,
            Err(e) => {
                warn!(%peer, error = %e, "read failed");
                break;
            }
        };

        match request {
            Request::Line(bytes) => {
                buffer.load_request(bytes);
                debug!(%peer, request = %buffer.text(), "relaying request");
                if let Err(e) = relay.forward(&mut buffer).await {
                    warn!(%peer, error = %e, "relay failed");
                    buffer.overwrite(SERVICE_UNAVAILABLE);
                }
            }
            Request::TooLong => {
                warn!(%peer, limit = MAX_MESSAGE_LEN, "rejected over-long request");
                buffer.overwrite(&render_protocol_error(&ProtocolError::TooLong));
            }
        }

        let mut reply = Vec::with_capacity(buffer.as_bytes().len() + 1);
        reply.extend_from_slice(buffer.as_bytes());
        reply.push(b'\n');
        if let Err(e) = writer.write_all(&reply).await {
            warn!(%peer, error = %e, "write failed");
            break;
        }
    }
    info!(%peer, "client disconnected");
}

/// Longest line read into memory: a full message plus `\r\n`.
const LINE_LIMIT: usize = MAX_MESSAGE_LEN + 2;

enum Request<'a> {
    /// Line contents without the line ending.
    Line(&'a [u8]),
    TooLong,
}

/// Reads the next request line into `line`. `None` at end of stream.
async fn read_request<'a, R>(
    reader: &mut R,
    line: &'a mut Vec<u8>,
) -> std::io::Result<Option<Request<'a>>>
where
    R: AsyncBufRead + Unpin,
{
    line.clear();
    let read = (&mut *reader)
        .take(LINE_LIMIT as u64)
        .read_until(b'\n', line)
        .await?;
    if read == 0 {
        return Ok(None);
    }

    let terminated = line.last() == Some(&b'\n');
    if !terminated && read == LINE_LIMIT {
        skip_line(reader).await?;
        return Ok(Some(Request::TooLong));
    }

    let mut content: &'a [u8] = line.as_slice();
    if let Some(rest) = content.strip_suffix(b"\n") {
        content = rest;
    }
    if let Some(rest) = content.strip_suffix(b"\r") {
        content = rest;
    }
    if content.len() > MAX_MESSAGE_LEN {
        return Ok(Some(Request::TooLong));
    }
    Ok(Some(Request::Line(content)))
}

/// Discards input up to and including the next newline.
async fn skip_line<R>(reader: &mut R) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
{
    loop {
        let chunk = reader.fill_buf().await?;
        if chunk.is_empty() {
            return Ok(());
        }
        match chunk.iter().position(|&b| b == b'\n') {
            Some(pos) => {
                reader.consume(pos + 1);
                return Ok(());
            }
            None => {
                let len = chunk.len();
                reader.consume(len);
            }
        }
    }
}
