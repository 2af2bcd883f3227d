//! TCP transport
//!
//! One envelope per frame: a 4-byte big-endian length followed by the
//! `bincode` body. Each send opens a short-lived connection, so delivery
//! order across envelopes is not preserved. Sends in flight are tracked so
//! a stopping node can [`flush`](Transport::flush) them before its runtime
//! goes away.

use super::{Locator, MailboxSender, Transport};
use crate::common::{Error, Result};
use crate::node::messages::Envelope;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::{JoinHandle, JoinSet};

/// Upper bound on a single encoded envelope.
pub const MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

#[derive(Debug, Clone, Default)]
pub struct TcpTransport {
    in_flight: Arc<Mutex<InFlight>>,
}

/// Outstanding deliveries. Dropping the transport detaches them instead of
/// aborting them.
#[derive(Debug, Default)]
struct InFlight(JoinSet<()>);

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.detach_all();
    }
}

impl TcpTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of sends not yet reaped.
    pub fn pending(&self) -> usize {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .0
            .len()
    }
}

impl Transport for TcpTransport {
    fn send(&self, to: &Locator, envelope: Envelope) -> Result<()> {
        let addr = to.to_socket_addr()?;
        let frame = encode_frame(&envelope)?;
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| Error::Internal(format!("no tokio runtime: {}", e)))?;

        let delivery = async move {
            let result: std::io::Result<()> = async {
                let mut stream = TcpStream::connect(addr).await?;
                stream.write_all(&frame).await?;
                stream.shutdown().await
            }
            .await;
            if let Err(e) = result {
                tracing::debug!("Failed to deliver frame to {}: {}", addr, e);
            }
        };

        let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        while in_flight.0.try_join_next().is_some() {}
        in_flight.0.spawn_on(delivery, &runtime);
        Ok(())
    }

    fn flush(&self) -> impl Future<Output = ()> + Send {
        let in_flight = Arc::clone(&self.in_flight);
        async move {
            loop {
                let mut batch = {
                    let mut guard = in_flight.lock().unwrap_or_else(PoisonError::into_inner);
                    std::mem::take(&mut *guard)
                };
                if batch.0.is_empty() {
                    return;
                }
                while batch.0.join_next().await.is_some() {}
            }
        }
    }
}

/// Serialize an envelope into a length-prefixed frame.
pub fn encode_frame(envelope: &Envelope) -> Result<Vec<u8>> {
    let body = bincode::serialize(envelope)?;
    if body.len() > MAX_FRAME_SIZE {
        return Err(Error::FrameTooLarge {
            size: body.len(),
            max: MAX_FRAME_SIZE,
        });
    }
    let mut frame = Vec::with_capacity(4 + body.len());
    frame.extend_from_slice(&(body.len() as u32).to_be_bytes());
    frame.extend_from_slice(&body);
    Ok(frame)
}

/// Read the next frame; `Ok(None)` on a clean end of stream.
pub async fn read_frame<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Option<Envelope>> {
    let len = match reader.read_u32().await {
        Ok(len) => len as usize,
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    if len > MAX_FRAME_SIZE {
        return Err(Error::FrameTooLarge {
            size: len,
            max: MAX_FRAME_SIZE,
        });
    }
    let mut body = vec![0u8; len];
    reader.read_exact(&mut body).await?;
    Ok(Some(bincode::deserialize(&body)?))
}

/// Write one frame to an already open stream.
pub async fn write_frame<W: AsyncWrite + Unpin>(writer: &mut W, envelope: &Envelope) -> Result<()> {
    let frame = encode_frame(envelope)?;
    writer.write_all(&frame).await?;
    Ok(())
}

/// Accept connections on `addr` and push every decoded envelope into
/// `mailbox`. Returns the bound address (useful with port 0) and the accept
/// loop's handle.
pub async fn listen(addr: SocketAddr, mailbox: MailboxSender) -> Result<(SocketAddr, JoinHandle<()>)> {
    let listener = TcpListener::bind(addr).await?;
    let local_addr = listener.local_addr()?;
    tracing::debug!("Listening on {}", local_addr);

    let handle = tokio::spawn(async move {
        loop {
            let (mut stream, peer_addr) = match listener.accept().await {
                Ok(conn) => conn,
                Err(e) => {
                    tracing::warn!("Failed to accept connection: {}", e);
                    continue;
                }
            };
            let mailbox = mailbox.clone();
            tokio::spawn(async move {
                loop {
                    match read_frame(&mut stream).await {
                        Ok(Some(envelope)) => {
                            if mailbox.send(envelope).is_err() {
                                return;
                            }
                        }
                        Ok(None) => return,
                        Err(e) => {
                            tracing::warn!("Dropping connection from {}: {}", peer_addr, e);
                            return;
                        }
                    }
                }
            });
        }
    });

    Ok((local_addr, handle))
}
