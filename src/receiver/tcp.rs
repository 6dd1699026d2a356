// src/receiver/tcp.rs - Single-client TCP transport
use std::collections::VecDeque;
use std::io::ErrorKind;
use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};

use super::transport::{ByteTransport, TransportError};
use super::{GcodeReceiver, ReceiverError};
use crate::channel::FrontendChannels;

const READ_CHUNK: usize = 256;

pub struct TcpTransport {
    stream: TcpStream,
    peer: SocketAddr,
    buffered: VecDeque<u8>,
}

impl TcpTransport {
    pub fn new(stream: TcpStream, peer: SocketAddr) -> Self {
        Self { stream, peer, buffered: VecDeque::new() }
    }

    /// Waits for the next client on `listener`.
    pub async fn accept(listener: &TcpListener) -> Result<Self, TransportError> {
        let (stream, peer) = listener.accept().await?;
        stream.set_nodelay(true)?;
        tracing::info!("Accepted connection from {}", peer);
        Ok(Self::new(stream, peer))
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }
}

#[async_trait]
impl ByteTransport for TcpTransport {
    async fn read_one(&mut self) -> Result<Option<u8>, TransportError> {
        if let Some(byte) = self.buffered.pop_front() {
            return Ok(Some(byte));
        }
        let mut chunk = [0u8; READ_CHUNK];
        match self.stream.try_read(&mut chunk) {
            Ok(0) => Err(TransportError::Disconnected),
            Ok(n) => {
                self.buffered.extend(&chunk[1..n]);
                Ok(Some(chunk[0]))
            }
            Err(e) if e.kind() == ErrorKind::WouldBlock => Ok(None),
            Err(e) => Err(disconnect_or_io(e)),
        }
    }

    async fn write_line(&mut self, text: &str) -> Result<(), TransportError> {
        let mut line = Vec::with_capacity(text.len() + 1);
        line.extend_from_slice(text.as_bytes());
        line.push(b'\n');
        self.stream.write_all(&line).await.map_err(disconnect_or_io)
    }
}

fn disconnect_or_io(e: std::io::Error) -> TransportError {
    match e.kind() {
        ErrorKind::ConnectionReset | ErrorKind::ConnectionAborted | ErrorKind::BrokenPipe => {
            TransportError::Disconnected
        }
        _ => TransportError::Io(e),
    }
}

/// Serves clients one at a time on `listener`, all sharing one worker.
///
/// A client disconnecting hands the channels to the next one; any other
/// failure ends the loop.
pub async fn serve(
    listener: TcpListener,
    mut channels: FrontendChannels,
    idle_sleep: Duration,
) -> Result<(), ReceiverError> {
    tracing::info!("Listening on {}", listener.local_addr().map_err(TransportError::from)?);
    loop {
        let transport = TcpTransport::accept(&listener).await?;
        let peer = transport.peer();
        let mut receiver = GcodeReceiver::new(transport, channels, idle_sleep)
            .with_span(tracing::info_span!("receiver", %peer));
        match receiver.run().await {
            Err(ReceiverError::Transport(TransportError::Disconnected)) => {
                tracing::info!("Client {} disconnected", peer);
                channels = receiver.into_channels();
            }
            other => return other,
        }
    }
}
