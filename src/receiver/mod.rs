// src/receiver/mod.rs - Front-end actor: bytes in, commands out, responses back
pub mod tcp;
pub mod terminal;
pub mod transport;

use std::time::Duration;

use thiserror::Error;
use tokio::time::sleep;
use tracing::Instrument;

use crate::channel::FrontendChannels;
use crate::gcode::{Command, GcodeCommand, RealtimeCommand};

pub use transport::{ByteTransport, MemoryTransport, TransportError};

pub const GREETING: &str = "FakeGrbl 0.1";

#[derive(Debug, Error)]
pub enum ReceiverError {
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
    #[error("Worker is no longer running")]
    WorkerGone,
}

/// Assembles newline-terminated lines, picking out realtime bytes on the way.
#[derive(Debug, Default)]
pub struct LineAssembler {
    buffer: Vec<u8>,
}

impl LineAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one byte; returns a command when the byte completes one.
    ///
    /// Realtime bytes never reach the line buffer. Blank lines are dropped.
    pub fn push(&mut self, byte: u8) -> Option<Command> {
        if let Some(realtime) = RealtimeCommand::from_byte(byte) {
            return Some(Command::Realtime(realtime));
        }
        if byte != b'\n' {
            self.buffer.push(byte);
            return None;
        }
        let line = std::mem::take(&mut self.buffer);
        let trimmed = line.trim_ascii();
        if trimmed.is_empty() {
            return None;
        }
        Some(Command::Gcode(GcodeCommand::new(trimmed)))
    }

    /// Bytes of the current, unterminated line.
    pub fn partial(&self) -> &[u8] {
        &self.buffer
    }
}

/// Runs the front-end side of a session over one transport.
pub struct GcodeReceiver<T: ByteTransport> {
    transport: T,
    channels: FrontendChannels,
    lines: LineAssembler,
    idle_sleep: Duration,
    span: tracing::Span,
}

impl<T: ByteTransport> GcodeReceiver<T> {
    pub fn new(transport: T, channels: FrontendChannels, idle_sleep: Duration) -> Self {
        Self {
            transport,
            channels,
            lines: LineAssembler::new(),
            idle_sleep,
            span: tracing::info_span!("receiver"),
        }
    }

    /// Log context for everything the receiver emits.
    pub fn with_span(mut self, span: tracing::Span) -> Self {
        self.span = span;
        self
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Gives the channels back, e.g. to serve the next socket client.
    pub fn into_channels(self) -> FrontendChannels {
        self.channels
    }

    pub async fn greet(&mut self) -> Result<(), ReceiverError> {
        self.transport.write_line(GREETING).await?;
        self.transport.write_line("").await?;
        Ok(())
    }

    /// Reads at most one byte, forwards any completed command, then writes
    /// out every response that is already waiting. Never waits for more.
    pub async fn poll_once(&mut self) -> Result<bool, ReceiverError> {
        let mut progressed = false;

        if let Some(byte) = self.transport.read_one().await? {
            progressed = true;
            if let Some(command) = self.lines.push(byte) {
                tracing::debug!("Sending command to worker: {}", command);
                self.channels
                    .commands
                    .send(command)
                    .map_err(|_| ReceiverError::WorkerGone)?;
            }
        }

        for response in self.channels.responses.drain() {
            tracing::debug!("Received worker response: {}", response);
            self.transport.write_line(&response.to_string()).await?;
            progressed = true;
        }

        Ok(progressed)
    }

    /// Greets the peer and serves it until the transport or worker fails.
    pub async fn run(&mut self) -> Result<(), ReceiverError> {
        let span = self.span.clone();
        self.serve().instrument(span).await
    }

    async fn serve(&mut self) -> Result<(), ReceiverError> {
        self.greet().await?;
        loop {
            if !self.poll_once().await? {
                sleep(self.idle_sleep).await;
            }
        }
    }
}
