// src/receiver/terminal.rs - stdin/stdout transport
use std::io::{IsTerminal, Read};
use std::time::Duration;

use async_trait::async_trait;
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use tokio::io::{AsyncWriteExt, Stdout};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;

use super::transport::{ByteTransport, TransportError};
use super::{GcodeReceiver, ReceiverError};
use crate::channel::FrontendChannels;

/// Ctrl-C. Raw mode turns off the terminal's own signal handling, so the
/// byte arrives here instead.
const INTERRUPT: u8 = 0x03;

/// Puts the terminal into raw mode for as long as it lives.
struct RawModeGuard(bool);

impl RawModeGuard {
    fn new(enable: bool) -> Self {
        if enable {
            match enable_raw_mode() {
                Ok(()) => Self(true),
                Err(e) => {
                    tracing::warn!("Failed to enable raw terminal mode: {}", e);
                    Self(false)
                }
            }
        } else {
            Self(false)
        }
    }

    fn is_raw(&self) -> bool {
        self.0
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        if self.0 {
            let _ = disable_raw_mode();
        }
    }
}

/// Maps a byte read from a raw terminal onto what a line-buffered terminal
/// would have delivered: Enter becomes `\n` and Ctrl-C ends the session.
fn translate_raw_input(byte: u8) -> Result<u8, TransportError> {
    match byte {
        INTERRUPT => Err(TransportError::Disconnected),
        b'\r' => Ok(b'\n'),
        other => Ok(other),
    }
}

fn line_ending(raw: bool) -> &'static [u8] {
    if raw { b"\r\n" } else { b"\n" }
}

/// Reads stdin on a dedicated blocking thread and writes to stdout.
///
/// When stdin is a terminal it is switched to raw mode, so realtime bytes
/// such as `?` reach the receiver without waiting for Enter. The previous
/// mode is restored when the transport is dropped.
pub struct TerminalTransport {
    input: mpsc::UnboundedReceiver<u8>,
    stdout: Stdout,
    raw: RawModeGuard,
}

impl TerminalTransport {
    pub fn spawn() -> Self {
        let raw = RawModeGuard::new(std::io::stdin().is_terminal());
        if raw.is_raw() {
            tracing::debug!("Terminal switched to raw mode");
        }

        let (tx, input) = mpsc::unbounded_channel();
        std::thread::Builder::new()
            .name("stdin-reader".to_string())
            .spawn(move || {
                for byte in std::io::stdin().lock().bytes() {
                    match byte {
                        Ok(byte) => {
                            if tx.send(byte).is_err() {
                                break;
                            }
                        }
                        Err(e) => {
                            tracing::error!("stdin read error: {}", e);
                            break;
                        }
                    }
                }
                tracing::debug!("stdin closed");
            })
            .map(|_| ())
            .unwrap_or_else(|e| tracing::error!("Failed to start stdin reader: {}", e));
        Self { input, stdout: tokio::io::stdout(), raw }
    }
}

#[async_trait]
impl ByteTransport for TerminalTransport {
    async fn read_one(&mut self) -> Result<Option<u8>, TransportError> {
        match self.input.try_recv() {
            Ok(byte) if self.raw.is_raw() => translate_raw_input(byte).map(Some),
            Ok(byte) => Ok(Some(byte)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(TransportError::Disconnected),
        }
    }

    async fn write_line(&mut self, text: &str) -> Result<(), TransportError> {
        self.stdout.write_all(text.as_bytes()).await?;
        self.stdout.write_all(line_ending(self.raw.is_raw())).await?;
        self.stdout.flush().await?;
        Ok(())
    }
}

/// Serves the terminal until stdin closes or Ctrl-C is typed.
pub async fn serve(channels: FrontendChannels, idle_sleep: Duration) -> Result<(), ReceiverError> {
    let mut receiver = GcodeReceiver::new(TerminalTransport::spawn(), channels, idle_sleep);
    match receiver.run().await {
        Err(ReceiverError::Transport(TransportError::Disconnected)) => {
            tracing::info!("Input closed");
            Ok(())
        }
        other => other,
    }
}
