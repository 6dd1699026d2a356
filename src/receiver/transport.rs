// src/receiver/transport.rs - Byte transport seam between the front-end and the outside world
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Peer disconnected")]
    Disconnected,
}

/// Minimal byte transport the front-end runs on.
#[async_trait]
pub trait ByteTransport: Send {
    /// Returns the next byte if one is already available, `Ok(None)` if
    /// reading would block.
    async fn read_one(&mut self) -> Result<Option<u8>, TransportError>;

    /// Writes `text` followed by a newline.
    async fn write_line(&mut self, text: &str) -> Result<(), TransportError>;
}

/// In-memory transport for driving a receiver from tests.
///
/// Clones share the same buffers, so a test can keep one handle to feed
/// input and inspect output while the receiver owns another.
#[derive(Debug, Clone, Default)]
pub struct MemoryTransport {
    inner: Arc<Mutex<MemoryBuffers>>,
}

#[derive(Debug, Default)]
struct MemoryBuffers {
    input: VecDeque<u8>,
    output: Vec<String>,
    closed: bool,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_input(&self, bytes: impl AsRef<[u8]>) {
        let mut inner = self.lock();
        inner.input.extend(bytes.as_ref().iter().copied());
    }

    /// After the remaining input is consumed, reads report a disconnect.
    pub fn close(&self) {
        self.lock().closed = true;
    }

    /// Every line written so far.
    pub fn lines(&self) -> Vec<String> {
        self.lock().output.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryBuffers> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl ByteTransport for MemoryTransport {
    async fn read_one(&mut self) -> Result<Option<u8>, TransportError> {
        let mut inner = self.lock();
        match inner.input.pop_front() {
            Some(byte) => Ok(Some(byte)),
            None if inner.closed => Err(TransportError::Disconnected),
            None => Ok(None),
        }
    }

    async fn write_line(&mut self, text: &str) -> Result<(), TransportError> {
        self.lock().output.push(text.to_string());
        Ok(())
    }
}
