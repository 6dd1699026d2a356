//! Message channels between the front-end and the worker.
//!
//! Both directions are unbounded `tokio::sync::mpsc` channels: senders never
//! wait, receivers only ever `try_recv`. Each direction is a single FIFO, so
//! a realtime byte is seen by the worker after every line sent before it.

use thiserror::Error;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;

use crate::gcode::Command;
use crate::responses::Response;

/// The other end of a channel has been dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("channel closed")]
pub struct ChannelClosed;

/// Front-end side of the command channel.
#[derive(Debug, Clone)]
pub struct CommandSender {
    inner: mpsc::UnboundedSender<Command>,
}

impl CommandSender {
    /// Fire-and-forget submission.
    pub fn send(&self, command: impl Into<Command>) -> Result<(), ChannelClosed> {
        self.inner.send(command.into()).map_err(|_| ChannelClosed)
    }
}

/// Worker side of the command channel.
#[derive(Debug)]
pub struct CommandReceiver {
    inner: mpsc::UnboundedReceiver<Command>,
}

impl CommandReceiver {
    /// `Ok(None)` when nothing is waiting; `Err` once the sender is gone and
    /// the channel is drained.
    pub fn try_recv(&mut self) -> Result<Option<Command>, ChannelClosed> {
        lift(self.inner.try_recv())
    }
}

/// Worker side of the response channel.
#[derive(Debug, Clone)]
pub struct ResponseSender {
    inner: mpsc::UnboundedSender<Response>,
}

impl ResponseSender {
    pub fn send(&self, response: Response) -> Result<(), ChannelClosed> {
        self.inner.send(response).map_err(|_| ChannelClosed)
    }
}

/// Front-end side of the response channel.
#[derive(Debug)]
pub struct ResponseReceiver {
    inner: mpsc::UnboundedReceiver<Response>,
}

impl ResponseReceiver {
    pub fn try_recv(&mut self) -> Result<Option<Response>, ChannelClosed> {
        lift(self.inner.try_recv())
    }

    /// Waits for the next response. Used by tests and tools that want to
    /// block instead of poll.
    pub async fn recv(&mut self) -> Option<Response> {
        self.inner.recv().await
    }

    /// Everything currently available, without waiting.
    pub fn drain(&mut self) -> Vec<Response> {
        let mut drained = Vec::new();
        while let Ok(Some(response)) = self.try_recv() {
            drained.push(response);
        }
        drained
    }
}

/// Endpoints owned by the front-end actor.
#[derive(Debug)]
pub struct FrontendChannels {
    pub commands: CommandSender,
    pub responses: ResponseReceiver,
}

/// Endpoints owned by the worker.
#[derive(Debug)]
pub struct WorkerChannels {
    pub commands: CommandReceiver,
    pub responses: ResponseSender,
}

pub fn channel_pair() -> (FrontendChannels, WorkerChannels) {
    let (command_tx, command_rx) = mpsc::unbounded_channel();
    let (response_tx, response_rx) = mpsc::unbounded_channel();

    let frontend = FrontendChannels {
        commands: CommandSender { inner: command_tx },
        responses: ResponseReceiver { inner: response_rx },
    };
    let worker = WorkerChannels {
        commands: CommandReceiver { inner: command_rx },
        responses: ResponseSender { inner: response_tx },
    };
    (frontend, worker)
}

fn lift<T>(result: Result<T, TryRecvError>) -> Result<Option<T>, ChannelClosed> {
    match result {
        Ok(item) => Ok(Some(item)),
        Err(TryRecvError::Empty) => Ok(None),
        Err(TryRecvError::Disconnected) => Err(ChannelClosed),
    }
}
