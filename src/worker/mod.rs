// src/worker/mod.rs - Simulated controller: command queue, tick loop, realtime handling
pub mod handlers;
pub mod state;

use std::collections::VecDeque;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{sleep, Instant};
use tracing::Instrument;

use crate::channel::{ChannelClosed, WorkerChannels};
use crate::gcode::{Command, GcodeCommand, RealtimeCommand};
use crate::responses::{Response, RunState};

pub use handlers::{Handler, HandlerTable, Step};
pub use state::MachineState;

/// Pending-queue capacity. A new G-code command is only admitted (and
/// acknowledged) while fewer than this many are queued.
pub const MAX_COMMANDS: usize = 100;

/// Result of one state-machine tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// The active command completed and was discarded.
    Finished,
    /// The active command needs more time; it stays active.
    Incomplete,
    /// Nothing active and nothing queued.
    EmptyQueue,
}

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Simulated duration of every G0/G1 move.
    pub move_delay: Duration,
    /// Sleep between loop iterations that did no work.
    pub idle_sleep: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            move_delay: Duration::from_millis(10),
            idle_sleep: Duration::from_millis(10),
        }
    }
}

/// The command currently being executed plus its transient metadata.
#[derive(Debug, Clone)]
pub struct ActiveCommand {
    pub command: GcodeCommand,
    /// Completion deadline, set on the first visit of a motion handler.
    pub delay_until: Option<Instant>,
}

impl ActiveCommand {
    fn new(command: GcodeCommand) -> Self {
        Self { command, delay_until: None }
    }
}

/// Owns the machine state and every queued command.
///
/// Nothing outside the worker touches its state; the front-end talks to it
/// only through [`WorkerChannels`].
pub struct Worker {
    state: MachineState,
    pending: VecDeque<GcodeCommand>,
    /// Lines read off the channel while the queue was full, not yet
    /// acknowledged. Only ever non-empty under backpressure.
    deferred: VecDeque<GcodeCommand>,
    active: Option<ActiveCommand>,
    handlers: HandlerTable,
    move_delay: Duration,
    idle_sleep: Duration,
    channels: WorkerChannels,
    span: tracing::Span,
}

impl Worker {
    pub fn new(channels: WorkerChannels, config: WorkerConfig) -> Self {
        Self {
            state: MachineState::new(),
            pending: VecDeque::new(),
            deferred: VecDeque::new(),
            active: None,
            handlers: HandlerTable::standard(),
            move_delay: config.move_delay,
            idle_sleep: config.idle_sleep,
            channels,
            span: tracing::info_span!("worker"),
        }
    }

    /// Log context for everything the worker emits.
    pub fn with_span(mut self, span: tracing::Span) -> Self {
        self.span = span;
        self
    }

    pub fn with_handlers(mut self, handlers: HandlerTable) -> Self {
        self.handlers = handlers;
        self
    }

    pub fn state(&self) -> &MachineState {
        &self.state
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Lines held back by backpressure, in arrival order.
    pub fn deferred_len(&self) -> usize {
        self.deferred.len()
    }

    pub fn active_command(&self) -> Option<&ActiveCommand> {
        self.active.as_ref()
    }

    /// True while a command is active, queued or held back.
    pub fn is_busy(&self) -> bool {
        self.active.is_some() || !self.pending.is_empty() || !self.deferred.is_empty()
    }

    pub fn can_accept_gcode(&self) -> bool {
        self.pending.len() < MAX_COMMANDS
    }

    /// Advances the state machine by one step.
    pub fn tick(&mut self) -> TickOutcome {
        let _enter = self.span.clone().entered();

        let mut active = match self.active.take() {
            Some(active) => active,
            None => match self.pending.pop_front() {
                Some(command) => {
                    tracing::debug!("Current command queue length: {}", self.pending.len());
                    tracing::info!("Worker beginning processing of command: {}", command);
                    ActiveCommand::new(command)
                }
                None => return TickOutcome::EmptyQueue,
            },
        };

        let step = match self.handlers.resolve(&active.command) {
            Some(handler) => self.run_handler(handler, &mut active, Instant::now()),
            None => {
                tracing::debug!(
                    "Gcode command not implemented: {}",
                    active.command.name().unwrap_or_default()
                );
                Step::Finished
            }
        };

        match step {
            Step::Finished => {
                tracing::debug!("Worker finished processing of command: {}", active.command);
                TickOutcome::Finished
            }
            Step::Pending => {
                self.active = Some(active);
                TickOutcome::Incomplete
            }
        }
    }

    /// Takes a command received from the front-end.
    ///
    /// Valid G-code is queued and acknowledged immediately; invalid lines are
    /// answered with an error and dropped.
    pub fn accept(&mut self, command: Command) {
        let _enter = self.span.clone().entered();
        tracing::debug!("Worker received command: {}", command);

        match command {
            Command::Realtime(cmd) => {
                if let Some(response) = self.handle_realtime(cmd) {
                    self.emit(response);
                }
            }
            Command::Gcode(cmd) if cmd.is_valid() => {
                self.pending.push_back(cmd);
                self.emit(Response::CommandAccepted);
            }
            Command::Gcode(cmd) => {
                tracing::error!("Invalid command: {}", cmd);
                self.emit(Response::Error);
            }
        }
    }

    pub fn handle_realtime(&mut self, command: RealtimeCommand) -> Option<Response> {
        match command {
            RealtimeCommand::Status => {
                let state = if self.is_busy() { RunState::Run } else { RunState::Idle };
                Some(Response::Status(self.state.status(state)))
            }
            RealtimeCommand::SoftReset => {
                tracing::info!("Soft reset: discarding {} queued command(s)", self.pending.len());
                self.state.reset();
                self.pending.clear();
                self.active = None;
                None
            }
            RealtimeCommand::CycleStart | RealtimeCommand::FeedHold => {
                tracing::debug!("Realtime command not implemented: {}", command);
                None
            }
        }
    }

    /// One loop iteration: at most one tick, then either one deferred line
    /// admitted or one message received.
    ///
    /// Returns whether anything happened. The channel is FIFO; while the queue
    /// is full, G-code read off it is held back unacknowledged so that realtime
    /// commands behind it are still serviced.
    pub fn poll_once(&mut self) -> Result<bool, ChannelClosed> {
        let mut progressed = self.tick() == TickOutcome::Finished;

        if self.can_accept_gcode() {
            if let Some(cmd) = self.deferred.pop_front() {
                self.accept(Command::Gcode(cmd));
                return Ok(true);
            }
        }

        match self.channels.commands.try_recv() {
            Ok(Some(Command::Gcode(cmd))) if !self.can_accept_gcode() => {
                tracing::trace!("Command queue full ({}), deferring: {}", self.pending.len(), cmd);
                self.deferred.push_back(cmd);
                progressed = true;
            }
            Ok(Some(cmd)) => {
                self.accept(cmd);
                progressed = true;
            }
            Ok(None) => {}
            Err(ChannelClosed) if !self.is_busy() => {
                return Err(ChannelClosed);
            }
            Err(ChannelClosed) => {}
        }
        Ok(progressed)
    }

    /// Polls until the front-end drops its command sender and the queue has
    /// drained. Usually ended earlier by aborting the task.
    pub async fn run(mut self) {
        let span = self.span.clone();
        async move {
            tracing::info!("Worker started with move delay {:?}", self.move_delay);
            loop {
                match self.poll_once() {
                    Ok(true) => tokio::task::yield_now().await,
                    Ok(false) => sleep(self.idle_sleep).await,
                    Err(ChannelClosed) => {
                        tracing::info!("Command channel closed, worker stopping");
                        break;
                    }
                }
            }
        }
        .instrument(span)
        .await
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    fn emit(&self, response: Response) {
        tracing::debug!("Enqueueing worker response: {}", response);
        if self.channels.responses.send(response).is_err() {
            tracing::trace!("Response channel closed, dropping response");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::channel_pair;

    fn worker(move_delay: Duration) -> (crate::channel::FrontendChannels, Worker) {
        let (frontend, channels) = channel_pair();
        let config = WorkerConfig { move_delay, idle_sleep: Duration::from_millis(1) };
        (frontend, Worker::new(channels, config))
    }

    #[tokio::test]
    async fn test_empty_queue_tick() {
        let (_frontend, mut worker) = worker(Duration::ZERO);
        assert_eq!(worker.tick(), TickOutcome::EmptyQueue);
        assert!(!worker.is_busy());
    }

    #[tokio::test]
    async fn test_unknown_command_is_a_noop() {
        let (mut frontend, mut worker) = worker(Duration::ZERO);
        worker.accept(GcodeCommand::new("G28 X0").into());
        assert_eq!(frontend.responses.drain(), vec![Response::CommandAccepted]);
        assert_eq!(worker.tick(), TickOutcome::Finished);
        assert_eq!(worker.state(), &MachineState::new());
        assert!(frontend.responses.drain().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_command_is_rejected() {
        let (mut frontend, mut worker) = worker(Duration::ZERO);
        worker.accept(GcodeCommand::new("G1 X10 foo").into());
        assert_eq!(frontend.responses.drain(), vec![Response::Error]);
        assert_eq!(worker.pending_len(), 0);
    }

    #[tokio::test]
    async fn test_feed_rate_and_units() {
        let (_frontend, mut worker) = worker(Duration::ZERO);
        for line in ["F1500", "G20"] {
            worker.accept(GcodeCommand::new(line).into());
        }
        while worker.tick() != TickOutcome::EmptyQueue {}
        assert_eq!(worker.state().feed_rate, 1500.0);
        assert!(!worker.state().metric);
    }

    #[tokio::test]
    async fn test_relative_positioning_splits_line() {
        let (_frontend, mut worker) = worker(Duration::ZERO);
        worker.accept(GcodeCommand::new("G91 G1 X3 Z2").into());
        assert_eq!(worker.tick(), TickOutcome::Finished);
        assert!(!worker.state().absolute);
        assert_eq!(worker.pending_len(), 1);
        assert_eq!(worker.tick(), TickOutcome::Finished);
        assert_eq!(worker.state().position(), [3.0, 0.0, 2.0]);
    }
}
