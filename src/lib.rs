// src/lib.rs - GRBL-like G-code receiver for integration tests
//
// Data flows transport -> receiver -> command channel -> worker, and back
// through the response channel. The worker is the only owner of machine
// state.
pub mod channel;
pub mod config;
pub mod gcode;
pub mod receiver;
pub mod responses;
pub mod worker;

pub use channel::{channel_pair, ChannelClosed, FrontendChannels, WorkerChannels};
pub use config::{load_config, Config, ConfigError};
pub use gcode::{is_realtime, Command, GcodeCommand, RealtimeCommand};
pub use receiver::{ByteTransport, GcodeReceiver, MemoryTransport, ReceiverError, TransportError};
pub use responses::{Response, RunState, StatusResponse};
pub use worker::{MachineState, TickOutcome, Worker, WorkerConfig, MAX_COMMANDS};
