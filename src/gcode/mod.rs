// src/gcode/mod.rs - Command model shared by the receiver and the worker
pub mod command;
pub mod realtime;

pub use command::{parse_fields, Args, Command, Field, GcodeCommand};
pub use realtime::{is_realtime, RealtimeCommand};
