// src/responses.rs - Worker responses and their wire format
use std::fmt;

/// Coarse machine state reported in a status response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Run,
    Idle,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunState::Run => f.write_str("Run"),
            RunState::Idle => f.write_str("Idle"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StatusResponse {
    pub state: RunState,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub feed_rate: f64,
    pub spindle_speed: f64,
}

/// Messages sent from the worker back to the front-end.
///
/// `Display` renders the wire form without the trailing newline.
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    CommandAccepted,
    Status(StatusResponse),
    Error,
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Response::CommandAccepted => f.write_str("ok"),
            Response::Error => f.write_str("error"),
            Response::Status(status) => write!(
                f,
                "<{}|MPos:{},{},{}|FS:{},{}>",
                status.state, status.x, status.y, status.z, status.feed_rate, status.spindle_speed
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_format() {
        assert_eq!(Response::CommandAccepted.to_string(), "ok");
        assert_eq!(Response::Error.to_string(), "error");

        let status = Response::Status(StatusResponse {
            state: RunState::Idle,
            x: 10.0,
            y: 5.0,
            z: 0.0,
            feed_rate: 0.0,
            spindle_speed: 0.0,
        });
        assert_eq!(status.to_string(), "<Idle|MPos:10,5,0|FS:0,0>");

        let status = Response::Status(StatusResponse {
            state: RunState::Run,
            x: -1.5,
            y: 0.25,
            z: 3.0,
            feed_rate: 1500.0,
            spindle_speed: 1000.0,
        });
        assert_eq!(status.to_string(), "<Run|MPos:-1.5,0.25,3|FS:1500,1000>");
    }
}
