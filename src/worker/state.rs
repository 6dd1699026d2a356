// src/worker/state.rs - Simulated machine state owned by the worker
use crate::responses::{RunState, StatusResponse};

#[derive(Debug, Clone, PartialEq)]
pub struct MachineState {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub feed_rate: f64,
    pub spindle_on: bool,
    pub spindle_speed: f64,
    pub spindle_clockwise: bool,
    /// G90 (true) / G91 (false)
    pub absolute: bool,
    /// G21 (true) / G20 (false)
    pub metric: bool,
}

impl MachineState {
    pub fn new() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            z: 0.0,
            feed_rate: 0.0,
            spindle_on: false,
            spindle_speed: 0.0,
            spindle_clockwise: true,
            absolute: true,
            metric: true,
        }
    }

    pub fn position(&self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }

    pub fn status(&self, state: RunState) -> StatusResponse {
        StatusResponse {
            state,
            x: self.x,
            y: self.y,
            z: self.z,
            feed_rate: self.feed_rate,
            spindle_speed: self.spindle_speed,
        }
    }
}

impl Default for MachineState {
    fn default() -> Self {
        Self::new()
    }
}
