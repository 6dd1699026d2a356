// src/gcode/realtime.rs - GRBL realtime (out-of-band) control bytes
use std::fmt;

/// Single-byte commands that bypass line buffering entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RealtimeCommand {
    Status,
    CycleStart,
    FeedHold,
    SoftReset,
}

impl RealtimeCommand {
    pub const STATUS: u8 = b'?';
    pub const CYCLE_START: u8 = b'~';
    pub const FEED_HOLD: u8 = b'!';
    pub const SOFT_RESET: u8 = 0x18;

    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            Self::STATUS => Some(RealtimeCommand::Status),
            Self::CYCLE_START => Some(RealtimeCommand::CycleStart),
            Self::FEED_HOLD => Some(RealtimeCommand::FeedHold),
            Self::SOFT_RESET => Some(RealtimeCommand::SoftReset),
            _ => None,
        }
    }

    pub fn byte(self) -> u8 {
        match self {
            RealtimeCommand::Status => Self::STATUS,
            RealtimeCommand::CycleStart => Self::CYCLE_START,
            RealtimeCommand::FeedHold => Self::FEED_HOLD,
            RealtimeCommand::SoftReset => Self::SOFT_RESET,
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            RealtimeCommand::Status => "Status",
            RealtimeCommand::CycleStart => "Cycle Start/Resume",
            RealtimeCommand::FeedHold => "Feed Hold",
            RealtimeCommand::SoftReset => "Soft Reset",
        }
    }
}

impl fmt::Display for RealtimeCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// Membership test against the fixed control-byte set.
pub fn is_realtime(byte: u8) -> bool {
    RealtimeCommand::from_byte(byte).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_control_bytes() {
        assert!(is_realtime(b'?'));
        assert!(is_realtime(b'~'));
        assert!(is_realtime(b'!'));
        assert!(is_realtime(0x18));
        assert!(!is_realtime(b'G'));
        assert!(!is_realtime(b'\n'));
        assert!(!is_realtime(b' '));
    }

    #[test]
    fn test_byte_mapping_is_reversible() {
        for cmd in [
            RealtimeCommand::Status,
            RealtimeCommand::CycleStart,
            RealtimeCommand::FeedHold,
            RealtimeCommand::SoftReset,
        ] {
            assert_eq!(RealtimeCommand::from_byte(cmd.byte()), Some(cmd));
        }
        assert_eq!(RealtimeCommand::SoftReset.to_string(), "Soft Reset");
    }
}
