// src/worker/handlers.rs - G-code handler table and handler bodies
use std::collections::HashMap;
use std::time::Duration;

use tokio::time::Instant;

use super::{ActiveCommand, Worker};
use crate::gcode::GcodeCommand;

/// What a handler did with the active command this tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Finished,
    /// Not done yet; run the same command again next tick.
    Pending,
}

/// Handler entries the worker knows how to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handler {
    /// G0
    RapidMove,
    /// G1
    LinearMove,
    /// G4
    Dwell,
    /// G20 / G21
    Units { metric: bool },
    /// G90 / G91
    Positioning { absolute: bool },
    /// G94
    FeedRateMode,
    /// M2
    ProgramEnd,
    /// M3 / M4
    SpindleOn { clockwise: bool },
    /// M5
    SpindleOff,
    /// Bare F word
    FeedRate,
}

/// Maps command names (`G1`) and main-field letters (`F`) to handlers.
#[derive(Debug, Clone)]
pub struct HandlerTable {
    by_name: HashMap<String, Handler>,
    by_letter: HashMap<char, Handler>,
}

impl HandlerTable {
    pub fn empty() -> Self {
        Self {
            by_name: HashMap::new(),
            by_letter: HashMap::new(),
        }
    }

    pub fn standard() -> Self {
        let mut table = Self::empty();
        table
            .register_name("G0", Handler::RapidMove)
            .register_name("G1", Handler::LinearMove)
            .register_name("G4", Handler::Dwell)
            .register_name("G20", Handler::Units { metric: false })
            .register_name("G21", Handler::Units { metric: true })
            .register_name("G90", Handler::Positioning { absolute: true })
            .register_name("G91", Handler::Positioning { absolute: false })
            .register_name("G94", Handler::FeedRateMode)
            .register_name("M2", Handler::ProgramEnd)
            .register_name("M3", Handler::SpindleOn { clockwise: true })
            .register_name("M4", Handler::SpindleOn { clockwise: false })
            .register_name("M5", Handler::SpindleOff)
            .register_letter('F', Handler::FeedRate);
        table
    }

    pub fn register_name(&mut self, name: &str, handler: Handler) -> &mut Self {
        self.by_name.insert(name.to_string(), handler);
        self
    }

    pub fn register_letter(&mut self, letter: char, handler: Handler) -> &mut Self {
        self.by_letter.insert(letter.to_ascii_uppercase(), handler);
        self
    }

    /// Exact name first, then the bare main-field letter.
    pub fn resolve(&self, command: &GcodeCommand) -> Option<Handler> {
        if let Some(handler) = command.name().and_then(|name| self.by_name.get(&name)) {
            return Some(*handler);
        }
        command
            .main_letter()
            .and_then(|letter| self.by_letter.get(&letter))
            .copied()
    }
}

impl Default for HandlerTable {
    fn default() -> Self {
        Self::standard()
    }
}

/// Effectively never.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// `now + delay`, saturating to a far-future instant instead of overflowing.
fn deadline_after(now: Instant, delay: Duration) -> Instant {
    now.checked_add(delay)
        .or_else(|| now.checked_add(FAR_FUTURE))
        .unwrap_or(now)
}

impl Worker {
    pub(super) fn run_handler(
        &mut self,
        handler: Handler,
        active: &mut ActiveCommand,
        now: Instant,
    ) -> Step {
        let command = &active.command;
        match handler {
            Handler::RapidMove | Handler::LinearMove => {
                let deadline = *active
                    .delay_until
                    .get_or_insert_with(|| deadline_after(now, self.move_delay));
                if now < deadline {
                    return Step::Pending;
                }
                let args = active.command.args();
                if let Some(x) = args.get('X') {
                    self.state.x = x;
                }
                if let Some(y) = args.get('Y') {
                    self.state.y = y;
                }
                if let Some(z) = args.get('Z') {
                    self.state.z = z;
                }
            }
            Handler::Dwell | Handler::FeedRateMode => {}
            Handler::Units { metric } => self.state.metric = metric,
            Handler::Positioning { absolute } => {
                self.state.absolute = absolute;
                self.requeue_trailing_fields(command);
            }
            Handler::ProgramEnd | Handler::SpindleOff => self.state.spindle_on = false,
            Handler::SpindleOn { clockwise } => {
                self.state.spindle_on = true;
                self.state.spindle_clockwise = clockwise;
                if let Some(speed) = command.args().get('S') {
                    self.state.spindle_speed = speed;
                }
            }
            Handler::FeedRate => {
                if let Some(feed) = command.main_value() {
                    self.state.feed_rate = feed;
                }
            }
        }
        Step::Finished
    }

    /// Turns the words after the main field into a new command at the head of
    /// the queue, so `G90 G1 X10` becomes `G90` followed by `G1X10`.
    fn requeue_trailing_fields(&mut self, command: &GcodeCommand) {
        let trailing = &command.fields()[1..];
        if trailing.is_empty() {
            return;
        }
        let mut line = Vec::new();
        for field in trailing {
            line.extend_from_slice(command.field_text(field));
        }
        let extra = GcodeCommand::new(line);
        tracing::debug!("Inserting new command to head of queue: {}", extra);
        self.pending.push_front(extra);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_by_name_then_letter() {
        let table = HandlerTable::standard();
        assert_eq!(
            table.resolve(&GcodeCommand::new("G01 X1")),
            Some(Handler::LinearMove)
        );
        assert_eq!(
            table.resolve(&GcodeCommand::new("M04 S5")),
            Some(Handler::SpindleOn { clockwise: false })
        );
        assert_eq!(
            table.resolve(&GcodeCommand::new("F1500")),
            Some(Handler::FeedRate)
        );
        assert_eq!(table.resolve(&GcodeCommand::new("G28")), None);
        assert_eq!(table.resolve(&GcodeCommand::new("X10")), None);
        assert_eq!(table.resolve(&GcodeCommand::new("")), None);
    }

    #[test]
    fn test_deadline_saturates_on_huge_delay() {
        let now = Instant::now();
        assert_eq!(deadline_after(now, Duration::from_secs(2)), now + Duration::from_secs(2));
        assert!(deadline_after(now, Duration::MAX) > now);
    }

    #[test]
    fn test_name_entry_wins_over_letter_entry() {
        let mut table = HandlerTable::empty();
        table
            .register_letter('g', Handler::Dwell)
            .register_name("G1", Handler::LinearMove);
        assert_eq!(
            table.resolve(&GcodeCommand::new("G1")),
            Some(Handler::LinearMove)
        );
        assert_eq!(table.resolve(&GcodeCommand::new("G2")), Some(Handler::Dwell));
    }
}
