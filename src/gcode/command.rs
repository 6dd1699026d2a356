// src/gcode/command.rs - Line-oriented G-code command model
use std::fmt;
use std::ops::Range;

use super::realtime::RealtimeCommand;

/// One `letter + number` word parsed out of a G-code line.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    /// Upper-cased field letter.
    pub letter: char,
    pub value: f64,
    /// Byte range of the whole word (letter included) in the source line.
    pub span: Range<usize>,
}

/// Auxiliary arguments of a command, keyed by letter in first-seen order.
///
/// A letter repeated on the same line keeps its first position but takes the
/// last value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Args {
    entries: Vec<(char, f64)>,
}

impl Args {
    pub fn get(&self, letter: char) -> Option<f64> {
        self.entries
            .iter()
            .find(|(l, _)| *l == letter)
            .map(|(_, v)| *v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (char, f64)> + '_ {
        self.entries.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn insert(&mut self, letter: char, value: f64) {
        match self.entries.iter_mut().find(|(l, _)| *l == letter) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((letter, value)),
        }
    }
}

/// A single line of G-code as received from the front-end.
///
/// The line is parsed once at construction; everything else is derived from
/// the parsed fields.
#[derive(Debug, Clone, PartialEq)]
pub struct GcodeCommand {
    line: Vec<u8>,
    fields: Vec<Field>,
}

impl GcodeCommand {
    pub fn new(line: impl Into<Vec<u8>>) -> Self {
        let line = line.into();
        let fields = parse_fields(&line);
        Self { line, fields }
    }

    pub fn line(&self) -> &[u8] {
        &self.line
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn main_field(&self) -> Option<&Field> {
        self.fields.first()
    }

    pub fn main_letter(&self) -> Option<char> {
        self.main_field().map(|f| f.letter)
    }

    pub fn main_value(&self) -> Option<f64> {
        self.main_field().map(|f| f.value)
    }

    /// Canonical identity: letter plus the integer part of the first value.
    ///
    /// Leading zeros disappear, so `M04` and `M4` share the name `M4`.
    pub fn name(&self) -> Option<String> {
        self.main_field()
            .map(|f| format!("{}{}", f.letter, f.value.trunc() as i64))
    }

    /// Every field after the main one.
    pub fn args(&self) -> Args {
        let mut args = Args::default();
        for field in self.fields.iter().skip(1) {
            args.insert(field.letter, field.value);
        }
        args
    }

    /// Source text of a field of this command, as it appeared on the line.
    pub fn field_text(&self, field: &Field) -> &[u8] {
        &self.line[field.span.clone()]
    }

    /// True when the parsed words cover the whole line apart from whitespace.
    pub fn is_valid(&self) -> bool {
        let mut cursor = 0;
        let mut leftover = Vec::new();
        for field in &self.fields {
            leftover.extend_from_slice(&self.line[cursor..field.span.start]);
            cursor = field.span.end;
        }
        leftover.extend_from_slice(&self.line[cursor..]);
        leftover.iter().all(u8::is_ascii_whitespace)
    }
}

impl fmt::Display for GcodeCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(&self.line))
    }
}

/// Splits a line into `letter + number` words.
///
/// A word is an ASCII letter immediately followed by a run of digits, signs
/// and decimal points that reads as a number. Anything else is skipped and
/// counts as unparsed text.
pub fn parse_fields(line: &[u8]) -> Vec<Field> {
    let mut fields = Vec::new();
    let mut pos = 0;
    while pos < line.len() {
        let letter = line[pos];
        if letter.is_ascii_alphabetic() {
            let value_start = pos + 1;
            let mut end = value_start;
            while end < line.len() && is_number_byte(line[end]) {
                end += 1;
            }
            if let Some(value) = parse_number(&line[value_start..end]) {
                fields.push(Field {
                    letter: letter.to_ascii_uppercase() as char,
                    value,
                    span: pos..end,
                });
                pos = end;
                continue;
            }
        }
        pos += 1;
    }
    fields
}

fn is_number_byte(byte: u8) -> bool {
    byte.is_ascii_digit() || matches!(byte, b'.' | b'-' | b'+')
}

fn parse_number(token: &[u8]) -> Option<f64> {
    if !token.iter().any(u8::is_ascii_digit) {
        return None;
    }
    std::str::from_utf8(token).ok()?.parse().ok()
}

/// Anything the front-end can hand to the worker.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Gcode(GcodeCommand),
    Realtime(RealtimeCommand),
}

impl Command {
    pub fn is_valid(&self) -> bool {
        match self {
            Command::Gcode(cmd) => cmd.is_valid(),
            Command::Realtime(_) => true,
        }
    }
}

impl From<GcodeCommand> for Command {
    fn from(cmd: GcodeCommand) -> Self {
        Command::Gcode(cmd)
    }
}

impl From<RealtimeCommand> for Command {
    fn from(cmd: RealtimeCommand) -> Self {
        Command::Realtime(cmd)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Gcode(cmd) => cmd.fmt(f),
            Command::Realtime(cmd) => cmd.fmt(f),
        }
    }
}
