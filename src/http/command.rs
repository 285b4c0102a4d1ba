//! The single-purpose scanners that together consume one header section.
//!
//! A message is parsed by walking a fixed chain of [`Command`]s. Each command
//! consumes a prefix of the bytes it is given and reports whether its field is
//! complete ([`Step::Finish`]) or needs more input ([`Step::Continue`]).
//! Commands never keep references into a caller buffer between calls: a field
//! that is split across two `parse()` calls is moved into a small carry buffer
//! and delivered from there.

use crate::common::constants::{
    DEFAULT_MAX_FIELD_LENGTH, DEFAULT_MAX_HEAD_LENGTH, DEFAULT_MAX_LEADING_SPACES,
};
use crate::http::event::HttpEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParserLimits {
    /// Spaces tolerated before a field or header value.
    pub max_leading_spaces: usize,
    /// Bytes a single field may accumulate across `parse()` calls.
    pub max_field_length: usize,
    /// Total header bytes before the parse fails.
    pub max_head_length: usize,
}

impl Default for ParserLimits {
    fn default() -> Self {
        Self {
            max_leading_spaces: DEFAULT_MAX_LEADING_SPACES,
            max_field_length: DEFAULT_MAX_FIELD_LENGTH,
            max_head_length: DEFAULT_MAX_HEAD_LENGTH,
        }
    }
}

/// A start-line field and the callback it is delivered to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Method,
    Url,
    Version,
    Code,
    Describe,
}

impl Field {
    pub fn name(self) -> &'static str {
        match self {
            Field::Method => "method",
            Field::Url => "url",
            Field::Version => "version",
            Field::Code => "status code",
            Field::Describe => "status description",
        }
    }

    fn deliver(self, event: &mut dyn HttpEvent, value: &[u8]) -> bool {
        match self {
            Field::Method => event.on_method(value),
            Field::Url => event.on_url(value),
            Field::Version => event.on_version(value),
            Field::Code => event.on_code(value),
            Field::Describe => event.on_describe(value),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// A start-line field ending at `terminator`.
    Field { field: Field, terminator: u8 },
    /// Zero or more `\nname: value\r` lines, ended by `\n\r`.
    NameValuePairs,
    /// The final `\n` of the header section.
    HeadEnd,
}

pub const REQUEST_CHAIN: [Command; 5] = [
    Command::Field { field: Field::Method, terminator: b' ' },
    Command::Field { field: Field::Url, terminator: b' ' },
    Command::Field { field: Field::Version, terminator: b'\r' },
    Command::NameValuePairs,
    Command::HeadEnd,
];

pub const RESPONSE_CHAIN: [Command; 5] = [
    Command::Field { field: Field::Version, terminator: b' ' },
    Command::Field { field: Field::Code, terminator: b' ' },
    Command::Field { field: Field::Describe, terminator: b'\r' },
    Command::NameValuePairs,
    Command::HeadEnd,
];

/// Progress of one command over one buffer; the payload is the number of
/// bytes consumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Continue(usize),
    Finish(usize),
}

/// A protocol error, with the message handed to `on_error`.
pub type StepResult = std::result::Result<Step, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unstarted,
    /// Started at this index of the current buffer, not yet terminated.
    Open(usize),
    /// Complete and entirely inside the current buffer.
    Closed(usize, usize),
    /// Complete and entirely inside the carry buffer.
    Carried,
}

/// Location of one field value: a range of the current buffer, possibly
/// preceded by bytes carried over from earlier buffers.
#[derive(Debug)]
struct Piece {
    mark: Mark,
    carried: Vec<u8>,
}

impl Piece {
    fn new() -> Self {
        Self {
            mark: Mark::Unstarted,
            carried: Vec::new(),
        }
    }

    fn reset(&mut self) {
        self.mark = Mark::Unstarted;
        self.carried.clear();
    }

    fn is_started(&self) -> bool {
        self.mark != Mark::Unstarted
    }

    fn open(&mut self, at: usize) {
        self.mark = Mark::Open(at);
    }

    fn close(&mut self, buf: &[u8], at: usize) {
        if let Mark::Open(start) = self.mark {
            if self.carried.is_empty() {
                self.mark = Mark::Closed(start, at);
            } else {
                self.carried.extend_from_slice(&buf[start..at]);
                self.mark = Mark::Carried;
            }
        }
    }

    fn bytes<'a>(&'a self, buf: &'a [u8]) -> &'a [u8] {
        match self.mark {
            Mark::Closed(start, end) => &buf[start..end],
            Mark::Carried => &self.carried,
            Mark::Unstarted | Mark::Open(_) => &[],
        }
    }

    /// Copies the part of the piece inside `buf` out before `buf` goes away.
    /// Returns false once the carried bytes exceed `limit`.
    fn carry(&mut self, buf: &[u8], limit: usize) -> bool {
        match self.mark {
            Mark::Open(start) => {
                self.carried.extend_from_slice(&buf[start..]);
                self.mark = Mark::Open(0);
            }
            Mark::Closed(start, end) => {
                self.carried.extend_from_slice(&buf[start..end]);
                self.mark = Mark::Carried;
            }
            Mark::Unstarted | Mark::Carried => {}
        }
        self.carried.len() <= limit
    }
}

/// Scans one start-line field up to its terminator.
#[derive(Debug)]
pub(crate) struct FieldScanner {
    value: Piece,
    spaces: usize,
}

impl FieldScanner {
    pub(crate) fn new() -> Self {
        Self {
            value: Piece::new(),
            spaces: 0,
        }
    }

    pub(crate) fn reset(&mut self) {
        self.value.reset();
        self.spaces = 0;
    }

    pub(crate) fn execute(
        &mut self,
        field: Field,
        terminator: u8,
        buf: &[u8],
        event: &mut dyn HttpEvent,
        limits: &ParserLimits,
    ) -> StepResult {
        for (i, &b) in buf.iter().enumerate() {
            if !self.value.is_started() {
                if b == b' ' {
                    self.spaces += 1;
                    if self.spaces > limits.max_leading_spaces {
                        return Err(format!("too many spaces before {}", field.name()));
                    }
                    continue;
                }
                self.value.open(i);
            }

            if b == terminator {
                self.value.close(buf, i);
                if !field.deliver(event, self.value.bytes(buf)) {
                    return Err(format!("{} rejected by event handler", field.name()));
                }
                return Ok(Step::Finish(i + 1));
            }
            if b == b'\r' || b == b'\n' {
                return Err(format!("unexpected line break in {}", field.name()));
            }
        }

        if !self.value.carry(buf, limits.max_field_length) {
            return Err(format!(
                "{} longer than {} bytes",
                field.name(),
                limits.max_field_length
            ));
        }
        Ok(Step::Continue(buf.len()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PairState {
    /// Expecting the `\n` that starts every line.
    LineStart,
    /// After the `\n`: a name, a stray `\n`, or the `\r` of the blank line.
    LineBegun,
    Name,
    BeforeValue,
    Value,
}

/// Scans `name: value` lines until the blank line.
#[derive(Debug)]
pub(crate) struct NameValueScanner {
    state: PairState,
    name: Piece,
    value: Piece,
    spaces: usize,
}

impl NameValueScanner {
    pub(crate) fn new() -> Self {
        Self {
            state: PairState::LineStart,
            name: Piece::new(),
            value: Piece::new(),
            spaces: 0,
        }
    }

    pub(crate) fn reset(&mut self) {
        self.state = PairState::LineStart;
        self.name.reset();
        self.value.reset();
        self.spaces = 0;
    }

    pub(crate) fn execute(
        &mut self,
        buf: &[u8],
        event: &mut dyn HttpEvent,
        limits: &ParserLimits,
    ) -> StepResult {
        for (i, &b) in buf.iter().enumerate() {
            match self.state {
                PairState::LineStart => {
                    if b != b'\n' {
                        return Err("NV pair not started with '\\n'".to_string());
                    }
                    self.state = PairState::LineBegun;
                }
                PairState::LineBegun => match b {
                    b'\n' => {}
                    b'\r' => return Ok(Step::Finish(i + 1)),
                    b':' => return Err("empty name in NV pair".to_string()),
                    _ => {
                        self.name.open(i);
                        self.state = PairState::Name;
                    }
                },
                PairState::Name => match b {
                    // Only the first colon separates; later ones belong to the value.
                    b':' => {
                        self.name.close(buf, i);
                        self.state = PairState::BeforeValue;
                    }
                    b'\r' | b'\n' => return Err("NV pair without ':'".to_string()),
                    _ => {}
                },
                PairState::BeforeValue => match b {
                    b' ' => {
                        self.spaces += 1;
                        if self.spaces > limits.max_leading_spaces {
                            return Err("too many spaces in NV pair".to_string());
                        }
                    }
                    b'\r' => {
                        self.value.open(i);
                        self.deliver(buf, i, event)?;
                    }
                    b'\n' => return Err("unexpected line feed in NV pair".to_string()),
                    _ => {
                        self.value.open(i);
                        self.state = PairState::Value;
                    }
                },
                PairState::Value => match b {
                    b'\r' => self.deliver(buf, i, event)?,
                    b'\n' => return Err("unexpected line feed in NV pair".to_string()),
                    _ => {}
                },
            }
        }

        let limit = limits.max_field_length;
        if !self.name.carry(buf, limit) || !self.value.carry(buf, limit) {
            return Err(format!("NV pair longer than {} bytes", limit));
        }
        Ok(Step::Continue(buf.len()))
    }

    fn deliver(
        &mut self,
        buf: &[u8],
        at: usize,
        event: &mut dyn HttpEvent,
    ) -> std::result::Result<(), String> {
        self.value.close(buf, at);
        if !event.on_name_value_pair(self.name.bytes(buf), self.value.bytes(buf)) {
            return Err("NV pair rejected by event handler".to_string());
        }

        self.name.reset();
        self.value.reset();
        self.spaces = 0;
        self.state = PairState::LineStart;
        Ok(())
    }
}

/// Consumes the `\n` that closes the header section.
pub(crate) fn execute_head_end(buf: &[u8], event: &mut dyn HttpEvent) -> StepResult {
    match buf.first() {
        None => Ok(Step::Continue(0)),
        Some(b'\n') => {
            if event.on_head_end() {
                Ok(Step::Finish(1))
            } else {
                Err("head end rejected by event handler".to_string())
            }
        }
        Some(_) => Err("http head not ended with '\\n'".to_string()),
    }
}
