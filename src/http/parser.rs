use crate::common::error::{Error, Result};
use crate::http::command::{
    execute_head_end, Command, FieldScanner, NameValueScanner, ParserLimits, Step, REQUEST_CHAIN,
    RESPONSE_CHAIN,
};
use crate::http::event::{HttpEvent, NullEvent};
use tracing::debug;

/// Which start line the parser expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Request,
    Response,
}

impl MessageKind {
    fn chain(self) -> &'static [Command] {
        match self {
            MessageKind::Request => &REQUEST_CHAIN,
            MessageKind::Response => &RESPONSE_CHAIN,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    /// The header section is not complete; feed more bytes.
    Continue,
    /// The header section is complete. Bytes after it are not consumed.
    Finish,
}

/// Streaming HTTP/1.x header parser.
///
/// Bytes may arrive in arbitrarily small chunks: every callback of the
/// installed [`HttpEvent`] fires exactly once per field, with the same value
/// no matter how the input was split. Values are borrowed from the caller's
/// buffer when a field fits in one chunk and from an internal carry buffer
/// otherwise, so they are only valid for the duration of the callback.
///
/// Without an installed event the parser still validates the input.
pub struct HttpParser<E> {
    kind: MessageKind,
    limits: ParserLimits,
    chain: &'static [Command],
    position: usize,
    head_length: usize,
    head_finished: bool,
    failed: Option<String>,
    field: FieldScanner,
    pairs: NameValueScanner,
    event: Option<E>,
}

impl<E: HttpEvent> HttpParser<E> {
    pub fn new(kind: MessageKind) -> Self {
        Self::with_limits(kind, ParserLimits::default())
    }

    pub fn with_limits(kind: MessageKind, limits: ParserLimits) -> Self {
        Self {
            kind,
            limits,
            chain: kind.chain(),
            position: 0,
            head_length: 0,
            head_finished: false,
            failed: None,
            field: FieldScanner::new(),
            pairs: NameValueScanner::new(),
            event: None,
        }
    }

    pub fn kind(&self) -> MessageKind {
        self.kind
    }

    pub fn limits(&self) -> &ParserLimits {
        &self.limits
    }

    /// Installs the event sink, returning the previous one.
    pub fn set_http_event(&mut self, event: E) -> Option<E> {
        self.event.replace(event)
    }

    pub fn http_event(&self) -> Option<&E> {
        self.event.as_ref()
    }

    pub fn http_event_mut(&mut self) -> Option<&mut E> {
        self.event.as_mut()
    }

    pub fn take_http_event(&mut self) -> Option<E> {
        self.event.take()
    }

    /// Bytes consumed by the header section so far.
    pub fn get_head_length(&self) -> usize {
        self.head_length
    }

    pub fn head_finished(&self) -> bool {
        self.head_finished
    }

    /// Rewinds to the start of the chain and resets the installed event, so the
    /// parser can take the next message.
    pub fn reset(&mut self) {
        self.chain = self.kind.chain();
        self.position = 0;
        self.head_length = 0;
        self.head_finished = false;
        self.failed = None;
        self.field.reset();
        self.pairs.reset();
        if let Some(event) = self.event.as_mut() {
            event.reset();
        }
    }

    /// Feeds the next chunk of the message.
    ///
    /// On a protocol error `on_error` is called once and the parser stays
    /// failed until [`reset`](Self::reset). Once the head is finished,
    /// further calls return `Finish` without consuming anything.
    pub fn parse(&mut self, buffer: &[u8]) -> Result<Progress> {
        if let Some(message) = &self.failed {
            return Err(Error::Parse(message.clone()));
        }
        if self.head_finished {
            return Ok(Progress::Finish);
        }

        let mut event = self.event.take();
        let mut null = NullEvent;
        let sink: &mut dyn HttpEvent = match event.as_mut() {
            Some(event) => event,
            None => &mut null,
        };

        let outcome = self.run(buffer, sink);
        if let Err(message) = &outcome {
            sink.on_error(message);
        }
        self.event = event;

        outcome.map_err(|message| {
            debug!(head_length = self.head_length, error = %message, "http head rejected");
            self.failed = Some(message.clone());
            Error::Parse(message)
        })
    }

    fn run(
        &mut self,
        buffer: &[u8],
        sink: &mut dyn HttpEvent,
    ) -> std::result::Result<Progress, String> {
        let mut offset = 0;
        loop {
            let tail = &buffer[offset..];
            let step = match self.chain[self.position] {
                Command::Field { field, terminator } => {
                    self.field
                        .execute(field, terminator, tail, sink, &self.limits)?
                }
                Command::NameValuePairs => self.pairs.execute(tail, sink, &self.limits)?,
                Command::HeadEnd => execute_head_end(tail, sink)?,
            };

            let (consumed, finished) = match step {
                Step::Continue(consumed) => (consumed, false),
                Step::Finish(consumed) => (consumed, true),
            };
            offset += consumed;
            self.head_length += consumed;
            if self.head_length > self.limits.max_head_length {
                return Err(format!(
                    "http head longer than {} bytes",
                    self.limits.max_head_length
                ));
            }
            if !finished {
                return Ok(Progress::Continue);
            }

            self.field.reset();
            self.position += 1;
            if self.position == self.chain.len() {
                self.head_finished = true;
                return Ok(Progress::Finish);
            }
        }
    }
}
