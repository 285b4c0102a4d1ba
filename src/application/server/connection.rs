use crate::common::error::Result;
use crate::core::event::event::{EpollAction, EPOLLERR, EPOLLHUP, EPOLLIN, EPOLLOUT};
use crate::core::net::epollable::Epollable;
use crate::core::net::fd::Descriptor;
use crate::core::net::socket::{read_nonblocking, write_nonblocking};
use crate::http::collector::HeaderCollector;
use crate::http::command::ParserLimits;
use crate::http::parser::{HttpParser, MessageKind, Progress};
use parking_lot::Mutex;
use std::net::SocketAddr;
use std::os::unix::io::RawFd;
use tracing::{debug, trace};

struct ConnectionState {
    parser: HttpParser<HeaderCollector>,
    buffer: Vec<u8>,
    response: Vec<u8>,
    written: usize,
}

/// One accepted client: reads a request head, answers with what was parsed
/// and closes.
pub struct HeaderConnection {
    descriptor: Descriptor,
    peer: SocketAddr,
    state: Mutex<ConnectionState>,
}

impl HeaderConnection {
    /// Takes ownership of the accepted, nonblocking `fd`.
    pub fn new(fd: RawFd, peer: SocketAddr, recv_buffer_size: usize, limits: ParserLimits) -> Self {
        let mut parser = HttpParser::with_limits(MessageKind::Request, limits);
        parser.set_http_event(HeaderCollector::new());

        Self {
            descriptor: Descriptor::from_raw_fd(fd),
            peer,
            state: Mutex::new(ConnectionState {
                parser,
                buffer: vec![0; recv_buffer_size],
                response: Vec::new(),
                written: 0,
            }),
        }
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    fn receive(&self, state: &mut ConnectionState) -> Result<EpollAction> {
        let fd = self.get_fd();
        let n = match read_nonblocking(fd, &mut state.buffer)? {
            None => return Ok(EpollAction::None),
            Some(0) => {
                debug!(fd, peer = %self.peer, "peer closed before head end");
                return Ok(EpollAction::Close);
            }
            Some(n) => n,
        };
        trace!(fd, bytes = n, "received");

        let ConnectionState {
            parser,
            buffer,
            response,
            ..
        } = state;
        match parser.parse(&buffer[..n]) {
            Ok(Progress::Continue) => return Ok(EpollAction::None),
            Ok(Progress::Finish) => {
                let summary = parser
                    .http_event()
                    .map(HeaderCollector::to_string)
                    .unwrap_or_default();
                *response = render(200, "OK", &summary);
            }
            Err(e) => {
                debug!(fd, peer = %self.peer, error = %e, "bad request");
                *response = render(400, "Bad Request", &format!("{}\n", e));
            }
        }
        Ok(EpollAction::Write)
    }

    fn send(&self, state: &mut ConnectionState) -> Result<EpollAction> {
        let fd = self.get_fd();
        if let Some(n) = write_nonblocking(fd, &state.response[state.written..])? {
            state.written += n;
        }
        if state.written < state.response.len() {
            return Ok(EpollAction::None);
        }
        debug!(fd, peer = %self.peer, bytes = state.written, "response sent");
        Ok(EpollAction::Close)
    }
}

fn render(code: u16, describe: &str, body: &str) -> Vec<u8> {
    format!(
        "HTTP/1.1 {} {}\r\nContent-Type: text/plain\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        code,
        describe,
        body.len(),
        body
    )
    .into_bytes()
}

impl Epollable for HeaderConnection {
    fn descriptor(&self) -> &Descriptor {
        &self.descriptor
    }

    fn handle_epoll_event(&self, events: u32) -> Result<EpollAction> {
        let mut state = self.state.lock();
        if state.response.is_empty() {
            if events & EPOLLIN != 0 {
                return self.receive(&mut state);
            }
        } else if events & EPOLLOUT != 0 {
            return self.send(&mut state);
        }

        if events & (EPOLLERR | EPOLLHUP) != 0 {
            debug!(fd = self.get_fd(), error = %self.socket_error_message(), "connection dropped");
            return Ok(EpollAction::Close);
        }
        Ok(EpollAction::None)
    }
}
