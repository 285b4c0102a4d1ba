use crate::application::config::models::Config;
use crate::application::server::connection::HeaderConnection;
use crate::common::error::Result;
use crate::core::event::event::{EpollAction, EPOLLIN};
use crate::core::event::event_loop::EventLoop;
use crate::core::event::poller::Waker;
use crate::core::net::epollable::Epollable;
use crate::core::net::fd::{self, Descriptor};
use crate::core::net::socket::ListeningSocket;
use crate::http::command::ParserLimits;
use parking_lot::Mutex;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Accepts every pending connection when the listener becomes readable.
///
/// Accepted connections are parked until the server registers them, since a
/// handler cannot reach the epoller that is dispatching it.
struct Acceptor {
    socket: ListeningSocket,
    accepted: Mutex<Vec<Arc<HeaderConnection>>>,
    recv_buffer_size: usize,
    nodelay: bool,
    limits: ParserLimits,
}

impl Acceptor {
    fn take_accepted(&self) -> Vec<Arc<HeaderConnection>> {
        std::mem::take(&mut *self.accepted.lock())
    }
}

impl Epollable for Acceptor {
    fn descriptor(&self) -> &Descriptor {
        self.socket.descriptor()
    }

    fn handle_epoll_event(&self, _events: u32) -> Result<EpollAction> {
        loop {
            let (fd, peer) = match self.socket.accept() {
                Ok(Some(accepted)) => accepted,
                Ok(None) => break,
                Err(e) => {
                    // Out of fds and similar: keep listening.
                    warn!(error = %e, "accept failed");
                    break;
                }
            };

            if self.nodelay {
                if let Err(e) = fd::set_nodelay(fd, true) {
                    debug!(fd, error = %e, "TCP_NODELAY not set");
                }
            }
            debug!(fd, %peer, "accepted");
            let connection = HeaderConnection::new(fd, peer, self.recv_buffer_size, self.limits);
            self.accepted.lock().push(Arc::new(connection));
        }
        Ok(EpollAction::None)
    }
}

/// Stops a running [`HeaderServer`] from another thread.
#[derive(Clone)]
pub struct ShutdownHandle {
    stop: Arc<AtomicBool>,
    waker: Waker,
}

impl ShutdownHandle {
    pub fn stop(&self) -> Result<()> {
        self.stop.store(true, Ordering::Release);
        self.waker.wakeup()
    }
}

/// A single-threaded server that parses request heads and echoes them back.
pub struct HeaderServer {
    event_loop: EventLoop,
    acceptor: Arc<Acceptor>,
    wait_timeout_ms: u32,
    stop: Arc<AtomicBool>,
}

impl HeaderServer {
    pub fn bind(config: &Config) -> Result<Self> {
        let socket = ListeningSocket::bind(config.server.listen)?;
        let mut event_loop = EventLoop::new(config.reactor.epoll_capacity)?;

        let acceptor = Arc::new(Acceptor {
            socket,
            accepted: Mutex::new(Vec::new()),
            recv_buffer_size: config.server.recv_buffer_size,
            nodelay: config.server.nodelay,
            limits: config.parser.limits(),
        });
        event_loop.add(acceptor.clone(), EPOLLIN)?;
        info!(addr = %acceptor.socket.local_addr(), "listening");

        Ok(Self {
            event_loop,
            acceptor,
            wait_timeout_ms: config.reactor.wait_timeout_ms,
            stop: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.acceptor.socket.local_addr()
    }

    pub fn shutdown_handle(&self) -> Result<ShutdownHandle> {
        Ok(ShutdownHandle {
            stop: Arc::clone(&self.stop),
            waker: self.event_loop.waker()?,
        })
    }

    /// Open client connections.
    pub fn connections(&self) -> usize {
        self.event_loop.epoller().registered().saturating_sub(1)
    }

    /// Serves until a [`ShutdownHandle`] asks to stop. Only reactor failures
    /// end the loop early; connection errors just close that connection.
    pub fn run(&mut self) -> Result<()> {
        while !self.stop.load(Ordering::Acquire) {
            self.run_once()?;
        }
        info!(open = self.connections(), "header server stopped");
        Ok(())
    }

    /// One wait and dispatch round, then registers newly accepted clients.
    pub fn run_once(&mut self) -> Result<()> {
        self.event_loop.run_once(self.wait_timeout_ms)?;

        for connection in self.acceptor.take_accepted() {
            if let Err(e) = self.event_loop.add(connection.clone(), EPOLLIN) {
                warn!(peer = %connection.peer(), error = %e, "registering connection failed");
                connection.close();
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::TcpStream;

    fn loopback_config() -> Config {
        let mut config = Config::default();
        config.server.listen = "127.0.0.1:0".parse().unwrap();
        config.reactor.wait_timeout_ms = 20;
        config
    }

    #[test]
    fn test_accepts_and_registers() {
        let mut server = HeaderServer::bind(&loopback_config()).unwrap();
        let _client = TcpStream::connect(server.local_addr()).unwrap();
        for _ in 0..50 {
            server.run_once().unwrap();
            if server.connections() == 1 {
                break;
            }
        }
        assert_eq!(server.connections(), 1);
    }

    #[test]
    fn test_serves_one_request() {
        let mut server = HeaderServer::bind(&loopback_config()).unwrap();
        let mut client = TcpStream::connect(server.local_addr()).unwrap();
        client.write_all(b"GET /x HTTP/1.1\r\nHost: t\r\n\r\n").unwrap();
        client
            .set_read_timeout(Some(std::time::Duration::from_millis(20)))
            .unwrap();

        let mut reply = Vec::new();
        for _ in 0..100 {
            server.run_once().unwrap();
            let mut chunk = [0u8; 512];
            match client.read(&mut chunk) {
                Ok(0) => break,
                Ok(n) => reply.extend_from_slice(&chunk[..n]),
                Err(_) => {}
            }
        }

        let reply = String::from_utf8(reply).unwrap();
        assert!(reply.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(reply.contains("url: /x\n"));
        assert!(reply.contains("header: Host=t\n"));
    }
}
