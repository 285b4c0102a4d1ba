use crate::common::error::{Error, Result};
use crate::core::net::epollable::Epollable;
use crate::core::net::fd::Descriptor;
use std::io::{self, Read, Write};
use std::mem::ManuallyDrop;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::os::unix::io::{FromRawFd, IntoRawFd, RawFd};

/// A nonblocking listening TCP socket.
pub struct ListeningSocket {
    descriptor: Descriptor,
    local_addr: SocketAddr,
}

impl ListeningSocket {
    pub fn bind(addr: SocketAddr) -> Result<Self> {
        let listener = TcpListener::bind(addr).map_err(|source| Error::Syscall {
            call: "bind",
            source,
        })?;
        listener.set_nonblocking(true)?;
        let local_addr = listener.local_addr()?;

        Ok(Self {
            descriptor: Descriptor::from_raw_fd(listener.into_raw_fd()),
            local_addr,
        })
    }

    /// The bound address, with the real port when binding to port 0.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Accepts one pending connection as a nonblocking fd owned by the caller.
    /// Returns `None` when nothing is pending.
    pub fn accept(&self) -> Result<Option<(RawFd, SocketAddr)>> {
        let listener = ManuallyDrop::new(unsafe { TcpListener::from_raw_fd(self.get_fd()) });
        match listener.accept() {
            Ok((stream, peer)) => {
                stream.set_nonblocking(true)?;
                Ok(Some((stream.into_raw_fd(), peer)))
            }
            Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => Ok(None),
            Err(source) => Err(Error::Syscall {
                call: "accept",
                source,
            }),
        }
    }
}

impl Epollable for ListeningSocket {
    fn descriptor(&self) -> &Descriptor {
        &self.descriptor
    }
}

/// Reads into `buf` without taking ownership of `fd`.
///
/// `Ok(None)` means the read would block; `Ok(Some(0))` is end of stream.
pub fn read_nonblocking(fd: RawFd, buf: &mut [u8]) -> Result<Option<usize>> {
    let mut stream = ManuallyDrop::new(unsafe { TcpStream::from_raw_fd(fd) });
    loop {
        match stream.read(buf) {
            Ok(n) => return Ok(Some(n)),
            Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(None),
            Err(source) => return Err(Error::Syscall { call: "read", source }),
        }
    }
}

/// Writes from `buf` without taking ownership of `fd`.
///
/// `Ok(None)` means the write would block.
pub fn write_nonblocking(fd: RawFd, buf: &[u8]) -> Result<Option<usize>> {
    let mut stream = ManuallyDrop::new(unsafe { TcpStream::from_raw_fd(fd) });
    loop {
        match stream.write(buf) {
            Ok(n) => return Ok(Some(n)),
            Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(None),
            Err(source) => return Err(Error::Syscall { call: "write", source }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::constants::INVALID_FD;
    use std::net::TcpStream;

    fn loopback() -> SocketAddr {
        "127.0.0.1:0".parse().unwrap()
    }

    #[test]
    fn test_bind_reports_real_port() {
        let socket = ListeningSocket::bind(loopback()).unwrap();
        assert_ne!(socket.local_addr().port(), 0);
        assert!(socket.is_nonblock().unwrap());
    }

    #[test]
    fn test_accept_without_client() {
        let socket = ListeningSocket::bind(loopback()).unwrap();
        assert!(socket.accept().unwrap().is_none());
    }

    #[test]
    fn test_accept_and_exchange() {
        let socket = ListeningSocket::bind(loopback()).unwrap();
        let mut client = TcpStream::connect(socket.local_addr()).unwrap();

        let accepted = loop {
            if let Some(accepted) = socket.accept().unwrap() {
                break accepted;
            }
            std::thread::sleep(std::time::Duration::from_millis(5));
        };
        let (fd, _) = accepted;
        let server_side = Descriptor::from_raw_fd(fd);

        let mut buf = [0u8; 8];
        assert_eq!(read_nonblocking(fd, &mut buf).unwrap(), None);
        client.write_all(b"ping").unwrap();

        let n = loop {
            if let Some(n) = read_nonblocking(fd, &mut buf).unwrap() {
                break n;
            }
            std::thread::sleep(std::time::Duration::from_millis(5));
        };
        assert_eq!(&buf[..n], b"ping");
        assert_eq!(write_nonblocking(fd, b"pong").unwrap(), Some(4));

        let mut reply = [0u8; 4];
        client.read_exact(&mut reply).unwrap();
        assert_eq!(&reply, b"pong");
        server_side.close();
        assert_eq!(server_side.get_fd(), INVALID_FD);
    }
}
