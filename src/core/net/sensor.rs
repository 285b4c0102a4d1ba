use crate::common::constants::{INVALID_FD, SENSOR_DRAIN_SIZE};
use crate::common::error::{Error, Result};
use crate::core::event::event::EpollAction;
use crate::core::net::epollable::Epollable;
use crate::core::net::fd::{close_fd, Descriptor};
use parking_lot::RwLock;
use std::os::unix::io::RawFd;

/// A pipe whose read end wakes up an epoll wait when the write end is touched.
///
/// Writers hold `write_end` shared for the whole `write`, and closing takes
/// it exclusively, so a touch never lands in a reused fd number.
pub struct Sensor {
    descriptor: Descriptor,
    write_end: RwLock<RawFd>,
}

impl Sensor {
    pub fn create() -> Result<Self> {
        let mut fds = [INVALID_FD; 2];
        if unsafe { libc::pipe2(fds.as_mut_ptr(), libc::O_NONBLOCK | libc::O_CLOEXEC) } < 0 {
            return Err(Error::last_os_error("pipe"));
        }

        Ok(Self {
            descriptor: Descriptor::from_raw_fd(fds[0]),
            write_end: RwLock::new(fds[1]),
        })
    }

    /// Makes the read end readable. A full pipe already guarantees that.
    pub fn touch(&self) -> Result<()> {
        let write_end = self.write_end.read();
        let fd = *write_end;
        if fd == INVALID_FD {
            return Err(Error::from_errno("write", libc::EBADF));
        }

        let finger = b'x';
        loop {
            let n = unsafe { libc::write(fd, &finger as *const u8 as *const libc::c_void, 1) };
            if n >= 0 {
                return Ok(());
            }
            let err = Error::last_os_error("write");
            if err.is_interrupted() {
                continue;
            }
            if err.is_would_block() {
                return Ok(());
            }
            return Err(err);
        }
    }

    /// Drains every pending touch. Returns how many bytes were read.
    pub fn feel(&self) -> Result<usize> {
        let fd = self.get_fd();
        let mut buf = [0u8; SENSOR_DRAIN_SIZE];
        let mut total = 0;
        loop {
            let n = unsafe { libc::read(fd, buf.as_mut_ptr() as *mut libc::c_void, buf.len()) };
            if n > 0 {
                total += n as usize;
                continue;
            }
            if n == 0 {
                return Ok(total);
            }
            let err = Error::last_os_error("read");
            if err.is_interrupted() {
                continue;
            }
            if err.is_would_block() {
                return Ok(total);
            }
            return Err(err);
        }
    }
}

impl Epollable for Sensor {
    fn descriptor(&self) -> &Descriptor {
        &self.descriptor
    }

    fn handle_epoll_event(&self, _events: u32) -> Result<EpollAction> {
        self.feel()?;
        Ok(EpollAction::None)
    }

    fn before_close(&self) {
        let mut write_end = self.write_end.write();
        let fd = std::mem::replace(&mut *write_end, INVALID_FD);
        if fd != INVALID_FD {
            close_fd(fd);
        }
    }
}

impl Drop for Sensor {
    fn drop(&mut self) {
        let fd = *self.write_end.get_mut();
        if fd != INVALID_FD {
            close_fd(fd);
        }
    }
}
