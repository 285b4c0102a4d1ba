use crate::common::constants::INVALID_FD;
use crate::common::error::{Error, Result};
use crate::core::event::poller::EpollHandle;
use parking_lot::Mutex;
use std::mem;
use std::os::unix::io::RawFd;
use std::sync::{Arc, Weak};
use tracing::{trace, warn};

/// Returns whether every bit of `flags` is set in the fd's status flags.
pub fn has_flags(fd: RawFd, flags: i32) -> Result<bool> {
    let current = unsafe { libc::fcntl(fd, libc::F_GETFL, 0) };
    if current < 0 {
        return Err(Error::last_os_error("fcntl"));
    }
    Ok(current & flags == flags)
}

/// Adds (`yes`) or removes the given status flags, keeping all others.
pub fn set_flags(fd: RawFd, yes: bool, flags: i32) -> Result<()> {
    let current = unsafe { libc::fcntl(fd, libc::F_GETFL, 0) };
    if current < 0 {
        return Err(Error::last_os_error("fcntl"));
    }

    let updated = if yes { current | flags } else { current & !flags };
    if unsafe { libc::fcntl(fd, libc::F_SETFL, updated) } < 0 {
        return Err(Error::last_os_error("fcntl"));
    }
    Ok(())
}

pub fn is_nonblock(fd: RawFd) -> Result<bool> {
    has_flags(fd, libc::O_NONBLOCK)
}

pub fn set_nonblock(fd: RawFd, yes: bool) -> Result<()> {
    set_flags(fd, yes, libc::O_NONBLOCK)
}

fn get_int_option(fd: RawFd, level: i32, option: i32) -> Result<i32> {
    let mut value: libc::c_int = 0;
    let mut len = mem::size_of::<libc::c_int>() as libc::socklen_t;
    let rc = unsafe {
        libc::getsockopt(
            fd,
            level,
            option,
            &mut value as *mut libc::c_int as *mut libc::c_void,
            &mut len,
        )
    };
    if rc < 0 {
        return Err(Error::last_os_error("getsockopt"));
    }
    Ok(value)
}

fn set_int_option(fd: RawFd, level: i32, option: i32, value: i32) -> Result<()> {
    let rc = unsafe {
        libc::setsockopt(
            fd,
            level,
            option,
            &value as *const libc::c_int as *const libc::c_void,
            mem::size_of::<libc::c_int>() as libc::socklen_t,
        )
    };
    if rc < 0 {
        return Err(Error::last_os_error("setsockopt"));
    }
    Ok(())
}

pub fn is_nodelay(fd: RawFd) -> Result<bool> {
    Ok(get_int_option(fd, libc::IPPROTO_TCP, libc::TCP_NODELAY)? != 0)
}

pub fn set_nodelay(fd: RawFd, yes: bool) -> Result<()> {
    set_tcp_option(fd, libc::TCP_NODELAY, yes)
}

/// Toggles a boolean TCP-level option such as `TCP_CORK` or `TCP_NODELAY`.
pub fn set_tcp_option(fd: RawFd, option: i32, yes: bool) -> Result<()> {
    set_int_option(fd, libc::IPPROTO_TCP, option, i32::from(yes))
}

pub fn set_linger(fd: RawFd, on: bool, seconds: i32) -> Result<()> {
    let linger = libc::linger {
        l_onoff: i32::from(on),
        l_linger: seconds,
    };
    let rc = unsafe {
        libc::setsockopt(
            fd,
            libc::SOL_SOCKET,
            libc::SO_LINGER,
            &linger as *const libc::linger as *const libc::c_void,
            mem::size_of::<libc::linger>() as libc::socklen_t,
        )
    };
    if rc < 0 {
        return Err(Error::last_os_error("setsockopt"));
    }
    Ok(())
}

pub fn shutdown(fd: RawFd, how: i32) -> Result<()> {
    if unsafe { libc::shutdown(fd, how) } < 0 {
        return Err(Error::last_os_error("shutdown"));
    }
    Ok(())
}

/// Pending socket error (`SO_ERROR`), or the errno of `getsockopt` itself.
pub fn socket_error_code(fd: RawFd) -> i32 {
    match get_int_option(fd, libc::SOL_SOCKET, libc::SO_ERROR) {
        Ok(code) => code,
        Err(e) => e.errno().unwrap_or(libc::EIO),
    }
}

pub fn close_fd(fd: RawFd) {
    if unsafe { libc::close(fd) } < 0 {
        warn!(fd, error = %std::io::Error::last_os_error(), "close failed");
    }
}

struct DescriptorState {
    fd: RawFd,
    epoll_events: Option<u32>,
    owner: Weak<EpollHandle>,
    closing: bool,
}

/// The fd of an epollable plus the event mask its epoll instance holds for it.
///
/// The mask is `None` while the fd is not registered. Only the owning
/// `Epoller` records a mask, and closing or detaching removes the kernel
/// registration through the weak `owner` link.
pub struct Descriptor {
    state: Mutex<DescriptorState>,
}

impl Descriptor {
    pub fn new() -> Self {
        Self::from_raw_fd(INVALID_FD)
    }

    /// Takes ownership of `fd`: it is closed on `close()` or drop.
    pub fn from_raw_fd(fd: RawFd) -> Self {
        Self {
            state: Mutex::new(DescriptorState {
                fd,
                epoll_events: None,
                owner: Weak::new(),
                closing: false,
            }),
        }
    }

    pub fn get_fd(&self) -> RawFd {
        self.state.lock().fd
    }

    /// Records `fd` without registering it anywhere.
    pub fn set_fd(&self, fd: RawFd) {
        let mut state = self.state.lock();
        state.fd = fd;
        state.closing = false;
    }

    pub fn epoll_events(&self) -> Option<u32> {
        self.state.lock().epoll_events
    }

    pub(crate) fn owner(&self) -> Option<Arc<EpollHandle>> {
        self.state.lock().owner.upgrade()
    }

    pub(crate) fn set_registration(&self, events: u32, owner: &Arc<EpollHandle>) {
        let mut state = self.state.lock();
        state.epoll_events = Some(events);
        state.owner = Arc::downgrade(owner);
    }

    pub(crate) fn clear_registration(&self) {
        let mut state = self.state.lock();
        state.epoll_events = None;
        state.owner = Weak::new();
    }

    /// Hands the fd to the caller without closing it.
    pub fn detach(&self) -> RawFd {
        let (fd, registration) = self.take();
        if let Some(owner) = registration {
            owner.forget(fd);
        }
        fd
    }

    /// Marks an open fd as being closed. Exactly one caller gets `true`
    /// until the fd is replaced.
    pub(crate) fn claim_close(&self) -> bool {
        let mut state = self.state.lock();
        if state.fd == INVALID_FD || state.closing {
            return false;
        }
        state.closing = true;
        true
    }

    /// Closes the fd once; later calls do nothing.
    pub fn close(&self) {
        let (fd, registration) = self.take();
        if fd == INVALID_FD {
            return;
        }
        if let Some(owner) = registration {
            owner.forget(fd);
        }
        trace!(fd, "closing descriptor");
        close_fd(fd);
    }

    fn take(&self) -> (RawFd, Option<Arc<EpollHandle>>) {
        let mut state = self.state.lock();
        let fd = mem::replace(&mut state.fd, INVALID_FD);
        state.closing = false;
        let registered = state.epoll_events.take().is_some();
        let owner = mem::take(&mut state.owner);
        let registration = if registered && fd != INVALID_FD {
            owner.upgrade()
        } else {
            None
        };
        (fd, registration)
    }
}

impl Default for Descriptor {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Descriptor {
    fn drop(&mut self) {
        let fd = self.state.get_mut().fd;
        if fd != INVALID_FD {
            close_fd(fd);
        }
    }
}
