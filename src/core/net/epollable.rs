use crate::common::constants::INVALID_FD;
use crate::common::error::Result;
use crate::core::event::event::EpollAction;
use crate::core::net::fd::{self, Descriptor};
use std::os::unix::io::RawFd;

/// A resource that an [`Epoller`](crate::core::event::poller::Epoller) can watch.
///
/// Implementors own a [`Descriptor`] and are shared as `Arc<dyn Epollable>`;
/// the registry of the epoller holds one reference while the fd is
/// registered. Registration state is only changed by the epoller, by
/// [`close`](Epollable::close) and by [`detach`](Epollable::detach).
pub trait Epollable: Send + Sync {
    fn descriptor(&self) -> &Descriptor;

    /// Called by the driving loop with the events the kernel reported.
    ///
    /// The returned action tells the loop what to do with the registration
    /// next. The default asks for the object to be closed.
    fn handle_epoll_event(&self, _events: u32) -> Result<EpollAction> {
        Ok(EpollAction::Close)
    }

    /// Runs once, right before the fd is closed.
    fn before_close(&self) {}

    fn get_fd(&self) -> RawFd {
        self.descriptor().get_fd()
    }

    fn epoll_events(&self) -> Option<u32> {
        self.descriptor().epoll_events()
    }

    /// Closes the fd, dropping any epoll registration first. Idempotent.
    fn close(&self) {
        if self.descriptor().claim_close() {
            self.before_close();
            self.descriptor().close();
        }
    }

    /// Gives up the fd without closing it and returns it.
    fn detach(&self) -> RawFd {
        self.descriptor().detach()
    }

    fn is_nonblock(&self) -> Result<bool> {
        fd::is_nonblock(self.get_fd())
    }

    fn set_nonblock(&self, yes: bool) -> Result<()> {
        fd::set_nonblock(self.get_fd(), yes)
    }

    fn is_nodelay(&self) -> Result<bool> {
        fd::is_nodelay(self.get_fd())
    }

    fn set_nodelay(&self, yes: bool) -> Result<()> {
        fd::set_nodelay(self.get_fd(), yes)
    }

    fn set_linger(&self, on: bool, seconds: i32) -> Result<()> {
        fd::set_linger(self.get_fd(), on, seconds)
    }

    fn set_tcp_option(&self, option: i32, yes: bool) -> Result<()> {
        fd::set_tcp_option(self.get_fd(), option, yes)
    }

    fn close_read(&self) -> Result<()> {
        shutdown_open(self.get_fd(), libc::SHUT_RD)
    }

    fn close_write(&self) -> Result<()> {
        shutdown_open(self.get_fd(), libc::SHUT_WR)
    }

    fn close_both(&self) -> Result<()> {
        shutdown_open(self.get_fd(), libc::SHUT_RDWR)
    }

    fn socket_error_code(&self) -> i32 {
        fd::socket_error_code(self.get_fd())
    }

    fn socket_error_message(&self) -> String {
        std::io::Error::from_raw_os_error(self.socket_error_code()).to_string()
    }
}

fn shutdown_open(fd: RawFd, how: i32) -> Result<()> {
    match fd {
        INVALID_FD => Ok(()),
        fd => fd::shutdown(fd, how),
    }
}
