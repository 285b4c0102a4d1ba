use std::fmt;

pub const EPOLLIN: u32 = libc::EPOLLIN as u32;
pub const EPOLLOUT: u32 = libc::EPOLLOUT as u32;
pub const EPOLLERR: u32 = libc::EPOLLERR as u32;
pub const EPOLLHUP: u32 = libc::EPOLLHUP as u32;
pub const EPOLLRDHUP: u32 = libc::EPOLLRDHUP as u32;

/// What the driving loop should do after an epollable handled its events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EpollAction {
    /// Leave the registration as it is.
    None,
    /// Watch for read readiness only.
    Read,
    /// Watch for write readiness only.
    Write,
    /// Watch for both.
    ReadWrite,
    /// Deregister and close.
    Close,
    /// Deregister but keep the fd open.
    Remove,
    /// Deregister, close and drop the loop's reference.
    Destroy,
    /// Deregister without closing and hand the object back to the caller.
    Release,
}

impl EpollAction {
    /// Event mask to re-arm with, for the re-arming actions.
    pub fn events(self) -> Option<u32> {
        match self {
            EpollAction::Read => Some(EPOLLIN),
            EpollAction::Write => Some(EPOLLOUT),
            EpollAction::ReadWrite => Some(EPOLLIN | EPOLLOUT),
            _ => None,
        }
    }
}

/// Formats an epoll event mask as `IN|OUT|...` for log lines.
pub struct EventMask(pub u32);

impl fmt::Display for EventMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const NAMES: [(u32, &str); 5] = [
            (EPOLLIN, "IN"),
            (EPOLLOUT, "OUT"),
            (EPOLLERR, "ERR"),
            (EPOLLHUP, "HUP"),
            (EPOLLRDHUP, "RDHUP"),
        ];

        let mut first = true;
        for (bit, name) in NAMES {
            if self.0 & bit != 0 {
                if !first {
                    f.write_str("|")?;
                }
                f.write_str(name)?;
                first = false;
            }
        }
        if first {
            write!(f, "{:#x}", self.0)?;
        }
        Ok(())
    }
}
