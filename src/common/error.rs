use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// A failing OS call, carrying the errno it reported.
    #[error("{call} failed: {source}")]
    Syscall {
        call: &'static str,
        #[source]
        source: io::Error,
    },

    /// Malformed HTTP header input or a field rejected by the event sink.
    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl Error {
    /// Builds a syscall error from the calling thread's current `errno`.
    pub fn last_os_error(call: &'static str) -> Self {
        Error::Syscall {
            call,
            source: io::Error::last_os_error(),
        }
    }

    pub fn from_errno(call: &'static str, errno: i32) -> Self {
        Error::Syscall {
            call,
            source: io::Error::from_raw_os_error(errno),
        }
    }

    /// OS error code for syscall and I/O errors.
    pub fn errno(&self) -> Option<i32> {
        match self {
            Error::Syscall { source, .. } => source.raw_os_error(),
            Error::Io(e) => e.raw_os_error(),
            _ => None,
        }
    }

    pub fn is_interrupted(&self) -> bool {
        self.errno() == Some(libc::EINTR)
    }

    pub fn is_would_block(&self) -> bool {
        matches!(self.errno(), Some(code) if code == libc::EAGAIN || code == libc::EWOULDBLOCK)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
