use crate::common::constants::INVALID_FD;
use crate::common::error::{Error, Result};
use crate::core::event::event::EpollAction;
use crate::core::net::epollable::Epollable;
use crate::core::net::fd::{close_fd, Descriptor};
use parking_lot::{Condvar, Mutex, RwLock};
use std::collections::VecDeque;
use std::os::unix::io::RawFd;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Outcome of [`EpollableQueue::push_back`].
#[derive(Debug, PartialEq, Eq)]
pub enum Pushed<T> {
    Queued,
    /// The queue stayed full for the whole timeout; the item is handed back.
    Full(T),
}

/// A bounded queue whose fd is readable exactly while it holds items.
///
/// Producers on any thread push; a reactor registers the queue for
/// `EPOLLIN` and pops when it becomes ready. Closing the queue fails every
/// later push, including pushes already waiting for room, with `EBADF`.
pub struct EpollableQueue<T> {
    descriptor: Descriptor,
    write_end: RwLock<RawFd>,
    closed: AtomicBool,
    items: Mutex<VecDeque<T>>,
    not_full: Condvar,
    capacity: usize,
}

impl<T> EpollableQueue<T> {
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(Error::from_errno("pipe", libc::EINVAL));
        }

        let mut fds = [INVALID_FD; 2];
        if unsafe { libc::pipe2(fds.as_mut_ptr(), libc::O_NONBLOCK | libc::O_CLOEXEC) } < 0 {
            return Err(Error::last_os_error("pipe"));
        }

        Ok(Self {
            descriptor: Descriptor::from_raw_fd(fds[0]),
            write_end: RwLock::new(fds[1]),
            closed: AtomicBool::new(false),
            items: Mutex::new(VecDeque::with_capacity(capacity)),
            not_full: Condvar::new(),
            capacity,
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.items.lock().len() >= self.capacity
    }

    /// Appends `item`, waiting up to `milliseconds` for room (0 = don't wait).
    pub fn push_back(&self, item: T, milliseconds: u32) -> Result<Pushed<T>> {
        let mut items = self.items.lock();
        if items.len() >= self.capacity && milliseconds > 0 {
            let timeout = Duration::from_millis(u64::from(milliseconds));
            self.not_full.wait_while_for(
                &mut items,
                |items| items.len() >= self.capacity && !self.is_closed(),
                timeout,
            );
        }
        if self.is_closed() {
            return Err(Error::from_errno("write", libc::EBADF));
        }
        if items.len() >= self.capacity {
            return Ok(Pushed::Full(item));
        }

        if items.is_empty() {
            self.signal()?;
        }
        items.push_back(item);
        Ok(Pushed::Queued)
    }

    pub fn pop_front(&self) -> Result<Option<T>> {
        let mut items = self.items.lock();
        let item = items.pop_front();
        if item.is_some() {
            if items.is_empty() {
                self.unsignal()?;
            }
            self.not_full.notify_one();
        }
        Ok(item)
    }

    /// Pops up to `max` items in queue order.
    pub fn pop_front_batch(&self, max: usize) -> Result<Vec<T>> {
        let mut items = self.items.lock();
        let count = max.min(items.len());
        let batch: Vec<T> = items.drain(..count).collect();
        if count > 0 {
            if items.is_empty() {
                self.unsignal()?;
            }
            self.not_full.notify_all();
        }
        Ok(batch)
    }

    pub fn front(&self) -> Option<T>
    where
        T: Clone,
    {
        self.items.lock().front().cloned()
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn signal(&self) -> Result<()> {
        let write_end = self.write_end.read();
        let fd = *write_end;
        if fd == INVALID_FD {
            return Err(Error::from_errno("write", libc::EBADF));
        }
        let byte = b'q';
        loop {
            if unsafe { libc::write(fd, &byte as *const u8 as *const libc::c_void, 1) } >= 0 {
                return Ok(());
            }
            let err = Error::last_os_error("write");
            if !err.is_interrupted() {
                return Err(err);
            }
        }
    }

    /// Callers hold the items lock, which keeps the read end open until
    /// `before_close` has marked the queue closed.
    fn unsignal(&self) -> Result<()> {
        if self.is_closed() {
            return Ok(());
        }
        let fd = self.descriptor.get_fd();
        let mut byte = 0u8;
        loop {
            if unsafe { libc::read(fd, &mut byte as *mut u8 as *mut libc::c_void, 1) } >= 0 {
                return Ok(());
            }
            let err = Error::last_os_error("read");
            if err.is_would_block() {
                return Ok(());
            }
            if !err.is_interrupted() {
                return Err(err);
            }
        }
    }
}

impl<T: Send> Epollable for EpollableQueue<T> {
    fn descriptor(&self) -> &Descriptor {
        &self.descriptor
    }

    /// Readiness only means "not empty"; the owner pops at its own pace.
    fn handle_epoll_event(&self, _events: u32) -> Result<EpollAction> {
        Ok(EpollAction::None)
    }

    fn before_close(&self) {
        // Set under the items lock so no pusher sits between its check and
        // its wait when the notification goes out.
        {
            let _items = self.items.lock();
            self.closed.store(true, Ordering::Release);
            self.not_full.notify_all();
        }

        let mut write_end = self.write_end.write();
        let fd = std::mem::replace(&mut *write_end, INVALID_FD);
        if fd != INVALID_FD {
            close_fd(fd);
        }
    }
}

impl<T> Drop for EpollableQueue<T> {
    fn drop(&mut self) {
        let fd = *self.write_end.get_mut();
        if fd != INVALID_FD {
            close_fd(fd);
        }
    }
}
