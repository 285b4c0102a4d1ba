use crate::common::constants::INVALID_FD;
use crate::common::error::{Error, Result};
use crate::common::time::Deadline;
use crate::core::event::event::{EventMask, EPOLLIN};
use crate::core::net::epollable::Epollable;
use crate::core::net::fd::close_fd;
use crate::core::net::sensor::Sensor;
use libc::{epoll_create1, epoll_ctl, epoll_event, epoll_wait, EPOLL_CLOEXEC, EPOLL_CTL_ADD, EPOLL_CTL_DEL, EPOLL_CTL_MOD};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::os::unix::io::RawFd;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, trace};

/// The kernel epoll instance plus the objects registered with it.
///
/// Epollables keep a weak link to this so that closing a registered fd can
/// remove the registration first.
pub(crate) struct EpollHandle {
    epfd: RawFd,
    registry: Mutex<HashMap<RawFd, Arc<dyn Epollable>>>,
    ctl_calls: AtomicU64,
}

impl EpollHandle {
    fn create() -> Result<Self> {
        let epfd = unsafe { epoll_create1(EPOLL_CLOEXEC) };
        if epfd < 0 {
            return Err(Error::last_os_error("epoll_create"));
        }
        Ok(Self {
            epfd,
            registry: Mutex::new(HashMap::new()),
            ctl_calls: AtomicU64::new(0),
        })
    }

    fn ctl(&self, op: i32, fd: RawFd, events: u32) -> Result<()> {
        self.ctl_calls.fetch_add(1, Ordering::Relaxed);
        let mut ev = epoll_event {
            events,
            u64: fd as u64,
        };
        if unsafe { epoll_ctl(self.epfd, op, fd, &mut ev) } < 0 {
            return Err(Error::last_os_error("epoll_ctl"));
        }
        Ok(())
    }

    fn lookup(&self, fd: RawFd) -> Option<Arc<dyn Epollable>> {
        self.registry.lock().get(&fd).cloned()
    }

    fn remember(&self, fd: RawFd, epollable: &Arc<dyn Epollable>) {
        let previous = self.registry.lock().insert(fd, Arc::clone(epollable));
        drop(previous);
    }

    fn unremember(&self, fd: RawFd) {
        let removed = self.registry.lock().remove(&fd);
        drop(removed);
    }

    /// Drops the registration of an fd that is about to be closed or detached.
    pub(crate) fn forget(&self, fd: RawFd) {
        if let Err(e) = self.ctl(EPOLL_CTL_DEL, fd, 0) {
            debug!(fd, error = %e, "removing registration of closing fd failed");
        }
        self.unremember(fd);
    }
}

impl Drop for EpollHandle {
    fn drop(&mut self) {
        close_fd(self.epfd);
    }
}

/// Wakes a blocked [`Epoller::timed_wait`] from any thread.
#[derive(Clone)]
pub struct Waker {
    sensor: Arc<Sensor>,
}

impl Waker {
    pub fn wakeup(&self) -> Result<()> {
        self.sensor.touch()
    }
}

/// One epoll instance and the epollables registered with it.
///
/// An `Epoller` belongs to a single reactor thread: registration and waiting
/// take `&mut self`. Other threads interrupt a wait through a [`Waker`].
pub struct Epoller {
    handle: Option<Arc<EpollHandle>>,
    sensor: Option<Arc<Sensor>>,
    events: Vec<epoll_event>,
    ready: Vec<(Arc<dyn Epollable>, u32)>,
}

impl Epoller {
    pub fn new() -> Self {
        Self {
            handle: None,
            sensor: None,
            events: Vec::new(),
            ready: Vec::new(),
        }
    }

    /// Creates the epoll instance with room for `capacity_hint` events per
    /// wait and registers the wakeup sensor.
    pub fn create(&mut self, capacity_hint: u32) -> Result<()> {
        if self.handle.is_some() {
            return Err(Error::from_errno("epoll_create", libc::EEXIST));
        }
        if capacity_hint == 0 {
            return Err(Error::from_errno("epoll_create", libc::EINVAL));
        }

        self.events = vec![epoll_event { events: 0, u64: 0 }; capacity_hint as usize];
        let handle = match EpollHandle::create() {
            Ok(handle) => Arc::new(handle),
            Err(e) => {
                self.events = Vec::new();
                return Err(e);
            }
        };
        self.handle = Some(handle);

        let registered = Sensor::create().map(Arc::new).and_then(|sensor| {
            let epollable: Arc<dyn Epollable> = sensor.clone();
            self.set_events(&epollable, EPOLLIN, false)?;
            Ok(sensor)
        });
        match registered {
            Ok(sensor) => {
                debug!(capacity = capacity_hint, "epoller created");
                self.sensor = Some(sensor);
                Ok(())
            }
            Err(e) => {
                self.destroy();
                Err(e)
            }
        }
    }

    /// Closes the sensor and the epoll instance. Safe to call repeatedly.
    pub fn destroy(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };

        self.ready.clear();
        if let Some(sensor) = self.sensor.take() {
            sensor.close();
        }

        let registered: Vec<Arc<dyn Epollable>> =
            handle.registry.lock().drain().map(|(_, e)| e).collect();
        for epollable in &registered {
            epollable.descriptor().clear_registration();
        }
        debug!(dropped = registered.len(), "epoller destroyed");
        drop(registered);

        self.events = Vec::new();
    }

    pub fn is_created(&self) -> bool {
        self.handle.is_some()
    }

    fn handle(&self) -> Result<&Arc<EpollHandle>> {
        self.handle
            .as_ref()
            .ok_or_else(|| Error::from_errno("epoll_ctl", libc::EBADF))
    }

    /// Waits at most `milliseconds` (0 polls without blocking).
    ///
    /// Interrupted waits are resumed with whatever time is left. Returns the
    /// number of ready epollables; wakeups of the internal sensor are not
    /// counted, so a pure [`wakeup`](Self::wakeup) returns 0.
    pub fn timed_wait(&mut self, milliseconds: u32) -> Result<usize> {
        self.wait_until(Some(Deadline::after_millis(milliseconds)))
    }

    /// Waits with no timeout until something is ready or a wakeup arrives.
    pub fn wait(&mut self) -> Result<usize> {
        self.wait_until(None)
    }

    fn wait_until(&mut self, deadline: Option<Deadline>) -> Result<usize> {
        let handle = Arc::clone(self.handle()?);
        self.ready.clear();

        let n = loop {
            let timeout = deadline.as_ref().map_or(-1, Deadline::remaining_millis);
            let n = unsafe {
                epoll_wait(
                    handle.epfd,
                    self.events.as_mut_ptr(),
                    self.events.len() as i32,
                    timeout,
                )
            };
            if n > 0 {
                break n as usize;
            }

            let expired = deadline.as_ref().map_or(false, Deadline::is_expired);
            if n == 0 {
                if expired || deadline.is_none() {
                    return Ok(0);
                }
                continue;
            }

            let err = Error::last_os_error("epoll_wait");
            if !err.is_interrupted() {
                return Err(err);
            }
            if expired {
                return Ok(0);
            }
            trace!("epoll_wait interrupted, retrying");
        };

        let sensor_fd = self.sensor.as_ref().map_or(INVALID_FD, |s| s.get_fd());
        for ev in &self.events[..n] {
            let fd = ev.u64 as RawFd;
            let mask = ev.events;
            if fd == sensor_fd {
                if let Some(sensor) = &self.sensor {
                    sensor.feel()?;
                }
                trace!("epoller woken up");
                continue;
            }
            match handle.lookup(fd) {
                Some(epollable) => self.ready.push((epollable, mask)),
                None => trace!(fd, events = %EventMask(mask), "event for unregistered fd"),
            }
        }

        Ok(self.ready.len())
    }

    /// Registers `epollable` for `events`, or changes its mask.
    ///
    /// Does nothing when the recorded mask already equals `events`, unless
    /// `force` is set, which always issues an add.
    pub fn set_events(
        &mut self,
        epollable: &Arc<dyn Epollable>,
        events: u32,
        force: bool,
    ) -> Result<()> {
        let handle = Arc::clone(self.handle()?);
        let fd = epollable.get_fd();
        if fd == INVALID_FD {
            return Err(Error::from_errno("epoll_ctl", libc::EBADF));
        }

        let descriptor = epollable.descriptor();
        if let Some(owner) = descriptor.owner() {
            if !Arc::ptr_eq(&owner, &handle) {
                return Err(Error::from_errno("epoll_ctl", libc::EEXIST));
            }
        }

        let current = if force { None } else { descriptor.epoll_events() };
        if current == Some(events) {
            return Ok(());
        }

        let op = if current.is_none() { EPOLL_CTL_ADD } else { EPOLL_CTL_MOD };
        handle.ctl(op, fd, events)?;
        descriptor.set_registration(events, &handle);
        handle.remember(fd, epollable);
        trace!(fd, events = %EventMask(events), "events set");
        Ok(())
    }

    /// Removes `epollable` from the interest set. No-op for a detached or
    /// unregistered epollable.
    pub fn del_events(&mut self, epollable: &dyn Epollable) -> Result<()> {
        let handle = Arc::clone(self.handle()?);
        let fd = epollable.get_fd();
        if fd == INVALID_FD || epollable.epoll_events().is_none() {
            return Ok(());
        }

        let descriptor = epollable.descriptor();
        match descriptor.owner() {
            Some(owner) if Arc::ptr_eq(&owner, &handle) => {}
            _ => return Err(Error::from_errno("epoll_ctl", libc::ENOENT)),
        }

        handle.ctl(EPOLL_CTL_DEL, fd, 0)?;
        descriptor.clear_registration();
        handle.unremember(fd);
        trace!(fd, "events deleted");
        Ok(())
    }

    /// The `index`-th ready epollable of the last wait.
    pub fn get(&self, index: usize) -> Option<&Arc<dyn Epollable>> {
        self.ready.get(index).map(|(epollable, _)| epollable)
    }

    /// The events reported for the `index`-th ready epollable.
    pub fn get_events(&self, index: usize) -> Option<u32> {
        self.ready.get(index).map(|(_, events)| *events)
    }

    pub fn ready(&self) -> impl Iterator<Item = (&Arc<dyn Epollable>, u32)> + '_ {
        self.ready.iter().map(|(epollable, events)| (epollable, *events))
    }

    /// Number of registered epollables, not counting the sensor.
    pub fn registered(&self) -> usize {
        self.handle.as_ref().map_or(0, |handle| {
            let total = handle.registry.lock().len();
            total.saturating_sub(usize::from(self.sensor.is_some()))
        })
    }

    /// Number of `epoll_ctl` calls issued so far.
    pub fn ctl_calls(&self) -> u64 {
        self.handle
            .as_ref()
            .map_or(0, |handle| handle.ctl_calls.load(Ordering::Relaxed))
    }

    pub fn wakeup(&self) -> Result<()> {
        match &self.sensor {
            Some(sensor) => sensor.touch(),
            None => Err(Error::from_errno("write", libc::EBADF)),
        }
    }

    pub fn waker(&self) -> Result<Waker> {
        match &self.sensor {
            Some(sensor) => Ok(Waker {
                sensor: Arc::clone(sensor),
            }),
            None => Err(Error::from_errno("write", libc::EBADF)),
        }
    }
}

impl Default for Epoller {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Epoller {
    fn drop(&mut self) {
        self.destroy();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::event::event::EPOLLOUT;
    use crate::core::net::fd::Descriptor;

    struct Pipe {
        descriptor: Descriptor,
        write_end: RawFd,
    }

    impl Pipe {
        fn new() -> Arc<Self> {
            let mut fds = [0; 2];
            assert_eq!(unsafe { libc::pipe(fds.as_mut_ptr()) }, 0);
            Arc::new(Self {
                descriptor: Descriptor::from_raw_fd(fds[0]),
                write_end: fds[1],
            })
        }

        fn poke(&self) {
            let byte = b'!';
            let n = unsafe { libc::write(self.write_end, &byte as *const u8 as *const libc::c_void, 1) };
            assert_eq!(n, 1);
        }
    }

    impl Drop for Pipe {
        fn drop(&mut self) {
            close_fd(self.write_end);
        }
    }

    impl Epollable for Pipe {
        fn descriptor(&self) -> &Descriptor {
            &self.descriptor
        }
    }

    fn created() -> Epoller {
        let mut epoller = Epoller::new();
        epoller.create(16).unwrap();
        epoller
    }

    #[test]
    fn test_create_twice_fails() {
        let mut epoller = created();
        assert_eq!(epoller.create(16).unwrap_err().errno(), Some(libc::EEXIST));
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let mut epoller = Epoller::new();
        assert_eq!(epoller.create(0).unwrap_err().errno(), Some(libc::EINVAL));
        assert!(!epoller.is_created());
    }

    #[test]
    fn test_operations_before_create_fail() {
        let mut epoller = Epoller::new();
        assert!(epoller.timed_wait(0).is_err());
        assert!(epoller.wakeup().is_err());
        let pipe: Arc<dyn Epollable> = Pipe::new();
        assert_eq!(
            epoller.set_events(&pipe, EPOLLIN, false).unwrap_err().errno(),
            Some(libc::EBADF)
        );
    }

    #[test]
    fn test_unchanged_mask_skips_syscall() {
        let mut epoller = created();
        let pipe: Arc<dyn Epollable> = Pipe::new();
        let before = epoller.ctl_calls();

        epoller.set_events(&pipe, EPOLLIN, false).unwrap();
        epoller.set_events(&pipe, EPOLLIN, false).unwrap();
        epoller.set_events(&pipe, EPOLLIN, false).unwrap();

        assert_eq!(epoller.ctl_calls(), before + 1);
        assert_eq!(pipe.epoll_events(), Some(EPOLLIN));
    }

    #[test]
    fn test_mask_change_is_modify() {
        let mut epoller = created();
        let pipe: Arc<dyn Epollable> = Pipe::new();
        epoller.set_events(&pipe, EPOLLIN, false).unwrap();
        epoller.set_events(&pipe, EPOLLIN | EPOLLOUT, false).unwrap();
        assert_eq!(pipe.epoll_events(), Some(EPOLLIN | EPOLLOUT));
        assert_eq!(epoller.registered(), 1);
    }

    #[test]
    fn test_forced_add_of_registered_fd_fails() {
        let mut epoller = created();
        let pipe: Arc<dyn Epollable> = Pipe::new();
        epoller.set_events(&pipe, EPOLLIN, false).unwrap();
        let err = epoller.set_events(&pipe, EPOLLIN, true).unwrap_err();
        assert_eq!(err.errno(), Some(libc::EEXIST));
        assert_eq!(pipe.epoll_events(), Some(EPOLLIN));
    }

    #[test]
    fn test_del_resets_mask() {
        let mut epoller = created();
        let pipe: Arc<dyn Epollable> = Pipe::new();
        epoller.set_events(&pipe, EPOLLIN, false).unwrap();
        epoller.del_events(pipe.as_ref()).unwrap();
        assert_eq!(pipe.epoll_events(), None);
        assert_eq!(epoller.registered(), 0);
        assert_eq!(Arc::strong_count(&pipe), 1);
    }

    #[test]
    fn test_del_of_detached_is_noop() {
        let mut epoller = created();
        let pipe = Pipe::new();
        pipe.close();
        assert!(epoller.del_events(pipe.as_ref()).is_ok());
    }

    #[test]
    fn test_set_events_on_closed_fd_fails() {
        let mut epoller = created();
        let pipe = Pipe::new();
        pipe.close();
        let epollable: Arc<dyn Epollable> = pipe;
        let err = epoller.set_events(&epollable, EPOLLIN, false).unwrap_err();
        assert_eq!(err.errno(), Some(libc::EBADF));
    }

    #[test]
    fn test_ready_object_is_reported() {
        let mut epoller = created();
        let pipe = Pipe::new();
        let epollable: Arc<dyn Epollable> = pipe.clone();
        epoller.set_events(&epollable, EPOLLIN, false).unwrap();

        pipe.poke();
        assert_eq!(epoller.timed_wait(1000).unwrap(), 1);
        assert_eq!(epoller.get(0).unwrap().get_fd(), pipe.get_fd());
        assert_ne!(epoller.get_events(0).unwrap() & EPOLLIN, 0);
        assert!(epoller.get(1).is_none());
    }

    #[test]
    fn test_close_while_registered_deregisters() {
        let mut epoller = created();
        let pipe = Pipe::new();
        let epollable: Arc<dyn Epollable> = pipe.clone();
        epoller.set_events(&epollable, EPOLLIN, false).unwrap();
        drop(epollable);

        pipe.close();
        assert_eq!(epoller.registered(), 0);
        assert_eq!(Arc::strong_count(&pipe), 1);
        assert_eq!(epoller.timed_wait(0).unwrap(), 0);
    }

    #[test]
    fn test_registration_is_exclusive() {
        let mut first = created();
        let mut second = created();
        let pipe: Arc<dyn Epollable> = Pipe::new();
        first.set_events(&pipe, EPOLLIN, false).unwrap();
        let err = second.set_events(&pipe, EPOLLIN, true).unwrap_err();
        assert_eq!(err.errno(), Some(libc::EEXIST));
        assert_eq!(second.del_events(pipe.as_ref()).unwrap_err().errno(), Some(libc::ENOENT));
    }

    #[test]
    fn test_destroy_is_idempotent_and_releases_objects() {
        let mut epoller = created();
        let pipe: Arc<dyn Epollable> = Pipe::new();
        epoller.set_events(&pipe, EPOLLIN, false).unwrap();
        epoller.destroy();
        epoller.destroy();
        assert!(!epoller.is_created());
        assert_eq!(pipe.epoll_events(), None);
        assert_eq!(Arc::strong_count(&pipe), 1);
    }

    #[test]
    fn test_wakeup_returns_zero_ready() {
        let mut epoller = created();
        epoller.wakeup().unwrap();
        assert_eq!(epoller.timed_wait(5000).unwrap(), 0);
    }
}
