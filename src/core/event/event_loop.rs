// Drives an Epoller: waits, dispatches ready epollables and applies the
// action each one asks for.
use crate::common::constants::INVALID_FD;
use crate::common::error::Result;
use crate::core::event::event::{EpollAction, EventMask};
use crate::core::event::poller::{Epoller, Waker};
use crate::core::net::epollable::Epollable;
use std::sync::Arc;
use tracing::{trace, warn};

pub struct EventLoop {
    epoller: Epoller,
}

impl EventLoop {
    pub fn new(capacity: u32) -> Result<Self> {
        let mut epoller = Epoller::new();
        epoller.create(capacity)?;
        Ok(Self { epoller })
    }

    pub fn epoller(&self) -> &Epoller {
        &self.epoller
    }

    pub fn epoller_mut(&mut self) -> &mut Epoller {
        &mut self.epoller
    }

    pub fn waker(&self) -> Result<Waker> {
        self.epoller.waker()
    }

    pub fn add(&mut self, epollable: Arc<dyn Epollable>, events: u32) -> Result<()> {
        self.epoller.set_events(&epollable, events, false)
    }

    /// Waits up to `timeout_ms` and handles whatever became ready.
    ///
    /// Returns the epollables that asked to be released; they are no longer
    /// registered and their fds are still open.
    pub fn run_once(&mut self, timeout_ms: u32) -> Result<Vec<Arc<dyn Epollable>>> {
        let n = self.epoller.timed_wait(timeout_ms)?;
        let ready: Vec<(Arc<dyn Epollable>, u32)> = self
            .epoller
            .ready()
            .map(|(epollable, events)| (Arc::clone(epollable), events))
            .collect();
        trace!(ready = n, "dispatching");

        let mut released = Vec::new();
        for (epollable, events) in ready {
            // An earlier handler in this batch may have closed it.
            let fd = epollable.get_fd();
            if fd == INVALID_FD {
                continue;
            }

            let action = match epollable.handle_epoll_event(events) {
                Ok(action) => action,
                Err(e) => {
                    warn!(fd, events = %EventMask(events), error = %e, "handler failed, closing");
                    EpollAction::Close
                }
            };
            trace!(fd, ?action, "handled");

            if let Err(e) = self.apply(&epollable, action, &mut released) {
                warn!(fd, ?action, error = %e, "applying action failed, closing");
                epollable.close();
            }
        }
        Ok(released)
    }

    fn apply(
        &mut self,
        epollable: &Arc<dyn Epollable>,
        action: EpollAction,
        released: &mut Vec<Arc<dyn Epollable>>,
    ) -> Result<()> {
        match action {
            EpollAction::None => {}
            EpollAction::Read | EpollAction::Write | EpollAction::ReadWrite => {
                if let Some(events) = action.events() {
                    self.epoller.set_events(epollable, events, false)?;
                }
            }
            EpollAction::Close | EpollAction::Destroy => epollable.close(),
            EpollAction::Remove => self.epoller.del_events(epollable.as_ref())?,
            EpollAction::Release => {
                self.epoller.del_events(epollable.as_ref())?;
                released.push(Arc::clone(epollable));
            }
        }
        Ok(())
    }
}
