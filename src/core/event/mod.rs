pub mod event;
pub mod event_loop;
pub mod poller;

pub use event::{EpollAction, EventMask, EPOLLERR, EPOLLHUP, EPOLLIN, EPOLLOUT, EPOLLRDHUP};
pub use event_loop::EventLoop;
pub use poller::{Epoller, Waker};
