pub mod epollable;
pub mod epollable_queue;
pub mod fd;
pub mod sensor;
pub mod socket;

pub use epollable::Epollable;
pub use epollable_queue::{EpollableQueue, Pushed};
pub use fd::Descriptor;
pub use sensor::Sensor;
pub use socket::ListeningSocket;
