//! Epoll reactor and streaming HTTP header parser.
//!
//! The crate has two decoupled halves:
//!
//! * [`core`]: [`Epollable`](core::net::epollable::Epollable) objects and the
//!   [`Epoller`](core::event::poller::Epoller) that registers them, waits on
//!   them and can be woken from other threads.
//! * [`http`]: an incremental header parser driven by a fixed chain of parse
//!   commands, reporting fields to an [`HttpEvent`](http::event::HttpEvent)
//!   sink as borrowed slices.

pub mod application;
pub mod common;
pub mod core;
pub mod http;

pub use common::error::{Error, Result};
