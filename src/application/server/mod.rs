pub mod connection;
pub mod header_server;

pub use connection::HeaderConnection;
pub use header_server::{HeaderServer, ShutdownHandle};
