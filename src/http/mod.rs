pub mod collector;
pub mod command;
pub mod event;
pub mod parser;

pub use collector::HeaderCollector;
pub use command::{Field, ParserLimits};
pub use event::{HttpEvent, NullEvent};
pub use parser::{HttpParser, MessageKind, Progress};
