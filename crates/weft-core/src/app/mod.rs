//! Application layer: dispatcher, watchdog loop, status views, persistence.

pub mod dispatcher;
pub mod persist;
pub mod poll_loop;
pub mod status;

pub use dispatcher::{Ack, DispatchConfig, Dispatcher};
pub use poll_loop::PollHandle;
pub use status::{LogEntry, StatusReport};
