//! Ports: the abstract seams of the dispatch core.
//!
//! The workflow layer plugs in through `Consumer` (execution + admission
//! gating) and `ItemFactory` (saved-queue reconstruction); observers plug
//! in through `EventSink`.

pub mod consumer;
pub mod event_sink;

pub use consumer::{Consumer, ItemFactory};
pub use event_sink::{EventSink, NoopEventSink, TracingEventSink};
