//! EventSink port: where queue lifecycle signals go.

use crate::domain::QueueEvent;

/// Observer for the dispatcher's lifecycle signals.
///
/// Emission happens inline with dispatch bookkeeping; implementations must
/// not block and must not call back into the dispatcher.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: &QueueEvent);
}

/// Discards every signal.
pub struct NoopEventSink;

impl EventSink for NoopEventSink {
    fn emit(&self, _event: &QueueEvent) {}
}

/// Forwards every signal to `tracing`.
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn emit(&self, event: &QueueEvent) {
        match event.item_id() {
            Some(id) => tracing::info!(signal = event.name(), item = %id),
            None => tracing::info!(signal = event.name()),
        }
    }
}
