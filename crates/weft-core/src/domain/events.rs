//! Queue lifecycle signals.

use super::id::ItemId;

/// The fixed set of signals the dispatcher emits, delivered through the
/// `EventSink` port. One enum instead of ad hoc named events keeps the
/// surface exhaustive for observers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueEvent {
    /// An item was dispatched to the consumer (also emitted per retry
    /// attempt).
    Start { id: ItemId },

    /// An item completed successfully.
    Done { id: ItemId },

    /// An item failed terminally.
    Error { id: ItemId },

    /// A completion drained the pending list.
    Idle,
}

impl QueueEvent {
    /// Stable signal name, as written to logs.
    pub fn name(&self) -> &'static str {
        match self {
            QueueEvent::Start { .. } => "queue-start",
            QueueEvent::Done { .. } => "queue-done",
            QueueEvent::Error { .. } => "queue-error",
            QueueEvent::Idle => "queue-idle",
        }
    }

    pub fn item_id(&self) -> Option<&ItemId> {
        match self {
            QueueEvent::Start { id } | QueueEvent::Done { id } | QueueEvent::Error { id } => {
                Some(id)
            }
            QueueEvent::Idle => None,
        }
    }
}
