//! Item state machine.

use serde::{Deserialize, Serialize};

/// Status of a queue item.
///
/// Transitions only move forward:
/// - New -> Processing -> Done | Error | TimedOut
/// - New -> Skipped (pre-declared bypass; the item is never started)
///
/// Terminal states never change again; a late settlement of an already
/// finalized item (typically one that timed out) is ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ItemStatus {
    /// Submitted, not yet started.
    New,

    /// Currently dispatched to the consumer.
    Processing,

    /// Completed successfully.
    Done,

    /// Failed (non-retryable, or the retry ceiling was exceeded).
    Error,

    /// Exceeded its effective deadline while processing.
    TimedOut,

    /// Bypassed without execution.
    Skipped,
}

impl ItemStatus {
    /// Is this a terminal state (no further transitions)?
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ItemStatus::Done | ItemStatus::Error | ItemStatus::TimedOut | ItemStatus::Skipped
        )
    }
}
