//! Consumer port: the seam between the dispatch core and the workflow
//! layer that actually drives the browser.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::domain::{ItemPayload, QueueItem, SavedItem};
use crate::error::ConsumeError;

/// Executes the workflow for one item and gates admission.
///
/// Design intent:
/// - The dispatcher owns ordering, retry and timeout policy.
/// - The consumer owns the external resource (one browser session) and
///   reports readiness through the two predicates, which are consulted
///   synchronously at admission time.
#[async_trait]
pub trait Consumer: Send + Sync {
    /// Global readiness gate: may a new primary dispatch start now?
    fn can_process_queue(&self) -> bool;

    /// May `item` start while the current dispatch is still in flight?
    /// Consulted right after a dispatch for the next pending non-callback
    /// item; approving bounds concurrency at two.
    fn can_handle_next_queue(&self, item: &ItemPayload) -> bool;

    /// Run the workflow for one item. The failure classification decides
    /// whether the dispatcher may retry (see `ConsumeError`).
    async fn process_queue(&self, item: Arc<ItemPayload>) -> Result<Value, ConsumeError>;
}

/// Rebuilds items from a saved-queue snapshot (`Dispatcher::load_queue`).
///
/// Whether the restored item keeps `saved.id` or receives a fresh one at
/// re-submission is this implementation's choice; keep it consistent, and
/// keep ids if downstream tooling correlates restored items with earlier
/// queue logs.
pub trait ItemFactory: Send + Sync {
    fn restore(&self, saved: SavedItem) -> QueueItem;
}
