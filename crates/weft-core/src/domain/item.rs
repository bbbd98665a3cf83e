//! Queue item record: payload + status/result/retry bookkeeping.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use tokio::sync::oneshot;

use super::id::ItemId;
use super::item_type::ItemType;
use super::payload::ItemPayload;
use super::state::ItemStatus;
use crate::error::ConsumeError;

/// Async hook attached to an item, invoked before a retry attempt or when a
/// timeout is declared. The workflow layer typically uses these to put the
/// browser session back into a known state.
#[async_trait]
pub trait ItemHook: Send + Sync {
    async fn run(&self, item: Arc<ItemPayload>);
}

/// Settles the submitting caller's pending completion.
pub type CompletionSender = oneshot::Sender<Result<Value, ConsumeError>>;
pub type CompletionReceiver = oneshot::Receiver<Result<Value, ConsumeError>>;

/// Optional capability hooks. Presence is checked via `Option`, not runtime
/// type probing; an item without hooks is observable only through events,
/// status and logs.
#[derive(Default)]
pub struct ItemHooks {
    /// Resolve/reject continuation for the submitter.
    pub completion: Option<CompletionSender>,

    /// Awaited before each retry attempt.
    pub on_retry: Option<Arc<dyn ItemHook>>,

    /// Awaited when a timeout is declared for this item.
    pub on_timeout: Option<Arc<dyn ItemHook>>,
}

/// The unit of work tracked by the dispatcher.
///
/// This record is the single source of truth for one item's state; the
/// runner's pending list holds ids only. Mutation happens exclusively inside
/// the dispatcher (`start`/`done`/`error`/timeout assignment); the consumer
/// only ever sees the immutable `ItemPayload`.
pub struct QueueItem {
    /// Assigned exactly once, by the caller or at `Dispatcher::add`.
    pub(crate) id: Option<ItemId>,
    pub(crate) payload: Arc<ItemPayload>,
    pub(crate) status: ItemStatus,
    pub(crate) result: Option<Value>,

    /// Stamped by `start()`; the watchdog measures elapsed time from here.
    pub(crate) started_at: Option<DateTime<Utc>>,

    /// Opt-in flag: only items with `retry` set are retried automatically.
    pub(crate) retry: bool,
    pub(crate) retry_count: u32,
    pub(crate) hooks: ItemHooks,
}

impl QueueItem {
    pub fn new(item_type: ItemType, data: Map<String, Value>) -> Self {
        Self {
            id: None,
            payload: Arc::new(ItemPayload::new(item_type, data)),
            status: ItemStatus::New,
            result: None,
            started_at: None,
            retry: false,
            retry_count: 0,
            hooks: ItemHooks::default(),
        }
    }

    pub fn with_id(mut self, id: ItemId) -> Self {
        self.id = Some(id);
        self
    }

    pub fn with_info(mut self, info: impl Into<String>) -> Self {
        Arc::make_mut(&mut self.payload).info = Some(info.into());
        self
    }

    pub fn with_maps(mut self, maps: Value) -> Self {
        Arc::make_mut(&mut self.payload).maps = Some(maps);
        self
    }

    pub fn with_callback(mut self, callback: Value) -> Self {
        Arc::make_mut(&mut self.payload).callback = Some(callback);
        self
    }

    /// Opt in to automatic retry of transient failures.
    pub fn with_retry(mut self) -> Self {
        self.retry = true;
        self
    }

    pub fn with_on_retry(mut self, hook: Arc<dyn ItemHook>) -> Self {
        self.hooks.on_retry = Some(hook);
        self
    }

    pub fn with_on_timeout(mut self, hook: Arc<dyn ItemHook>) -> Self {
        self.hooks.on_timeout = Some(hook);
        self
    }

    /// Attach a completion continuation; the receiver settles with the
    /// item's terminal success or failure. A timed-out item is abandoned
    /// and never settles its receiver.
    pub fn with_completion(mut self) -> (Self, CompletionReceiver) {
        let (tx, rx) = oneshot::channel();
        self.hooks.completion = Some(tx);
        (self, rx)
    }

    pub fn id(&self) -> Option<&ItemId> {
        self.id.as_ref()
    }

    pub fn payload(&self) -> &Arc<ItemPayload> {
        &self.payload
    }

    pub fn item_type(&self) -> &ItemType {
        &self.payload.item_type
    }

    pub fn status(&self) -> ItemStatus {
        self.status
    }

    pub fn result(&self) -> Option<&Value> {
        self.result.as_ref()
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    /// True iff the status is terminal.
    pub fn finished(&self) -> bool {
        self.status.is_terminal()
    }

    /// See `ItemPayload::mapped_value`.
    pub fn mapped_value(&self, name: &str) -> Option<Value> {
        self.payload.mapped_value(name)
    }

    /// Idempotent: equal values are a no-op, and terminal states never
    /// change again.
    pub(crate) fn set_status(&mut self, status: ItemStatus) {
        if self.status == status || self.status.is_terminal() {
            return;
        }
        self.status = status;
    }

    /// Idempotent: re-setting an equal result is a no-op.
    pub(crate) fn set_result(&mut self, value: Value) {
        if self.result.as_ref() == Some(&value) {
            return;
        }
        self.result = Some(value);
    }

    /// Stamp the attempt start time and move to Processing.
    pub(crate) fn start(&mut self) {
        self.started_at = Some(Utc::now());
        self.set_status(ItemStatus::Processing);
    }

    pub(crate) fn done(&mut self, result: Value) {
        self.set_status(ItemStatus::Done);
        self.set_result(result);
    }

    pub(crate) fn error(&mut self, message: String) {
        self.set_status(ItemStatus::Error);
        self.set_result(Value::String(message));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn item() -> QueueItem {
        QueueItem::new(ItemType::work(), Map::new())
    }

    #[test]
    fn start_stamps_time_and_moves_to_processing() {
        let mut it = item();
        assert_eq!(it.status(), ItemStatus::New);
        it.start();
        assert_eq!(it.status(), ItemStatus::Processing);
        assert!(it.started_at().is_some());
        assert!(!it.finished());
    }

    #[test]
    fn done_records_result_and_finishes() {
        let mut it = item();
        it.start();
        it.done(json!({"ok": true}));
        assert_eq!(it.status(), ItemStatus::Done);
        assert_eq!(it.result(), Some(&json!({"ok": true})));
        assert!(it.finished());
    }

    #[test]
    fn terminal_states_never_change() {
        let mut it = item();
        it.start();
        it.done(json!(1));
        it.error("too late".into());
        assert_eq!(it.status(), ItemStatus::Done);

        let mut it = item();
        it.set_status(ItemStatus::Skipped);
        it.start();
        assert_eq!(it.status(), ItemStatus::Skipped);
    }

    #[test]
    fn equal_result_is_not_reset() {
        let mut it = item();
        it.set_result(json!("v"));
        it.set_result(json!("v"));
        assert_eq!(it.result(), Some(&json!("v")));
        it.set_result(json!("w"));
        assert_eq!(it.result(), Some(&json!("w")));
    }

    #[test]
    fn builders_fill_payload_and_hooks() {
        let (it, rx) = item()
            .with_info("invoice 42")
            .with_maps(json!({"a": "b"}))
            .with_retry()
            .with_completion();
        assert_eq!(it.payload().info.as_deref(), Some("invoice 42"));
        assert!(it.payload().maps.is_some());
        assert!(it.retry);
        assert!(it.hooks.completion.is_some());
        drop(rx);
    }
}
