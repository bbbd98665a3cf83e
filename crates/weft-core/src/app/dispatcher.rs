//! Dispatcher: the process-wide orchestrator.
//!
//! One explicit context object instead of hidden module state: construct it
//! once at process start and clone the handle wherever it is needed. It owns
//! the full item history, the sequential runner, the attached consumer, the
//! timeout/retry policy and the watchdog loop.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::Mutex;

use crate::app::poll_loop::{self, PollHandle};
use crate::domain::{
    CompletionSender, ItemHook, ItemId, ItemPayload, ItemStatus, ItemType, QueueEvent, QueueItem,
};
use crate::error::ConsumeError;
use crate::ports::{Consumer, EventSink, NoopEventSink};
use crate::runner::SequentialRunner;

/// Dispatch policy knobs.
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// Applied when an item carries no `data.timeout` override.
    pub default_timeout: Duration,

    /// Maximum automatic retries per opted-in item; total attempts are
    /// `1 + retry_limit`.
    pub retry_limit: u32,

    /// Watchdog tick.
    pub poll_interval: Duration,

    /// Directory holding queue log files and the saved-queue snapshot.
    pub queue_dir: PathBuf,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            default_timeout: Duration::from_secs(600),
            retry_limit: 3,
            poll_interval: Duration::from_millis(100),
            queue_dir: PathBuf::from("queue"),
        }
    }
}

/// Acknowledgement returned by `Dispatcher::add`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Ack {
    pub status: String,
    pub id: ItemId,
}

pub(crate) struct DispatchState {
    pub(crate) consumer: Option<Arc<dyn Consumer>>,
    pub(crate) records: HashMap<ItemId, QueueItem>,
    /// Submission order; log and status views iterate this.
    pub(crate) history: Vec<ItemId>,
    pub(crate) runner: SequentialRunner,
    /// Most recently finished non-callback item.
    pub(crate) last: Option<ItemId>,
    pub(crate) poll: Option<PollHandle>,
}

pub(crate) struct DispatcherInner {
    pub(crate) created_at: DateTime<Utc>,
    pub(crate) config: DispatchConfig,
    pub(crate) sink: Arc<dyn EventSink>,
    pub(crate) state: Mutex<DispatchState>,
}

/// Cheap-clone handle over the dispatch core.
#[derive(Clone)]
pub struct Dispatcher {
    pub(crate) inner: Arc<DispatcherInner>,
}

impl Dispatcher {
    pub fn new(config: DispatchConfig) -> Self {
        Self::with_sink(config, Arc::new(NoopEventSink))
    }

    pub fn with_sink(config: DispatchConfig, sink: Arc<dyn EventSink>) -> Self {
        Self {
            inner: Arc::new(DispatcherInner {
                created_at: Utc::now(),
                config,
                sink,
                state: Mutex::new(DispatchState {
                    consumer: None,
                    records: HashMap::new(),
                    history: Vec::new(),
                    runner: SequentialRunner::new(),
                    last: None,
                    poll: None,
                }),
            }),
        }
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.inner.created_at
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.inner.config
    }

    /// Attach (or replace) the consumer and start the watchdog loop once.
    pub async fn set_consumer(&self, consumer: Arc<dyn Consumer>) {
        {
            let mut st = self.inner.state.lock().await;
            st.consumer = Some(consumer);
            if st.poll.is_none() {
                st.poll = Some(poll_loop::spawn(self.clone()));
            }
        }
        self.advance().await;
    }

    /// Submit an item. Assigns an id when the caller supplied none,
    /// enqueues callbacks at the head of the pending list, and immediately
    /// tries to dispatch.
    pub async fn add(&self, mut item: QueueItem) -> Ack {
        let id = {
            let mut st = self.inner.state.lock().await;
            let id = match item.id.clone() {
                Some(id) => id,
                None => loop {
                    // regenerate on the (unlikely) collision so ids stay
                    // unique within the process history
                    let candidate = ItemId::generate();
                    if !st.records.contains_key(&candidate) {
                        break candidate;
                    }
                },
            };
            item.id = Some(id.clone());
            let priority = item.payload.item_type.is_callback();
            st.history.push(id.clone());
            st.records.insert(id.clone(), item);
            st.runner.enqueue(id.clone(), priority);
            id
        };
        self.advance().await;
        Ack {
            status: "queued".into(),
            id,
        }
    }

    /// Mark a still-pending item as bypassed: it will be dropped from the
    /// pending list without ever being dispatched. Returns false once the
    /// item has already started (or is unknown).
    pub async fn skip(&self, id: &ItemId) -> bool {
        let mut st = self.inner.state.lock().await;
        match st.records.get_mut(id) {
            Some(rec) if rec.status == ItemStatus::New => {
                rec.set_status(ItemStatus::Skipped);
                true
            }
            _ => false,
        }
    }

    /// Best-effort duplicate-submission check: is an item with this type
    /// and info label already waiting or running? Items submitted without
    /// an info label never match.
    pub async fn has_pending(&self, item_type: &ItemType, info: &str) -> bool {
        let st = self.inner.state.lock().await;
        st.history
            .iter()
            .filter_map(|id| st.records.get(id))
            .any(|rec| {
                rec.payload.item_type == *item_type
                    && rec.payload.info.as_deref() == Some(info)
                    && matches!(rec.status, ItemStatus::New | ItemStatus::Processing)
            })
    }

    /// Stop the watchdog loop. Idempotent; in-flight consumer calls are
    /// not aborted.
    pub async fn shutdown(&self) {
        let poll = self.inner.state.lock().await.poll.take();
        if let Some(poll) = poll {
            poll.shutdown_and_join().await;
        }
    }

    /// Try to dispatch pending work.
    ///
    /// Admission rules, all applied under the state lock:
    /// 1. Skipped items are bypassed without processing; the next pending
    ///    item is considered in their place.
    /// 2. The head item is admitted when nothing is in flight and the
    ///    consumer's readiness gate holds.
    /// 3. Immediately after a dispatch, the next pending item may be
    ///    admitted alongside it if it is not a callback and the consumer
    ///    approves it (`can_handle_next_queue`).
    pub async fn advance(&self) {
        let mut spawns: Vec<(Arc<dyn Consumer>, ItemId, Arc<ItemPayload>)> = Vec::new();
        {
            let mut st = self.inner.state.lock().await;
            let state = &mut *st;
            let Some(consumer) = state.consumer.clone() else {
                return;
            };

            let mut primary = None;
            while primary.is_none() {
                let Some(id) = state.runner.admit(consumer.can_process_queue()) else {
                    break;
                };
                let Some(rec) = state.records.get_mut(&id) else {
                    state.runner.release();
                    continue;
                };
                if rec.status == ItemStatus::Skipped {
                    // pre-declared bypass: free the slot and consider the
                    // next pending item
                    state.runner.release();
                    continue;
                }
                rec.start();
                self.inner.sink.emit(&QueueEvent::Start { id: id.clone() });
                primary = Some((id, Arc::clone(&rec.payload)));
            }

            if let Some((id, payload)) = primary {
                spawns.push((Arc::clone(&consumer), id, payload));

                // the consumer may approve one more, non-callback item to
                // run alongside the one just dispatched
                let approved = state
                    .runner
                    .peek()
                    .and_then(|next| state.records.get(next))
                    .map(|rec| Arc::clone(&rec.payload))
                    .filter(|payload| !payload.item_type.is_callback())
                    .map(|payload| consumer.can_handle_next_queue(&payload))
                    .unwrap_or(false);
                if let Some(id) = state.runner.admit_next(approved) {
                    match state.records.get_mut(&id) {
                        Some(rec) if rec.status != ItemStatus::Skipped => {
                            rec.start();
                            self.inner.sink.emit(&QueueEvent::Start { id: id.clone() });
                            spawns.push((Arc::clone(&consumer), id, Arc::clone(&rec.payload)));
                        }
                        _ => {
                            state.runner.release();
                        }
                    }
                }
            }
        }

        for (consumer, id, payload) in spawns {
            self.spawn_process(consumer, id, payload);
        }
    }

    /// Run the consumer call for one admitted item and report the result
    /// back. The call gets its own task so a panic inside the workflow
    /// cannot take the dispatch loop down with it; it surfaces as an
    /// internal, non-retryable failure instead.
    fn spawn_process(&self, consumer: Arc<dyn Consumer>, id: ItemId, payload: Arc<ItemPayload>) {
        let dispatcher = self.clone();
        tokio::spawn(async move {
            let call = tokio::spawn({
                let consumer = Arc::clone(&consumer);
                let payload = Arc::clone(&payload);
                async move { consumer.process_queue(payload).await }
            });
            let result = match call.await {
                Ok(result) => result,
                Err(join_err) => {
                    tracing::error!(item = %id, error = %join_err, "consumer call aborted");
                    Err(ConsumeError::Internal(format!(
                        "consumer call aborted: {join_err}"
                    )))
                }
            };
            dispatcher.complete(id, result).await;
        });
    }

    /// Settle one dispatch attempt.
    pub(crate) async fn complete(&self, id: ItemId, result: Result<Value, ConsumeError>) {
        enum Followup {
            Ignore,
            Advance(Option<(CompletionSender, Result<Value, ConsumeError>)>),
            Retry {
                consumer: Arc<dyn Consumer>,
                payload: Arc<ItemPayload>,
                hook: Option<Arc<dyn ItemHook>>,
            },
        }

        let followup = {
            let mut st = self.inner.state.lock().await;
            let state = &mut *st;
            let Some(rec) = state.records.get_mut(&id) else {
                return;
            };
            if rec.finished() {
                // finalized elsewhere (typically a timeout); the late
                // settlement is ignored
                Followup::Ignore
            } else {
                match result {
                    Ok(value) => {
                        rec.done(value.clone());
                        let completion = rec.hooks.completion.take();
                        if !rec.payload.item_type.is_callback() {
                            state.last = Some(id.clone());
                        }
                        self.inner.sink.emit(&QueueEvent::Done { id: id.clone() });
                        if state.runner.release() {
                            self.inner.sink.emit(&QueueEvent::Idle);
                        }
                        Followup::Advance(completion.map(|tx| (tx, Ok(value))))
                    }
                    Err(err) => {
                        rec.retry_count += 1;
                        let eligible = err.is_retryable()
                            && rec.retry
                            && rec.retry_count <= self.inner.config.retry_limit;
                        match (eligible, state.consumer.clone()) {
                            (true, Some(consumer)) => {
                                tracing::warn!(
                                    item = %id,
                                    retries = rec.retry_count,
                                    error = %err,
                                    "transient failure, retrying"
                                );
                                Followup::Retry {
                                    consumer,
                                    payload: Arc::clone(&rec.payload),
                                    hook: rec.hooks.on_retry.clone(),
                                }
                            }
                            _ => {
                                rec.error(err.to_string());
                                let completion = rec.hooks.completion.take();
                                if !rec.payload.item_type.is_callback() {
                                    state.last = Some(id.clone());
                                }
                                self.inner.sink.emit(&QueueEvent::Error { id: id.clone() });
                                if state.runner.release() {
                                    self.inner.sink.emit(&QueueEvent::Idle);
                                }
                                Followup::Advance(completion.map(|tx| (tx, Err(err))))
                            }
                        }
                    }
                }
            }
        };

        match followup {
            Followup::Ignore => {}
            Followup::Advance(settle) => {
                if let Some((tx, outcome)) = settle {
                    // ignore send error: the submitter may have gone away
                    let _ = tx.send(outcome);
                }
                self.advance().await;
            }
            Followup::Retry {
                consumer,
                payload,
                hook,
            } => {
                if let Some(hook) = hook {
                    hook.run(Arc::clone(&payload)).await;
                }
                // re-enter the dispatch step for the same item, unless it
                // was finalized while the retry hook ran
                let restarted = {
                    let mut st = self.inner.state.lock().await;
                    match st.records.get_mut(&id) {
                        Some(rec) if !rec.finished() => {
                            rec.start();
                            self.inner.sink.emit(&QueueEvent::Start { id: id.clone() });
                            true
                        }
                        _ => false,
                    }
                };
                if restarted {
                    self.spawn_process(consumer, id, payload);
                } else {
                    self.advance().await;
                }
            }
        }
    }
}
