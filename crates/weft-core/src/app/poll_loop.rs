//! Watchdog loop: timeout detection + missed-wakeup safety net.
//!
//! Runs every `poll_interval` while a consumer is attached. A hung consumer
//! call cannot be aborted, so the loop finalizes the item instead: the item
//! is marked timed out, its slot is freed and the queue moves on; the
//! eventual settlement of the abandoned call is ignored.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::app::dispatcher::Dispatcher;
use crate::domain::{ItemHook, ItemPayload, ItemStatus};

/// Handle to the running watchdog task.
/// - `request_shutdown` asks the loop to stop at the next tick.
/// - `shutdown_and_join` additionally waits for it to finish.
pub struct PollHandle {
    shutdown_tx: watch::Sender<bool>,
    join: JoinHandle<()>,
}

impl PollHandle {
    pub fn request_shutdown(&self) {
        // ignore send error: the loop may already be gone
        let _ = self.shutdown_tx.send(true);
    }

    pub async fn shutdown_and_join(self) {
        self.request_shutdown();
        let _ = self.join.await;
    }
}

/// Spawn the watchdog for `dispatcher`. Installed once, on the first
/// `set_consumer`.
pub(crate) fn spawn(dispatcher: Dispatcher) -> PollHandle {
    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
    let interval = dispatcher.inner.config.poll_interval;
    let join = tokio::spawn(async move {
        let mut tick = tokio::time::interval(interval);
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        break;
                    }
                }
                _ = tick.tick() => {
                    dispatcher.poll_once().await;
                }
            }
        }
    });
    PollHandle { shutdown_tx, join }
}

enum Tick {
    /// An item exceeded its effective deadline.
    Timeout {
        hook: Option<Arc<dyn ItemHook>>,
        payload: Arc<ItemPayload>,
    },
    /// Nothing timed out but work is pending: advance anyway, in case a
    /// wakeup was missed.
    Kick,
    Quiet,
}

impl Dispatcher {
    /// One watchdog tick. The earliest in-flight item is the subject: its
    /// effective deadline is `data.timeout` when present (zero or negative
    /// disables), else the configured default.
    pub(crate) async fn poll_once(&self) {
        let tick = {
            let mut st = self.inner.state.lock().await;
            let state = &mut *st;

            let earliest = state
                .history
                .iter()
                .filter_map(|id| state.records.get(id).map(|rec| (id, rec)))
                .filter(|(_, rec)| rec.status() == ItemStatus::Processing)
                .filter_map(|(id, rec)| rec.started_at().map(|at| (id.clone(), at)))
                .min_by_key(|&(_, at)| at);

            let mut tick = Tick::Quiet;
            if let Some((id, started_at)) = earliest
                && let Some(rec) = state.records.get_mut(&id)
            {
                let effective_ms = rec
                    .payload()
                    .timeout_override()
                    .unwrap_or(self.inner.config.default_timeout.as_millis() as i64);
                let elapsed_ms = (Utc::now() - started_at).num_milliseconds();
                if effective_ms > 0 && elapsed_ms > effective_ms {
                    tracing::warn!(
                        item = %id,
                        elapsed_ms,
                        timeout_ms = effective_ms,
                        "item timed out, abandoning its in-flight call"
                    );
                    rec.set_status(ItemStatus::TimedOut);
                    let hook = rec.hooks.on_timeout.clone();
                    let payload = Arc::clone(&rec.payload);
                    state.runner.release();
                    tick = Tick::Timeout { hook, payload };
                }
            }

            if matches!(tick, Tick::Quiet) && state.runner.pending() > 0 {
                tick = Tick::Kick;
            }
            tick
        };

        match tick {
            Tick::Timeout { hook, payload } => {
                if let Some(hook) = hook {
                    hook.run(payload).await;
                }
                self.advance().await;
            }
            Tick::Kick => self.advance().await,
            Tick::Quiet => {}
        }
    }
}
