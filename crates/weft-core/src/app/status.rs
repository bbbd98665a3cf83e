//! Status and log views over the dispatcher history.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::app::dispatcher::Dispatcher;
use crate::domain::{ItemId, ItemStatus, ItemType, QueueItem};

/// One history item as reported by `Dispatcher::logs` and written by
/// `save_logs`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: ItemId,
    #[serde(rename = "type")]
    pub item_type: ItemType,

    /// The item's info label, when it carried one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Start time of the last attempt.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<DateTime<Utc>>,

    pub status: ItemStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
}

impl LogEntry {
    /// `raw` keeps structured results; otherwise they are stringified for
    /// display.
    pub(crate) fn from_item(item: &QueueItem, raw: bool) -> Self {
        let result = item.result().cloned().map(|value| {
            if raw {
                value
            } else {
                match value {
                    Value::String(s) => Value::String(s),
                    other => Value::String(other.to_string()),
                }
            }
        });
        Self {
            id: item
                .id()
                .cloned()
                .expect("history items always carry an id"),
            item_type: item.item_type().clone(),
            name: item.payload().info.clone(),
            time: item.started_at(),
            status: item.status(),
            result,
        }
    }
}

/// Snapshot for operational tooling.
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    /// Dispatcher creation time.
    pub time: DateTime<Utc>,

    /// Items submitted since start.
    pub total: usize,

    /// Items still waiting to be dispatched.
    pub queue: usize,

    /// Newline-joined display of the items currently processing.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current: Option<String>,

    /// Log entry of the most recently finished non-callback item.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last: Option<LogEntry>,
}

fn display_line(item: &QueueItem) -> String {
    let id = item.id().map(ItemId::as_str).unwrap_or("????????");
    match &item.payload().info {
        Some(info) => format!("[{id}] {}: {info}", item.item_type()),
        None => format!("[{id}] {}", item.item_type()),
    }
}

impl Dispatcher {
    /// Build the operational status snapshot.
    pub async fn status(&self) -> StatusReport {
        let st = self.inner.state.lock().await;
        let current: Vec<String> = st
            .history
            .iter()
            .filter_map(|id| st.records.get(id))
            .filter(|rec| rec.status() == ItemStatus::Processing)
            .map(display_line)
            .collect();
        let last = st
            .last
            .as_ref()
            .and_then(|id| st.records.get(id))
            .map(|rec| LogEntry::from_item(rec, false));
        StatusReport {
            time: self.created_at(),
            total: st.history.len(),
            queue: st.runner.pending(),
            current: (!current.is_empty()).then(|| current.join("\n")),
            last,
        }
    }

    /// Log records for every submitted item, in submission order.
    pub async fn logs(&self, raw: bool) -> Vec<LogEntry> {
        let st = self.inner.state.lock().await;
        st.history
            .iter()
            .filter_map(|id| st.records.get(id))
            .map(|rec| LogEntry::from_item(rec, raw))
            .collect()
    }
}
