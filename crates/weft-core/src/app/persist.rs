//! On-disk queue files: finished-history logs and the saved-queue snapshot.
//!
//! Best-effort durability only. Logs are append-by-new-file (never
//! overwrite); the snapshot is a single fixed-path file consumed and
//! deleted on load. Neither is a transaction log.

use std::fs;
use std::path::{Path, PathBuf};

use crate::app::dispatcher::Dispatcher;
use crate::app::status::LogEntry;
use crate::domain::{ItemStatus, SavedItem};
use crate::error::PersistError;
use crate::ports::ItemFactory;

pub(crate) const SAVED_QUEUE_FILE: &str = "saved.queue";

/// First unused `queue<N>.log` path, scanning ascending from 1.
fn next_log_path(dir: &Path) -> PathBuf {
    let mut n = 1u32;
    loop {
        let candidate = dir.join(format!("queue{n}.log"));
        if !candidate.exists() {
            return candidate;
        }
        n += 1;
    }
}

impl Dispatcher {
    /// Write every finished non-callback history item to a freshly numbered
    /// log file. Returns the path, or `None` when there was nothing to
    /// write.
    pub async fn save_logs(&self) -> Result<Option<PathBuf>, PersistError> {
        let entries: Vec<LogEntry> = {
            let st = self.inner.state.lock().await;
            st.history
                .iter()
                .filter_map(|id| st.records.get(id))
                .filter(|rec| !rec.item_type().is_callback())
                .filter(|rec| {
                    !matches!(rec.status(), ItemStatus::New | ItemStatus::Processing)
                })
                .map(|rec| LogEntry::from_item(rec, true))
                .collect()
        };
        if entries.is_empty() {
            return Ok(None);
        }

        let dir = &self.inner.config.queue_dir;
        fs::create_dir_all(dir)?;
        let path = next_log_path(dir);
        fs::write(&path, serde_json::to_vec_pretty(&entries)?)?;
        tracing::info!(path = %path.display(), entries = entries.len(), "queue log written");
        Ok(Some(path))
    }

    /// Snapshot every never-started non-callback item to the fixed-path
    /// saved-queue file. Returns the path, or `None` when nothing
    /// qualified.
    pub async fn save_queue(&self) -> Result<Option<PathBuf>, PersistError> {
        let saved: Vec<SavedItem> = {
            let st = self.inner.state.lock().await;
            st.history
                .iter()
                .filter_map(|id| st.records.get(id))
                .filter(|rec| rec.status() == ItemStatus::New && !rec.item_type().is_callback())
                .map(|rec| SavedItem {
                    item_type: rec.item_type().clone(),
                    id: rec
                        .id()
                        .cloned()
                        .expect("history items always carry an id"),
                    data: rec.payload().data.clone(),
                    callback: rec.payload().callback.clone(),
                })
                .collect()
        };
        if saved.is_empty() {
            return Ok(None);
        }

        let dir = &self.inner.config.queue_dir;
        fs::create_dir_all(dir)?;
        let path = dir.join(SAVED_QUEUE_FILE);
        fs::write(&path, serde_json::to_vec_pretty(&saved)?)?;
        tracing::info!(path = %path.display(), items = saved.len(), "queue snapshot written");
        Ok(Some(path))
    }

    /// Re-submit every item from the saved-queue snapshot through the
    /// factory, then delete the snapshot. Returns the number restored;
    /// a missing snapshot restores nothing.
    pub async fn load_queue(&self, factory: &dyn ItemFactory) -> Result<usize, PersistError> {
        let path = self.inner.config.queue_dir.join(SAVED_QUEUE_FILE);
        if !path.exists() {
            return Ok(0);
        }

        let bytes = fs::read(&path)?;
        let saved: Vec<SavedItem> = serde_json::from_slice(&bytes)?;
        let mut restored = 0;
        for entry in saved {
            let item = factory.restore(entry);
            self.add(item).await;
            restored += 1;
        }
        fs::remove_file(&path)?;
        tracing::info!(items = restored, "queue snapshot restored");
        Ok(restored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::dispatcher::DispatchConfig;
    use crate::domain::{ItemType, QueueItem};
    use serde_json::{Map, Value, json};
    use std::time::Duration;

    fn config(dir: &Path) -> DispatchConfig {
        DispatchConfig {
            queue_dir: dir.to_path_buf(),
            poll_interval: Duration::from_millis(10),
            ..DispatchConfig::default()
        }
    }

    fn data(pairs: &[(&str, Value)]) -> Map<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    /// Keeps the saved id, so restored items correlate with earlier logs.
    struct KeepIdFactory;

    impl ItemFactory for KeepIdFactory {
        fn restore(&self, saved: SavedItem) -> QueueItem {
            let mut item = QueueItem::new(saved.item_type, saved.data).with_id(saved.id);
            if let Some(callback) = saved.callback {
                item = item.with_callback(callback);
            }
            item
        }
    }

    #[tokio::test]
    async fn save_logs_skips_when_nothing_finished() {
        let dir = tempfile::tempdir().unwrap();
        let dispatcher = Dispatcher::new(config(dir.path()));
        dispatcher
            .add(QueueItem::new(ItemType::work(), Map::new()))
            .await;

        assert_eq!(dispatcher.save_logs().await.unwrap(), None);
        assert!(!dir.path().join("queue1.log").exists());
    }

    #[tokio::test]
    async fn save_logs_numbers_files_and_never_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let dispatcher = Dispatcher::new(config(dir.path()));

        let ack = dispatcher
            .add(QueueItem::new(ItemType::work(), Map::new()).with_info("done job"))
            .await;
        let callback = dispatcher
            .add(QueueItem::new(ItemType::callback(), Map::new()))
            .await;
        {
            let mut st = dispatcher.inner.state.lock().await;
            let rec = st.records.get_mut(&ack.id).unwrap();
            rec.start();
            rec.done(json!({"rows": 7}));
            let rec = st.records.get_mut(&callback.id).unwrap();
            rec.start();
            rec.done(json!("pong"));
        }

        let first = dispatcher.save_logs().await.unwrap().unwrap();
        assert_eq!(first, dir.path().join("queue1.log"));
        let second = dispatcher.save_logs().await.unwrap().unwrap();
        assert_eq!(second, dir.path().join("queue2.log"));

        let entries: Vec<LogEntry> =
            serde_json::from_slice(&fs::read(&first).unwrap()).unwrap();
        // the finished callback is excluded
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].id, ack.id);
        assert_eq!(entries[0].result, Some(json!({"rows": 7})));
    }

    #[tokio::test]
    async fn save_queue_snapshots_only_never_started_work() {
        let dir = tempfile::tempdir().unwrap();
        let dispatcher = Dispatcher::new(config(dir.path()));

        let pending = dispatcher
            .add(
                QueueItem::new(ItemType::work(), data(&[("vendor", json!("PT Maju"))]))
                    .with_callback(json!("order-import")),
            )
            .await;
        dispatcher
            .add(QueueItem::new(ItemType::callback(), Map::new()))
            .await;
        let started = dispatcher
            .add(QueueItem::new(ItemType::work(), Map::new()))
            .await;
        {
            let mut st = dispatcher.inner.state.lock().await;
            st.records.get_mut(&started.id).unwrap().start();
        }

        let path = dispatcher.save_queue().await.unwrap().unwrap();
        let saved: Vec<SavedItem> = serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].id, pending.id);
        assert_eq!(saved[0].data["vendor"], json!("PT Maju"));
        assert_eq!(saved[0].callback, Some(json!("order-import")));
    }

    #[tokio::test]
    async fn load_queue_restores_items_and_deletes_the_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let saver = Dispatcher::new(config(dir.path()));
        let ack = saver
            .add(QueueItem::new(ItemType::work(), data(&[("k", json!("v"))])))
            .await;
        let path = saver.save_queue().await.unwrap().unwrap();

        // a fresh dispatcher, as after a process restart
        let loader = Dispatcher::new(config(dir.path()));
        let restored = loader.load_queue(&KeepIdFactory).await.unwrap();
        assert_eq!(restored, 1);
        assert!(!path.exists());

        let st = loader.inner.state.lock().await;
        let rec = st.records.get(&ack.id).expect("factory kept the id");
        assert_eq!(rec.status(), ItemStatus::New);
        assert_eq!(rec.payload().data["k"], json!("v"));
    }

    #[tokio::test]
    async fn load_queue_without_snapshot_restores_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let dispatcher = Dispatcher::new(config(dir.path()));
        assert_eq!(dispatcher.load_queue(&KeepIdFactory).await.unwrap(), 0);
    }
}
