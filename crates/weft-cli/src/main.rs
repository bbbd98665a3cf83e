use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing_subscriber::EnvFilter;

use weft_core::{
    ConsumeError, Consumer, DispatchConfig, Dispatcher, ItemPayload, ItemType, QueueItem,
    TracingEventSink,
};

#[derive(Debug, Deserialize)]
struct GreetPayload {
    name: String,
}

/// Stands in for the browser workflow layer: fails a few times with a
/// transient error, then completes.
struct DemoConsumer {
    remaining_failures: AtomicU32,
}

impl DemoConsumer {
    fn new(n: u32) -> Self {
        Self {
            remaining_failures: AtomicU32::new(n),
        }
    }
}

#[async_trait]
impl Consumer for DemoConsumer {
    fn can_process_queue(&self) -> bool {
        true
    }

    fn can_handle_next_queue(&self, _item: &ItemPayload) -> bool {
        false
    }

    async fn process_queue(&self, item: Arc<ItemPayload>) -> Result<Value, ConsumeError> {
        if item.item_type.is_callback() {
            println!("callback: {}", item.info.as_deref().unwrap_or("-"));
            return Ok(json!("acknowledged"));
        }

        let left = self.remaining_failures.load(Ordering::Relaxed);
        if left > 0 {
            self.remaining_failures.fetch_sub(1, Ordering::Relaxed);
            return Err(ConsumeError::transient(format!(
                "intentional failure (left={left})"
            )));
        }

        // payload access: plain serde decode plus the mapped/templated view
        let p: GreetPayload = serde_json::from_value(Value::Object(item.data.clone()))
            .map_err(|e| ConsumeError::permanent(format!("payload decode: {e}")))?;
        let greeting = item
            .mapped_value("greeting")
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_else(|| format!("Hello, {}!", p.name));
        println!("{greeting}");
        Ok(json!({ "printed": greeting }))
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // (A) one dispatcher for the whole process, events logged via tracing
    let dispatcher = Dispatcher::with_sink(DispatchConfig::default(), Arc::new(TracingEventSink));
    dispatcher.set_consumer(Arc::new(DemoConsumer::new(2))).await;

    // (B) a retrying work item whose label is derived through the mapping
    let mut data = serde_json::Map::new();
    data.insert("name".into(), json!("weft"));
    let (item, completion) = QueueItem::new(ItemType::work(), data)
        .with_maps(json!({ "greeting": "FORMAT:Hello, %1%!|name" }))
        .with_info("demo greeting")
        .with_retry()
        .with_completion();
    let ack = dispatcher.add(item).await;
    println!("queued work: {}", ack.id);

    // (C) callbacks jump the queue
    let ping = QueueItem::new(ItemType::callback(), serde_json::Map::new()).with_info("ping");
    dispatcher.add(ping).await;

    // (D) wait for the work item to settle (two retries happen first)
    match completion.await {
        Ok(Ok(value)) => println!("done: {value}"),
        Ok(Err(err)) => println!("failed: {err}"),
        Err(_) => println!("dispatcher dropped the item"),
    }

    let report = dispatcher.status().await;
    println!(
        "status: {}",
        serde_json::to_string_pretty(&report).expect("status serializes")
    );
    for entry in dispatcher.logs(false).await {
        println!("log: {}", serde_json::to_string(&entry).expect("log serializes"));
    }

    dispatcher.shutdown().await;
}
