//! weft-core
//!
//! Job dispatch core for single-session browser automation: many
//! independently submitted items, one worker slot, bounded retry of
//! transient failures, a timeout watchdog, and priority "callback"
//! notifications.
//!
//! # モジュール構成
//! - **domain**: アイテムモデル（id, type, status, payload, hooks, events）
//!   と field resolver
//! - **ports**: 抽象化レイヤー（Consumer, ItemFactory, EventSink）
//! - **runner**: pending 順序と admission の管理
//! - **app**: Dispatcher 本体、watchdog ループ、status ビュー、永続化
//!
//! The workflow layer (navigation, form filling, scraping) lives outside
//! this crate; it plugs in through [`ports::Consumer`].

pub mod app;
pub mod domain;
pub mod error;
pub mod ports;
pub mod runner;

pub use app::{Ack, DispatchConfig, Dispatcher, LogEntry, PollHandle, StatusReport};
pub use domain::{
    CompletionReceiver, CompletionSender, ItemHook, ItemHooks, ItemId, ItemPayload, ItemStatus,
    ItemType, QueueEvent, QueueItem, SavedItem,
};
pub use error::{ConsumeError, PersistError};
pub use ports::{Consumer, EventSink, ItemFactory, NoopEventSink, TracingEventSink};
pub use runner::SequentialRunner;
