//! Domain model: ids, item kinds, statuses, payloads, records, events.

pub mod events;
pub mod fields;
pub mod id;
pub mod item;
pub mod item_type;
pub mod payload;
pub mod state;

pub use events::QueueEvent;
pub use id::ItemId;
pub use item::{CompletionReceiver, CompletionSender, ItemHook, ItemHooks, QueueItem};
pub use item_type::ItemType;
pub use payload::{ItemPayload, SavedItem};
pub use state::ItemStatus;
