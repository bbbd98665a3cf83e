use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::fields;
use super::id::ItemId;
use super::item_type::ItemType;

/// Immutable half of a queue item: the part handed to the consumer.
///
/// 運搬用 data: cloned out of the dispatcher lock before the workflow runs,
/// so the consumer never touches dispatcher bookkeeping. `data` and `maps`
/// never change after submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemPayload {
    #[serde(rename = "type")]
    pub item_type: ItemType,

    /// Flat string-keyed payload.
    pub data: Map<String, Value>,

    /// Optional nested mapping of workflow field paths (e.g. "rekanan.nama")
    /// to `data` keys, enabling payload key indirection.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maps: Option<Value>,

    /// Human-readable label; also the duplicate-submission key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub info: Option<String>,

    /// Opaque value carried through persistence for the restoring factory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub callback: Option<Value>,
}

impl ItemPayload {
    pub fn new(item_type: ItemType, data: Map<String, Value>) -> Self {
        Self {
            item_type,
            data,
            maps: None,
            info: None,
            callback: None,
        }
    }

    /// Resolve a workflow field name to a payload value.
    ///
    /// With `maps` unset, `name` is used as the data key directly. With
    /// `maps` set, `name` is a dotted path through the mapping whose leaf
    /// names the data key. The key then goes through the field resolver,
    /// so mapped keys may be `CONCAT`/`FORMAT` expressions.
    pub fn mapped_value(&self, name: &str) -> Option<Value> {
        let key = match &self.maps {
            None => name.to_string(),
            Some(maps) => {
                let mut node = maps;
                for segment in name.split('.') {
                    node = node.get(segment)?;
                }
                node.as_str()?.to_string()
            }
        };
        fields::resolve(&self.data, &key)
    }

    /// Per-item deadline override in milliseconds (`data.timeout`).
    /// Zero or negative disables the timeout for this item.
    pub fn timeout_override(&self) -> Option<i64> {
        self.data.get("timeout").and_then(Value::as_i64)
    }
}

/// Persisted form of a never-started item: `{type, id, data, callback}`.
///
/// Written by `Dispatcher::save_queue`, consumed by `Dispatcher::load_queue`
/// through the consumer-supplied factory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavedItem {
    #[serde(rename = "type")]
    pub item_type: ItemType,
    pub id: ItemId,
    pub data: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub callback: Option<Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload(maps: Option<Value>) -> ItemPayload {
        let mut data = Map::new();
        data.insert("vendor_name".into(), json!("PT Maju"));
        data.insert("vendor_city".into(), json!("Bandung"));
        let mut p = ItemPayload::new(ItemType::work(), data);
        p.maps = maps;
        p
    }

    #[test]
    fn without_maps_the_name_is_the_data_key() {
        let p = payload(None);
        assert_eq!(p.mapped_value("vendor_name"), Some(json!("PT Maju")));
        assert_eq!(p.mapped_value("missing"), None);
    }

    #[test]
    fn dotted_names_walk_the_mapping() {
        let p = payload(Some(json!({ "rekanan": { "nama": "vendor_name" } })));
        assert_eq!(p.mapped_value("rekanan.nama"), Some(json!("PT Maju")));
        assert_eq!(p.mapped_value("rekanan.alamat"), None);
    }

    #[test]
    fn mapped_keys_may_be_templates() {
        let p = payload(Some(json!({
            "rekanan": { "label": "CONCAT:, |vendor_name|vendor_city" }
        })));
        assert_eq!(
            p.mapped_value("rekanan.label"),
            Some(json!("PT Maju, Bandung"))
        );
    }

    #[test]
    fn timeout_override_reads_data_timeout() {
        let mut p = payload(None);
        assert_eq!(p.timeout_override(), None);
        p.data.insert("timeout".into(), json!(200));
        assert_eq!(p.timeout_override(), Some(200));
    }
}
