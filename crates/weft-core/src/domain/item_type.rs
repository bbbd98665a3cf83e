use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of a queue item.
///
/// Extensible on purpose: workflow layers register their own kinds
/// ("work", "invoice", "export", ...). The only kind the dispatcher itself
/// treats specially is `callback`: it is scheduled ahead of everything else
/// and excluded from "last finished" tracking and persistence.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ItemType(String);

impl ItemType {
    pub const CALLBACK: &'static str = "callback";

    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Ordinary unit of work.
    pub fn work() -> Self {
        Self::new("work")
    }

    /// Priority notification kind.
    pub fn callback() -> Self {
        Self::new(Self::CALLBACK)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_callback(&self) -> bool {
        self.0 == Self::CALLBACK
    }
}

impl fmt::Display for ItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn callback_is_distinguished() {
        assert!(ItemType::callback().is_callback());
        assert!(!ItemType::work().is_callback());
        assert!(!ItemType::new("export").is_callback());
    }

    #[test]
    fn custom_kinds_round_trip() {
        let t = ItemType::new("invoice");
        let json = serde_json::to_string(&t).unwrap();
        assert_eq!(json, "\"invoice\"");
        let back: ItemType = serde_json::from_str(&json).unwrap();
        assert_eq!(back, t);
    }
}
