use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque item identifier: 8 lowercase hex characters, assigned once.
///
/// The display convention matters because ids end up in queue log files;
/// anything that renders as 8 hex characters is acceptable, so we draw a
/// random 32-bit word instead of hashing the submission timestamp.
/// Uniqueness within the process history is enforced where ids are
/// assigned (`Dispatcher::add`), not here.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ItemId(String);

impl ItemId {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Draw a fresh candidate id.
    pub fn generate() -> Self {
        Self(format!("{:08x}", rand::random::<u32>()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_are_eight_lowercase_hex_chars() {
        for _ in 0..32 {
            let id = ItemId::generate();
            assert_eq!(id.as_str().len(), 8);
            assert!(id.as_str().chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        }
    }

    #[test]
    fn caller_supplied_ids_pass_through() {
        let id = ItemId::new("deadbeef");
        assert_eq!(id.to_string(), "deadbeef");
    }
}
