//! Context attached to state writes

use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Identifies one state write, or a group of writes made by one action
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Context {
    /// ULID, sortable by creation time
    pub id: String,
}

impl Context {
    pub fn new() -> Self {
        Self {
            id: Ulid::new().to_string(),
        }
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contexts_are_unique() {
        let first = Context::new();
        let second = Context::new();
        assert_ne!(first.id, second.id);
        assert_eq!(first.id.len(), 26);
    }
}
