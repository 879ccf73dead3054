//! State type representing an entity's current state

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Context, EntityId, STATE_UNAVAILABLE};

/// The state of an entity at a point in time
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct State {
    /// The entity this state belongs to
    pub entity_id: EntityId,

    /// The state value ("on", "off", "unavailable", ...)
    pub state: String,

    /// Additional attributes associated with the state
    #[serde(default)]
    pub attributes: HashMap<String, serde_json::Value>,

    /// When the state value last changed
    pub last_changed: DateTime<Utc>,

    /// When the state or its attributes were last written
    pub last_updated: DateTime<Utc>,

    /// Context of the write that created this state
    pub context: Context,
}

impl State {
    /// Create a new state stamped with the current time
    pub fn new(
        entity_id: EntityId,
        state: impl Into<String>,
        attributes: HashMap<String, serde_json::Value>,
        context: Context,
    ) -> Self {
        let now = Utc::now();
        Self {
            entity_id,
            state: state.into(),
            attributes,
            last_changed: now,
            last_updated: now,
            context,
        }
    }

    /// Create the successor of this state, keeping `last_changed` when the value is unchanged
    pub fn with_update(
        &self,
        new_state: impl Into<String>,
        new_attributes: HashMap<String, serde_json::Value>,
        context: Context,
    ) -> Self {
        let now = Utc::now();
        let new_state = new_state.into();
        let last_changed = if self.state == new_state {
            self.last_changed
        } else {
            now
        };

        Self {
            entity_id: self.entity_id.clone(),
            state: new_state,
            attributes: new_attributes,
            last_changed,
            last_updated: now,
            context,
        }
    }

    /// Check if the state value represents an unavailable entity
    pub fn is_unavailable(&self) -> bool {
        self.state == STATE_UNAVAILABLE
    }

    /// Get an attribute value by key
    pub fn attribute<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.attributes
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn light() -> EntityId {
        EntityId::new("light", "desk").unwrap()
    }

    #[test]
    fn test_with_update_keeps_last_changed_for_same_value() {
        let state = State::new(light(), "on", HashMap::new(), Context::new());
        let attrs = HashMap::from([("brightness".to_string(), json!(128))]);
        let next = state.with_update("on", attrs, Context::new());

        assert_eq!(next.last_changed, state.last_changed);
        assert!(next.last_updated >= state.last_updated);
        assert_eq!(next.attribute::<u8>("brightness"), Some(128));
    }

    #[test]
    fn test_with_update_moves_last_changed_for_new_value() {
        let state = State::new(light(), "on", HashMap::new(), Context::new());
        let next = state.with_update("unavailable", HashMap::new(), Context::new());

        assert!(next.last_changed >= state.last_changed);
        assert!(next.is_unavailable());
    }
}
