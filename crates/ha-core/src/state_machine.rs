//! State machine receiving entity state writes
//!
//! Integrations write their entities' states here; every write is broadcast
//! to subscribers as a [`StateChangedEvent`], including writes that leave the
//! state value unchanged.

use std::collections::HashMap;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, instrument, trace};

use crate::{Context, EntityId, State};

/// Default channel capacity for state change subscriptions
const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// Fired for every state write and removal
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateChangedEvent {
    pub entity_id: EntityId,
    pub old_state: Option<State>,
    pub new_state: Option<State>,
}

/// Tracks the current state of every entity
pub struct StateMachine {
    /// All entity states keyed by entity_id string
    states: DashMap<String, State>,
    /// Broadcast of every write
    sender: broadcast::Sender<StateChangedEvent>,
}

impl StateMachine {
    /// Create an empty state machine
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(DEFAULT_CHANNEL_CAPACITY);
        Self {
            states: DashMap::new(),
            sender,
        }
    }

    /// Subscribe to state writes
    pub fn subscribe(&self) -> broadcast::Receiver<StateChangedEvent> {
        self.sender.subscribe()
    }

    /// Write the state of an entity
    ///
    /// `last_changed` only moves when the state value differs from the
    /// previous one; subscribers are notified either way.
    #[instrument(skip(self, state, attributes, context), fields(entity_id = %entity_id))]
    pub fn set(
        &self,
        entity_id: EntityId,
        state: impl Into<String>,
        attributes: HashMap<String, serde_json::Value>,
        context: Context,
    ) -> State {
        let key = entity_id.to_string();
        let old_state = self.states.get(&key).map(|s| s.clone());

        let new_state = match &old_state {
            Some(existing) => existing.with_update(state, attributes, context),
            None => State::new(entity_id.clone(), state, attributes, context),
        };

        debug!(
            state = %new_state.state,
            changed = old_state.as_ref().map(|s| s.state != new_state.state).unwrap_or(true),
            "Setting entity state"
        );

        self.states.insert(key, new_state.clone());

        // No receivers is not an error
        let _ = self.sender.send(StateChangedEvent {
            entity_id,
            old_state,
            new_state: Some(new_state.clone()),
        });

        new_state
    }

    /// Get the current state of an entity
    pub fn get(&self, entity_id: &str) -> Option<State> {
        self.states.get(entity_id).map(|s| s.clone())
    }

    /// Get the state value, or None if the entity doesn't exist
    pub fn get_state(&self, entity_id: &str) -> Option<String> {
        self.states.get(entity_id).map(|s| s.state.clone())
    }

    /// Remove an entity's state
    #[instrument(skip(self), fields(entity_id = %entity_id))]
    pub fn remove(&self, entity_id: &EntityId) -> Option<State> {
        let old_state = self.states.remove(&entity_id.to_string()).map(|(_, s)| s);

        if old_state.is_some() {
            trace!("Removing entity state");
            let _ = self.sender.send(StateChangedEvent {
                entity_id: entity_id.clone(),
                old_state: old_state.clone(),
                new_state: None,
            });
        }

        old_state
    }

    /// Get all entity IDs
    pub fn entity_ids(&self) -> Vec<String> {
        self.states.iter().map(|r| r.key().clone()).collect()
    }

    /// Get the total number of entities
    pub fn entity_count(&self) -> usize {
        self.states.len()
    }
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}
