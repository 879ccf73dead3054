//! Host runtime core for Home Assistant integrations
//!
//! This crate provides the pieces of the host runtime an integration talks to:
//! entity ids, entity states, the state machine that receives state writes,
//! the executor that runs blocking I/O off the async workers, and the error
//! type surfaced to users.

mod context;
mod entity_id;
mod error;
mod executor;
mod hass;
mod state;
mod state_machine;

pub use context::Context;
pub use entity_id::{slugify, EntityId, EntityIdError};
pub use error::HomeAssistantError;
pub use executor::{Executor, ExecutorError, DEFAULT_EXECUTOR_TIMEOUT, DEFAULT_MAX_WORKERS};
pub use hass::HomeAssistant;
pub use state::State;
pub use state_machine::{StateChangedEvent, StateMachine};

/// State value of an entity that is switched on
pub const STATE_ON: &str = "on";

/// State value of an entity that is switched off
pub const STATE_OFF: &str = "off";

/// State value of an entity whose integration cannot reach the device
pub const STATE_UNAVAILABLE: &str = "unavailable";

/// Common configuration keys shared by integrations
pub mod const_keys {
    /// Hostname or IP address of a device
    pub const CONF_HOST: &str = "host";

    /// TCP port of a device
    pub const CONF_PORT: &str = "port";
}
