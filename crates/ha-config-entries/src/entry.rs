//! Config entry model
//!
//! A config entry is one configured instance of an integration, e.g. one
//! SignalRGB host. Only the identifying fields and `data` are persisted;
//! lifecycle state lives in memory.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::state_machine::InvalidTransition;

/// Lifecycle state of an entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ConfigEntryState {
    #[default]
    NotLoaded,
    SetupInProgress,
    Loaded,
    /// Setup failed with a non-retryable error
    SetupError,
    /// Device was not ready; setup will be retried
    SetupRetry,
    UnloadInProgress,
    /// The integration refused to unload; terminal
    FailedUnload,
}

impl ConfigEntryState {
    /// States from which an unload may start
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ConfigEntryState::NotLoaded
                | ConfigEntryState::Loaded
                | ConfigEntryState::SetupError
                | ConfigEntryState::SetupRetry
        )
    }
}

/// How the entry was created
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ConfigEntrySource {
    /// Interactive config flow
    #[default]
    User,
    /// Imported from a configuration file
    Import,
}

impl ConfigEntrySource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfigEntrySource::User => "user",
            ConfigEntrySource::Import => "import",
        }
    }
}

/// A configured integration instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigEntry {
    /// ULID assigned at creation
    pub entry_id: String,
    pub domain: String,
    pub title: String,
    /// Immutable configuration captured by the config flow
    #[serde(default)]
    pub data: Map<String, Value>,
    #[serde(default = "default_version")]
    pub version: u32,
    /// Prevents duplicate entries for the same device
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unique_id: Option<String>,
    #[serde(default)]
    pub source: ConfigEntrySource,

    #[serde(skip)]
    pub state: ConfigEntryState,
    /// Why the entry is in a failed or retry state
    #[serde(skip)]
    pub reason: Option<String>,
    /// Setup attempts since the last settled state
    #[serde(skip)]
    pub tries: u32,

    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub modified_at: DateTime<Utc>,
}

fn default_version() -> u32 {
    1
}

impl ConfigEntry {
    pub fn new(domain: impl Into<String>, title: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            entry_id: ulid::Ulid::new().to_string(),
            domain: domain.into(),
            title: title.into(),
            data: Map::new(),
            version: default_version(),
            unique_id: None,
            source: ConfigEntrySource::default(),
            state: ConfigEntryState::NotLoaded,
            reason: None,
            tries: 0,
            created_at: now,
            modified_at: now,
        }
    }

    pub fn with_data(mut self, data: Map<String, Value>) -> Self {
        self.data = data;
        self
    }

    pub fn with_unique_id(mut self, unique_id: impl Into<String>) -> Self {
        self.unique_id = Some(unique_id.into());
        self
    }

    pub fn with_source(mut self, source: ConfigEntrySource) -> Self {
        self.source = source;
        self
    }

    /// String value of a `data` key
    pub fn data_str(&self, key: &str) -> Option<&str> {
        self.data.get(key).and_then(Value::as_str)
    }

    /// Unsigned integer value of a `data` key
    pub fn data_u64(&self, key: &str) -> Option<u64> {
        self.data.get(key).and_then(Value::as_u64)
    }

    pub fn is_loaded(&self) -> bool {
        self.state == ConfigEntryState::Loaded
    }

    /// Move to `new_state` if the lifecycle allows it
    ///
    /// The retry counter survives only retry and setup states.
    pub fn try_set_state(
        &mut self,
        new_state: ConfigEntryState,
        reason: Option<String>,
    ) -> Result<(), InvalidTransition> {
        self.state = self.state.try_transition(new_state)?;
        self.reason = reason;

        if !matches!(
            new_state,
            ConfigEntryState::SetupRetry | ConfigEntryState::SetupInProgress
        ) {
            self.tries = 0;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn signalrgb_entry() -> ConfigEntry {
        let data = json!({"host": "192.168.1.20", "port": 16038});
        ConfigEntry::new("signalrgb", "192.168.1.20")
            .with_data(data.as_object().cloned().unwrap())
            .with_unique_id("192.168.1.20:16038")
    }

    #[test]
    fn test_new_entry_defaults() {
        let entry = ConfigEntry::new("signalrgb", "desk");
        assert_eq!(entry.state, ConfigEntryState::NotLoaded);
        assert_eq!(entry.source, ConfigEntrySource::User);
        assert_eq!(entry.version, 1);
        assert_eq!(entry.entry_id.len(), 26);
    }

    #[test]
    fn test_data_accessors() {
        let entry = signalrgb_entry();
        assert_eq!(entry.data_str("host"), Some("192.168.1.20"));
        assert_eq!(entry.data_u64("port"), Some(16038));
        assert_eq!(entry.data_str("port"), None);
        assert_eq!(entry.data_u64("missing"), None);
    }

    #[test]
    fn test_runtime_fields_are_not_persisted() {
        let mut entry = signalrgb_entry().with_source(ConfigEntrySource::Import);
        entry.try_set_state(ConfigEntryState::SetupInProgress, None).unwrap();
        entry.tries = 3;

        let value = serde_json::to_value(&entry).unwrap();
        assert!(value.get("state").is_none());
        assert!(value.get("tries").is_none());
        assert_eq!(value["source"], "import");

        let parsed: ConfigEntry = serde_json::from_value(value).unwrap();
        assert_eq!(parsed.state, ConfigEntryState::NotLoaded);
        assert_eq!(parsed.unique_id.as_deref(), Some("192.168.1.20:16038"));
    }

    #[test]
    fn test_try_set_state_resets_tries_when_settled() {
        let mut entry = signalrgb_entry();
        entry.try_set_state(ConfigEntryState::SetupInProgress, None).unwrap();
        entry
            .try_set_state(ConfigEntryState::SetupRetry, Some("timeout".into()))
            .unwrap();
        entry.tries = 2;
        entry.try_set_state(ConfigEntryState::SetupInProgress, None).unwrap();
        assert_eq!(entry.tries, 2);

        entry.try_set_state(ConfigEntryState::Loaded, None).unwrap();
        assert_eq!(entry.tries, 0);
        assert!(entry.is_loaded());
    }

    #[test]
    fn test_invalid_transition_leaves_state() {
        let mut entry = signalrgb_entry();
        assert!(entry.try_set_state(ConfigEntryState::Loaded, None).is_err());
        assert_eq!(entry.state, ConfigEntryState::NotLoaded);
    }
}
