//! Errors surfaced by integrations to the host runtime

use thiserror::Error;

/// Error raised by an integration to the host runtime
///
/// `ConfigEntryNotReady` makes the config entry manager schedule a setup
/// retry; everything else is reported to the user as a failed action.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum HomeAssistantError {
    /// The device could not be reached during setup; retry later
    #[error("config entry not ready: {0}")]
    ConfigEntryNotReady(String),

    /// Setup failed permanently
    #[error("setup failed: {0}")]
    SetupFailed(String),

    /// A user-initiated action failed
    #[error("{0}")]
    ActionFailed(String),
}

impl HomeAssistantError {
    /// Whether the host should retry setup later
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ConfigEntryNotReady(_))
    }
}
