//! Integration entry points called by the config entry manager

use async_trait::async_trait;
use ha_core::HomeAssistantError;

use crate::entry::ConfigEntry;

/// An integration that can set up and unload config entries of its domain
#[async_trait]
pub trait Integration: Send + Sync {
    fn domain(&self) -> &str;

    /// Set up one entry
    ///
    /// Return [`HomeAssistantError::ConfigEntryNotReady`] when the device is
    /// temporarily unreachable; the manager schedules a retry.
    async fn setup_entry(&self, entry: &ConfigEntry) -> Result<(), HomeAssistantError>;

    /// Tear down one entry, returning whether it was unloaded
    async fn unload_entry(&self, entry: &ConfigEntry) -> bool;
}
