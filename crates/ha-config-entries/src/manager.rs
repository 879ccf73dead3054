//! Config entries manager
//!
//! Indexes entries, persists them, and drives their lifecycle through the
//! registered [`Integration`]s.

use std::collections::HashSet;
use std::sync::Arc;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::entry::{ConfigEntry, ConfigEntryState};
use crate::integration::Integration;
use crate::state_machine::{calculate_retry_delay, InvalidTransition};
use crate::storage::{StorageError, Store};

pub const STORAGE_KEY: &str = "core.config_entries";
pub const STORAGE_VERSION: u32 = 1;
pub const STORAGE_MINOR_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum ConfigEntriesError {
    #[error("Entry not found: {0}")]
    NotFound(String),

    #[error("Entry already exists for domain {domain} with unique_id {unique_id}")]
    AlreadyExists { domain: String, unique_id: String },

    #[error("No integration registered for domain {0}")]
    UnknownIntegration(String),

    #[error("Cannot unload entry in state {0:?}")]
    CannotUnload(ConfigEntryState),

    #[error("Setup failed: {0}")]
    SetupFailed(String),

    #[error(transparent)]
    InvalidState(#[from] InvalidTransition),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

pub type ConfigEntriesResult<T> = Result<T, ConfigEntriesError>;

/// Persisted form of all entries
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigEntriesData {
    pub entries: Vec<ConfigEntry>,
}

/// Manager of all config entries
pub struct ConfigEntries {
    /// `None` keeps entries in memory only
    store: Option<Store<ConfigEntriesData>>,
    entries: DashMap<String, ConfigEntry>,
    by_domain: DashMap<String, HashSet<String>>,
    by_unique_id: DashMap<(String, String), String>,
    integrations: DashMap<String, Arc<dyn Integration>>,
    /// Serializes setup and unload
    setup_lock: Mutex<()>,
}

impl ConfigEntries {
    /// Manager persisting to `<config_dir>/.storage/core.config_entries`
    pub fn new(config_dir: impl AsRef<std::path::Path>) -> Self {
        Self::with_store(Some(Store::new(
            config_dir,
            STORAGE_KEY,
            STORAGE_VERSION,
            STORAGE_MINOR_VERSION,
        )))
    }

    /// Manager without persistence
    pub fn in_memory() -> Self {
        Self::with_store(None)
    }

    fn with_store(store: Option<Store<ConfigEntriesData>>) -> Self {
        Self {
            store,
            entries: DashMap::new(),
            by_domain: DashMap::new(),
            by_unique_id: DashMap::new(),
            integrations: DashMap::new(),
            setup_lock: Mutex::new(()),
        }
    }

    /// Read persisted entries
    pub async fn load(&self) -> ConfigEntriesResult<()> {
        let Some(store) = &self.store else {
            return Ok(());
        };
        if let Some(data) = store.load().await? {
            info!("Loading {} config entries from storage", data.entries.len());
            for entry in data.entries {
                self.index_entry(entry);
            }
        }
        Ok(())
    }

    async fn save(&self) -> ConfigEntriesResult<()> {
        let Some(store) = &self.store else {
            return Ok(());
        };
        let data = ConfigEntriesData {
            entries: self.entries.iter().map(|r| r.value().clone()).collect(),
        };
        store.save(&data).await?;
        Ok(())
    }

    fn index_entry(&self, entry: ConfigEntry) {
        self.by_domain
            .entry(entry.domain.clone())
            .or_default()
            .insert(entry.entry_id.clone());
        if let Some(unique_id) = &entry.unique_id {
            self.by_unique_id.insert(
                (entry.domain.clone(), unique_id.clone()),
                entry.entry_id.clone(),
            );
        }
        self.entries.insert(entry.entry_id.clone(), entry);
    }

    fn unindex_entry(&self, entry: &ConfigEntry) {
        if let Some(mut ids) = self.by_domain.get_mut(&entry.domain) {
            ids.remove(&entry.entry_id);
        }
        if let Some(unique_id) = &entry.unique_id {
            self.by_unique_id
                .remove(&(entry.domain.clone(), unique_id.clone()));
        }
        self.entries.remove(&entry.entry_id);
    }

    pub fn register_integration(&self, integration: Arc<dyn Integration>) {
        debug!("Registered integration: {}", integration.domain());
        self.integrations
            .insert(integration.domain().to_string(), integration);
    }

    fn integration(&self, domain: &str) -> Option<Arc<dyn Integration>> {
        self.integrations.get(domain).map(|i| Arc::clone(i.value()))
    }

    pub fn get(&self, entry_id: &str) -> Option<ConfigEntry> {
        self.entries.get(entry_id).map(|r| r.value().clone())
    }

    pub fn get_by_domain(&self, domain: &str) -> Vec<ConfigEntry> {
        self.by_domain
            .get(domain)
            .map(|ids| ids.iter().filter_map(|id| self.get(id)).collect())
            .unwrap_or_default()
    }

    pub fn get_by_unique_id(&self, domain: &str, unique_id: &str) -> Option<ConfigEntry> {
        let entry_id = self
            .by_unique_id
            .get(&(domain.to_string(), unique_id.to_string()))?
            .clone();
        self.get(&entry_id)
    }

    pub fn entry_ids(&self) -> Vec<String> {
        self.entries.iter().map(|r| r.key().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Add and persist a new entry
    pub async fn add(&self, entry: ConfigEntry) -> ConfigEntriesResult<ConfigEntry> {
        if let Some(unique_id) = &entry.unique_id {
            if self.get_by_unique_id(&entry.domain, unique_id).is_some() {
                return Err(ConfigEntriesError::AlreadyExists {
                    domain: entry.domain.clone(),
                    unique_id: unique_id.clone(),
                });
            }
        }

        self.index_entry(entry.clone());
        self.save().await?;

        info!(
            "Added config entry: {} ({}) [{}]",
            entry.title, entry.domain, entry.entry_id
        );
        Ok(entry)
    }

    /// Unload if needed, then forget and persist
    pub async fn remove(&self, entry_id: &str) -> ConfigEntriesResult<ConfigEntry> {
        self.unload(entry_id).await?;
        let entry = self
            .get(entry_id)
            .ok_or_else(|| ConfigEntriesError::NotFound(entry_id.to_string()))?;

        self.unindex_entry(&entry);
        self.save().await?;

        info!(
            "Removed config entry: {} ({}) [{}]",
            entry.title, entry.domain, entry_id
        );
        Ok(entry)
    }

    fn transition(
        &self,
        entry_id: &str,
        state: ConfigEntryState,
        reason: Option<String>,
    ) -> ConfigEntriesResult<ConfigEntry> {
        let mut entry = self
            .entries
            .get_mut(entry_id)
            .ok_or_else(|| ConfigEntriesError::NotFound(entry_id.to_string()))?;
        entry.try_set_state(state, reason)?;
        debug!("Entry {} state changed to {:?}", entry_id, state);
        Ok(entry.clone())
    }

    /// Set up one entry through its integration
    ///
    /// Returns the resulting state. A not-ready integration leaves the entry
    /// in [`ConfigEntryState::SetupRetry`] without an error.
    pub async fn setup(&self, entry_id: &str) -> ConfigEntriesResult<ConfigEntryState> {
        let _lock = self.setup_lock.lock().await;

        let entry = self.transition(entry_id, ConfigEntryState::SetupInProgress, None)?;
        let Some(integration) = self.integration(&entry.domain) else {
            let reason = format!("integration {} not found", entry.domain);
            self.transition(entry_id, ConfigEntryState::SetupError, Some(reason))?;
            return Err(ConfigEntriesError::UnknownIntegration(entry.domain));
        };

        match integration.setup_entry(&entry).await {
            Ok(()) => {
                self.transition(entry_id, ConfigEntryState::Loaded, None)?;
                info!("Setup completed for entry: {} ({})", entry.title, entry_id);
                Ok(ConfigEntryState::Loaded)
            }
            Err(err) if err.is_retryable() => {
                let entry =
                    self.transition(entry_id, ConfigEntryState::SetupRetry, Some(err.to_string()))?;
                if let Some(mut stored) = self.entries.get_mut(entry_id) {
                    stored.tries += 1;
                }
                warn!(
                    "Entry {} not ready yet (attempt {}): {}",
                    entry.title,
                    entry.tries + 1,
                    err
                );
                Ok(ConfigEntryState::SetupRetry)
            }
            Err(err) => {
                warn!("Setup failed for entry {}: {}", entry_id, err);
                self.transition(entry_id, ConfigEntryState::SetupError, Some(err.to_string()))?;
                Err(ConfigEntriesError::SetupFailed(err.to_string()))
            }
        }
    }

    /// Set up an entry and keep retrying in the background while it is not ready
    pub async fn setup_with_retry(
        self: &Arc<Self>,
        entry_id: &str,
    ) -> ConfigEntriesResult<Option<JoinHandle<()>>> {
        match self.setup(entry_id).await? {
            ConfigEntryState::SetupRetry => Ok(Some(self.schedule_retry(entry_id))),
            _ => Ok(None),
        }
    }

    /// Retry setup with backoff until the entry leaves `SetupRetry`
    pub fn schedule_retry(self: &Arc<Self>, entry_id: &str) -> JoinHandle<()> {
        let manager = Arc::clone(self);
        let entry_id = entry_id.to_string();

        tokio::spawn(async move {
            loop {
                let Some(entry) = manager.get(&entry_id) else {
                    break;
                };
                if entry.state != ConfigEntryState::SetupRetry {
                    break;
                }

                let delay = calculate_retry_delay(entry.tries);
                info!("Retrying setup of {} in {:?}", entry.title, delay);
                tokio::time::sleep(delay).await;

                let still_waiting = manager
                    .get(&entry_id)
                    .is_some_and(|e| e.state == ConfigEntryState::SetupRetry);
                if !still_waiting {
                    break;
                }
                if let Err(err) = manager.setup(&entry_id).await {
                    warn!("Retry of {} failed: {}", entry_id, err);
                    break;
                }
            }
        })
    }

    /// Unload an entry, returning whether the integration released it
    pub async fn unload(&self, entry_id: &str) -> ConfigEntriesResult<bool> {
        let _lock = self.setup_lock.lock().await;

        let entry = self
            .get(entry_id)
            .ok_or_else(|| ConfigEntriesError::NotFound(entry_id.to_string()))?;

        match entry.state {
            ConfigEntryState::NotLoaded => return Ok(true),
            state if !state.is_recoverable() => {
                return Err(ConfigEntriesError::CannotUnload(state))
            }
            _ => {}
        }

        let was_loaded = entry.is_loaded();
        let entry = self.transition(entry_id, ConfigEntryState::UnloadInProgress, None)?;

        let unloaded = if was_loaded {
            match self.integration(&entry.domain) {
                Some(integration) => integration.unload_entry(&entry).await,
                None => true,
            }
        } else {
            true
        };

        if unloaded {
            self.transition(entry_id, ConfigEntryState::NotLoaded, None)?;
            info!("Unloaded entry: {} ({})", entry.title, entry_id);
        } else {
            self.transition(
                entry_id,
                ConfigEntryState::FailedUnload,
                Some("integration refused to unload".to_string()),
            )?;
            warn!("Failed to unload entry: {} ({})", entry.title, entry_id);
        }
        Ok(unloaded)
    }

    /// Set up every entry, scheduling retries for those not ready
    pub async fn setup_all(self: &Arc<Self>) -> Vec<JoinHandle<()>> {
        let mut retries = Vec::new();
        for entry_id in self.entry_ids() {
            match self.setup_with_retry(&entry_id).await {
                Ok(Some(handle)) => retries.push(handle),
                Ok(None) => {}
                Err(err) => warn!("Setup of {} failed: {}", entry_id, err),
            }
        }
        retries
    }

    /// Unload every loaded or pending entry
    pub async fn unload_all(&self) {
        for entry_id in self.entry_ids() {
            if let Err(err) = self.unload(&entry_id).await {
                warn!("Unload of {} failed: {}", entry_id, err);
            }
        }
    }
}
