//! SignalRGB integration
//!
//! Exposes a SignalRGB instance as one light entity per config entry.
//!
//! ```text
//! LightHandle ──> light task ──> SignalRgbLight ──> executor ──> EffectsService
//!                     ^                                              │
//!                     └──── watch ──── SignalRgbCoordinator <────────┘
//! ```
//!
//! - [`config_flow`] - validates a host/port pair and creates the entry
//! - [`coordinator`] - polls the instance into [`LightSnapshot`]s
//! - [`light`] - the entity: cache, commands, reconciliation
//! - [`platform`] - the task owning each entity

pub mod brightness;
pub mod config_flow;
pub mod constants;
pub mod coordinator;
pub mod error;
pub mod light;
pub mod options;
pub mod platform;

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use ha_config_entries::{ConfigEntry, ConfigFlow, FlowFactory, Integration};
use ha_core::const_keys::{CONF_HOST, CONF_PORT};
use ha_core::{HomeAssistant, HomeAssistantError};
use signalrgb_client::{EffectsService, SignalRgbClient};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

pub use config_flow::SignalRgbConfigFlow;
pub use constants::DOMAIN;
pub use coordinator::{LightSnapshot, SignalRgbCoordinator};
pub use error::{Error, Result};
pub use light::SignalRgbLight;
pub use options::{PowerModel, SignalRgbOptions};
pub use platform::{LightCommand, LightHandle};

use crate::constants::DEFAULT_PORT;
use crate::coordinator::{call_client, create_coordinator};

/// Builds the API client of one instance
pub type ClientFactory = Arc<
    dyn Fn(&str, u16, &SignalRgbOptions) -> signalrgb_client::Result<Arc<dyn EffectsService>>
        + Send
        + Sync,
>;

/// Factory creating HTTP clients
pub fn http_client_factory() -> ClientFactory {
    Arc::new(|host: &str, port: u16, options: &SignalRgbOptions| {
        let client = SignalRgbClient::with_timeout(host, port, options.request_timeout())?;
        Ok(Arc::new(client) as Arc<dyn EffectsService>)
    })
}

/// Everything a loaded entry keeps alive
struct RuntimeData {
    client: Arc<dyn EffectsService>,
    coordinator: Arc<SignalRgbCoordinator>,
    light: LightHandle,
    tasks: Vec<JoinHandle<()>>,
}

pub struct SignalRgbIntegration {
    hass: HomeAssistant,
    options: SignalRgbOptions,
    client_factory: ClientFactory,
    /// entry_id -> runtime data
    runtime: DashMap<String, RuntimeData>,
}

impl SignalRgbIntegration {
    pub fn new(hass: HomeAssistant, options: SignalRgbOptions) -> Self {
        Self::with_client_factory(hass, options, http_client_factory())
    }

    pub fn with_client_factory(
        hass: HomeAssistant,
        options: SignalRgbOptions,
        client_factory: ClientFactory,
    ) -> Self {
        Self {
            hass,
            options,
            client_factory,
            runtime: DashMap::new(),
        }
    }

    pub fn options(&self) -> &SignalRgbOptions {
        &self.options
    }

    /// Handle to the light of a loaded entry
    pub fn light(&self, entry_id: &str) -> Option<LightHandle> {
        self.runtime.get(entry_id).map(|r| r.light.clone())
    }

    pub fn client(&self, entry_id: &str) -> Option<Arc<dyn EffectsService>> {
        self.runtime.get(entry_id).map(|r| Arc::clone(&r.client))
    }

    pub fn coordinator(&self, entry_id: &str) -> Option<Arc<SignalRgbCoordinator>> {
        self.runtime.get(entry_id).map(|r| Arc::clone(&r.coordinator))
    }

    /// Entry ids with runtime data
    pub fn loaded_entries(&self) -> Vec<String> {
        self.runtime.iter().map(|r| r.key().clone()).collect()
    }

    /// Factory for the flow manager
    pub fn config_flow_factory(&self) -> FlowFactory {
        let hass = self.hass.clone();
        let client_factory = Arc::clone(&self.client_factory);
        let options = self.options.clone();
        Arc::new(move || {
            Box::new(SignalRgbConfigFlow::new(
                hass.clone(),
                Arc::clone(&client_factory),
                options.clone(),
            )) as Box<dyn ConfigFlow>
        })
    }

    fn connect(
        &self,
        entry: &ConfigEntry,
    ) -> std::result::Result<(String, Arc<dyn EffectsService>), HomeAssistantError> {
        let host = entry.data_str(CONF_HOST).ok_or_else(|| {
            HomeAssistantError::SetupFailed(format!("{} has no host", entry.title))
        })?;
        let port = match entry.data_u64(CONF_PORT) {
            None => DEFAULT_PORT,
            Some(port) => u16::try_from(port).map_err(|_| {
                HomeAssistantError::SetupFailed(format!("invalid port {port}"))
            })?,
        };

        let client = (self.client_factory)(host, port, &self.options)
            .map_err(|err| HomeAssistantError::SetupFailed(err.to_string()))?;
        Ok((host.to_string(), client))
    }
}

#[async_trait]
impl Integration for SignalRgbIntegration {
    fn domain(&self) -> &str {
        DOMAIN
    }

    async fn setup_entry(
        &self,
        entry: &ConfigEntry,
    ) -> std::result::Result<(), HomeAssistantError> {
        self.options
            .validate()
            .map_err(|err| HomeAssistantError::SetupFailed(err.to_string()))?;
        let (host, client) = self.connect(entry)?;

        if let Err(err) = call_client(&self.hass, &client, |c| c.get_current_effect()).await {
            return Err(HomeAssistantError::ConfigEntryNotReady(format!(
                "Unable to connect to SignalRGB at {host}: {err}"
            )));
        }

        let coordinator = create_coordinator(&self.hass, Arc::clone(&client), &self.options);
        coordinator.config_entry_first_refresh().await?;

        let mut light = SignalRgbLight::new(
            self.hass.clone(),
            Arc::clone(&client),
            Arc::clone(&coordinator),
            self.options.clone(),
            &entry.entry_id,
            &host,
        )
        .map_err(|err| HomeAssistantError::SetupFailed(err.to_string()))?;
        light.added_to_hass().await;

        let (handle, light_task) = platform::spawn_light(light);
        let scheduler = coordinator.spawn_scheduler();

        info!("Set up SignalRGB at {} as {}", host, handle.entity_id());
        if let Some(previous) = self.runtime.insert(
            entry.entry_id.clone(),
            RuntimeData {
                client,
                coordinator,
                light: handle,
                tasks: vec![light_task, scheduler],
            },
        ) {
            warn!("Replacing runtime data of {}", entry.entry_id);
            previous.tasks.iter().for_each(JoinHandle::abort);
        }
        Ok(())
    }

    async fn unload_entry(&self, entry: &ConfigEntry) -> bool {
        let Some((_, runtime)) = self.runtime.remove(&entry.entry_id) else {
            warn!("No runtime data for {}", entry.entry_id);
            return false;
        };

        for task in runtime.tasks {
            task.abort();
            // Cancelled once it yields; no state writes after this
            let _ = task.await;
        }
        self.hass.states.remove(runtime.light.entity_id());
        debug!("Unloaded SignalRGB entry {}", entry.entry_id);
        true
    }
}
