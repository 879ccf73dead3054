//! SignalRGB light entity
//!
//! The entity keeps a local view of the instance (effect, on/off,
//! brightness, effect list) that commands update optimistically and
//! coordinator snapshots overwrite. It is owned by a single task (see
//! [`crate::platform`]), so no locking is involved.

use std::collections::HashMap;
use std::sync::Arc;

use ha_core::{Context, EntityId, HomeAssistant, STATE_OFF, STATE_ON, STATE_UNAVAILABLE};
use ha_helpers::light::{
    ColorMode, LightEntityFeature, TurnOnParams, ATTR_BRIGHTNESS, ATTR_COLOR_MODE, ATTR_EFFECT,
    ATTR_EFFECT_LIST, ATTR_FRIENDLY_NAME, ATTR_SUPPORTED_COLOR_MODES, ATTR_SUPPORTED_FEATURES,
};
use ha_helpers::DeviceInfo;
use serde_json::{json, Value};
use signalrgb_client::{Effect, EffectsService, SignalRgbError};
use tracing::{debug, error, instrument, warn};

use crate::brightness;
use crate::constants::{DOMAIN, MANUFACTURER, MODEL};
use crate::coordinator::{call_client, LightSnapshot, SignalRgbCoordinator};
use crate::error::{Error, Result};
use crate::options::{PowerModel, SignalRgbOptions};

pub struct SignalRgbLight {
    hass: HomeAssistant,
    client: Arc<dyn EffectsService>,
    coordinator: Arc<SignalRgbCoordinator>,
    options: SignalRgbOptions,
    entity_id: EntityId,
    unique_id: String,
    device_info: DeviceInfo,

    current_effect: Option<Effect>,
    is_on: bool,
    /// SignalRGB scale, 0..=100
    brightness: u8,
    /// Last non-off effect applied through this entity
    last_active_effect: Option<String>,
    effect_list: Vec<String>,
}

impl SignalRgbLight {
    pub fn new(
        hass: HomeAssistant,
        client: Arc<dyn EffectsService>,
        coordinator: Arc<SignalRgbCoordinator>,
        options: SignalRgbOptions,
        entry_id: &str,
        host: &str,
    ) -> Result<Self> {
        options.validate()?;
        let entity_id = EntityId::from_name("light", &format!("{DOMAIN}_{entry_id}"))
            .map_err(|err| Error::InvalidConfig(err.to_string()))?;
        let device_info = DeviceInfo::new((DOMAIN, entry_id), format!("{MODEL} {host}"))
            .with_manufacturer(MANUFACTURER)
            .with_model(MODEL);

        debug!("SignalRgbLight initialized: {}", entity_id);
        Ok(Self {
            hass,
            client,
            coordinator,
            options,
            entity_id,
            unique_id: format!("{entry_id}_light"),
            device_info,
            current_effect: None,
            is_on: false,
            brightness: 0,
            last_active_effect: None,
            effect_list: Vec::new(),
        })
    }

    pub fn entity_id(&self) -> &EntityId {
        &self.entity_id
    }

    pub fn unique_id(&self) -> &str {
        &self.unique_id
    }

    pub fn device_info(&self) -> &DeviceInfo {
        &self.device_info
    }

    /// The entity has no name of its own and shows the device name
    pub fn name(&self) -> &str {
        &self.device_info.name
    }

    pub fn coordinator(&self) -> &Arc<SignalRgbCoordinator> {
        &self.coordinator
    }

    pub fn available(&self) -> bool {
        self.coordinator.last_update_success()
    }

    pub fn is_on(&self) -> bool {
        self.is_on
    }

    /// Brightness on the light scale (0..=255)
    pub fn brightness(&self) -> u8 {
        brightness::to_host(self.brightness)
    }

    /// Brightness on the SignalRGB scale (0..=100)
    pub fn native_brightness(&self) -> u8 {
        self.brightness
    }

    pub fn effect(&self) -> Option<&str> {
        self.current_effect.as_ref().map(Effect::name)
    }

    pub fn current_effect(&self) -> Option<&Effect> {
        self.current_effect.as_ref()
    }

    pub fn effect_list(&self) -> &[String] {
        &self.effect_list
    }

    pub fn last_active_effect(&self) -> Option<&str> {
        self.last_active_effect.as_deref()
    }

    pub fn color_mode(&self) -> ColorMode {
        ColorMode::Brightness
    }

    pub fn supported_color_modes(&self) -> Vec<ColorMode> {
        vec![ColorMode::Brightness]
    }

    pub fn supported_features(&self) -> LightEntityFeature {
        LightEntityFeature::EFFECT
    }

    /// Details of the running effect, only while on
    pub fn extra_state_attributes(&self) -> HashMap<String, Value> {
        let effect = match &self.current_effect {
            Some(effect) if self.is_on => effect,
            _ => return HashMap::new(),
        };
        let attrs = &effect.attributes;

        HashMap::from([
            ("effect_name".to_string(), json!(attrs.name)),
            ("effect_description".to_string(), json!(attrs.description)),
            ("effect_developer".to_string(), json!(attrs.developer_effect)),
            ("effect_publisher".to_string(), json!(attrs.publisher)),
            ("effect_uses_audio".to_string(), json!(attrs.uses_audio)),
            ("effect_uses_input".to_string(), json!(attrs.uses_input)),
            ("effect_uses_meters".to_string(), json!(attrs.uses_meters)),
            ("effect_uses_video".to_string(), json!(attrs.uses_video)),
            ("effect_parameters".to_string(), attrs.parameters.clone()),
            ("effect_image".to_string(), json!(attrs.image)),
        ])
    }

    fn state_attributes(&self) -> HashMap<String, Value> {
        let mut attributes = HashMap::from([
            (ATTR_FRIENDLY_NAME.to_string(), json!(self.name())),
            (ATTR_EFFECT_LIST.to_string(), json!(self.effect_list)),
            (
                ATTR_SUPPORTED_COLOR_MODES.to_string(),
                json!(self.supported_color_modes()),
            ),
            (
                ATTR_SUPPORTED_FEATURES.to_string(),
                json!(self.supported_features().bits()),
            ),
        ]);
        if !self.available() {
            return attributes;
        }

        attributes.insert(ATTR_COLOR_MODE.to_string(), json!(self.color_mode()));
        attributes.insert(ATTR_EFFECT.to_string(), json!(self.effect()));
        if self.is_on {
            attributes.insert(ATTR_BRIGHTNESS.to_string(), json!(self.brightness()));
        }
        attributes.extend(self.extra_state_attributes());
        attributes
    }

    /// Publish the cached view to the state machine
    pub fn write_ha_state(&self) {
        let state = match (self.available(), self.is_on) {
            (false, _) => STATE_UNAVAILABLE,
            (true, true) => STATE_ON,
            (true, false) => STATE_OFF,
        };
        self.hass.states.set(
            self.entity_id.clone(),
            state,
            self.state_attributes(),
            Context::new(),
        );
    }

    /// Initial sync once the entity is registered
    pub async fn added_to_hass(&mut self) {
        debug!("SignalRgbLight being added: {}", self.entity_id);
        self.handle_coordinator_update();
        self.refresh_effect_catalog().await;
    }

    /// Reconcile from the coordinator's latest data
    pub fn handle_coordinator_update(&mut self) {
        match self.coordinator.data() {
            Some(snapshot) => self.reconcile(&snapshot),
            None => {
                warn!("No data received from coordinator for {}", self.entity_id);
                self.write_ha_state();
            }
        }
    }

    /// Overwrite the cache from a snapshot and publish, changed or not
    pub fn reconcile(&mut self, snapshot: &LightSnapshot) {
        self.current_effect = snapshot.current_effect().cloned();
        self.is_on = snapshot.is_on(&self.options.off_effect_name);
        self.brightness = snapshot.brightness().min(brightness::NATIVE_MAX);

        debug!(
            effect = self.effect().unwrap_or("None"),
            is_on = self.is_on,
            brightness = self.brightness,
            "Reconciled {}",
            self.entity_id
        );
        self.write_ha_state();
    }

    #[instrument(skip(self), fields(entity_id = %self.entity_id))]
    pub async fn turn_on(&mut self, params: TurnOnParams) -> Result<()> {
        if self.options.power_model == PowerModel::Enabled && !self.is_on {
            debug!("Light was off, enabling");
            call_client(&self.hass, &self.client, |c| c.set_enabled(true)).await?;
            self.is_on = true;
            self.write_ha_state();
        }

        if let Some(host_brightness) = params.brightness {
            let native = brightness::to_native(host_brightness);
            debug!("Setting brightness to {}%", native);
            call_client(&self.hass, &self.client, move |c| c.set_brightness(native)).await?;
            self.brightness = native;
            self.write_ha_state();
        }

        match params.effect {
            Some(effect) => self.apply_effect(&effect).await?,
            None if self.options.power_model == PowerModel::OffEffect && !self.is_on => {
                let effect = self
                    .last_active_effect
                    .clone()
                    .unwrap_or_else(|| self.options.default_effect.clone());
                debug!("Resuming effect {}", effect);
                self.apply_effect(&effect).await?;
            }
            None => {}
        }

        self.coordinator.request_refresh();
        Ok(())
    }

    #[instrument(skip(self), fields(entity_id = %self.entity_id))]
    pub async fn turn_off(&mut self) -> Result<()> {
        match self.options.power_model {
            PowerModel::Enabled => {
                call_client(&self.hass, &self.client, |c| c.set_enabled(false)).await?;
                self.is_on = false;
                self.write_ha_state();
            }
            PowerModel::OffEffect => {
                let off_effect = self.options.off_effect_name.clone();
                self.apply_effect(&off_effect).await?;
            }
        }

        self.coordinator
            .request_refresh_after(self.options.off_grace_delay());
        Ok(())
    }

    /// Look up `name` and run it; the cache is untouched on failure
    pub async fn apply_effect(&mut self, name: &str) -> Result<()> {
        debug!("Applying effect {} on {}", name, self.entity_id);

        let lookup = name.to_string();
        let effect = match call_client(&self.hass, &self.client, move |c| {
            c.get_effect_by_name(&lookup)
        })
        .await
        {
            Ok(effect) => effect,
            Err(Error::Api(SignalRgbError::EffectNotFound(name))) => {
                error!("Effect {} does not exist", name);
                return Err(Error::UnknownEffect(name));
            }
            Err(err) => {
                error!("Failed to apply effect {}: {}", name, err);
                return Err(err);
            }
        };

        let effect_id = effect.id.clone();
        if let Err(err) =
            call_client(&self.hass, &self.client, move |c| c.apply_effect(&effect_id)).await
        {
            error!("Failed to apply effect {}: {}", name, err);
            return Err(err);
        }

        let is_off_effect = self.options.is_off_effect(effect.name());
        if !is_off_effect {
            self.last_active_effect = Some(effect.name().to_string());
        }
        if self.options.power_model == PowerModel::OffEffect {
            self.is_on = !is_off_effect;
        }
        self.current_effect = Some(effect);
        self.write_ha_state();
        Ok(())
    }

    /// Reload the effect list; a failure leaves it empty
    pub async fn refresh_effect_catalog(&mut self) {
        match call_client(&self.hass, &self.client, |c| c.get_effects()).await {
            Ok(effects) => {
                self.effect_list = effects
                    .iter()
                    .map(Effect::name)
                    .filter(|name| !self.options.is_off_effect(name))
                    .map(str::to_string)
                    .collect();
                debug!("Effect list updated: {:?}", self.effect_list);
            }
            Err(err) => {
                error!("Failed to fetch effect list: {}", err);
                self.effect_list.clear();
            }
        }
        self.write_ha_state();
    }
}
