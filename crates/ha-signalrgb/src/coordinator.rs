//! Snapshot polling of a SignalRGB instance

use std::sync::Arc;

use futures::FutureExt;
use ha_core::HomeAssistant;
use ha_helpers::{DataUpdateCoordinator, UpdateFailed, UpdateMethod};
use signalrgb_client::{Effect, EffectsService};
use tracing::debug;

use crate::error::Result;
use crate::options::{PowerModel, SignalRgbOptions};

/// Point-in-time read of a SignalRGB instance, one variant per power model
#[derive(Debug, Clone, PartialEq)]
pub enum LightSnapshot {
    Enabled {
        current_effect: Option<Effect>,
        enabled: bool,
        /// 0..=100
        brightness: u8,
    },
    OffEffect {
        current_effect: Option<Effect>,
        /// 0..=100
        brightness: u8,
    },
}

impl LightSnapshot {
    pub fn current_effect(&self) -> Option<&Effect> {
        match self {
            LightSnapshot::Enabled { current_effect, .. }
            | LightSnapshot::OffEffect { current_effect, .. } => current_effect.as_ref(),
        }
    }

    pub fn brightness(&self) -> u8 {
        match self {
            LightSnapshot::Enabled { brightness, .. }
            | LightSnapshot::OffEffect { brightness, .. } => *brightness,
        }
    }

    /// On/off derived by the snapshot's power model
    ///
    /// Under the off-effect model a snapshot without an effect is off.
    pub fn is_on(&self, off_effect_name: &str) -> bool {
        match self {
            LightSnapshot::Enabled { enabled, .. } => *enabled,
            LightSnapshot::OffEffect { current_effect, .. } => current_effect
                .as_ref()
                .is_some_and(|effect| effect.name() != off_effect_name),
        }
    }
}

pub type SignalRgbCoordinator = DataUpdateCoordinator<LightSnapshot>;

/// Run one blocking client call on the host executor
pub(crate) async fn call_client<T, F>(
    hass: &HomeAssistant,
    client: &Arc<dyn EffectsService>,
    job: F,
) -> Result<T>
where
    F: FnOnce(&dyn EffectsService) -> signalrgb_client::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let client = Arc::clone(client);
    Ok(hass.add_executor_job(move || job(client.as_ref())).await??)
}

/// Read one snapshot; each remote property is a separate executor job
pub async fn fetch_snapshot(
    hass: &HomeAssistant,
    client: &Arc<dyn EffectsService>,
    power_model: PowerModel,
) -> Result<LightSnapshot> {
    let current_effect = call_client(hass, client, |c| c.get_current_effect()).await?;
    let brightness = call_client(hass, client, |c| c.brightness()).await?;

    let snapshot = match power_model {
        PowerModel::Enabled => LightSnapshot::Enabled {
            current_effect: Some(current_effect),
            enabled: call_client(hass, client, |c| c.enabled()).await?,
            brightness,
        },
        PowerModel::OffEffect => LightSnapshot::OffEffect {
            current_effect: Some(current_effect),
            brightness,
        },
    };

    debug!(
        effect = snapshot.current_effect().map(Effect::name).unwrap_or("None"),
        brightness = snapshot.brightness(),
        "Fetched SignalRGB state"
    );
    Ok(snapshot)
}

/// Coordinator polling `client` at the configured interval
pub fn create_coordinator(
    hass: &HomeAssistant,
    client: Arc<dyn EffectsService>,
    options: &SignalRgbOptions,
) -> Arc<SignalRgbCoordinator> {
    let hass = hass.clone();
    let power_model = options.power_model;

    let update_method: UpdateMethod<LightSnapshot> = Arc::new(move || {
        let hass = hass.clone();
        let client = Arc::clone(&client);
        async move {
            fetch_snapshot(&hass, &client, power_model)
                .await
                .map_err(|err| UpdateFailed(err.to_string()))
        }
        .boxed()
    });

    DataUpdateCoordinator::new("signalrgb_light", options.update_interval(), update_method)
}

#[cfg(test)]
mod tests {
    use super::*;
    use signalrgb_client::EffectAttributes;

    fn effect(name: &str) -> Effect {
        Effect {
            id: name.to_lowercase().replace(' ', "-"),
            attributes: EffectAttributes {
                name: name.to_string(),
                ..EffectAttributes::default()
            },
        }
    }

    #[test]
    fn test_enabled_snapshot_uses_flag() {
        let snapshot = LightSnapshot::Enabled {
            current_effect: Some(effect("All Off")),
            enabled: true,
            brightness: 40,
        };
        assert!(snapshot.is_on("All Off"));
        assert_eq!(snapshot.brightness(), 40);
    }

    #[test]
    fn test_off_effect_snapshot_uses_effect_name() {
        let on = LightSnapshot::OffEffect {
            current_effect: Some(effect("Rainbow Wave")),
            brightness: 100,
        };
        let off = LightSnapshot::OffEffect {
            current_effect: Some(effect("All Off")),
            brightness: 100,
        };
        let unknown = LightSnapshot::OffEffect {
            current_effect: None,
            brightness: 100,
        };

        assert!(on.is_on("All Off"));
        assert!(!off.is_on("All Off"));
        assert!(!unknown.is_on("All Off"));
        assert_eq!(on.current_effect().map(Effect::name), Some("Rainbow Wave"));
    }
}
