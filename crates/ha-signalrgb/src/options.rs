//! Deployment options of the integration

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_EFFECT, DEFAULT_OFF_EFFECT, OFF_GRACE_DELAY, UPDATE_INTERVAL};
use crate::error::{Error, Result};

/// How on/off is represented by the SignalRGB instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PowerModel {
    /// On/off is SignalRGB's `enabled` flag
    #[default]
    Enabled,
    /// Off is a dedicated effect; any other effect means on
    OffEffect,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalRgbOptions {
    pub power_model: PowerModel,
    /// Name of the effect meaning "off" under [`PowerModel::OffEffect`]
    pub off_effect_name: String,
    /// Effect used to turn on when no effect was active before
    pub default_effect: String,
    pub off_grace_delay_ms: u64,
    pub update_interval_secs: u64,
    /// Timeout of one HTTP request
    pub request_timeout_secs: u64,
}

impl Default for SignalRgbOptions {
    fn default() -> Self {
        Self {
            power_model: PowerModel::default(),
            off_effect_name: DEFAULT_OFF_EFFECT.to_string(),
            default_effect: DEFAULT_EFFECT.to_string(),
            off_grace_delay_ms: OFF_GRACE_DELAY.as_millis() as u64,
            update_interval_secs: UPDATE_INTERVAL.as_secs(),
            request_timeout_secs: signalrgb_client::DEFAULT_TIMEOUT.as_secs(),
        }
    }
}

impl SignalRgbOptions {
    pub fn with_power_model(mut self, power_model: PowerModel) -> Self {
        self.power_model = power_model;
        self
    }

    pub fn with_off_grace_delay(mut self, delay: Duration) -> Self {
        self.off_grace_delay_ms = delay.as_millis() as u64;
        self
    }

    pub fn off_grace_delay(&self) -> Duration {
        Duration::from_millis(self.off_grace_delay_ms)
    }

    pub fn update_interval(&self) -> Duration {
        Duration::from_secs(self.update_interval_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Whether `name` is the effect standing for "off"
    pub fn is_off_effect(&self, name: &str) -> bool {
        self.power_model == PowerModel::OffEffect && name == self.off_effect_name
    }

    pub fn validate(&self) -> Result<()> {
        if self.update_interval_secs == 0 {
            return Err(Error::InvalidConfig(
                "update_interval_secs must be positive".to_string(),
            ));
        }
        if self.request_timeout_secs == 0 {
            return Err(Error::InvalidConfig(
                "request_timeout_secs must be positive".to_string(),
            ));
        }
        if self.power_model == PowerModel::OffEffect {
            if self.off_effect_name.trim().is_empty() {
                return Err(Error::InvalidConfig(
                    "off_effect_name is required for the off_effect power model".to_string(),
                ));
            }
            if self.default_effect.trim().is_empty() {
                return Err(Error::InvalidConfig(
                    "default_effect is required for the off_effect power model".to_string(),
                ));
            }
            if self.default_effect == self.off_effect_name {
                return Err(Error::InvalidConfig(
                    "default_effect must differ from off_effect_name".to_string(),
                ));
            }
        }
        Ok(())
    }
}
