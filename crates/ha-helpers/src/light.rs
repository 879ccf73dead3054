//! Light platform vocabulary
//!
//! Attribute names, color modes and feature flags used by light entities.
//! Brightness on the host side is always 0..=255.

use serde::{Deserialize, Serialize};

pub const ATTR_BRIGHTNESS: &str = "brightness";
pub const ATTR_EFFECT: &str = "effect";
pub const ATTR_EFFECT_LIST: &str = "effect_list";
pub const ATTR_COLOR_MODE: &str = "color_mode";
pub const ATTR_SUPPORTED_COLOR_MODES: &str = "supported_color_modes";
pub const ATTR_SUPPORTED_FEATURES: &str = "supported_features";
pub const ATTR_FRIENDLY_NAME: &str = "friendly_name";

/// Color modes a light can report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorMode {
    Brightness,
}

bitflags::bitflags! {
    /// Feature bits of a light entity, published as the integer `supported_features`
    #[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
    pub struct LightEntityFeature: u32 {
        const EFFECT = 4;
    }
}

/// Parameters of a `light.turn_on` call
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnOnParams {
    /// Host-scale brightness (0..=255)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brightness: Option<u8>,
    /// Effect name from the entity's effect list
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effect: Option<String>,
}

impl TurnOnParams {
    pub fn brightness(brightness: u8) -> Self {
        Self {
            brightness: Some(brightness),
            effect: None,
        }
    }

    pub fn effect(effect: impl Into<String>) -> Self {
        Self {
            brightness: None,
            effect: Some(effect.into()),
        }
    }
}
