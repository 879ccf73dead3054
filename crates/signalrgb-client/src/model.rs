//! Payloads of the SignalRGB lighting API

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A lighting effect installed in SignalRGB
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Effect {
    /// Opaque id used to apply the effect
    pub id: String,
    pub attributes: EffectAttributes,
}

impl Effect {
    /// Display name; unique among installed effects
    pub fn name(&self) -> &str {
        &self.attributes.name
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EffectAttributes {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub publisher: Option<String>,
    #[serde(default)]
    pub developer_effect: bool,
    #[serde(default)]
    pub uses_audio: bool,
    #[serde(default)]
    pub uses_input: bool,
    #[serde(default)]
    pub uses_meters: bool,
    #[serde(default)]
    pub uses_video: bool,
    /// Effect controls as reported by SignalRGB
    #[serde(default)]
    pub parameters: Value,
    /// Preview image URL
    #[serde(default)]
    pub image: Option<String>,
}

/// `GET /api/v1/lighting`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentState {
    /// Id of the running effect
    pub id: String,
    pub attributes: CurrentStateAttributes,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentStateAttributes {
    pub name: String,
    pub enabled: bool,
    /// 0..=100
    pub global_brightness: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct EffectList {
    #[serde(default)]
    pub items: Vec<Effect>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct ApiErrorDetail {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub detail: Option<String>,
}

/// Wrapper around every response body
#[derive(Debug, Deserialize)]
pub(crate) struct Envelope<T> {
    #[serde(default)]
    pub status: Option<String>,
    pub data: Option<T>,
    #[serde(default)]
    pub errors: Vec<ApiErrorDetail>,
}

impl<T> Envelope<T> {
    pub fn is_error(&self) -> bool {
        self.status.as_deref() == Some("error") || !self.errors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_effect_with_sparse_attributes() {
        let effect: Effect = serde_json::from_value(json!({
            "id": "rainbow-wave",
            "type": "lighting",
            "attributes": {"name": "Rainbow Wave", "uses_audio": true}
        }))
        .unwrap();

        assert_eq!(effect.name(), "Rainbow Wave");
        assert!(effect.attributes.uses_audio);
        assert!(!effect.attributes.developer_effect);
        assert_eq!(effect.attributes.parameters, Value::Null);
        assert_eq!(effect.attributes.image, None);
    }

    #[test]
    fn test_error_envelope() {
        let envelope: Envelope<Effect> = serde_json::from_value(json!({
            "status": "error",
            "errors": [{"title": "Not Found", "detail": "no such effect", "code": 404}]
        }))
        .unwrap();

        assert!(envelope.is_error());
        assert!(envelope.data.is_none());
        assert_eq!(envelope.errors[0].title, "Not Found");
    }
}
