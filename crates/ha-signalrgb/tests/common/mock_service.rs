//! In-memory SignalRGB instance

use std::collections::HashMap;
use std::sync::Mutex;

use signalrgb_client::{Effect, EffectAttributes, EffectsService, Result, SignalRgbError};

/// Operations of [`EffectsService`], used to program failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    GetCurrentEffect,
    GetEffects,
    GetEffectByName,
    ApplyEffect,
    Enabled,
    SetEnabled,
    Brightness,
    SetBrightness,
}

const ALL_METHODS: [Method; 8] = [
    Method::GetCurrentEffect,
    Method::GetEffects,
    Method::GetEffectByName,
    Method::ApplyEffect,
    Method::Enabled,
    Method::SetEnabled,
    Method::Brightness,
    Method::SetBrightness,
];

/// One recorded call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    GetCurrentEffect,
    GetEffects,
    GetEffectByName(String),
    ApplyEffect(String),
    Enabled,
    SetEnabled(bool),
    Brightness,
    SetBrightness(u8),
}

impl Call {
    pub fn is_write(&self) -> bool {
        matches!(
            self,
            Call::ApplyEffect(_) | Call::SetEnabled(_) | Call::SetBrightness(_)
        )
    }
}

struct DeviceState {
    effects: Vec<Effect>,
    current: String,
    enabled: bool,
    brightness: u8,
}

/// Effects service backed by memory, recording every call
pub struct MockEffectsService {
    device: Mutex<DeviceState>,
    calls: Mutex<Vec<Call>>,
    failures: Mutex<HashMap<Method, SignalRgbError>>,
}

pub fn effect(name: &str) -> Effect {
    Effect {
        id: name.to_lowercase().replace(' ', "-"),
        attributes: EffectAttributes {
            name: name.to_string(),
            description: Some(format!("{name} effect")),
            publisher: Some("WhirlwindFX".to_string()),
            uses_audio: name == "Audio Visualizer",
            parameters: serde_json::json!({"speed": 50}),
            ..EffectAttributes::default()
        },
    }
}

impl MockEffectsService {
    /// Instance running "Rainbow Wave", enabled, at 50% brightness
    pub fn new() -> Self {
        Self::with_effects(&["Rainbow Wave", "Solid Color", "Sunset", "All Off"])
    }

    pub fn with_effects(names: &[&str]) -> Self {
        let effects: Vec<Effect> = names.iter().map(|name| effect(name)).collect();
        let current = effects.first().map(|e| e.id.clone()).unwrap_or_default();
        Self {
            device: Mutex::new(DeviceState {
                effects,
                current,
                enabled: true,
                brightness: 50,
            }),
            calls: Mutex::new(Vec::new()),
            failures: Mutex::new(HashMap::new()),
        }
    }

    /// Make `method` fail with `err` until cleared
    pub fn fail(&self, method: Method, err: SignalRgbError) {
        self.failures.lock().unwrap().insert(method, err);
    }

    /// Make every method fail as unreachable
    pub fn go_offline(&self) {
        for method in ALL_METHODS {
            self.fail(method, SignalRgbError::Connection("connection refused".to_string()));
        }
    }

    pub fn clear_failures(&self) {
        self.failures.lock().unwrap().clear();
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    /// Recorded state-changing calls, in order
    pub fn writes(&self) -> Vec<Call> {
        self.calls().into_iter().filter(Call::is_write).collect()
    }

    pub fn count(&self, call: &Call) -> usize {
        self.calls().iter().filter(|c| *c == call).count()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    /// Change the device behind the integration's back
    pub fn set_current(&self, name: &str) {
        let mut device = self.device.lock().unwrap();
        device.current = effect(name).id;
    }

    pub fn set_device_enabled(&self, enabled: bool) {
        self.device.lock().unwrap().enabled = enabled;
    }

    pub fn set_device_brightness(&self, brightness: u8) {
        self.device.lock().unwrap().brightness = brightness;
    }

    pub fn current_name(&self) -> String {
        let device = self.device.lock().unwrap();
        device
            .effects
            .iter()
            .find(|e| e.id == device.current)
            .map(|e| e.name().to_string())
            .unwrap_or_default()
    }

    pub fn device_enabled(&self) -> bool {
        self.device.lock().unwrap().enabled
    }

    pub fn device_brightness(&self) -> u8 {
        self.device.lock().unwrap().brightness
    }

    fn record(&self, method: Method, call: Call) -> Result<()> {
        self.calls.lock().unwrap().push(call);
        match self.failures.lock().unwrap().get(&method) {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

impl EffectsService for MockEffectsService {
    fn get_current_effect(&self) -> Result<Effect> {
        self.record(Method::GetCurrentEffect, Call::GetCurrentEffect)?;
        let device = self.device.lock().unwrap();
        device
            .effects
            .iter()
            .find(|e| e.id == device.current)
            .cloned()
            .ok_or_else(|| SignalRgbError::Api {
                status: 404,
                title: "Not Found".to_string(),
                detail: None,
            })
    }

    fn get_effects(&self) -> Result<Vec<Effect>> {
        self.record(Method::GetEffects, Call::GetEffects)?;
        Ok(self.device.lock().unwrap().effects.clone())
    }

    fn get_effect_by_name(&self, name: &str) -> Result<Effect> {
        self.record(Method::GetEffectByName, Call::GetEffectByName(name.to_string()))?;
        self.device
            .lock()
            .unwrap()
            .effects
            .iter()
            .find(|e| e.name() == name)
            .cloned()
            .ok_or_else(|| SignalRgbError::EffectNotFound(name.to_string()))
    }

    fn apply_effect(&self, effect_id: &str) -> Result<()> {
        self.record(Method::ApplyEffect, Call::ApplyEffect(effect_id.to_string()))?;
        self.device.lock().unwrap().current = effect_id.to_string();
        Ok(())
    }

    fn enabled(&self) -> Result<bool> {
        self.record(Method::Enabled, Call::Enabled)?;
        Ok(self.device.lock().unwrap().enabled)
    }

    fn set_enabled(&self, enabled: bool) -> Result<()> {
        self.record(Method::SetEnabled, Call::SetEnabled(enabled))?;
        self.device.lock().unwrap().enabled = enabled;
        Ok(())
    }

    fn brightness(&self) -> Result<u8> {
        self.record(Method::Brightness, Call::Brightness)?;
        Ok(self.device.lock().unwrap().brightness)
    }

    fn set_brightness(&self, brightness: u8) -> Result<()> {
        self.record(Method::SetBrightness, Call::SetBrightness(brightness))?;
        self.device.lock().unwrap().brightness = brightness;
        Ok(())
    }
}
