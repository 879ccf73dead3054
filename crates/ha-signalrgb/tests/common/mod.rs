//! Shared fixtures for the SignalRGB integration tests

#![allow(dead_code)]

mod mock_service;

use std::sync::Arc;
use std::time::Duration;

use ha_core::{Executor, HomeAssistant};
use ha_signalrgb::coordinator::create_coordinator;
use ha_signalrgb::{ClientFactory, SignalRgbCoordinator, SignalRgbLight, SignalRgbOptions};
use signalrgb_client::EffectsService;

pub use mock_service::{effect, Call, Method, MockEffectsService};

pub const ENTRY_ID: &str = "test";
pub const HOST: &str = "192.168.1.100";
pub const ENTITY_ID: &str = "light.signalrgb_test";

pub fn test_hass() -> HomeAssistant {
    HomeAssistant::new(Executor::new(4, Duration::from_secs(5)))
}

/// Factory handing out `service` for any host
pub fn mock_factory(service: &Arc<MockEffectsService>) -> ClientFactory {
    let service = Arc::clone(service);
    Arc::new(move |_host: &str, _port: u16, _options: &SignalRgbOptions| {
        Ok(Arc::clone(&service) as Arc<dyn EffectsService>)
    })
}

/// A light over `service` whose coordinator has fetched once
pub async fn make_light(
    hass: &HomeAssistant,
    service: &Arc<MockEffectsService>,
    options: SignalRgbOptions,
) -> (SignalRgbLight, Arc<SignalRgbCoordinator>) {
    let client = Arc::clone(service) as Arc<dyn EffectsService>;
    let coordinator = create_coordinator(hass, Arc::clone(&client), &options);
    coordinator
        .config_entry_first_refresh()
        .await
        .expect("first refresh");

    let light = SignalRgbLight::new(
        hass.clone(),
        client,
        Arc::clone(&coordinator),
        options,
        ENTRY_ID,
        HOST,
    )
    .expect("light");
    (light, coordinator)
}

/// Poll `condition` until it holds or a second passes
pub async fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    for _ in 0..100 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}
