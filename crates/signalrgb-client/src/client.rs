//! HTTP implementation of [`EffectsService`]

use std::sync::OnceLock;
use std::time::Duration;

use reqwest::blocking::{Client, RequestBuilder};
use reqwest::{Method, StatusCode, Url};
use serde::de::{DeserializeOwned, IgnoredAny};
use serde_json::json;
use tracing::{debug, trace};

use crate::error::{Result, SignalRgbError};
use crate::model::{CurrentState, Effect, EffectList, Envelope};
use crate::service::EffectsService;

pub const DEFAULT_PORT: u16 = 16038;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

const API_PATH: [&str; 3] = ["api", "v1", "lighting"];

/// Blocking client for one SignalRGB instance
///
/// The underlying HTTP client is created on first use, so the value can be
/// constructed on an async worker and used from blocking threads.
pub struct SignalRgbClient {
    base: Url,
    timeout: Duration,
    http: OnceLock<Client>,
}

impl SignalRgbClient {
    pub fn new(host: &str, port: u16) -> Result<Self> {
        Self::with_timeout(host, port, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(host: &str, port: u16, timeout: Duration) -> Result<Self> {
        let host = host.trim();
        if host.is_empty() || host.contains(['/', '?', '#', '@', ' ']) {
            return Err(SignalRgbError::InvalidHost(host.to_string()));
        }
        let base = Url::parse(&format!("http://{host}:{port}/"))
            .map_err(|err| SignalRgbError::InvalidHost(format!("{host}: {err}")))?;

        Ok(Self {
            base,
            timeout,
            http: OnceLock::new(),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    fn http(&self) -> Result<&Client> {
        if let Some(client) = self.http.get() {
            return Ok(client);
        }
        let client = Client::builder().timeout(self.timeout).build()?;
        Ok(self.http.get_or_init(|| client))
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|()| SignalRgbError::InvalidHost(self.base.to_string()))?
            .pop_if_empty()
            .extend(API_PATH)
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, segments: &[&str]) -> Result<RequestBuilder> {
        let url = self.endpoint(segments)?;
        trace!("{} {}", method, url);
        Ok(self.http()?.request(method, url))
    }

    /// Send and unwrap the response envelope
    fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<Option<T>> {
        let response = request.send()?;
        let status = response.status();
        if matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
            return Err(SignalRgbError::InvalidAuthentication);
        }

        let body = response.text()?;
        let envelope: Envelope<T> = match serde_json::from_str(&body) {
            Ok(envelope) => envelope,
            Err(_) if !status.is_success() => return Err(status_error(status, None)),
            Err(_) if body.trim().is_empty() => return Ok(None),
            Err(err) => return Err(SignalRgbError::Decode(err.to_string())),
        };

        if !status.is_success() || envelope.is_error() {
            let first = envelope.errors.into_iter().next();
            return Err(status_error(
                status,
                first.map(|e| (e.title, e.detail)),
            ));
        }
        Ok(envelope.data)
    }

    fn get<T: DeserializeOwned>(&self, segments: &[&str]) -> Result<T> {
        self.send(self.request(Method::GET, segments)?)?
            .ok_or_else(|| SignalRgbError::Decode("response has no data".to_string()))
    }

    /// Current effect id, enabled flag and brightness in one call
    pub fn current_state(&self) -> Result<CurrentState> {
        self.get(&[])
    }

    pub fn get_effect(&self, effect_id: &str) -> Result<Effect> {
        self.get(&["effects", effect_id])
    }
}

fn status_error(status: StatusCode, error: Option<(String, Option<String>)>) -> SignalRgbError {
    let (title, detail) = error.unwrap_or_else(|| {
        (
            status.canonical_reason().unwrap_or("error").to_string(),
            None,
        )
    });
    SignalRgbError::Api {
        status: status.as_u16(),
        title,
        detail,
    }
}

impl EffectsService for SignalRgbClient {
    fn get_current_effect(&self) -> Result<Effect> {
        let state = self.current_state()?;
        self.get_effect(&state.id)
    }

    fn get_effects(&self) -> Result<Vec<Effect>> {
        let list: EffectList = self.get(&["effects"])?;
        debug!("Fetched {} effects", list.items.len());
        Ok(list.items)
    }

    fn get_effect_by_name(&self, name: &str) -> Result<Effect> {
        self.get_effects()?
            .into_iter()
            .find(|effect| effect.name() == name)
            .ok_or_else(|| SignalRgbError::EffectNotFound(name.to_string()))
    }

    fn apply_effect(&self, effect_id: &str) -> Result<()> {
        debug!("Applying effect {}", effect_id);
        let request = self.request(Method::POST, &["effects", effect_id, "apply"])?;
        self.send::<IgnoredAny>(request)?;
        Ok(())
    }

    fn enabled(&self) -> Result<bool> {
        Ok(self.current_state()?.attributes.enabled)
    }

    fn set_enabled(&self, enabled: bool) -> Result<()> {
        let request = self
            .request(Method::PATCH, &["enabled"])?
            .json(&json!({ "enabled": enabled }));
        self.send::<IgnoredAny>(request)?;
        Ok(())
    }

    fn brightness(&self) -> Result<u8> {
        Ok(self.current_state()?.attributes.global_brightness)
    }

    fn set_brightness(&self, brightness: u8) -> Result<()> {
        let request = self
            .request(Method::PATCH, &["global_brightness"])?
            .json(&json!({ "global_brightness": brightness.min(100) }));
        self.send::<IgnoredAny>(request)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoints_escape_effect_ids() {
        let client = SignalRgbClient::new("192.168.1.20", DEFAULT_PORT).unwrap();
        let url = client.endpoint(&["effects", "Rainbow Wave.html", "apply"]).unwrap();
        assert_eq!(
            url.as_str(),
            "http://192.168.1.20:16038/api/v1/lighting/effects/Rainbow%20Wave.html/apply"
        );
        assert_eq!(
            client.endpoint(&[]).unwrap().as_str(),
            "http://192.168.1.20:16038/api/v1/lighting"
        );
    }

    #[test]
    fn test_invalid_hosts() {
        for host in ["", "  ", "http://desk", "desk/lights", "user@desk"] {
            assert!(
                matches!(
                    SignalRgbClient::new(host, DEFAULT_PORT),
                    Err(SignalRgbError::InvalidHost(_))
                ),
                "{host:?}"
            );
        }
        assert!(SignalRgbClient::new("desk.local", 5000).is_ok());
    }

    #[test]
    fn test_invalid_host_display() {
        let err = SignalRgbError::InvalidHost("x".into());
        assert!(err.to_string().starts_with("Invalid Host"));
        assert_eq!(
            SignalRgbError::InvalidAuthentication.to_string(),
            "Invalid Authentication"
        );
    }
}
