//! Config flow for SignalRGB

use std::collections::HashMap;

use async_trait::async_trait;
use ha_config_entries::{ConfigFlow, FlowContext, FlowStep, FormField, STEP_USER};
use ha_core::const_keys::{CONF_HOST, CONF_PORT};
use ha_core::{ExecutorError, HomeAssistant};
use serde_json::{Map, Value};
use signalrgb_client::SignalRgbError;
use tracing::{debug, error, warn};

use crate::constants::DEFAULT_PORT;
use crate::coordinator::call_client;
use crate::error::Error;
use crate::options::SignalRgbOptions;
use crate::ClientFactory;

pub const ERROR_CANNOT_CONNECT: &str = "cannot_connect";
pub const ERROR_INVALID_AUTH: &str = "invalid_auth";
pub const ERROR_INVALID_HOST: &str = "invalid_host";
pub const ERROR_INVALID_INPUT: &str = "invalid_input";
pub const ERROR_UNKNOWN: &str = "unknown";

const ERROR_BASE: &str = "base";

/// Host and port of one SignalRGB instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostInput {
    pub host: String,
    pub port: u16,
}

impl HostInput {
    /// Read host and port from form input; the port defaults to 16038
    pub fn parse(input: &Map<String, Value>) -> Option<Self> {
        let host = input.get(CONF_HOST)?.as_str()?.trim();
        if host.is_empty() {
            return None;
        }
        let port = match input.get(CONF_PORT) {
            None | Some(Value::Null) => DEFAULT_PORT,
            Some(port) => port.as_u64().and_then(|p| u16::try_from(p).ok())?,
        };
        if port == 0 {
            return None;
        }
        Some(Self {
            host: host.to_string(),
            port,
        })
    }

    pub fn unique_id(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn to_data(&self) -> Map<String, Value> {
        let mut data = Map::new();
        data.insert(CONF_HOST.to_string(), Value::from(self.host.clone()));
        data.insert(CONF_PORT.to_string(), Value::from(self.port));
        data
    }
}

/// Form error key for a failed validation
pub fn error_key(err: &Error) -> &'static str {
    match err {
        Error::Api(SignalRgbError::InvalidAuthentication) => ERROR_INVALID_AUTH,
        Error::Api(SignalRgbError::InvalidHost(_)) => ERROR_INVALID_HOST,
        Error::Api(_) | Error::Executor(ExecutorError::Timeout(_)) => ERROR_CANNOT_CONNECT,
        Error::Executor(_) | Error::UnknownEffect(_) | Error::InvalidConfig(_) => ERROR_UNKNOWN,
    }
}

pub struct SignalRgbConfigFlow {
    hass: HomeAssistant,
    client_factory: ClientFactory,
    options: SignalRgbOptions,
}

impl SignalRgbConfigFlow {
    pub fn new(hass: HomeAssistant, client_factory: ClientFactory, options: SignalRgbOptions) -> Self {
        Self {
            hass,
            client_factory,
            options,
        }
    }

    fn data_schema() -> Vec<FormField> {
        vec![
            FormField::string(CONF_HOST).required(),
            FormField::integer(CONF_PORT).with_default(DEFAULT_PORT),
        ]
    }

    fn show_form(errors: HashMap<String, String>) -> FlowStep {
        FlowStep::form(STEP_USER, Self::data_schema(), errors)
    }

    fn form_error(key: &str) -> FlowStep {
        Self::show_form(HashMap::from([(ERROR_BASE.to_string(), key.to_string())]))
    }

    /// Talk to the instance once
    async fn validate_input(&self, input: &HostInput) -> Result<(), Error> {
        let client = (self.client_factory)(&input.host, input.port, &self.options)?;
        let effect = call_client(&self.hass, &client, |c| c.get_current_effect()).await?;
        debug!("Validated {}, running {}", input.unique_id(), effect.name());
        Ok(())
    }
}

#[async_trait]
impl ConfigFlow for SignalRgbConfigFlow {
    async fn step_user(
        &mut self,
        ctx: &mut FlowContext,
        user_input: Option<Map<String, Value>>,
    ) -> FlowStep {
        let Some(user_input) = user_input else {
            return Self::show_form(HashMap::new());
        };
        let Some(input) = HostInput::parse(&user_input) else {
            return Self::form_error(ERROR_INVALID_INPUT);
        };

        ctx.set_unique_id(input.unique_id());
        if let Some(abort) = ctx.abort_if_unique_id_configured() {
            return abort;
        }

        if let Err(err) = self.validate_input(&input).await {
            let key = error_key(&err);
            if key == ERROR_UNKNOWN {
                error!("Unexpected error validating {}: {}", input.unique_id(), err);
            } else {
                warn!("Cannot validate {}: {}", input.unique_id(), err);
            }
            return Self::form_error(key);
        }

        FlowStep::create_entry(input.host.clone(), input.to_data())
    }

    /// Imported hosts are not contacted; setup retries until they answer
    async fn step_import(&mut self, ctx: &mut FlowContext, import_data: Map<String, Value>) -> FlowStep {
        let Some(input) = HostInput::parse(&import_data) else {
            return FlowStep::abort(ERROR_INVALID_INPUT);
        };

        ctx.set_unique_id(input.unique_id());
        if let Some(abort) = ctx.abort_if_unique_id_configured() {
            return abort;
        }
        FlowStep::create_entry(input.host.clone(), input.to_data())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;

    fn input(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_parse_host_input() {
        let parsed = HostInput::parse(&input(json!({"host": " 1.1.1.1 ", "port": 5000}))).unwrap();
        assert_eq!(parsed.host, "1.1.1.1");
        assert_eq!(parsed.port, 5000);
        assert_eq!(parsed.unique_id(), "1.1.1.1:5000");
        assert_eq!(
            Value::Object(parsed.to_data()),
            json!({"host": "1.1.1.1", "port": 5000})
        );

        let defaulted = HostInput::parse(&input(json!({"host": "desk"}))).unwrap();
        assert_eq!(defaulted.port, 16038);
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert_eq!(HostInput::parse(&input(json!({}))), None);
        assert_eq!(HostInput::parse(&input(json!({"host": "  "}))), None);
        assert_eq!(HostInput::parse(&input(json!({"host": "a", "port": 70000}))), None);
        assert_eq!(HostInput::parse(&input(json!({"host": "a", "port": "80"}))), None);
        assert_eq!(HostInput::parse(&input(json!({"host": "a", "port": 0}))), None);
    }

    #[test]
    fn test_error_keys() {
        let cases = [
            (Error::Api(SignalRgbError::InvalidAuthentication), ERROR_INVALID_AUTH),
            (
                Error::Api(SignalRgbError::InvalidHost("x".to_string())),
                ERROR_INVALID_HOST,
            ),
            (
                Error::Api(SignalRgbError::Connection("refused".to_string())),
                ERROR_CANNOT_CONNECT,
            ),
            (
                Error::Executor(ExecutorError::Timeout(Duration::from_secs(1))),
                ERROR_CANNOT_CONNECT,
            ),
            (
                Error::Executor(ExecutorError::JobFailed("panic".to_string())),
                ERROR_UNKNOWN,
            ),
        ];
        for (err, key) in cases {
            assert_eq!(error_key(&err), key, "{err}");
        }
    }
}
