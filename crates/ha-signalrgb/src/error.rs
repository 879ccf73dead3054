use ha_core::{ExecutorError, HomeAssistantError};
use signalrgb_client::SignalRgbError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Error communicating with SignalRGB: {0}")]
    Api(#[from] SignalRgbError),

    #[error("Error communicating with SignalRGB: {0}")]
    Executor(#[from] ExecutorError),

    #[error("Unknown effect: {0}")]
    UnknownEffect(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl From<Error> for HomeAssistantError {
    fn from(err: Error) -> Self {
        HomeAssistantError::ActionFailed(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
