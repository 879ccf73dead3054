use thiserror::Error;

/// Every failure of the SignalRGB API
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SignalRgbError {
    /// The API rejected the request (HTTP 401/403)
    #[error("Invalid Authentication")]
    InvalidAuthentication,

    /// The host/port pair does not form a usable URL
    #[error("Invalid Host: {0}")]
    InvalidHost(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    /// The API answered with an error envelope or status
    #[error("API error {status}: {title}")]
    Api {
        status: u16,
        title: String,
        detail: Option<String>,
    },

    #[error("Effect not found: {0}")]
    EffectNotFound(String),

    /// The response body did not match the expected shape
    #[error("Invalid response: {0}")]
    Decode(String),
}

impl SignalRgbError {
    /// Whether the device could not be reached at all
    pub fn is_connection_error(&self) -> bool {
        matches!(self, Self::Connection(_) | Self::Timeout(_))
    }
}

impl From<reqwest::Error> for SignalRgbError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(err.to_string())
        } else if err.is_builder() {
            Self::InvalidHost(err.to_string())
        } else if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::Connection(err.to_string())
        }
    }
}

pub type Result<T> = std::result::Result<T, SignalRgbError>;
