//! Client for the SignalRGB local lighting API
//!
//! SignalRGB exposes its lighting state on `http://{host}:16038/api/v1/lighting`.
//! [`SignalRgbClient`] speaks that API with a blocking HTTP client;
//! [`EffectsService`] is the interface integrations program against.

mod client;
mod error;
pub mod model;
mod service;

pub use client::{SignalRgbClient, DEFAULT_PORT, DEFAULT_TIMEOUT};
pub use error::{Result, SignalRgbError};
pub use model::{CurrentState, CurrentStateAttributes, Effect, EffectAttributes};
pub use service::EffectsService;
