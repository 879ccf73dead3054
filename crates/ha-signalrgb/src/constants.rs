//! Constants of the SignalRGB integration

use std::time::Duration;

pub use signalrgb_client::DEFAULT_PORT;

pub const DOMAIN: &str = "signalrgb";

pub const MANUFACTURER: &str = "WhirlwindFX";
pub const MODEL: &str = "SignalRGB";

/// Coordinator polling period
pub const UPDATE_INTERVAL: Duration = Duration::from_secs(300);

/// Effect that stands for "off" when power is modeled as an effect
pub const DEFAULT_OFF_EFFECT: &str = "All Off";

/// Effect applied when turning on with no effect to resume
pub const DEFAULT_EFFECT: &str = "Solid Color";

/// Wait before refreshing after a turn off, while SignalRGB settles
pub const OFF_GRACE_DELAY: Duration = Duration::from_millis(500);
