use crate::error::Result;
use crate::model::Effect;

/// Operations of a SignalRGB instance
///
/// Calls block on network I/O; async callers run them on an executor.
pub trait EffectsService: Send + Sync {
    /// The effect currently running
    fn get_current_effect(&self) -> Result<Effect>;

    /// All installed effects, in API order
    fn get_effects(&self) -> Result<Vec<Effect>>;

    /// Look an effect up by display name
    ///
    /// Fails with [`SignalRgbError::EffectNotFound`](crate::SignalRgbError::EffectNotFound)
    /// when no effect has that name.
    fn get_effect_by_name(&self, name: &str) -> Result<Effect>;

    fn apply_effect(&self, effect_id: &str) -> Result<()>;

    fn enabled(&self) -> Result<bool>;

    fn set_enabled(&self, enabled: bool) -> Result<()>;

    /// Global brightness, 0..=100
    fn brightness(&self) -> Result<u8>;

    /// Set global brightness, 0..=100
    fn set_brightness(&self, brightness: u8) -> Result<()>;
}
