//! Config entry lifecycle
//!
//! ```text
//! NotLoaded ─> SetupInProgress ─┬─> Loaded ─────┐
//!                               ├─> SetupError ─┤
//!                               └─> SetupRetry ─┼─> UnloadInProgress ─┬─> NotLoaded
//!                                               │                     └─> FailedUnload
//!        SetupError | SetupRetry ─> SetupInProgress
//! ```

use std::time::Duration;

use thiserror::Error;

use crate::entry::ConfigEntryState;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("cannot move config entry from {from:?} to {to:?}")]
pub struct InvalidTransition {
    pub from: ConfigEntryState,
    pub to: ConfigEntryState,
}

impl ConfigEntryState {
    /// States reachable in one step
    pub fn successors(self) -> &'static [ConfigEntryState] {
        use ConfigEntryState::*;

        match self {
            NotLoaded => &[SetupInProgress],
            SetupInProgress => &[Loaded, SetupError, SetupRetry],
            Loaded => &[UnloadInProgress],
            SetupError | SetupRetry => &[SetupInProgress, UnloadInProgress],
            UnloadInProgress => &[NotLoaded, FailedUnload],
            FailedUnload => &[],
        }
    }

    pub fn can_transition_to(self, to: ConfigEntryState) -> bool {
        self.successors().contains(&to)
    }

    /// Validate a single lifecycle step
    pub fn try_transition(self, to: ConfigEntryState) -> Result<ConfigEntryState, InvalidTransition> {
        if self.can_transition_to(to) {
            Ok(to)
        } else {
            Err(InvalidTransition { from: self, to })
        }
    }
}

/// Delay before the next setup attempt of a not-ready entry
///
/// `2^min(tries, 4) * 5` seconds plus up to 100 ms of jitter.
pub fn calculate_retry_delay(tries: u32) -> Duration {
    let base = Duration::from_secs(5 * 2u64.pow(tries.min(4)));
    let jitter = Duration::from_millis(rand::random::<u64>() % 100);
    base + jitter
}
