//! Helpers shared by integrations
//!
//! - [`update_coordinator`] - scheduled and on-demand polling of a device
//! - [`device_info`] - device metadata attached to entities
//! - [`light`] - vocabulary of the light platform

pub mod device_info;
pub mod light;
pub mod update_coordinator;

pub use device_info::DeviceInfo;
pub use update_coordinator::{CoordinatorState, DataUpdateCoordinator, UpdateFailed, UpdateMethod};
