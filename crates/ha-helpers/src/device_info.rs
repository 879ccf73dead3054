//! Device metadata attached to entities

use serde::{Deserialize, Serialize};

/// Describes the physical or logical device behind an entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    /// (domain, id) pairs identifying the device
    pub identifiers: Vec<(String, String)>,
    pub name: String,
    pub manufacturer: String,
    pub model: String,
}

impl DeviceInfo {
    pub fn new(
        identifier: (impl Into<String>, impl Into<String>),
        name: impl Into<String>,
    ) -> Self {
        Self {
            identifiers: vec![(identifier.0.into(), identifier.1.into())],
            name: name.into(),
            manufacturer: String::new(),
            model: String::new(),
        }
    }

    pub fn with_manufacturer(mut self, manufacturer: impl Into<String>) -> Self {
        self.manufacturer = manufacturer.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }
}
