//! Immutable name → address lookup table.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while building or querying the directory.
#[derive(Debug, Error)]
pub enum DeviceError {
    /// The device file could not be read.
    #[error("failed to read device file: {0}")]
    Io(#[from] std::io::Error),

    /// The device file is not valid YAML for the expected shape.
    #[error("failed to parse device file: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// An entry is missing a required field.
    #[error("invalid device configuration: {0}")]
    InvalidConfig(String),

    /// No device is registered under the requested name.
    #[error("device not found: {0}")]
    NotFound(String),
}

/// A machine that can be woken by name.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Device {
    pub name: String,
    pub mac: String,
    pub broadcast: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Device {
    pub fn new(
        name: impl Into<String>,
        mac: impl Into<String>,
        broadcast: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            mac: mac.into(),
            broadcast: broadcast.into(),
            description: None,
        }
    }

    fn validate(&self) -> Result<(), DeviceError> {
        if self.name.is_empty() {
            return Err(DeviceError::InvalidConfig(
                "device name cannot be empty".to_string(),
            ));
        }
        if self.mac.is_empty() {
            return Err(DeviceError::InvalidConfig(format!(
                "device MAC address cannot be empty for device: {}",
                self.name
            )));
        }
        if self.broadcast.is_empty() {
            return Err(DeviceError::InvalidConfig(format!(
                "device broadcast address cannot be empty for device: {}",
                self.name
            )));
        }
        Ok(())
    }
}

/// On-disk layout of the device file.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct DeviceFile {
    #[serde(default)]
    pub devices: Vec<Device>,
}

/// Read-only mapping from device name to [`Device`].
#[derive(Debug, Clone, Default)]
pub struct DeviceDirectory {
    devices: BTreeMap<String, Device>,
}

impl DeviceDirectory {
    /// Load and validate the YAML device file at `path`.
    pub fn load(path: &Path) -> Result<Self, DeviceError> {
        let content = fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Build a directory from YAML text.
    pub fn from_yaml(content: &str) -> Result<Self, DeviceError> {
        let file: DeviceFile = serde_yaml::from_str(content)?;
        Self::from_devices(file.devices)
    }

    /// Build a directory, failing on the first invalid entry.
    pub fn from_devices(devices: impl IntoIterator<Item = Device>) -> Result<Self, DeviceError> {
        let mut map = BTreeMap::new();
        for device in devices {
            device.validate()?;
            if let Some(previous) = map.insert(device.name.clone(), device) {
                tracing::warn!(
                    device = %previous.name,
                    "Duplicate device name, later entry replaces earlier one"
                );
            }
        }
        Ok(Self { devices: map })
    }

    /// Look up a device by name.
    pub fn resolve(&self, name: &str) -> Result<&Device, DeviceError> {
        self.devices
            .get(name)
            .ok_or_else(|| DeviceError::NotFound(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.devices.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Snapshot of every registered device, ordered by name.
    pub fn list_all(&self) -> Vec<&Device> {
        self.devices.values().collect()
    }
}
