//! Wake request model shared by every listener, the dispatcher and `wolctl`.
//!
//! # Data Flow
//! ```text
//! HTTP body / query / form ─┐
//!                           ├─▶ WakePayload ─▶ WakeRequest::new (validate) ─▶ queue
//! MQTT JSON message ────────┘
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Message returned to callers whose request names neither a device nor a
/// complete mac/broadcast pair.
pub const INVALID_REQUEST_MESSAGE: &str =
    "Must provide either 'device' or both 'mac' and 'broadcast'";

/// Rejection of an inbound request at the listener boundary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Neither a device name nor a full mac/broadcast pair was supplied.
    #[error("{}", INVALID_REQUEST_MESSAGE)]
    MissingTarget,
}

/// Wire shape of a wake request: `{device?, mac?, broadcast?}`.
///
/// Missing and `null` fields deserialize to empty strings; empty fields are
/// left out when serializing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct WakePayload {
    #[serde(deserialize_with = "null_as_empty", skip_serializing_if = "String::is_empty")]
    pub device: String,
    #[serde(deserialize_with = "null_as_empty", skip_serializing_if = "String::is_empty")]
    pub mac: String,
    #[serde(deserialize_with = "null_as_empty", skip_serializing_if = "String::is_empty")]
    pub broadcast: String,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

impl WakePayload {
    /// Payload that wakes a configured device by name.
    pub fn for_device(name: impl Into<String>) -> Self {
        Self {
            device: name.into(),
            ..Self::default()
        }
    }

    /// Payload that wakes a machine by its address pair.
    pub fn for_address(mac: impl Into<String>, broadcast: impl Into<String>) -> Self {
        Self {
            device: String::new(),
            mac: mac.into(),
            broadcast: broadcast.into(),
        }
    }

    /// Apply the presence rule without building a request.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.device.is_empty() && (self.mac.is_empty() || self.broadcast.is_empty()) {
            return Err(ValidationError::MissingTarget);
        }
        Ok(())
    }
}

/// A validated wake request, attributed to the listener that received it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WakeRequest {
    /// Device name for directory lookup.
    pub device_name: Option<String>,
    /// Hardware address, used only when no device name is given.
    pub hardware_address: Option<String>,
    /// Broadcast address, used only when no device name is given.
    pub broadcast_address: Option<String>,
    /// Name of the listener that produced the request (`"HTTP"`, `"MQTT"`).
    pub source: &'static str,
}

impl WakeRequest {
    /// Normalize a payload into a request, enforcing the presence invariant.
    pub fn new(source: &'static str, payload: WakePayload) -> Result<Self, ValidationError> {
        payload.validate()?;
        Ok(Self {
            device_name: non_empty(payload.device),
            hardware_address: non_empty(payload.mac),
            broadcast_address: non_empty(payload.broadcast),
            source,
        })
    }
}

fn non_empty(value: String) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}
