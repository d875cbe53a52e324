//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the relay.
//! All types derive Serde traits for deserialization from the settings file.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for the wake relay.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct RelayConfig {
    /// HTTP listener settings.
    pub http: HttpConfig,

    /// MQTT listener settings (disabled unless a broker is set).
    pub mqtt: MqttConfig,

    /// Device directory source.
    pub devices: DevicesConfig,

    /// Request queue and packet sending.
    pub dispatch: DispatchConfig,

    /// Shutdown behavior.
    pub shutdown: ShutdownConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// HTTP listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Bind address. A leading `:` (e.g. ":7092") binds all interfaces.
    pub bind_address: String,

    /// Maximum accepted request body size.
    pub body_limit_bytes: usize,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind_address: ":7092".to_string(),
            body_limit_bytes: 64 * 1024,
        }
    }
}

impl HttpConfig {
    /// Bind address in a form `SocketAddr` parsing accepts.
    pub fn socket_address(&self) -> String {
        normalize_bind_address(&self.bind_address)
    }
}

/// Expand Go-style ":port" addresses to "0.0.0.0:port".
pub fn normalize_bind_address(addr: &str) -> String {
    if addr.starts_with(':') {
        format!("0.0.0.0{}", addr)
    } else {
        addr.to_string()
    }
}

/// MQTT listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MqttConfig {
    /// Broker URL (e.g., "tcp://localhost:1883"). `None` disables the listener.
    pub broker: Option<String>,

    /// Topic to subscribe to.
    pub topic: String,

    /// Client identifier; generated from the current time when unset.
    pub client_id: Option<String>,

    pub username: Option<String>,

    pub password: Option<String>,

    /// Delivery quality (0, 1 or 2). Larger values fall back to 1.
    pub qos: u8,

    /// Keep-alive interval in seconds.
    pub keep_alive_secs: u64,

    /// Delay between attempts until the first connection succeeds.
    pub connect_retry_secs: u64,

    /// Upper bound for reconnect backoff after a lost connection.
    pub max_reconnect_secs: u64,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            broker: None,
            topic: "homeguard/wakeup".to_string(),
            client_id: None,
            username: None,
            password: None,
            qos: 1,
            keep_alive_secs: 30,
            connect_retry_secs: 5,
            max_reconnect_secs: 60,
        }
    }
}

impl MqttConfig {
    pub fn enabled(&self) -> bool {
        self.broker.as_deref().is_some_and(|b| !b.is_empty())
    }
}

/// Device directory source.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DevicesConfig {
    /// Path to the YAML device file.
    pub path: PathBuf,
}

impl Default for DevicesConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("config.yaml"),
        }
    }
}

/// Request queue and sender configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Capacity of the shared request queue.
    pub queue_capacity: usize,

    /// Log packets instead of sending them.
    pub dry_run: bool,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 100,
            dry_run: false,
        }
    }
}

/// Shutdown configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ShutdownConfig {
    /// How long to wait for tasks after cancellation.
    pub grace_secs: u64,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self { grace_secs: 5 }
    }
}

impl ShutdownConfig {
    pub fn grace_period(&self) -> Duration {
        Duration::from_secs(self.grace_secs)
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RelayConfig::default();
        assert_eq!(config.http.bind_address, ":7092");
        assert_eq!(config.http.socket_address(), "0.0.0.0:7092");
        assert_eq!(config.mqtt.topic, "homeguard/wakeup");
        assert_eq!(config.mqtt.qos, 1);
        assert!(!config.mqtt.enabled());
        assert_eq!(config.dispatch.queue_capacity, 100);
        assert_eq!(config.shutdown.grace_period(), Duration::from_secs(5));
        assert_eq!(config.devices.path, PathBuf::from("config.yaml"));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: RelayConfig = toml::from_str(
            r#"
            [mqtt]
            broker = "tcp://broker.local:1883"
            qos = 2

            [dispatch]
            dry_run = true
            "#,
        )
        .unwrap();
        assert!(config.mqtt.enabled());
        assert_eq!(config.mqtt.qos, 2);
        assert_eq!(config.mqtt.topic, "homeguard/wakeup");
        assert!(config.dispatch.dry_run);
        assert_eq!(config.dispatch.queue_capacity, 100);
    }

    #[test]
    fn test_normalize_bind_address() {
        assert_eq!(normalize_bind_address(":8080"), "0.0.0.0:8080");
        assert_eq!(normalize_bind_address("127.0.0.1:8080"), "127.0.0.1:8080");
    }
}
