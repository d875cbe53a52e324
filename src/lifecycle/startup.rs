//! Startup orchestration.
//!
//! # Responsibilities
//! - Load the device directory (a missing or broken file is not fatal)
//! - Pick the packet sender (UDP or dry run)
//! - Register the HTTP listener, plus MQTT when a broker is configured
//!
//! Nothing here binds sockets; listeners bind when the relay starts.

use std::path::Path;
use std::sync::Arc;

use crate::config::RelayConfig;
use crate::device::DeviceDirectory;
use crate::lifecycle::Relay;
use crate::listener::{HttpListener, MqttListener};
use crate::wol::{DryRunSender, UdpWakeSender, WakeSender};

/// Load the device directory, degrading to direct-address mode on failure.
pub fn load_directory(path: &Path) -> Option<Arc<DeviceDirectory>> {
    match DeviceDirectory::load(path) {
        Ok(directory) => {
            tracing::info!(
                path = %path.display(),
                devices = directory.len(),
                "Loaded device configuration"
            );
            for device in directory.list_all() {
                tracing::debug!(
                    name = %device.name,
                    mac = %device.mac,
                    broadcast = %device.broadcast,
                    description = device.description.as_deref().unwrap_or_default(),
                    "Configured device"
                );
            }
            Some(Arc::new(directory))
        }
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "Failed to load device configuration, device names will not resolve"
            );
            None
        }
    }
}

/// Sender used for outbound magic packets.
pub fn build_sender(dry_run: bool) -> Arc<dyn WakeSender> {
    if dry_run {
        tracing::warn!("Dry run enabled, magic packets will only be logged");
        Arc::new(DryRunSender)
    } else {
        Arc::new(UdpWakeSender::new())
    }
}

/// Assemble an unstarted relay from configuration.
pub fn build_relay(config: &RelayConfig) -> Relay {
    let directory = load_directory(&config.devices.path);
    let sender = build_sender(config.dispatch.dry_run);

    let mut relay = Relay::new(
        directory,
        sender,
        config.dispatch.queue_capacity,
        config.shutdown.grace_period(),
    )
    .with_listener(Arc::new(HttpListener::new(&config.http)));

    if config.mqtt.enabled() {
        relay = relay.with_listener(Arc::new(MqttListener::new(config.mqtt.clone())));
    } else {
        tracing::info!("No MQTT broker configured, MQTT listener disabled");
    }

    relay
}
