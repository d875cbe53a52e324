//! HomeGuard Wake-on-LAN relay
//!
//! Accepts wake requests over HTTP and (optionally) MQTT and turns each one
//! into a magic packet on the local network.
//!
//! # Architecture Overview
//!
//! ```text
//!     POST /wakeup ──▶ ┌──────────────┐
//!                      │ HttpListener │──┐
//!                      └──────────────┘  │    ┌───────────┐    ┌──────────────┐
//!                                        ├───▶│ mpsc(100) │───▶│  Dispatcher  │
//!                      ┌──────────────┐  │    └───────────┘    └──────┬───────┘
//!     MQTT topic ────▶ │ MqttListener │──┘                           │
//!                      └──────────────┘          DeviceDirectory ◀───┤
//!                                                                    ▼
//!                                                           UDP broadcast :9
//!
//!     Relay (lifecycle) owns the cancellation token, spawns every task and
//!     waits for them with a bounded grace period on SIGINT/SIGTERM.
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use homeguard::config::validation::validate_config;
use homeguard::config::{load_config, RelayConfig};
use homeguard::lifecycle::{build_relay, wait_for_shutdown_signal, ShutdownOutcome};
use homeguard::observability::{logging, metrics};

#[derive(Parser, Debug)]
#[command(name = "homeguard", version)]
#[command(about = "HomeGuard Wake-on-LAN relay", long_about = None)]
struct Args {
    /// Optional TOML settings file; flags override its values
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Path to the device configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// HTTP listener address
    #[arg(long)]
    http: Option<String>,

    /// MQTT broker URL (e.g., tcp://localhost:1883)
    #[arg(long)]
    mqtt_broker: Option<String>,

    /// MQTT topic to subscribe to
    #[arg(long)]
    mqtt_topic: Option<String>,

    /// MQTT client ID (default: auto-generated)
    #[arg(long)]
    mqtt_client_id: Option<String>,

    /// MQTT username
    #[arg(long, env = "HOMEGUARD_MQTT_USERNAME")]
    mqtt_username: Option<String>,

    /// MQTT password
    #[arg(long, env = "HOMEGUARD_MQTT_PASSWORD", hide_env_values = true)]
    mqtt_password: Option<String>,

    /// MQTT QoS level (0, 1, or 2)
    #[arg(long)]
    mqtt_qos: Option<u8>,

    /// Log level (debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,

    /// Log magic packets instead of sending them
    #[arg(long)]
    dry_run: bool,
}

impl Args {
    fn apply(self, config: &mut RelayConfig) {
        if let Some(path) = self.config {
            config.devices.path = path;
        }
        if let Some(http) = self.http {
            config.http.bind_address = http;
        }
        if let Some(broker) = self.mqtt_broker {
            config.mqtt.broker = Some(broker);
        }
        if let Some(topic) = self.mqtt_topic {
            config.mqtt.topic = topic;
        }
        if let Some(client_id) = self.mqtt_client_id {
            config.mqtt.client_id = Some(client_id);
        }
        if let Some(username) = self.mqtt_username {
            config.mqtt.username = Some(username);
        }
        if let Some(password) = self.mqtt_password {
            config.mqtt.password = Some(password);
        }
        if let Some(qos) = self.mqtt_qos {
            config.mqtt.qos = qos;
        }
        if let Some(level) = self.log_level {
            config.observability.log_level = level;
        }
        if self.dry_run {
            config.dispatch.dry_run = true;
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let mut args = Args::parse();

    let mut config = match args.settings.take() {
        Some(path) => match load_config(&path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Failed to load settings from {}: {}", path.display(), e);
                return ExitCode::FAILURE;
            }
        },
        None => RelayConfig::default(),
    };
    args.apply(&mut config);

    logging::init(&config.observability.log_level);

    if let Err(errors) = validate_config(&config) {
        for error in &errors {
            tracing::error!(%error, "Invalid configuration");
        }
        return ExitCode::FAILURE;
    }

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        http = %config.http.bind_address,
        mqtt_enabled = config.mqtt.enabled(),
        "Starting HomeGuard WOL Service"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let running = build_relay(&config).start();
    tracing::info!("HomeGuard WOL Service is running. Press Ctrl+C to stop.");

    wait_for_shutdown_signal().await;
    tracing::info!("Shutdown signal received, stopping services...");

    match running.shutdown().await {
        ShutdownOutcome::Graceful => tracing::info!("Shutdown complete"),
        ShutdownOutcome::TimedOut => tracing::warn!("Shutdown timed out, exiting anyway"),
    }
    ExitCode::SUCCESS
}
