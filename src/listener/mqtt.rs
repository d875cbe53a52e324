//! MQTT (message bus) listener.
//!
//! # Responsibilities
//! - Keep a broker session alive, reconnecting indefinitely
//! - Re-subscribe to the topic on every `ConnAck`
//! - Turn JSON publishes into queued wake requests
//!
//! # Design Decisions
//! - Enqueue never waits: a full queue drops the message (at-most-once)
//! - Malformed or incomplete messages are logged and dropped
//! - Fixed retry interval until the first connection, capped exponential
//!   backoff after a connection is lost
//! - `stop()` ends the session loop on its own, like process cancellation

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Outgoing, Packet, QoS};
use tokio::sync::mpsc::error::TrySendError;
use tokio_util::sync::CancellationToken;
use tracing::Span;

use crate::config::schema::MqttConfig;
use crate::listener::{Listener, ListenerError, RequestQueue};
use crate::observability::metrics;
use crate::request::{WakePayload, WakeRequest};
use crate::resilience::calculate_backoff;

pub const MQTT_LISTENER: &str = "MQTT";

const DEFAULT_BROKER_PORT: u16 = 1883;
const CLIENT_REQUEST_CAPACITY: usize = 10;
const DISCONNECT_GRACE: Duration = Duration::from_millis(250);
const RECONNECT_BASE: Duration = Duration::from_secs(1);

/// Default client identifier: `wol-mqtt-<unix seconds>`.
pub fn timestamp_client_id() -> String {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default();
    format!("wol-mqtt-{}", secs)
}

/// Map a configured level onto a QoS, treating anything above 2 as 1.
pub fn qos_level(level: u8) -> QoS {
    match level {
        0 => QoS::AtMostOnce,
        2 => QoS::ExactlyOnce,
        _ => QoS::AtLeastOnce,
    }
}

/// Split a broker URL (`tcp://host:port`, `mqtt://host:port` or `host:port`)
/// into host and port.
pub fn parse_broker(broker: &str) -> Result<(String, u16), ListenerError> {
    let with_scheme = if broker.contains("://") {
        broker.to_string()
    } else {
        format!("tcp://{}", broker)
    };

    let url = url::Url::parse(&with_scheme)
        .map_err(|e| ListenerError::InvalidConfig(format!("invalid broker '{}': {}", broker, e)))?;

    match url.scheme() {
        "tcp" | "mqtt" => {}
        other => {
            return Err(ListenerError::InvalidConfig(format!(
                "unsupported broker scheme '{}'",
                other
            )))
        }
    }

    let host = url
        .host_str()
        .filter(|h| !h.is_empty())
        .ok_or_else(|| ListenerError::InvalidConfig(format!("broker '{}' has no host", broker)))?
        .trim_start_matches('[')
        .trim_end_matches(']')
        .to_string();

    Ok((host, url.port().unwrap_or(DEFAULT_BROKER_PORT)))
}

/// Message bus transport for wake requests.
pub struct MqttListener {
    config: MqttConfig,
    client_id: String,
    qos: QoS,
    client: Mutex<Option<AsyncClient>>,
    connected: AtomicBool,
    shutdown: CancellationToken,
    span: Span,
}

impl MqttListener {
    pub fn new(config: MqttConfig) -> Self {
        Self::with_client_id_generator(config, timestamp_client_id)
    }

    /// Build a listener whose fallback client id comes from `generate`.
    ///
    /// `generate` runs only when the configuration has no client id.
    pub fn with_client_id_generator(config: MqttConfig, generate: impl FnOnce() -> String) -> Self {
        let span = tracing::info_span!("listener", listener = MQTT_LISTENER);

        let client_id = match config.client_id.as_deref() {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => generate(),
        };

        if config.qos > 2 {
            tracing::warn!(parent: &span, qos = config.qos, "Invalid QoS level, using 1");
        }
        let qos = qos_level(config.qos);

        Self {
            config,
            client_id,
            qos,
            client: Mutex::new(None),
            connected: AtomicBool::new(false),
            shutdown: CancellationToken::new(),
            span,
        }
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn qos(&self) -> QoS {
        self.qos
    }

    fn client_slot(&self) -> MutexGuard<'_, Option<AsyncClient>> {
        self.client.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn options(&self) -> Result<MqttOptions, ListenerError> {
        let broker = self
            .config
            .broker
            .as_deref()
            .ok_or_else(|| ListenerError::InvalidConfig("no MQTT broker configured".to_string()))?;
        let (host, port) = parse_broker(broker)?;

        let mut options = MqttOptions::new(self.client_id.clone(), host, port);
        options.set_clean_session(true);
        options.set_keep_alive(Duration::from_secs(self.config.keep_alive_secs.max(5)));

        let username = self.config.username.clone().unwrap_or_default();
        let password = self.config.password.clone().unwrap_or_default();
        if !username.is_empty() || !password.is_empty() {
            options.set_credentials(username, password);
        }

        Ok(options)
    }

    /// Parse, validate and enqueue one publish. Never waits on the queue.
    pub fn handle_message(
        &self,
        topic: &str,
        payload: &[u8],
        cancel: &CancellationToken,
        queue: &RequestQueue,
    ) {
        let text = String::from_utf8_lossy(payload);
        tracing::debug!(parent: &self.span, topic = %topic, payload = %text, "Received MQTT message");

        let parsed: WakePayload = match serde_json::from_slice(payload) {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::error!(
                    parent: &self.span,
                    error = %e,
                    payload = %text,
                    "Failed to parse MQTT payload"
                );
                metrics::record_request_rejected(MQTT_LISTENER, "invalid_json");
                return;
            }
        };

        let request = match WakeRequest::new(MQTT_LISTENER, parsed) {
            Ok(request) => request,
            Err(_) => {
                tracing::error!(
                    parent: &self.span,
                    payload = %text,
                    "Invalid MQTT message: must provide either device name or both mac and broadcast"
                );
                metrics::record_request_rejected(MQTT_LISTENER, "validation");
                return;
            }
        };

        if cancel.is_cancelled() {
            tracing::info!(parent: &self.span, "Context canceled while processing message");
            metrics::record_request_dropped(MQTT_LISTENER, "shutting_down");
            return;
        }

        let device = request.device_name.clone().unwrap_or_default();
        let mac = request.hardware_address.clone().unwrap_or_default();
        let broadcast = request.broadcast_address.clone().unwrap_or_default();

        match queue.try_send(request) {
            Ok(()) => {
                tracing::info!(
                    parent: &self.span,
                    device = %device,
                    mac = %mac,
                    broadcast = %broadcast,
                    "Processed MQTT wakeup request"
                );
                metrics::record_request_received(MQTT_LISTENER);
            }
            Err(TrySendError::Full(_)) => {
                tracing::warn!(parent: &self.span, device = %device, mac = %mac, "Channel full, dropping message");
                metrics::record_request_dropped(MQTT_LISTENER, "queue_full");
            }
            Err(TrySendError::Closed(_)) => {
                tracing::info!(parent: &self.span, "Request queue closed, dropping message");
                metrics::record_request_dropped(MQTT_LISTENER, "shutting_down");
            }
        }
    }

    fn on_connected(&self, client: &AsyncClient) {
        self.connected.store(true, Ordering::SeqCst);
        tracing::info!(
            parent: &self.span,
            broker = self.config.broker.as_deref().unwrap_or_default(),
            "Connected to MQTT broker"
        );

        match client.try_subscribe(self.config.topic.clone(), self.qos) {
            Ok(()) => tracing::info!(
                parent: &self.span,
                topic = %self.config.topic,
                qos = ?self.qos,
                "Subscribed to topic"
            ),
            Err(e) => tracing::error!(
                parent: &self.span,
                topic = %self.config.topic,
                error = %e,
                "Failed to subscribe to topic"
            ),
        }
    }

    /// Drive the event loop briefly so queued unsubscribe/disconnect
    /// requests reach the broker.
    async fn flush(&self, eventloop: &mut EventLoop) {
        if !self.connected.swap(false, Ordering::SeqCst) {
            return;
        }

        let drained = tokio::time::timeout(DISCONNECT_GRACE, async {
            loop {
                match eventloop.poll().await {
                    Ok(Event::Outgoing(Outgoing::Disconnect)) | Err(_) => break,
                    Ok(_) => {}
                }
            }
        })
        .await;

        if drained.is_err() {
            tracing::debug!(parent: &self.span, "Disconnect grace window elapsed");
        }
    }
}

#[async_trait]
impl Listener for MqttListener {
    fn name(&self) -> &'static str {
        MQTT_LISTENER
    }

    async fn start(
        &self,
        cancel: CancellationToken,
        queue: RequestQueue,
    ) -> Result<(), ListenerError> {
        let options = self.options()?;
        let (client, mut eventloop) = AsyncClient::new(options, CLIENT_REQUEST_CAPACITY);
        *self.client_slot() = Some(client.clone());

        let connect_retry = Duration::from_secs(self.config.connect_retry_secs);
        let max_reconnect = Duration::from_secs(self.config.max_reconnect_secs).max(RECONNECT_BASE);
        let mut ever_connected = false;
        let mut failures: u32 = 0;

        tracing::info!(
            parent: &self.span,
            broker = self.config.broker.as_deref().unwrap_or_default(),
            client_id = %self.client_id,
            "Connecting to MQTT broker"
        );

        loop {
            let event = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = self.shutdown.cancelled() => break,
                event = eventloop.poll() => event,
            };

            match event {
                Ok(Event::Incoming(Packet::ConnAck(_))) => {
                    ever_connected = true;
                    failures = 0;
                    self.on_connected(&client);
                }
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    self.handle_message(&publish.topic, &publish.payload, &cancel, &queue);
                }
                Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                    self.connected.store(false, Ordering::SeqCst);
                    break;
                }
                Ok(_) => {}
                Err(e) => {
                    let was_connected = self.connected.swap(false, Ordering::SeqCst);
                    let delay = if ever_connected {
                        failures = failures.saturating_add(1);
                        calculate_backoff(failures, RECONNECT_BASE, max_reconnect)
                    } else {
                        connect_retry
                    };

                    if was_connected {
                        tracing::error!(parent: &self.span, error = %e, "MQTT connection lost");
                    } else {
                        tracing::warn!(
                            parent: &self.span,
                            error = %e,
                            retry_in = ?delay,
                            "MQTT connection attempt failed"
                        );
                    }

                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => break,
                        _ = self.shutdown.cancelled() => break,
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }

        if cancel.is_cancelled() {
            tracing::info!(parent: &self.span, "MQTT listener context canceled");
        }
        self.stop().await?;
        self.flush(&mut eventloop).await;
        Ok(())
    }

    async fn stop(&self) -> Result<(), ListenerError> {
        self.shutdown.cancel();
        let Some(client) = self.client_slot().take() else {
            return Ok(());
        };

        if self.connected.load(Ordering::SeqCst) {
            if let Err(e) = client.try_unsubscribe(self.config.topic.clone()) {
                tracing::error!(parent: &self.span, error = %e, "Failed to unsubscribe from topic");
            }
            if let Err(e) = client.try_disconnect() {
                tracing::warn!(parent: &self.span, error = %e, "Failed to request disconnect");
            }
            tracing::info!(parent: &self.span, "MQTT listener stopped");
        }

        Ok(())
    }
}
