//! Inbound request listeners.
//!
//! # Data Flow
//! ```text
//! HTTP POST/GET /wakeup ──▶ http.rs ──(blocking send, cancellable)──┐
//!                                                                   ├─▶ mpsc queue ─▶ dispatcher
//! MQTT publish on topic ──▶ mqtt.rs ──(try_send, drop when full)────┘
//! ```
//!
//! # Design Decisions
//! - Every transport implements [`Listener`]; the dispatcher never sees transports
//! - Validation happens here, so only well-formed requests are enqueued
//! - `stop()` is idempotent and safe after `start()` has returned

pub mod http;
pub mod mqtt;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::request::WakeRequest;

pub use http::HttpListener;
pub use mqtt::MqttListener;

/// Sending half of the shared request queue.
pub type RequestQueue = mpsc::Sender<WakeRequest>;

/// Transport-level listener failures.
#[derive(Debug, Error)]
pub enum ListenerError {
    /// The listen socket could not be bound.
    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    /// The HTTP server stopped with an I/O error.
    #[error("HTTP server error: {0}")]
    Serve(#[source] std::io::Error),

    /// The broker connection could not be used.
    #[error("MQTT broker error: {0}")]
    Broker(String),

    /// The listener settings are unusable.
    #[error("invalid listener configuration: {0}")]
    InvalidConfig(String),
}

/// A source of wake requests.
#[async_trait]
pub trait Listener: Send + Sync {
    /// Stable identifier used for logging and request attribution.
    fn name(&self) -> &'static str;

    /// Run until `cancel` fires or the transport fails. This is a task body.
    async fn start(
        &self,
        cancel: CancellationToken,
        queue: RequestQueue,
    ) -> Result<(), ListenerError>;

    /// Ask the transport to shut down gracefully. Idempotent.
    async fn stop(&self) -> Result<(), ListenerError>;
}
