//! HTTP listener.
//!
//! # Endpoints
//! - `GET|POST /wakeup`: JSON body when `Content-Type: application/json`,
//!   otherwise form body and query parameters (`device`, `mac`, `broadcast`)
//! - `GET /health`: liveness probe
//!
//! The handler blocks on the queue until it accepts the request or the relay
//! shuts down, so callers feel backpressure directly.

use async_trait::async_trait;
use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::{any, get},
    Router,
};
use thiserror::Error;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower::ServiceBuilder;
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};
use tracing::Span;

use crate::config::schema::{normalize_bind_address, HttpConfig};
use crate::listener::{Listener, ListenerError, RequestQueue};
use crate::observability::metrics;
use crate::request::{WakePayload, WakeRequest};

pub const HTTP_LISTENER: &str = "HTTP";

const ACCEPTED: &str = "Wakeup request received";
const SHUTTING_DOWN: &str = "Server shutting down";
const MALFORMED_FORM: &str = "Failed to parse form";

/// A query string or form body that is not valid urlencoded UTF-8.
#[derive(Debug, Error)]
#[error("malformed urlencoded data")]
struct MalformedForm;

/// State injected into handlers.
#[derive(Clone)]
struct AppState {
    queue: RequestQueue,
    cancel: CancellationToken,
    span: Span,
}

/// HTTP transport for wake requests.
pub struct HttpListener {
    bind_address: String,
    body_limit: usize,
    shutdown: CancellationToken,
    span: Span,
}

impl HttpListener {
    pub fn new(config: &HttpConfig) -> Self {
        Self {
            bind_address: normalize_bind_address(&config.bind_address),
            body_limit: config.body_limit_bytes,
            shutdown: CancellationToken::new(),
            span: tracing::info_span!("listener", listener = HTTP_LISTENER),
        }
    }

    pub fn bind_address(&self) -> &str {
        &self.bind_address
    }

    /// Router whose handlers log under this listener's span.
    pub fn router(&self, queue: RequestQueue, cancel: CancellationToken) -> Router {
        wakeup_router(queue, cancel, self.body_limit, self.span.clone())
    }
}

/// Build the router serving `/wakeup` and `/health`.
pub fn wakeup_router(
    queue: RequestQueue,
    cancel: CancellationToken,
    body_limit: usize,
    span: Span,
) -> Router {
    let state = AppState { queue, cancel, span };

    Router::new()
        .route("/wakeup", any(wakeup_handler))
        .route("/health", get(health_handler))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(RequestBodyLimitLayer::new(body_limit)),
        )
}

#[async_trait]
impl Listener for HttpListener {
    fn name(&self) -> &'static str {
        HTTP_LISTENER
    }

    async fn start(
        &self,
        cancel: CancellationToken,
        queue: RequestQueue,
    ) -> Result<(), ListenerError> {
        let listener = TcpListener::bind(&self.bind_address)
            .await
            .map_err(|source| ListenerError::Bind {
                address: self.bind_address.clone(),
                source,
            })?;
        let local_addr = listener.local_addr().map_err(ListenerError::Serve)?;

        tracing::info!(parent: &self.span, address = %local_addr, "Starting HTTP listener");

        let app = self.router(queue, cancel.clone());
        let stop = self.shutdown.clone();
        let span = self.span.clone();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                tokio::select! {
                    _ = cancel.cancelled() => {}
                    _ = stop.cancelled() => {}
                }
                tracing::info!(parent: &span, "Shutting down HTTP listener");
            })
            .await
            .map_err(ListenerError::Serve)?;

        tracing::info!(parent: &self.span, "HTTP listener stopped");
        Ok(())
    }

    async fn stop(&self) -> Result<(), ListenerError> {
        if !self.shutdown.is_cancelled() {
            self.shutdown.cancel();
            tracing::debug!(parent: &self.span, "HTTP listener stop requested");
        }
        Ok(())
    }
}

async fn health_handler() -> &'static str {
    "OK"
}

async fn wakeup_handler(
    State(state): State<AppState>,
    method: Method,
    headers: HeaderMap,
    uri: Uri,
    body: Bytes,
) -> Response {
    if method != Method::GET && method != Method::POST {
        return (StatusCode::METHOD_NOT_ALLOWED, "Method not allowed").into_response();
    }

    let payload = if content_type_is(&headers, "application/json") {
        match serde_json::from_slice::<WakePayload>(&body) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::error!(parent: &state.span, error = %e, "Failed to parse JSON body");
                metrics::record_request_rejected(HTTP_LISTENER, "invalid_json");
                return (StatusCode::BAD_REQUEST, "Invalid JSON").into_response();
            }
        }
    } else {
        let form_body = (method == Method::POST
            && content_type_is(&headers, "application/x-www-form-urlencoded"))
        .then_some(&body[..]);
        match form_payload(uri.query(), form_body) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::error!(parent: &state.span, error = %e, "Failed to parse form");
                metrics::record_request_rejected(HTTP_LISTENER, "invalid_form");
                return (StatusCode::BAD_REQUEST, MALFORMED_FORM).into_response();
            }
        }
    };

    let request = match WakeRequest::new(HTTP_LISTENER, payload) {
        Ok(request) => request,
        Err(e) => {
            tracing::error!(
                parent: &state.span,
                "Invalid request: must provide either device name or both mac and broadcast"
            );
            metrics::record_request_rejected(HTTP_LISTENER, "validation");
            return (StatusCode::BAD_REQUEST, e.to_string()).into_response();
        }
    };

    let device = request.device_name.clone().unwrap_or_default();
    let mac = request.hardware_address.clone().unwrap_or_default();
    let broadcast = request.broadcast_address.clone().unwrap_or_default();

    let sent = tokio::select! {
        biased;
        _ = state.cancel.cancelled() => false,
        result = state.queue.send(request) => result.is_ok(),
    };

    if sent {
        tracing::info!(
            parent: &state.span,
            device = %device,
            mac = %mac,
            broadcast = %broadcast,
            "Received wakeup request"
        );
        metrics::record_request_received(HTTP_LISTENER);
        (StatusCode::OK, ACCEPTED).into_response()
    } else {
        tracing::info!(parent: &state.span, "Context canceled");
        metrics::record_request_dropped(HTTP_LISTENER, "shutting_down");
        (StatusCode::SERVICE_UNAVAILABLE, SHUTTING_DOWN).into_response()
    }
}

/// Whether the request's media type (ignoring parameters) equals `expected`.
fn content_type_is(headers: &HeaderMap, expected: &str) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .is_some_and(|essence| essence.trim().eq_ignore_ascii_case(expected))
}

/// Read fields from a urlencoded body and the query string.
///
/// Body values come first, and the first value for each key wins.
fn form_payload(query: Option<&str>, body: Option<&[u8]>) -> Result<WakePayload, MalformedForm> {
    for input in query.map(str::as_bytes).into_iter().chain(body) {
        check_urlencoded(input)?;
    }

    let mut device = None;
    let mut mac = None;
    let mut broadcast = None;

    let body_pairs = body.into_iter().flat_map(url::form_urlencoded::parse);
    let query_pairs = query
        .into_iter()
        .flat_map(|q| url::form_urlencoded::parse(q.as_bytes()));

    for (key, value) in body_pairs.chain(query_pairs) {
        let slot = match key.as_ref() {
            "device" => &mut device,
            "mac" => &mut mac,
            "broadcast" => &mut broadcast,
            _ => continue,
        };
        if slot.is_none() {
            *slot = Some(value.into_owned());
        }
    }

    Ok(WakePayload {
        device: device.unwrap_or_default(),
        mac: mac.unwrap_or_default(),
        broadcast: broadcast.unwrap_or_default(),
    })
}

/// Reject broken percent-escapes, `;` separators and keys or values that do
/// not decode to UTF-8. `form_urlencoded::parse` would accept all of them.
fn check_urlencoded(input: &[u8]) -> Result<(), MalformedForm> {
    let mut decoded = Vec::with_capacity(input.len());
    let mut bytes = input.iter();

    while let Some(&byte) = bytes.next() {
        match byte {
            b'%' => {
                let hi = bytes.next().and_then(|c| char::from(*c).to_digit(16));
                let lo = bytes.next().and_then(|c| char::from(*c).to_digit(16));
                match (hi, lo) {
                    (Some(hi), Some(lo)) => decoded.push((hi * 16 + lo) as u8),
                    _ => return Err(MalformedForm),
                }
            }
            b';' => return Err(MalformedForm),
            b'&' | b'=' => {
                std::str::from_utf8(&decoded).map_err(|_| MalformedForm)?;
                decoded.clear();
            }
            other => decoded.push(other),
        }
    }

    std::str::from_utf8(&decoded).map_err(|_| MalformedForm)?;
    Ok(())
}
