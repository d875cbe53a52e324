//! Metrics collection and exposition.
//!
//! # Metrics
//! - `homeguard_requests_received_total` (counter): accepted requests by source
//! - `homeguard_requests_rejected_total` (counter): listener-side rejections by source, reason
//! - `homeguard_requests_dropped_total` (counter): requests discarded after acceptance
//! - `homeguard_packets_sent_total` (counter): magic packets transmitted
//! - `homeguard_packets_failed_total` (counter): send failures by reason
//! - `homeguard_listeners_running` (gauge): listener tasks currently running

use std::net::SocketAddr;

use metrics::{counter, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter with its own HTTP listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request_received(source: &'static str) {
    counter!("homeguard_requests_received_total", "source" => source).increment(1);
}

pub fn record_request_rejected(source: &'static str, reason: &'static str) {
    counter!("homeguard_requests_rejected_total", "source" => source, "reason" => reason)
        .increment(1);
}

pub fn record_request_dropped(source: &'static str, reason: &'static str) {
    counter!("homeguard_requests_dropped_total", "source" => source, "reason" => reason)
        .increment(1);
}

pub fn record_packet_sent() {
    counter!("homeguard_packets_sent_total").increment(1);
}

pub fn record_packet_failed(reason: &'static str) {
    counter!("homeguard_packets_failed_total", "reason" => reason).increment(1);
}

pub fn record_listener_started(name: &'static str) {
    gauge!("homeguard_listeners_running", "listener" => name).increment(1.0);
}

pub fn record_listener_stopped(name: &'static str) {
    gauge!("homeguard_listeners_running", "listener" => name).decrement(1.0);
}
