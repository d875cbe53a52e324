//! Resilience helpers.
//!
//! Only transport connections are retried (the MQTT reconnect loop). Packet
//! sends are fire-and-forget and never retried.

pub mod backoff;

pub use backoff::calculate_backoff;
