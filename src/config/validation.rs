//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (capacity > 0, grace > 0)
//! - Check addresses parse before anything binds
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: RelayConfig → Result<(), Vec<ValidationError>>

use std::fmt;
use std::net::SocketAddr;

use crate::config::schema::RelayConfig;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

pub fn validate_config(config: &RelayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.http.bind_address.is_empty() {
        errors.push(ValidationError::new("http.bind_address", "must not be empty"));
    } else if config.http.socket_address().parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "http.bind_address",
            format!("'{}' is not a valid socket address", config.http.bind_address),
        ));
    }

    if config.http.body_limit_bytes == 0 {
        errors.push(ValidationError::new("http.body_limit_bytes", "must be greater than 0"));
    }

    if config.mqtt.enabled() {
        if config.mqtt.topic.is_empty() {
            errors.push(ValidationError::new(
                "mqtt.topic",
                "must not be empty when a broker is configured",
            ));
        }
        if config.mqtt.connect_retry_secs == 0 {
            errors.push(ValidationError::new("mqtt.connect_retry_secs", "must be greater than 0"));
        }
        if config.mqtt.max_reconnect_secs == 0 {
            errors.push(ValidationError::new("mqtt.max_reconnect_secs", "must be greater than 0"));
        }
    }

    if config.dispatch.queue_capacity == 0 {
        errors.push(ValidationError::new("dispatch.queue_capacity", "must be greater than 0"));
    }

    if config.shutdown.grace_secs == 0 {
        errors.push(ValidationError::new("shutdown.grace_secs", "must be greater than 0"));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!(
                "'{}' is not a valid socket address",
                config.observability.metrics_address
            ),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&RelayConfig::default()).is_ok());
    }

    #[test]
    fn test_reports_every_error() {
        let mut config = RelayConfig::default();
        config.http.bind_address = "nowhere".into();
        config.dispatch.queue_capacity = 0;
        config.shutdown.grace_secs = 0;
        config.mqtt.broker = Some("tcp://localhost:1883".into());
        config.mqtt.topic = String::new();

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field).collect();
        assert_eq!(
            fields,
            vec![
                "http.bind_address",
                "mqtt.topic",
                "dispatch.queue_capacity",
                "shutdown.grace_secs"
            ]
        );
    }

    #[test]
    fn test_zero_reconnect_delays_rejected() {
        let mut config = RelayConfig::default();
        config.mqtt.max_reconnect_secs = 0;
        assert!(validate_config(&config).is_ok());

        config.mqtt.broker = Some("tcp://localhost:1883".into());
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "mqtt.max_reconnect_secs");

        config.mqtt.connect_retry_secs = 0;
        let fields: Vec<_> = validate_config(&config)
            .unwrap_err()
            .iter()
            .map(|e| e.field)
            .collect();
        assert_eq!(fields, vec!["mqtt.connect_retry_secs", "mqtt.max_reconnect_secs"]);
    }

    #[test]
    fn test_metrics_address_checked_only_when_enabled() {
        let mut config = RelayConfig::default();
        config.observability.metrics_address = "bogus".into();
        assert!(validate_config(&config).is_ok());

        config.observability.metrics_enabled = true;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors[0].field, "observability.metrics_address");
    }
}
