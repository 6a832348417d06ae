//! Configuration validation.
//!
//! Semantic checks that serde cannot express: value ranges, parseable
//! addresses, usable upstream URLs. All problems are collected so an
//! operator can fix a config file in one pass.

use std::net::SocketAddr;
use thiserror::Error;
use url::Url;

use crate::config::schema::{GatewayConfig, UpstreamConfig};

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {reason}")]
pub struct ValidationError {
    pub field: String,
    pub reason: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Validate a configuration, returning every error found.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    check_socket_addr(&mut errors, "listener.bind_address", &config.listener.bind_address);

    check_upstream(&mut errors, "upstreams.products", &config.upstreams.products);
    check_upstream(&mut errors, "upstreams.orders", &config.upstreams.orders);

    let cb = &config.circuit_breaker;
    if cb.call_timeout_ms == 0 {
        errors.push(ValidationError::new("circuit_breaker.call_timeout_ms", "must be greater than 0"));
    }
    if cb.error_threshold_percentage == 0 || cb.error_threshold_percentage > 100 {
        errors.push(ValidationError::new(
            "circuit_breaker.error_threshold_percentage",
            "must be between 1 and 100",
        ));
    }
    if cb.reset_timeout_ms == 0 {
        errors.push(ValidationError::new("circuit_breaker.reset_timeout_ms", "must be greater than 0"));
    }
    if cb.rolling_buckets == 0 {
        errors.push(ValidationError::new("circuit_breaker.rolling_buckets", "must be greater than 0"));
    } else if cb.rolling_window_ms < u64::from(cb.rolling_buckets) {
        errors.push(ValidationError::new(
            "circuit_breaker.rolling_window_ms",
            "must be at least one millisecond per bucket",
        ));
    }

    let retries = &config.retries;
    if retries.max_attempts == 0 {
        errors.push(ValidationError::new("retries.max_attempts", "must be at least 1"));
    }
    if retries.max_delay_ms < retries.delay_ms {
        errors.push(ValidationError::new("retries.max_delay_ms", "must not be below retries.delay_ms"));
    }

    let rate_limit = &config.rate_limit;
    if rate_limit.enabled {
        if rate_limit.window_secs == 0 {
            errors.push(ValidationError::new("rate_limit.window_secs", "must be greater than 0"));
        }
        if rate_limit.max_requests == 0 {
            errors.push(ValidationError::new("rate_limit.max_requests", "must be greater than 0"));
        }
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::new("timeouts.request_secs", "must be greater than 0"));
    }

    if config.observability.metrics_enabled {
        check_socket_addr(&mut errors, "observability.metrics_address", &config.observability.metrics_address);
    }

    if config.admin.enabled {
        check_socket_addr(&mut errors, "admin.bind_address", &config.admin.bind_address);
        if config.admin.api_key.is_empty() {
            errors.push(ValidationError::new("admin.api_key", "must not be empty"));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_socket_addr(errors: &mut Vec<ValidationError>, field: &str, value: &str) {
    if value.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(field, format!("'{}' is not a socket address", value)));
    }
}

fn check_upstream(errors: &mut Vec<ValidationError>, field: &str, upstream: &UpstreamConfig) {
    match Url::parse(&upstream.base_url) {
        Ok(url) if url.scheme() != "http" => {
            errors.push(ValidationError::new(
                format!("{}.base_url", field),
                format!("unsupported scheme '{}'", url.scheme()),
            ));
        }
        Ok(url) if url.host_str().is_none() => {
            errors.push(ValidationError::new(format!("{}.base_url", field), "missing host"));
        }
        Ok(_) => {}
        Err(e) => {
            errors.push(ValidationError::new(format!("{}.base_url", field), e.to_string()));
        }
    }
    if upstream.timeout_ms == 0 {
        errors.push(ValidationError::new(format!("{}.timeout_ms", field), "must be greater than 0"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&GatewayConfig::default()).is_ok());
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = GatewayConfig::default();
        config.retries.max_attempts = 0;
        config.circuit_breaker.error_threshold_percentage = 0;
        config.upstreams.orders.base_url = "https://orders.internal".into();
        config.listener.bind_address = "not-an-address".into();

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(errors.len(), 4, "{:?}", errors);
        assert!(fields.contains(&"retries.max_attempts"));
        assert!(fields.contains(&"circuit_breaker.error_threshold_percentage"));
        assert!(fields.contains(&"upstreams.orders.base_url"));
        assert!(fields.contains(&"listener.bind_address"));
    }

    #[test]
    fn test_disabled_rate_limit_is_not_checked() {
        let mut config = GatewayConfig::default();
        config.rate_limit.enabled = false;
        config.rate_limit.max_requests = 0;
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_error_display() {
        let err = ValidationError::new("retries.max_attempts", "must be at least 1");
        assert_eq!(err.to_string(), "retries.max_attempts: must be at least 1");
    }
}
