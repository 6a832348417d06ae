//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_requests_total` (counter): requests by method, route, status
//! - `gateway_request_duration_seconds` (histogram): end-to-end latency
//! - `gateway_upstream_calls_total` (counter): upstream calls by upstream, outcome
//! - `gateway_upstream_call_duration_seconds` (histogram): upstream latency
//! - `gateway_breaker_state` (gauge): 0=closed, 1=half-open, 2=open
//! - `gateway_breaker_transitions_total` (counter): transitions by breaker, from, to
//! - `gateway_breaker_rejections_total` (counter): fast-failed calls by breaker
//! - `gateway_retries_total` (counter): retry attempts by operation
//! - `gateway_rate_limited_total` (counter): rejected requests by reason
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; without an installed
//!   recorder every call is a no-op, so tests need no setup
//! - Route labels use the matched route template, never the raw path

use axum::{
    body::Body,
    extract::MatchedPath,
    http::Request,
    middleware::Next,
    response::Response,
};
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};
use std::net::SocketAddr;
use std::time::Instant;

use crate::resilience::CircuitState;

/// Install the Prometheus recorder and its scrape endpoint.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;

    describe_counter!("gateway_requests_total", "Total number of requests handled");
    describe_histogram!(
        "gateway_request_duration_seconds",
        "Request duration in seconds"
    );
    describe_counter!("gateway_upstream_calls_total", "Calls made to backend services");
    describe_histogram!(
        "gateway_upstream_call_duration_seconds",
        "Backend call duration in seconds"
    );
    describe_gauge!(
        "gateway_breaker_state",
        "Circuit breaker state (0=closed, 1=half-open, 2=open)"
    );
    describe_counter!(
        "gateway_breaker_transitions_total",
        "Circuit breaker state transitions"
    );
    describe_counter!(
        "gateway_breaker_rejections_total",
        "Calls rejected by an open circuit breaker"
    );
    describe_counter!("gateway_retries_total", "Retry attempts");
    describe_counter!(
        "gateway_rate_limited_total",
        "Requests rejected by the rate limiter"
    );

    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

/// Record one handled request.
pub fn record_request(method: &str, route: &str, status: u16, start: Instant) {
    counter!(
        "gateway_requests_total",
        "method" => method.to_string(),
        "route" => route.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    histogram!(
        "gateway_request_duration_seconds",
        "method" => method.to_string(),
        "route" => route.to_string()
    )
    .record(start.elapsed().as_secs_f64());
}

/// Middleware recording count and latency for every request.
pub async fn track_requests(request: Request<Body>, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());

    let response = next.run(request).await;
    record_request(&method, &route, response.status().as_u16(), start);
    response
}

/// Record one call to a backend service.
pub fn record_upstream_call(upstream: &str, outcome: &'static str, start: Instant) {
    counter!(
        "gateway_upstream_calls_total",
        "upstream" => upstream.to_string(),
        "outcome" => outcome
    )
    .increment(1);
    histogram!(
        "gateway_upstream_call_duration_seconds",
        "upstream" => upstream.to_string()
    )
    .record(start.elapsed().as_secs_f64());
}

/// Record a circuit breaker transition and publish the new state.
pub fn record_breaker_transition(breaker: &str, from: CircuitState, to: CircuitState) {
    counter!(
        "gateway_breaker_transitions_total",
        "breaker" => breaker.to_string(),
        "from" => from.as_str(),
        "to" => to.as_str()
    )
    .increment(1);
    gauge!("gateway_breaker_state", "breaker" => breaker.to_string()).set(state_value(to));
}

/// Record a call rejected by an open breaker.
pub fn record_breaker_rejection(breaker: &str) {
    counter!("gateway_breaker_rejections_total", "breaker" => breaker.to_string()).increment(1);
}

/// Record a retry attempt.
pub fn record_retry(operation: &str) {
    counter!("gateway_retries_total", "operation" => operation.to_string()).increment(1);
}

/// Record a rate-limited request.
pub fn record_rate_limited(reason: &'static str) {
    counter!("gateway_rate_limited_total", "reason" => reason).increment(1);
}

fn state_value(state: CircuitState) -> f64 {
    match state {
        CircuitState::Closed => 0.0,
        CircuitState::HalfOpen => 1.0,
        CircuitState::Open => 2.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_without_recorder_is_noop() {
        let start = Instant::now();
        record_request("GET", "/products/{id}", 200, start);
        record_upstream_call("product-service", "success", start);
        record_breaker_transition("products", CircuitState::Closed, CircuitState::Open);
        record_breaker_rejection("products");
        record_retry("products");
        record_rate_limited("window_exhausted");
    }

    #[test]
    fn test_state_values_are_ordered_by_severity() {
        assert!(state_value(CircuitState::Closed) < state_value(CircuitState::HalfOpen));
        assert!(state_value(CircuitState::HalfOpen) < state_value(CircuitState::Open));
    }
}
