//! Circuit breaker event listeners.
//!
//! Breakers report state transitions and call outcomes to listeners
//! synchronously, after releasing their internal lock. Listeners are a side
//! channel: they never influence the result handed back to the caller.

use crate::observability::metrics;
use crate::resilience::circuit_breaker::CircuitState;
use crate::upstream::UpstreamError;

/// Receives circuit breaker events.
pub trait BreakerListener: Send + Sync {
    /// The breaker moved from `from` to `to`.
    fn on_state_change(&self, breaker: &str, from: CircuitState, to: CircuitState);

    /// A call was rejected without being attempted.
    fn on_reject(&self, _breaker: &str) {}

    /// An admitted call failed (timeouts included).
    fn on_failure(&self, _breaker: &str, _error: &UpstreamError) {}

    /// An admitted call succeeded.
    fn on_success(&self, _breaker: &str) {}
}

/// Writes breaker events to the tracing subscriber.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingListener;

impl BreakerListener for LoggingListener {
    fn on_state_change(&self, breaker: &str, from: CircuitState, to: CircuitState) {
        match to {
            CircuitState::Open => {
                tracing::warn!(breaker, from = %from, "Circuit breaker OPENED: suspending upstream calls")
            }
            CircuitState::HalfOpen => {
                tracing::info!(breaker, from = %from, "Circuit breaker HALF-OPEN: probing upstream")
            }
            CircuitState::Closed => {
                tracing::info!(breaker, from = %from, "Circuit breaker CLOSED: upstream recovered")
            }
        }
    }

    fn on_reject(&self, breaker: &str) {
        tracing::debug!(breaker, "Call rejected, circuit breaker is open");
    }

    fn on_failure(&self, breaker: &str, error: &UpstreamError) {
        tracing::warn!(breaker, error = %error, kind = error.kind(), "Protected call failed");
    }
}

/// Exports breaker state and counters through the metrics facade.
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsListener;

impl BreakerListener for MetricsListener {
    fn on_state_change(&self, breaker: &str, from: CircuitState, to: CircuitState) {
        metrics::record_breaker_transition(breaker, from, to);
    }

    fn on_reject(&self, breaker: &str) {
        metrics::record_breaker_rejection(breaker);
    }
}
