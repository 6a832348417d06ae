//! Upstream call types and the failure taxonomy.

use axum::http::{Method, StatusCode};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

/// Body returned by a successful upstream call.
pub type Payload = Value;

/// Result type for upstream operations.
pub type UpstreamResult<T> = Result<T, UpstreamError>;

/// One request to a backend, relative to its base URL.
#[derive(Debug, Clone, PartialEq)]
pub struct UpstreamRequest {
    pub method: Method,
    pub path: String,
    pub body: Option<Value>,
    pub request_id: Option<String>,
}

impl UpstreamRequest {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            path: path.into(),
            body: None,
            request_id: None,
        }
    }

    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self {
            method: Method::POST,
            path: path.into(),
            body: Some(body),
            request_id: None,
        }
    }

    /// Attach the gateway request ID so the backend can correlate logs.
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }
}

/// Why an upstream call did not produce a payload.
#[derive(Debug, Clone, Error)]
pub enum UpstreamError {
    /// Connection could not be established or broke mid-request.
    #[error("network error: {0}")]
    Network(String),

    /// The call did not finish within its deadline.
    #[error("timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    /// The backend answered with a non-2xx status.
    #[error("upstream responded with status {status}")]
    Upstream { status: StatusCode, body: Value },

    /// The circuit breaker rejected the call without attempting it.
    #[error("circuit breaker '{breaker}' is open")]
    BreakerOpen { breaker: String },

    /// Every allowed attempt failed; `last` is the final attempt's failure.
    ///
    /// `reported` keeps the most recent failure the backend answered itself,
    /// which may be older than `last` when later attempts were rejected by
    /// the breaker or never got a response.
    #[error("gave up after {attempts} attempts: {last}")]
    RetryExhausted {
        attempts: u32,
        last: Box<UpstreamError>,
        reported: Option<Box<UpstreamError>>,
    },
}

impl UpstreamError {
    /// The underlying failure, looking through retry exhaustion.
    pub fn last_failure(&self) -> &UpstreamError {
        match self {
            UpstreamError::RetryExhausted { last, .. } => last.last_failure(),
            other => other,
        }
    }

    /// The most recent failure the backend answered with, looking through
    /// retry exhaustion.
    pub fn reported_failure(&self) -> Option<&UpstreamError> {
        match self {
            UpstreamError::Upstream { .. } => Some(self),
            UpstreamError::RetryExhausted { last, reported, .. } => reported
                .as_deref()
                .and_then(UpstreamError::reported_failure)
                .or_else(|| last.reported_failure()),
            _ => None,
        }
    }

    /// Status reported by the backend, if it answered at all.
    pub fn upstream_status(&self) -> Option<StatusCode> {
        match self.reported_failure() {
            Some(UpstreamError::Upstream { status, .. }) => Some(*status),
            _ => None,
        }
    }

    /// Human-readable message from the backend's error body.
    ///
    /// Uses the `message` field of a JSON object body, or the body itself
    /// when the backend answered with plain text.
    pub fn upstream_message(&self) -> Option<String> {
        match self.reported_failure() {
            Some(UpstreamError::Upstream { body, .. }) => match body {
                Value::Object(map) => map
                    .get("message")
                    .and_then(Value::as_str)
                    .map(str::to_string),
                Value::String(text) if !text.trim().is_empty() => Some(text.clone()),
                _ => None,
            },
            _ => None,
        }
    }

    pub fn is_breaker_open(&self) -> bool {
        matches!(self.last_failure(), UpstreamError::BreakerOpen { .. })
    }

    /// Short label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            UpstreamError::Network(_) => "network",
            UpstreamError::Timeout(_) => "timeout",
            UpstreamError::Upstream { .. } => "upstream",
            UpstreamError::BreakerOpen { .. } => "breaker_open",
            UpstreamError::RetryExhausted { .. } => "retry_exhausted",
        }
    }
}
