//! Error responses.
//!
//! Every failure leaves the gateway as a status code plus `{"message": ...}`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::upstream::UpstreamError;

pub const LIST_PRODUCTS_FAILED: &str = "Error fetching products";
pub const PRODUCT_LOOKUP_FAILED: &str = "Server error or circuit breaker is open";
pub const BREAKER_OPEN: &str = "circuit breaker open";
pub const CREATE_ORDER_FAILED: &str = "Error creating order";

/// JSON error body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub message: String,
}

pub fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorBody {
            message: message.into(),
        }),
    )
        .into_response()
}

/// Status and message for a failed protected lookup.
///
/// The backend's own status wins; without one (network, timeout, open
/// circuit) the gateway answers 503.
pub fn protected_failure(error: &UpstreamError) -> (StatusCode, String) {
    let status = error
        .upstream_status()
        .unwrap_or(StatusCode::SERVICE_UNAVAILABLE);
    let message = error.upstream_message().unwrap_or_else(|| {
        if error.is_breaker_open() {
            BREAKER_OPEN.to_string()
        } else {
            PRODUCT_LOOKUP_FAILED.to_string()
        }
    });
    (status, message)
}

pub fn protected_error_response(error: &UpstreamError) -> Response {
    let (status, message) = protected_failure(error);
    error_response(status, message)
}
