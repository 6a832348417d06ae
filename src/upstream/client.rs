//! HTTP client for backend services.
//!
//! # Responsibilities
//! - Issue exactly one request per call to `base_url + path`
//! - Enforce the per-upstream deadline
//! - Decode JSON bodies and classify failures
//!
//! # Design Decisions
//! - Object-safe trait so handlers hold `Arc<dyn UpstreamClient>` and tests
//!   can substitute scripted doubles
//! - Non-2xx responses keep their status and decoded body for the caller
//! - Empty bodies decode to `null`, non-JSON bodies to a JSON string

use async_trait::async_trait;
use axum::body::{Body, Bytes};
use axum::http::{header, HeaderValue, Request, Response};
use hyper::body::Incoming;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use serde_json::Value;
use std::error::Error as StdError;
use std::time::{Duration, Instant};
use url::Url;

use crate::config::UpstreamConfig;
use crate::http::request::X_REQUEST_ID;
use crate::observability::metrics;
use crate::resilience::timeouts::with_deadline;
use crate::upstream::types::{Payload, UpstreamError, UpstreamRequest};

/// A backend the gateway can call.
#[async_trait]
pub trait UpstreamClient: Send + Sync {
    /// Name used in logs and metrics.
    fn name(&self) -> &str;

    /// Perform one call.
    async fn call(&self, request: UpstreamRequest) -> Result<Payload, UpstreamError>;
}

/// Upstream reached over plain HTTP.
#[derive(Clone)]
pub struct HttpUpstream {
    name: String,
    base_url: String,
    timeout: Duration,
    max_response_bytes: usize,
    client: Client<HttpConnector, Body>,
}

impl HttpUpstream {
    /// Create a client for the configured backend.
    pub fn new(config: &UpstreamConfig) -> Result<Self, url::ParseError> {
        let base_url = Url::parse(&config.base_url)?;
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());

        Ok(Self {
            name: config.name.clone(),
            base_url: base_url.as_str().trim_end_matches('/').to_string(),
            timeout: config.timeout(),
            max_response_bytes: config.max_response_bytes,
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn build_request(&self, request: &UpstreamRequest) -> Result<Request<Body>, UpstreamError> {
        let uri = format!("{}{}", self.base_url, request.path);
        let mut builder = Request::builder()
            .method(request.method.clone())
            .uri(uri)
            .header(header::ACCEPT, HeaderValue::from_static("application/json"));

        if let Some(id) = request.request_id.as_deref() {
            if let Ok(value) = HeaderValue::from_str(id) {
                builder = builder.header(X_REQUEST_ID, value);
            }
        }

        let body = match &request.body {
            Some(json) => {
                builder = builder.header(
                    header::CONTENT_TYPE,
                    HeaderValue::from_static("application/json"),
                );
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };

        builder
            .body(body)
            .map_err(|e| UpstreamError::Network(format!("invalid upstream request: {}", e)))
    }

    async fn send(&self, request: Request<Body>) -> Result<Payload, UpstreamError> {
        let response: Response<Incoming> = self
            .client
            .request(request)
            .await
            .map_err(|e| UpstreamError::Network(error_chain(&e)))?;

        let status = response.status();
        let (_, body) = response.into_parts();
        let bytes = axum::body::to_bytes(Body::new(body), self.max_response_bytes)
            .await
            .map_err(|e| UpstreamError::Network(format!("failed to read response body: {}", e)))?;
        let payload = decode_body(&bytes);

        if status.is_success() {
            Ok(payload)
        } else {
            Err(UpstreamError::Upstream {
                status,
                body: payload,
            })
        }
    }
}

#[async_trait]
impl UpstreamClient for HttpUpstream {
    fn name(&self) -> &str {
        &self.name
    }

    async fn call(&self, request: UpstreamRequest) -> Result<Payload, UpstreamError> {
        let start = Instant::now();
        let http_request = self.build_request(&request)?;

        tracing::debug!(
            upstream = %self.name,
            method = %request.method,
            path = %request.path,
            request_id = request.request_id.as_deref().unwrap_or("unknown"),
            "Calling upstream"
        );

        let result = with_deadline(self.timeout, self.send(http_request)).await;

        let outcome = match &result {
            Ok(_) => "success",
            Err(e) => e.kind(),
        };
        metrics::record_upstream_call(&self.name, outcome, start);

        result
    }
}

/// Decode a response body as JSON, falling back to a string.
pub fn decode_body(bytes: &Bytes) -> Value {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Value::Null;
    }
    serde_json::from_slice(bytes)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(bytes).into_owned()))
}

/// Render an error with its sources, e.g. "client error (Connect): connection refused".
fn error_chain(error: &dyn StdError) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
