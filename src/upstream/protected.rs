//! Upstream wrapped in retry and circuit breaker.

use async_trait::async_trait;
use std::sync::Arc;

use crate::resilience::{with_retry, CircuitBreaker, RetryPolicy};
use crate::upstream::client::UpstreamClient;
use crate::upstream::types::{Payload, UpstreamError, UpstreamRequest};

/// Decorates an upstream so every call runs as
/// retry → breaker → timeout → inner call.
pub struct ProtectedUpstream {
    inner: Arc<dyn UpstreamClient>,
    breaker: Arc<CircuitBreaker>,
    policy: RetryPolicy,
}

impl ProtectedUpstream {
    pub fn new(inner: Arc<dyn UpstreamClient>, breaker: Arc<CircuitBreaker>, policy: RetryPolicy) -> Self {
        Self {
            inner,
            breaker,
            policy,
        }
    }

    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }
}

#[async_trait]
impl UpstreamClient for ProtectedUpstream {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn call(&self, request: UpstreamRequest) -> Result<Payload, UpstreamError> {
        with_retry(&self.policy, self.breaker.name(), |_| {
            let request = request.clone();
            self.breaker.fire(move || self.inner.call(request))
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config::CircuitBreakerConfig;
    use crate::resilience::CircuitState;
    use axum::http::StatusCode;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    /// Upstream that replays a script of outcomes, then repeats the last one.
    struct ScriptedUpstream {
        script: Mutex<VecDeque<Result<Payload, UpstreamError>>>,
        calls: AtomicU32,
    }

    impl ScriptedUpstream {
        fn new(script: Vec<Result<Payload, UpstreamError>>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script.into()),
                calls: AtomicU32::new(0),
            })
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl UpstreamClient for ScriptedUpstream {
        fn name(&self) -> &str {
            "product-service"
        }

        async fn call(&self, _request: UpstreamRequest) -> Result<Payload, UpstreamError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut script = self.script.lock().unwrap();
            if script.len() > 1 {
                script.pop_front().unwrap()
            } else {
                script.front().cloned().unwrap()
            }
        }
    }

    fn unavailable() -> Result<Payload, UpstreamError> {
        Err(UpstreamError::Upstream {
            status: StatusCode::SERVICE_UNAVAILABLE,
            body: json!({ "message": "try later" }),
        })
    }

    fn breaker(volume_threshold: u32) -> Arc<CircuitBreaker> {
        let config = CircuitBreakerConfig {
            volume_threshold,
            ..CircuitBreakerConfig::default()
        };
        Arc::new(CircuitBreaker::with_clock("products", config, Arc::new(ManualClock::new())))
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovers_after_transient_failures() {
        let upstream = ScriptedUpstream::new(vec![unavailable(), unavailable(), Ok(json!({ "id": 42 }))]);
        let protected = ProtectedUpstream::new(
            upstream.clone(),
            breaker(10),
            RetryPolicy::fixed(3, Duration::from_secs(1)),
        );

        let payload = protected.call(UpstreamRequest::get("/products/42")).await.unwrap();
        assert_eq!(payload, json!({ "id": 42 }));
        assert_eq!(upstream.calls(), 3);
        assert_eq!(protected.breaker().state(), CircuitState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_short_circuit_once_breaker_opens() {
        let upstream = ScriptedUpstream::new(vec![unavailable()]);
        let protected = ProtectedUpstream::new(
            upstream.clone(),
            breaker(0),
            RetryPolicy::fixed(3, Duration::from_secs(1)),
        );

        let err = protected.call(UpstreamRequest::get("/products/42")).await.unwrap_err();

        // First attempt trips the breaker; attempts 2 and 3 fail fast.
        assert_eq!(upstream.calls(), 1);
        assert!(err.is_breaker_open());
        assert!(matches!(err, UpstreamError::RetryExhausted { attempts: 3, .. }));
        assert_eq!(protected.breaker().state(), CircuitState::Open);
        // The backend's own answer survives the fast-failed attempts.
        assert_eq!(err.upstream_status(), Some(StatusCode::SERVICE_UNAVAILABLE));
        assert_eq!(err.upstream_message().as_deref(), Some("try later"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_surfaces_last_upstream_failure() {
        let upstream = ScriptedUpstream::new(vec![
            Err(UpstreamError::Network("refused".into())),
            Err(UpstreamError::Upstream {
                status: StatusCode::NOT_FOUND,
                body: json!({ "message": "Product not found" }),
            }),
        ]);
        let protected = ProtectedUpstream::new(
            upstream.clone(),
            breaker(100),
            RetryPolicy::fixed(3, Duration::from_millis(10)),
        );

        let err = protected.call(UpstreamRequest::get("/products/42")).await.unwrap_err();
        assert_eq!(upstream.calls(), 3);
        assert_eq!(err.upstream_status(), Some(StatusCode::NOT_FOUND));
        assert_eq!(err.upstream_message().as_deref(), Some("Product not found"));
    }
}
