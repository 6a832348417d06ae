//! Per-client fixed-window rate limiting.
//!
//! # Design Decisions
//! - Clients are keyed by socket peer IP; forwarded-for headers are not trusted
//! - Each client's window starts with its first request and resets wholesale
//!   once `window_secs` have passed
//! - Expired windows are dropped by a background purge task

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{header, HeaderValue, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use dashmap::DashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;

use crate::clock::{Clock, SystemClock};
use crate::config::RateLimitConfig;
use crate::observability::metrics;

pub const X_RATELIMIT_LIMIT: &str = "x-ratelimit-limit";
pub const X_RATELIMIT_REMAINING: &str = "x-ratelimit-remaining";

/// Requests seen from one client in its current window.
#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    count: u32,
}

/// Outcome of an admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Allowed { remaining: u32 },
    Limited { retry_after: Duration },
}

/// State for the rate limiter.
pub struct RateLimiterState {
    windows: DashMap<String, Window>,
    config: RateLimitConfig,
    clock: Arc<dyn Clock>,
}

impl RateLimiterState {
    pub fn new(config: RateLimitConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: RateLimitConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            windows: DashMap::new(),
            config,
            clock,
        }
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Count one request from `key` and decide whether it may proceed.
    pub fn check(&self, key: &str) -> Admission {
        let now = self.clock.now();
        let length = self.config.window();

        let mut window = self.windows.entry(key.to_string()).or_insert(Window {
            started: now,
            count: 0,
        });

        let elapsed = now.duration_since(window.started);
        if elapsed >= length {
            window.started = now;
            window.count = 0;
        }

        if window.count < self.config.max_requests {
            window.count += 1;
            Admission::Allowed {
                remaining: self.config.max_requests - window.count,
            }
        } else {
            Admission::Limited {
                retry_after: length.saturating_sub(now.duration_since(window.started)),
            }
        }
    }

    /// Drop windows that have fully elapsed. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let length = self.config.window();
        let before = self.windows.len();
        self.windows
            .retain(|_, window| now.duration_since(window.started) < length);
        before.saturating_sub(self.windows.len())
    }

    /// Number of clients with a live window.
    pub fn tracked_clients(&self) -> usize {
        self.windows.len()
    }

    /// Purge expired windows periodically until shutdown.
    pub async fn run_purge(self: Arc<Self>, mut shutdown: broadcast::Receiver<()>) {
        let period = self.config.window().max(Duration::from_secs(1));
        let mut ticker = tokio::time::interval(period);
        // First tick completes immediately.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let removed = self.purge_expired();
                    if removed > 0 {
                        tracing::debug!(removed, remaining = self.tracked_clients(), "Purged expired rate limit windows");
                    }
                }
                _ = shutdown.recv() => {
                    tracing::debug!("Rate limit purge task stopping");
                    break;
                }
            }
        }
    }
}

/// Middleware enforcing the per-client request budget.
pub async fn rate_limit_middleware(
    State(state): State<Arc<RateLimiterState>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if !state.config.enabled {
        return next.run(request).await;
    }

    let client = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string());

    let limit = state.config.max_requests;
    match state.check(&client) {
        Admission::Allowed { remaining } => {
            let mut response = next.run(request).await;
            set_limit_headers(&mut response, limit, remaining);
            response
        }
        Admission::Limited { retry_after } => {
            tracing::warn!(client = %client, retry_after_secs = retry_after.as_secs(), "Rate limit exceeded");
            metrics::record_rate_limited("window_exhausted");

            let mut response =
                (StatusCode::TOO_MANY_REQUESTS, state.config.message.clone()).into_response();
            set_limit_headers(&mut response, limit, 0);
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(retry_after_secs(retry_after)));
            response
        }
    }
}

fn set_limit_headers(response: &mut Response, limit: u32, remaining: u32) {
    let headers = response.headers_mut();
    headers.insert(X_RATELIMIT_LIMIT, HeaderValue::from(limit));
    headers.insert(X_RATELIMIT_REMAINING, HeaderValue::from(remaining));
}

/// Whole seconds, rounded up, never zero.
fn retry_after_secs(retry_after: Duration) -> u64 {
    let secs = retry_after.as_secs() + u64::from(retry_after.subsec_nanos() > 0);
    secs.max(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use axum::{middleware, routing::get, Router};
    use tower::ServiceExt;

    fn limiter(max_requests: u32, clock: Arc<ManualClock>) -> RateLimiterState {
        let config = RateLimitConfig {
            window_secs: 60,
            max_requests,
            ..RateLimitConfig::default()
        };
        RateLimiterState::with_clock(config, clock)
    }

    #[test]
    fn test_limits_after_max_requests() {
        let clock = Arc::new(ManualClock::new());
        let limiter = limiter(3, clock.clone());

        assert_eq!(limiter.check("10.0.0.1"), Admission::Allowed { remaining: 2 });
        assert_eq!(limiter.check("10.0.0.1"), Admission::Allowed { remaining: 1 });
        assert_eq!(limiter.check("10.0.0.1"), Admission::Allowed { remaining: 0 });

        clock.advance(Duration::from_secs(20));
        assert_eq!(
            limiter.check("10.0.0.1"),
            Admission::Limited {
                retry_after: Duration::from_secs(40)
            }
        );
    }

    #[test]
    fn test_new_window_admits_again() {
        let clock = Arc::new(ManualClock::new());
        let limiter = limiter(1, clock.clone());

        assert!(matches!(limiter.check("a"), Admission::Allowed { .. }));
        assert!(matches!(limiter.check("a"), Admission::Limited { .. }));

        clock.advance(Duration::from_secs(60));
        assert_eq!(limiter.check("a"), Admission::Allowed { remaining: 0 });
    }

    #[test]
    fn test_clients_are_independent() {
        let clock = Arc::new(ManualClock::new());
        let limiter = limiter(1, clock);

        assert!(matches!(limiter.check("a"), Admission::Allowed { .. }));
        assert!(matches!(limiter.check("b"), Admission::Allowed { .. }));
        assert!(matches!(limiter.check("a"), Admission::Limited { .. }));
    }

    #[test]
    fn test_purge_drops_only_expired_windows() {
        let clock = Arc::new(ManualClock::new());
        let limiter = limiter(5, clock.clone());

        limiter.check("old");
        clock.advance(Duration::from_secs(30));
        limiter.check("fresh");
        clock.advance(Duration::from_secs(30));

        assert_eq!(limiter.purge_expired(), 1);
        assert_eq!(limiter.tracked_clients(), 1);
    }

    #[test]
    fn test_retry_after_rounds_up() {
        assert_eq!(retry_after_secs(Duration::from_millis(1500)), 2);
        assert_eq!(retry_after_secs(Duration::from_secs(3)), 3);
        assert_eq!(retry_after_secs(Duration::ZERO), 1);
    }

    fn app(state: Arc<RateLimiterState>) -> Router {
        Router::new()
            .route("/home", get(|| async { "ok" }))
            .layer(middleware::from_fn_with_state(state, rate_limit_middleware))
    }

    #[tokio::test]
    async fn test_middleware_rejects_with_message() {
        let state = Arc::new(limiter(1, Arc::new(ManualClock::new())));
        let app = app(state);

        let first = app
            .clone()
            .oneshot(Request::get("/home").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(first.status(), StatusCode::OK);
        assert_eq!(first.headers()[X_RATELIMIT_LIMIT], "1");
        assert_eq!(first.headers()[X_RATELIMIT_REMAINING], "0");

        let second = app
            .oneshot(Request::get("/home").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(second.headers()[header::RETRY_AFTER], "60");
        let body = axum::body::to_bytes(second.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"Too many requests, please try again later.");
    }

    #[tokio::test]
    async fn test_disabled_limiter_passes_everything() {
        let config = RateLimitConfig {
            enabled: false,
            max_requests: 1,
            ..RateLimitConfig::default()
        };
        let app = app(Arc::new(RateLimiterState::new(config)));

        for _ in 0..3 {
            let response = app
                .clone()
                .oneshot(Request::get("/home").body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
            assert!(response.headers().get(X_RATELIMIT_LIMIT).is_none());
        }
    }
}
