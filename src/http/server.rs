//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with all gateway routes
//! - Wire up middleware (rate limit, metrics, limits, timeout, headers, request ID, tracing)
//! - Build upstream clients and the product lookup breaker from config
//! - Bind server to listener and drain on shutdown

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{limit::RequestBodyLimitLayer, timeout::TimeoutLayer};

use crate::config::{ContentConfig, GatewayConfig};
use crate::http::orders::create_order;
use crate::http::pages::{blogs, home};
use crate::http::products::{get_product, list_products};
use crate::http::request::{propagate_request_id_layer, set_request_id_layer};
use crate::observability::{metrics, tracing::http_trace_layer};
use crate::resilience::{CircuitBreaker, LoggingListener, MetricsListener, RetryPolicy};
use crate::security::{rate_limit_middleware, with_security_headers, RateLimiterState};
use crate::upstream::{HttpUpstream, ProtectedUpstream, UpstreamClient};

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("invalid base_url for upstream {name}: {source}")]
    InvalidUpstream {
        name: String,
        #[source]
        source: url::ParseError,
    },
}

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    /// Product service, called directly.
    pub products: Arc<dyn UpstreamClient>,
    /// Product service behind retry and the circuit breaker.
    pub product_lookup: Arc<dyn UpstreamClient>,
    /// Order service, called directly.
    pub orders: Arc<dyn UpstreamClient>,
    /// Every breaker in the gateway, for the admin API.
    pub breakers: Vec<Arc<CircuitBreaker>>,
    pub content: ContentConfig,
}

impl AppState {
    /// Build upstream clients and resilience wrappers from config.
    pub fn from_config(config: &GatewayConfig) -> Result<Self, ServerError> {
        let products: Arc<dyn UpstreamClient> = Arc::new(http_upstream(&config.upstreams.products)?);
        let orders: Arc<dyn UpstreamClient> = Arc::new(http_upstream(&config.upstreams.orders)?);

        let breaker = Arc::new(
            CircuitBreaker::new("product-lookup", config.circuit_breaker.clone())
                .with_listener(Arc::new(LoggingListener))
                .with_listener(Arc::new(MetricsListener)),
        );
        let product_lookup = Arc::new(ProtectedUpstream::new(
            products.clone(),
            breaker.clone(),
            RetryPolicy::from(&config.retries),
        ));

        Ok(Self {
            products,
            product_lookup,
            orders,
            breakers: vec![breaker],
            content: config.content.clone(),
        })
    }
}

fn http_upstream(config: &crate::config::UpstreamConfig) -> Result<HttpUpstream, ServerError> {
    HttpUpstream::new(config).map_err(|source| ServerError::InvalidUpstream {
        name: config.name.clone(),
        source,
    })
}

/// HTTP server for the gateway.
pub struct HttpServer {
    router: Router,
    state: AppState,
    rate_limiter: Arc<RateLimiterState>,
    config: GatewayConfig,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: GatewayConfig) -> Result<Self, ServerError> {
        let state = AppState::from_config(&config)?;
        Ok(Self::with_state(config, state))
    }

    /// Create a server around pre-built state.
    pub fn with_state(config: GatewayConfig, state: AppState) -> Self {
        let rate_limiter = Arc::new(RateLimiterState::new(config.rate_limit.clone()));
        let router = Self::build_router(&config, state.clone(), rate_limiter.clone());
        Self {
            router,
            state,
            rate_limiter,
            config,
        }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(
        config: &GatewayConfig,
        state: AppState,
        rate_limiter: Arc<RateLimiterState>,
    ) -> Router {
        let router = Router::new()
            .route("/products", get(list_products))
            .route("/products/{id}", get(get_product))
            .route("/orders", post(create_order))
            .route("/home", get(home))
            .route("/blogs", get(blogs))
            .with_state(state)
            .layer(middleware::from_fn_with_state(rate_limiter, rate_limit_middleware))
            .layer(middleware::from_fn(metrics::track_requests))
            .layer(RequestBodyLimitLayer::new(config.security.max_body_size))
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)));

        let router = if config.security.enable_headers {
            with_security_headers(router)
        } else {
            router
        };

        router
            .layer(propagate_request_id_layer())
            .layer(http_trace_layer())
            .layer(set_request_id_layer())
    }

    /// The fully layered router.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Run the server until `shutdown` fires, then drain in-flight requests.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            products = %self.config.upstreams.products.base_url,
            orders = %self.config.upstreams.orders.base_url,
            "HTTP server starting"
        );

        tokio::spawn(self.rate_limiter.clone().run_purge(shutdown.resubscribe()));

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("HTTP server draining connections");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}
