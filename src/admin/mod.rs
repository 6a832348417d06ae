//! Admin API.
//!
//! Served on its own listener so it can stay bound to loopback while the
//! gateway listens publicly. Every route requires the configured bearer key.

pub mod auth;
pub mod handlers;

use axum::{middleware, routing::get, Router};
use std::sync::Arc;
use std::time::Instant;

use self::auth::admin_auth_middleware;
use self::handlers::{get_breakers, get_status};
use crate::resilience::CircuitBreaker;

/// State shared by admin handlers.
#[derive(Clone)]
pub struct AdminState {
    pub breakers: Vec<Arc<CircuitBreaker>>,
    pub api_key: Arc<str>,
    pub started_at: Instant,
}

impl AdminState {
    pub fn new(breakers: Vec<Arc<CircuitBreaker>>, api_key: impl Into<Arc<str>>) -> Self {
        Self {
            breakers,
            api_key: api_key.into(),
            started_at: Instant::now(),
        }
    }
}

pub fn setup_admin_router(state: AdminState) -> Router {
    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/breakers", get(get_breakers))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            admin_auth_middleware,
        ))
        .with_state(state)
}
