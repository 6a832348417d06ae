//! API gateway library.
//!
//! Fronts a product service and an order service. Product lookups run through
//! retry and a circuit breaker; every route sits behind a per-client rate limiter.

pub mod admin;
pub mod clock;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod resilience;
pub mod security;
pub mod upstream;

pub use config::schema::GatewayConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
