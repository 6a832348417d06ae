//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Protected call:
//!     → retries.rs (bounded attempts, backoff.rs delay between them)
//!     → circuit_breaker.rs (admit or fail fast, track outcomes in window.rs)
//!     → timeouts.rs (per-call deadline)
//!     → upstream client
//!
//! Side channel:
//!     circuit_breaker.rs → events.rs listeners (logging, metrics)
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every protected call has a deadline
//! - Retries never bypass the breaker: each attempt re-enters `fire`
//! - Circuit breaker prevents cascading failures
//! - Breakers are explicitly owned and injected, never global

pub mod backoff;
pub mod circuit_breaker;
pub mod events;
pub mod retries;
pub mod timeouts;
pub mod window;

pub use backoff::Backoff;
pub use circuit_breaker::{BreakerSnapshot, CircuitBreaker, CircuitState};
pub use events::{BreakerListener, LoggingListener, MetricsListener};
pub use retries::{with_retry, RetryPolicy};
