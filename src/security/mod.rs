//! Request admission and response hardening.
//!
//! Every public route passes the per-client rate limiter before any handler
//! or upstream call runs.

pub mod headers;
pub mod rate_limit;

pub use headers::with_security_headers;
pub use rate_limit::{rate_limit_middleware, Admission, RateLimiterState};
