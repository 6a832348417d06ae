//! Upstream (backend) access.
//!
//! # Data Flow
//! ```text
//! Route handler
//!     → protected.rs (retry + circuit breaker, product lookup only)
//!     → client.rs (one HTTP request, deadline, body decoding)
//!     → backend service
//! ```
//!
//! # Design Decisions
//! - One fixed base address per backend
//! - Failures are classified once, here, into `UpstreamError`
//! - Protection is a decorator over the same trait, so routes choose it per call path

pub mod client;
pub mod protected;
pub mod types;

pub use client::{HttpUpstream, UpstreamClient};
pub use protected::ProtectedUpstream;
pub use types::{Payload, UpstreamError, UpstreamRequest, UpstreamResult};
