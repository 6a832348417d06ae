//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → GatewayConfig (validated, immutable)
//!     → cloned into each subsystem at startup
//! ```
//!
//! # Design Decisions
//! - Config is fixed once the process starts
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{
    AdminConfig, BackoffKind, CircuitBreakerConfig, ContentConfig, GatewayConfig, ListenerConfig,
    LogFormat, ObservabilityConfig, RateLimitConfig, RetryConfig, SecurityConfig, TimeoutConfig,
    UpstreamConfig, UpstreamsConfig,
};
pub use validation::{validate_config, ValidationError};
