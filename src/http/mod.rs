//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware stack)
//!     → request.rs (request ID assigned and propagated)
//!     → security (rate limit admission)
//!     → products.rs / orders.rs / pages.rs (route handlers)
//!     → response.rs (status + {message} on failure)
//!     → Send to client
//! ```

pub mod orders;
pub mod pages;
pub mod products;
pub mod request;
pub mod response;
pub mod server;

pub use request::X_REQUEST_ID;
pub use server::{AppState, HttpServer, ServerError};
