//! API gateway.
//!
//! # Architecture Overview
//!
//! ```text
//!                       ┌──────────────────────────────────────────────────────┐
//!                       │                     API GATEWAY                       │
//!                       │                                                       │
//!   Client Request      │  ┌───────────┐   ┌───────────┐   ┌────────────────┐  │
//!   ────────────────────┼─▶│request id │──▶│rate limit │──▶│ route handler  │  │
//!                       │  │ + tracing │   │ (per IP)  │   └───────┬────────┘  │
//!                       │  └───────────┘   └───────────┘           │           │
//!                       │                          ┌───────────────┼─────────┐ │
//!                       │                          ▼               ▼         ▼ │
//!                       │                 ┌──────────────┐  direct call  static│
//!                       │                 │ retry        │       │       pages │
//!                       │                 │  → breaker   │       │             │
//!                       │                 │   → timeout  │       │             │
//!                       │                 └──────┬───────┘       │             │
//!                       │                        ▼               ▼             │
//!                       │                 ┌─────────────────────────────┐      │
//!                       │                 │   upstream client (hyper)   │──────┼──▶ product / order
//!                       │                 └─────────────────────────────┘      │    services
//!                       │                                                       │
//!                       │  config · observability · admin API · lifecycle       │
//!                       └──────────────────────────────────────────────────────┘
//! ```

use clap::Parser;
use std::path::PathBuf;

use api_gateway::config::{load_config, validate_config, ConfigError, GatewayConfig};
use api_gateway::lifecycle::startup;
use api_gateway::observability::logging::init_logging;

#[derive(Parser)]
#[command(name = "api-gateway")]
#[command(about = "API gateway with retry, circuit breaking and rate limiting", long_about = None)]
struct Cli {
    /// Path to a TOML config file. Built-in defaults are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => {
            let config = GatewayConfig::default();
            validate_config(&config).map_err(ConfigError::Validation)?;
            config
        }
    };

    init_logging(&config.observability)?;

    tracing::info!("api-gateway v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        config_file = ?cli.config,
        bind_address = %config.listener.bind_address,
        products = %config.upstreams.products.base_url,
        orders = %config.upstreams.orders.base_url,
        rate_limit = config.rate_limit.max_requests,
        rate_window_secs = config.rate_limit.window_secs,
        "Configuration loaded"
    );

    startup::run(config).await?;
    Ok(())
}
