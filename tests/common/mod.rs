//! Shared utilities for integration tests.

#![allow(dead_code)]

use api_gateway::config::{GatewayConfig, UpstreamConfig};
use api_gateway::http::HttpServer;
use api_gateway::lifecycle::Shutdown;
use axum::Router;
use gateway_sdk::GatewayClient;
use std::net::SocketAddr;
use tokio::net::TcpListener;

/// Serve `router` on an ephemeral port and return its address.
pub async fn start_backend(router: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });
    addr
}

/// An address nothing is listening on.
pub async fn dead_backend() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}

/// Gateway config pointing at the given backends, with test-friendly delays.
pub fn config_for(products: SocketAddr, orders: SocketAddr) -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.listener.bind_address = "127.0.0.1:0".into();
    config.upstreams.products = UpstreamConfig::new("product-service", format!("http://{}", products));
    config.upstreams.orders = UpstreamConfig::new("order-service", format!("http://{}", orders));
    config.retries.delay_ms = 50;
    config
}

/// A running gateway.
pub struct TestGateway {
    pub addr: SocketAddr,
    pub client: GatewayClient,
    pub server_breakers: Vec<std::sync::Arc<api_gateway::resilience::CircuitBreaker>>,
    shutdown: Shutdown,
}

impl TestGateway {
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }
}

impl Drop for TestGateway {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

/// Start the gateway on an ephemeral port.
pub async fn start_gateway(config: GatewayConfig) -> TestGateway {
    let server = HttpServer::new(config).unwrap();
    let server_breakers = server.state().breakers.clone();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = server.run(listener, server_shutdown).await;
    });

    let http = reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap();

    TestGateway {
        addr,
        client: GatewayClient::with_client(http, &format!("http://{}", addr)),
        server_breakers,
        shutdown,
    }
}
