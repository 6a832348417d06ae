//! End-to-end tests for the public routes.

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};

mod common;

fn product_service() -> Router {
    Router::new()
        .route(
            "/products",
            get(|| async { Json(json!([{ "id": 1, "name": "Keyboard" }, { "id": 2, "name": "Mouse" }])) }),
        )
        .route(
            "/products/{id}",
            get(|Path(id): Path<String>| async move {
                if id == "1" {
                    (StatusCode::OK, Json(json!({ "id": 1, "name": "Keyboard" })))
                } else {
                    (StatusCode::NOT_FOUND, Json(json!({ "message": "Product not found" })))
                }
            }),
        )
}

fn order_service(received: Arc<Mutex<Vec<Value>>>) -> Router {
    Router::new()
        .route(
            "/orders",
            post(
                |State(received): State<Arc<Mutex<Vec<Value>>>>, Json(order): Json<Value>| async move {
                    received.lock().unwrap().push(order.clone());
                    (StatusCode::CREATED, Json(json!({ "orderId": 7, "order": order })))
                },
            ),
        )
        .with_state(received)
}

#[tokio::test]
async fn test_list_products() {
    let products = common::start_backend(product_service()).await;
    let orders = common::dead_backend().await;
    let gateway = common::start_gateway(common::config_for(products, orders)).await;

    let res = gateway.client.list_products().await.unwrap();
    assert_eq!(res.status, 200);
    assert_eq!(res.body.as_array().unwrap().len(), 2);
    assert!(res.header("x-request-id").is_some());
}

#[tokio::test]
async fn test_list_products_backend_down() {
    let products = common::dead_backend().await;
    let orders = common::dead_backend().await;
    let gateway = common::start_gateway(common::config_for(products, orders)).await;

    let res = gateway.client.list_products().await.unwrap();
    assert_eq!(res.status, 500);
    assert_eq!(res.message(), Some("Error fetching products"));
}

#[tokio::test]
async fn test_get_product() {
    let products = common::start_backend(product_service()).await;
    let orders = common::dead_backend().await;
    let gateway = common::start_gateway(common::config_for(products, orders)).await;

    let res = gateway.client.get_product("1").await.unwrap();
    assert_eq!(res.status, 200);
    assert_eq!(res.body, json!({ "id": 1, "name": "Keyboard" }));
}

#[tokio::test]
async fn test_get_product_not_found_with_default_config() {
    let products = common::start_backend(product_service()).await;
    let orders = common::dead_backend().await;
    let gateway = common::start_gateway(common::config_for(products, orders)).await;

    // The 404 trips the breaker and the later attempts are rejected, but the
    // client still sees what the product service said.
    let res = gateway.client.get_product("42").await.unwrap();
    assert_eq!(res.status, 404);
    assert_eq!(res.message(), Some("Product not found"));
    assert_eq!(
        gateway.server_breakers[0].state(),
        api_gateway::resilience::CircuitState::Open
    );
}

#[tokio::test]
async fn test_get_product_not_found_passes_status_and_message() {
    let products = common::start_backend(product_service()).await;
    let orders = common::dead_backend().await;
    let mut config = common::config_for(products, orders);
    config.retries.retry_client_errors = false;
    let gateway = common::start_gateway(config).await;

    let res = gateway.client.get_product("42").await.unwrap();
    assert_eq!(res.status, 404);
    assert_eq!(res.message(), Some("Product not found"));
}

#[tokio::test]
async fn test_create_order_forwards_body() {
    let products = common::dead_backend().await;
    let received = Arc::new(Mutex::new(Vec::new()));
    let orders = common::start_backend(order_service(received.clone())).await;
    let gateway = common::start_gateway(common::config_for(products, orders)).await;

    let order = json!({ "productId": 1, "quantity": 3 });
    let res = gateway.client.create_order(&order).await.unwrap();

    assert_eq!(res.status, 201);
    assert_eq!(res.body["orderId"], 7);
    assert_eq!(received.lock().unwrap().as_slice(), &[order]);
}

#[tokio::test]
async fn test_create_order_backend_down() {
    let products = common::dead_backend().await;
    let orders = common::dead_backend().await;
    let gateway = common::start_gateway(common::config_for(products, orders)).await;

    let res = gateway.client.create_order(&json!({ "productId": 1 })).await.unwrap();
    assert_eq!(res.status, 500);
    assert_eq!(res.message(), Some("Error creating order"));
}

#[tokio::test]
async fn test_home_and_blogs() {
    let products = common::dead_backend().await;
    let orders = common::dead_backend().await;
    let gateway = common::start_gateway(common::config_for(products, orders)).await;

    let (status, html) = gateway.client.home().await.unwrap();
    assert_eq!(status, 200);
    assert!(html.contains("<h1>API Gateway</h1>"));

    let res = gateway.client.blogs().await.unwrap();
    assert_eq!(res.status, 200);
    let posts = res.body.as_array().unwrap();
    assert!(!posts.is_empty());
    assert!(posts[0].get("title").is_some());
}

#[tokio::test]
async fn test_unknown_route_is_404() {
    let products = common::dead_backend().await;
    let orders = common::dead_backend().await;
    let gateway = common::start_gateway(common::config_for(products, orders)).await;

    let res = gateway.client.get("/nope").await.unwrap();
    assert_eq!(res.status, 404);
}

#[tokio::test]
async fn test_request_id_reaches_backend() {
    let seen = Arc::new(Mutex::new(None::<String>));
    let backend = Router::new()
        .route(
            "/products",
            get(|State(seen): State<Arc<Mutex<Option<String>>>>, headers: HeaderMap| async move {
                *seen.lock().unwrap() = headers
                    .get("x-request-id")
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string);
                Json(json!([]))
            }),
        )
        .with_state(seen.clone());
    let products = common::start_backend(backend).await;
    let orders = common::dead_backend().await;
    let gateway = common::start_gateway(common::config_for(products, orders)).await;

    let res = gateway.client.list_products().await.unwrap();
    let echoed = res.header("x-request-id").unwrap().to_string();
    assert_eq!(seen.lock().unwrap().as_deref(), Some(echoed.as_str()));
}

#[tokio::test]
async fn test_rate_limit_rejects_excess_requests() {
    let products = common::dead_backend().await;
    let orders = common::dead_backend().await;
    let mut config = common::config_for(products, orders);
    config.rate_limit.max_requests = 2;
    let gateway = common::start_gateway(config).await;

    for remaining in ["1", "0"] {
        let res = gateway.client.get("/home").await.unwrap();
        assert_eq!(res.status, 200);
        assert_eq!(res.header("x-ratelimit-limit"), Some("2"));
        assert_eq!(res.header("x-ratelimit-remaining"), Some(remaining));
    }

    let res = gateway.client.get("/home").await.unwrap();
    assert_eq!(res.status, 429);
    assert_eq!(
        res.body,
        Value::String("Too many requests, please try again later.".into())
    );
    assert!(res.header("retry-after").is_some());
    assert_eq!(res.header("x-ratelimit-remaining"), Some("0"));
}
