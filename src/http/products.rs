//! Product routes.

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use url::Url;

use crate::http::request::request_id;
use crate::http::response::{error_response, protected_error_response, LIST_PRODUCTS_FAILED};
use crate::http::server::AppState;
use crate::upstream::UpstreamRequest;

/// `GET /products`: direct pass-through, no retry or breaker.
pub async fn list_products(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let request_id = request_id(&headers).unwrap_or("unknown").to_string();
    let request = UpstreamRequest::get("/products").with_request_id(request_id.clone());

    match state.products.call(request).await {
        Ok(products) => {
            tracing::info!(request_id = %request_id, "Fetched product list");
            Json(products).into_response()
        }
        Err(error) => {
            tracing::error!(request_id = %request_id, error = %error, "Failed to fetch product list");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, LIST_PRODUCTS_FAILED)
        }
    }
}

/// `GET /products/{id}`: retried lookup behind the circuit breaker.
pub async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Response {
    let request_id = request_id(&headers).unwrap_or("unknown").to_string();
    let request = UpstreamRequest::get(product_path(&id)).with_request_id(request_id.clone());

    match state.product_lookup.call(request).await {
        Ok(product) => {
            tracing::info!(request_id = %request_id, product_id = %id, "Fetched product");
            Json(product).into_response()
        }
        Err(error) => {
            tracing::error!(
                request_id = %request_id,
                product_id = %id,
                error = %error,
                breaker_open = error.is_breaker_open(),
                "Failed to fetch product"
            );
            protected_error_response(&error)
        }
    }
}

/// Backend path for one product, with the id percent-encoded as a single segment.
pub fn product_path(id: &str) -> String {
    Url::parse("http://upstream/products")
        .ok()
        .and_then(|mut url| {
            url.path_segments_mut().ok()?.push(id);
            Some(url.path().to_string())
        })
        .unwrap_or_else(|| format!("/products/{}", id))
}
