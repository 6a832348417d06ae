//! Order routes.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};

use crate::http::request::request_id;
use crate::http::response::{error_response, CREATE_ORDER_FAILED};
use crate::http::server::AppState;
use crate::upstream::UpstreamRequest;

/// `POST /orders`: forwards the JSON body to the order service.
///
/// A body sent without a JSON content type is forwarded as `{}`. A JSON body
/// that does not parse is answered with 400 and never reaches the backend.
pub async fn create_order(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<Value>, JsonRejection>,
) -> Response {
    let request_id = request_id(&headers).unwrap_or("unknown").to_string();
    let order = match body {
        Ok(Json(order)) => order,
        Err(JsonRejection::MissingJsonContentType(_)) => json!({}),
        Err(rejection) => {
            tracing::warn!(
                request_id = %request_id,
                error = %rejection.body_text(),
                "Rejected order body"
            );
            return error_response(rejection.status(), rejection.body_text());
        }
    };
    let request = UpstreamRequest::post("/orders", order).with_request_id(request_id.clone());

    match state.orders.call(request).await {
        Ok(created) => {
            tracing::info!(request_id = %request_id, "Created order");
            (StatusCode::CREATED, Json(created)).into_response()
        }
        Err(error) => {
            tracing::error!(request_id = %request_id, error = %error, "Failed to create order");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, CREATE_ORDER_FAILED)
        }
    }
}
