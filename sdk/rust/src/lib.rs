//! Client for the API gateway.
//!
//! Wraps the public routes and hands back status, headers and the decoded
//! body, so callers can inspect failures as well as successes.

use reqwest::{header::HeaderMap, Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Error body returned by the gateway on failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub message: String,
}

/// A gateway response with its body decoded.
#[derive(Debug, Clone)]
pub struct GatewayResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    /// JSON body, or the raw text as a JSON string when it is not JSON.
    pub body: Value,
}

impl GatewayResponse {
    async fn read(resp: Response) -> Result<Self, reqwest::Error> {
        let status = resp.status();
        let headers = resp.headers().clone();
        let text = resp.text().await?;
        let body = if text.is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).unwrap_or(Value::String(text))
        };
        Ok(Self {
            status,
            headers,
            body,
        })
    }

    /// The `message` field of an error body.
    pub fn message(&self) -> Option<&str> {
        self.body.get("message").and_then(Value::as_str)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

pub struct GatewayClient {
    client: Client,
    gateway_url: String,
}

impl GatewayClient {
    pub fn new(gateway_url: &str) -> Self {
        Self::with_client(Client::new(), gateway_url)
    }

    pub fn with_client(client: Client, gateway_url: &str) -> Self {
        Self {
            client,
            gateway_url: gateway_url.trim_end_matches('/').to_string(),
        }
    }

    /// `GET /products`
    pub async fn list_products(&self) -> Result<GatewayResponse, reqwest::Error> {
        self.get("/products").await
    }

    /// `GET /products/{id}`
    pub async fn get_product(&self, id: &str) -> Result<GatewayResponse, reqwest::Error> {
        self.get(&format!("/products/{}", id)).await
    }

    /// `POST /orders`
    pub async fn create_order<T: Serialize + ?Sized>(
        &self,
        order: &T,
    ) -> Result<GatewayResponse, reqwest::Error> {
        let resp = self
            .client
            .post(format!("{}/orders", self.gateway_url))
            .json(order)
            .send()
            .await?;
        GatewayResponse::read(resp).await
    }

    /// `GET /blogs`
    pub async fn blogs(&self) -> Result<GatewayResponse, reqwest::Error> {
        self.get("/blogs").await
    }

    /// `GET /home`, returning the raw HTML.
    pub async fn home(&self) -> Result<(StatusCode, String), reqwest::Error> {
        let resp = self
            .client
            .get(format!("{}/home", self.gateway_url))
            .send()
            .await?;
        let status = resp.status();
        Ok((status, resp.text().await?))
    }

    /// Any other path, e.g. to probe unknown routes.
    pub async fn get(&self, path: &str) -> Result<GatewayResponse, reqwest::Error> {
        let resp = self
            .client
            .get(format!("{}{}", self.gateway_url, path))
            .send()
            .await?;
        GatewayResponse::read(resp).await
    }
}
