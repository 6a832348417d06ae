//! Content served by the gateway itself.

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{Html, IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::http::request::request_id;
use crate::http::response::error_response;
use crate::http::server::AppState;

const HOME_PAGE: &str = include_str!("../../views/index.html");
const BUNDLED_BLOGS: &str = include_str!("../../data/blogs.json");

/// One entry of the blog data set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlogPost {
    pub id: u32,
    pub title: String,
    pub author: String,
    pub summary: String,
    pub published_at: String,
}

#[derive(Debug, Error)]
pub enum ContentError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid blog data: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Load the blog data set from `path`, or the bundled copy when unset.
pub async fn load_blogs(path: Option<&Path>) -> Result<Vec<BlogPost>, ContentError> {
    match path {
        Some(path) => {
            let raw = tokio::fs::read_to_string(path)
                .await
                .map_err(|source| ContentError::Io {
                    path: path.display().to_string(),
                    source,
                })?;
            Ok(serde_json::from_str(&raw)?)
        }
        None => Ok(serde_json::from_str(BUNDLED_BLOGS)?),
    }
}

/// `GET /home`
pub async fn home() -> Html<&'static str> {
    tracing::info!("Serving home page");
    Html(HOME_PAGE)
}

/// `GET /blogs`
pub async fn blogs(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let request_id = request_id(&headers).unwrap_or("unknown");
    match load_blogs(state.content.blogs_path.as_deref().map(Path::new)).await {
        Ok(posts) => {
            tracing::info!(request_id, count = posts.len(), "Serving blog list");
            Json(posts).into_response()
        }
        Err(error) => {
            tracing::error!(request_id, error = %error, "Failed to load blog list");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, error.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_bundled_blogs_parse() {
        let posts = load_blogs(None).await.unwrap();
        assert!(!posts.is_empty());
        assert!(posts.iter().all(|p| !p.title.is_empty()));
    }

    #[tokio::test]
    async fn test_missing_file_is_io_error() {
        let err = load_blogs(Some(Path::new("/nonexistent/blogs.json")))
            .await
            .unwrap_err();
        assert!(matches!(err, ContentError::Io { .. }));
        assert!(err.to_string().contains("/nonexistent/blogs.json"));
    }

    #[tokio::test]
    async fn test_malformed_file_is_parse_error() {
        let path = std::env::temp_dir().join(format!("blogs-{}.json", uuid::Uuid::new_v4()));
        tokio::fs::write(&path, "[{\"id\": 1}").await.unwrap();

        let err = load_blogs(Some(&path)).await.unwrap_err();
        assert!(matches!(err, ContentError::Parse(_)));

        let _ = tokio::fs::remove_file(&path).await;
    }

    #[test]
    fn test_home_page_is_html() {
        assert!(HOME_PAGE.contains("<html"));
    }
}
