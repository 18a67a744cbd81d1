//! Router assembly.
//!
//! SYSTEM CONTEXT
//! ==============
//! The HTTP surface lets the downstream workflow talk back: `/answer` posts
//! into a thread or a direct channel, `/get_thread` reads a conversation.
//! Both sit behind the `X-API-Key` check; `/health` stays open for probes.

pub mod answer;
pub mod auth;
pub mod thread;

use axum::Router;
use axum::http::StatusCode;
use axum::middleware;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use serde_json::json;
use tower_http::trace::TraceLayer;
use tracing::error;

use crate::mattermost::types::DirectoryError;
use crate::state::AppState;

/// Build the application router.
pub fn app(state: AppState) -> Router {
    let protected = Router::new()
        .route("/answer", post(answer::answer))
        .route("/get_thread", post(thread::get_thread))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth::require_api_key));

    Router::new()
        .route("/health", get(health))
        .merge(protected)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "healthy" }))
}

// =============================================================================
// ERRORS
// =============================================================================

/// Errors returned by route handlers.
///
/// Client mistakes render as `{"ok": false, "error": ...}`. Failures on the
/// chat server side render as a problem document with `title`, `status`
/// and `detail`.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(&'static str),

    #[error("{0}")]
    NotFound(String),

    /// The chat server could not be reached or answered with a failure status.
    #[error("chat server error: {0}")]
    Upstream(DirectoryError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<DirectoryError> for ApiError {
    fn from(err: DirectoryError) -> Self {
        match err {
            DirectoryError::Request(_) | DirectoryError::Status { .. } => Self::Upstream(err),
            DirectoryError::InvalidId(_) => Self::NotFound(err.to_string()),
            DirectoryError::Parse(_) | DirectoryError::HttpClientBuild(_) | DirectoryError::InvalidUrl(_) => {
                Self::Internal(err.to_string())
            }
        }
    }
}

impl ApiError {
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Upstream(_) => StatusCode::BAD_GATEWAY,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            Self::BadRequest(msg) | Self::NotFound(msg) => json!({ "ok": false, "error": msg }),
            Self::Unauthorized(msg) => json!({ "ok": false, "error": msg }),
            Self::Upstream(e) => {
                error!(error = %e, "chat server request failed");
                problem(status, "Mattermost API Error", &e.to_string())
            }
            Self::Internal(detail) => {
                error!(error = %detail, "request failed");
                problem(status, "Internal Server Error", detail)
            }
        };
        (status, Json(body)).into_response()
    }
}

fn problem(status: StatusCode, title: &str, detail: &str) -> serde_json::Value {
    json!({ "title": title, "status": status.as_u16(), "detail": detail })
}

/// Trimmed value, or `None` when absent or blank.
fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
