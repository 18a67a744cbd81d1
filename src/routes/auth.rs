//! Shared-key authentication for the protected routes.

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tracing::warn;

use super::ApiError;
use crate::state::AppState;

pub const API_KEY_HEADER: &str = "X-API-Key";

/// Reject requests whose `X-API-Key` header is missing or wrong.
pub async fn require_api_key(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let Some(presented) = request.headers().get(API_KEY_HEADER) else {
        warn!(path = %request.uri().path(), "missing api key header");
        return ApiError::Unauthorized("Missing X-API-Key header").into_response();
    };

    if presented.as_bytes() != state.api_key.as_bytes() {
        warn!(path = %request.uri().path(), "invalid api key");
        return ApiError::Unauthorized("Invalid X-API-Key").into_response();
    }

    next.run(request).await
}
