//! `POST /get_thread`: read a thread root and its replies.

use axum::extract::State;
use axum::response::Json;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{ApiError, non_blank};
use crate::mattermost::types::{FileRef, Post};
use crate::services::thread::{self, DEFAULT_THREAD_LIMIT, ThreadOrder};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct GetThreadRequest {
    #[serde(default)]
    pub root_id: Option<String>,
    #[serde(default)]
    pub limit: Option<i64>,
    #[serde(default)]
    pub order: Option<String>,
}

/// A post as returned to callers: the fields a workflow needs and nothing else.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThreadPost {
    pub id: String,
    pub channel_id: String,
    pub user_id: String,
    pub create_at: i64,
    pub message: String,
    pub root_id: Option<String>,
    pub props: Map<String, Value>,
    pub files: Vec<FileRef>,
}

impl From<Post> for ThreadPost {
    fn from(post: Post) -> Self {
        let files = post.file_refs();
        Self {
            id: post.id,
            channel_id: post.channel_id,
            user_id: post.user_id,
            create_at: post.create_at,
            message: post.message,
            root_id: post.root_id,
            props: post.props.unwrap_or_default(),
            files,
        }
    }
}

#[derive(Debug, PartialEq, Serialize)]
pub struct GetThreadResponse {
    pub ok: bool,
    pub root: ThreadPost,
    pub replies: Vec<ThreadPost>,
}

pub async fn get_thread(
    State(state): State<AppState>,
    Json(request): Json<GetThreadRequest>,
) -> Result<Json<GetThreadResponse>, ApiError> {
    let Some(root_id) = non_blank(request.root_id.as_deref()) else {
        return Err(ApiError::BadRequest("root_id is required".into()));
    };
    let order = match request.order.as_deref() {
        None => ThreadOrder::default(),
        Some(raw) => ThreadOrder::parse(raw)
            .ok_or_else(|| ApiError::BadRequest("order must be 'asc' or 'desc'".into()))?,
    };
    let limit = request.limit.unwrap_or(DEFAULT_THREAD_LIMIT);

    let thread = thread::fetch_thread(state.directory.as_ref(), root_id, limit, order)
        .await
        .map_err(|e| {
            if e.is_not_found() {
                ApiError::NotFound("Thread not found".into())
            } else {
                ApiError::from(e)
            }
        })?;

    Ok(Json(GetThreadResponse {
        ok: true,
        root: thread.root.into(),
        replies: thread.replies.into_iter().map(ThreadPost::from).collect(),
    }))
}

#[cfg(test)]
#[path = "thread_test.rs"]
mod tests;
