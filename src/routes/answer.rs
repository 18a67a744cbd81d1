//! `POST /answer`: post a reply into a thread or a direct channel.

use axum::extract::State;
use axum::response::Json;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::info;

use super::{ApiError, non_blank};
use crate::mattermost::types::CreatePostRequest;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct AnswerRequest {
    /// Informational only; the target is derived from which ids are present.
    #[serde(default)]
    pub mode: Option<String>,
    #[serde(default)]
    pub channel_id: Option<String>,
    #[serde(default)]
    pub root_id: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub props: Option<Map<String, Value>>,
    #[serde(default)]
    pub file_ids: Option<Vec<String>>,
}

#[derive(Debug, PartialEq, Eq, Serialize)]
pub struct AnswerResponse {
    pub ok: bool,
    pub post_id: String,
    pub channel_id: String,
    pub root_id: Option<String>,
}

/// Where a reply goes.
#[derive(Debug, PartialEq, Eq)]
pub enum Target<'a> {
    Thread { channel_id: &'a str, root_id: &'a str },
    DirectById(&'a str),
    DirectByUsername(&'a str),
}

/// Pick the reply target. A thread wins when both `channel_id` and
/// `root_id` are given; otherwise a user id beats a username.
///
/// # Errors
///
/// Returns `BadRequest` when the request names no target.
pub fn resolve_target(request: &AnswerRequest) -> Result<Target<'_>, ApiError> {
    let channel_id = non_blank(request.channel_id.as_deref());
    let root_id = non_blank(request.root_id.as_deref());
    if let (Some(channel_id), Some(root_id)) = (channel_id, root_id) {
        return Ok(Target::Thread { channel_id, root_id });
    }
    if let Some(user_id) = non_blank(request.user_id.as_deref()) {
        return Ok(Target::DirectById(user_id));
    }
    if let Some(username) = non_blank(request.username.as_deref()) {
        return Ok(Target::DirectByUsername(username));
    }
    Err(ApiError::BadRequest("Either (channel_id + root_id) or (user_id/username) must be provided".into()))
}

pub async fn answer(
    State(state): State<AppState>,
    Json(request): Json<AnswerRequest>,
) -> Result<Json<AnswerResponse>, ApiError> {
    let text = request.text.as_deref().unwrap_or_default();
    if text.trim().is_empty() {
        return Err(ApiError::BadRequest("Text is required".into()));
    }

    let (channel_id, root_id) = match resolve_target(&request)? {
        Target::Thread { channel_id, root_id } => (channel_id.to_owned(), Some(root_id.to_owned())),
        Target::DirectById(user_id) => (direct_channel(&state, user_id).await?, None),
        Target::DirectByUsername(username) => {
            let user = state
                .directory
                .get_user_by_username(username)
                .await?
                .ok_or_else(|| ApiError::NotFound(format!("User not found: {username}")))?;
            (direct_channel(&state, &user.id).await?, None)
        }
    };

    let create = CreatePostRequest {
        channel_id,
        message: text.to_owned(),
        root_id,
        props: request.props,
        file_ids: request.file_ids,
    };
    let post = state.directory.create_post(&create).await?;
    info!(post_id = %post.id, channel_id = %post.channel_id, mode = ?request.mode, "answer posted");

    Ok(Json(AnswerResponse { ok: true, post_id: post.id, channel_id: post.channel_id, root_id: post.root_id }))
}

async fn direct_channel(state: &AppState, user_id: &str) -> Result<String, ApiError> {
    let bot_user_id = state
        .bot_user_id
        .as_deref()
        .ok_or_else(|| ApiError::BadRequest("BOT_USER_ID is not configured".into()))?;
    let channel = state.directory.create_direct_channel(bot_user_id, user_id).await?;
    Ok(channel.id)
}

#[cfg(test)]
#[path = "answer_test.rs"]
mod tests;
