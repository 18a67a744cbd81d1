//! Mattermost wire types and directory errors.
//!
//! These mirror the JSON shapes of the REST API v4 and the websocket event
//! stream. Fields the bridge never reads are kept in `extra` maps. The typed
//! [`Post`] normalizes a few values (an empty `root_id` reads as `None`), so
//! the webhook's `raw` post is forwarded from the decoded JSON instead of
//! from a re-serialized `Post`.

use std::collections::HashMap;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Channel type code the platform uses for one-to-one direct messages.
pub const DIRECT_CHANNEL_TYPE: &str = "D";

// =============================================================================
// ERROR
// =============================================================================

/// Errors produced by Mattermost REST calls.
#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    /// The request never produced a response (connect, timeout, TLS).
    #[error("request failed: {0}")]
    Request(String),

    /// The server answered with a non-success status.
    #[error("unexpected status {status}")]
    Status { status: u16, body: String },

    /// The response body could not be deserialized.
    #[error("response parse failed: {0}")]
    Parse(String),

    /// The underlying HTTP client could not be constructed.
    #[error("HTTP client build failed: {0}")]
    HttpClientBuild(String),

    /// The configured API base is not usable as a URL prefix.
    #[error("invalid API base URL: {0}")]
    InvalidUrl(String),

    /// An id or username that cannot name a resource (empty, `.` or `..`).
    /// Rejected before any request is sent.
    #[error("invalid identifier {0:?}")]
    InvalidId(String),
}

impl DirectoryError {
    /// Transport failures, request timeouts and server errors are worth another attempt.
    #[must_use]
    pub fn retryable(&self) -> bool {
        matches!(self, Self::Request(_) | Self::Status { status: 408 | 500..=599, .. })
    }

    /// The server answered 404, or the identifier could never match anything.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Status { status: 404, .. } | Self::InvalidId(_))
    }
}

// =============================================================================
// POSTS
// =============================================================================

/// One attachment entry from `metadata.files`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileInfo {
    pub id: String,
    #[serde(default)]
    pub name: String,
    /// `mime_type`, `size`, `extension`, ...
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// The `{id, name}` summary of an attachment handed to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileRef {
    pub id: String,
    pub name: String,
}

impl From<&FileInfo> for FileRef {
    fn from(file: &FileInfo) -> Self {
        Self { id: file.id.clone(), name: file.name.clone() }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PostMetadata {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<FileInfo>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A chat post as returned by the REST API or embedded in a `posted` event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: String,
    #[serde(default)]
    pub create_at: i64,
    #[serde(default)]
    pub update_at: i64,
    pub user_id: String,
    pub channel_id: String,
    /// Thread root. The platform encodes "no root" as an empty string.
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub root_id: Option<String>,
    #[serde(default)]
    pub message: String,
    #[serde(default, rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub props: Option<Map<String, Value>>,
    #[serde(default)]
    pub file_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<PostMetadata>,
    #[serde(default, deserialize_with = "empty_string_as_none", skip_serializing_if = "Option::is_none")]
    pub hashtags: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none", skip_serializing_if = "Option::is_none")]
    pub pending_post_id: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Post {
    #[must_use]
    pub fn is_thread_reply(&self) -> bool {
        self.root_id.is_some()
    }

    /// Attached files as reported in the post metadata.
    #[must_use]
    pub fn files(&self) -> &[FileInfo] {
        self.metadata.as_ref().map_or(&[], |m| m.files.as_slice())
    }

    #[must_use]
    pub fn file_refs(&self) -> Vec<FileRef> {
        self.files().iter().map(FileRef::from).collect()
    }
}

/// Body of `GET posts/{id}/thread`.
#[derive(Debug, Clone, Deserialize)]
pub struct PostList {
    #[serde(default)]
    pub order: Vec<String>,
    #[serde(default)]
    pub posts: HashMap<String, Post>,
}

/// Body of `POST posts`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreatePostRequest {
    pub channel_id: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub props: Option<Map<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_ids: Option<Vec<String>>,
}

// =============================================================================
// USERS + CHANNELS
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nickname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    pub id: String,
    #[serde(default, rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub name: String,
}

// =============================================================================
// WEBSOCKET EVENTS
// =============================================================================

/// Name of the event the server emits when a post is created.
pub const POSTED_EVENT: &str = "posted";

/// One JSON text frame from the event stream.
///
/// Replies to client actions (`{"status":"OK","seq_reply":1}`) carry no
/// `event` and parse with an empty name.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawEvent {
    #[serde(default)]
    pub event: String,
    #[serde(default)]
    pub data: Option<EventData>,
    #[serde(default)]
    pub broadcast: Option<Broadcast>,
    #[serde(default)]
    pub seq: i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventData {
    /// The created post, serialized as a JSON string inside the event.
    #[serde(default)]
    pub post: Option<String>,
    #[serde(default)]
    pub channel_id: Option<String>,
    #[serde(default)]
    pub channel_type: Option<String>,
    #[serde(default)]
    pub sender_name: Option<String>,
    #[serde(default)]
    pub team_id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Broadcast {
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub channel_id: Option<String>,
    #[serde(default)]
    pub team_id: Option<String>,
}

fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.filter(|s| !s.is_empty()))
}

#[cfg(test)]
#[path = "types_test.rs"]
mod tests;
