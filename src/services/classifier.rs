//! Event classifier: decides which stream frames become forwarded posts.
//!
//! Pure functions, no I/O. A frame is forwarded only when it is a `posted`
//! event whose post was not written by the bridge itself and that is either
//! a direct message or a thread reply. Everything else is noise and is
//! skipped silently; only unparseable payloads are errors.

use serde::Deserialize;
use serde_json::Value;

use crate::mattermost::types::{DIRECT_CHANNEL_TYPE, POSTED_EVENT, Post, RawEvent};

/// A post accepted for forwarding, with the type of the channel it was posted in.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundPost {
    pub post: Post,
    /// The post JSON exactly as it arrived in the event.
    pub raw: Value,
    pub channel_type: String,
}

impl InboundPost {
    #[must_use]
    pub fn is_direct(&self) -> bool {
        self.channel_type == DIRECT_CHANNEL_TYPE
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Not a post-created event (typing, status, acknowledgements, ...).
    NotPosted,
    /// A `posted` event without an embedded post.
    MissingPost,
    /// Authored by the bridge's own bot user.
    OwnMessage,
    /// Top-level post in a non-direct channel.
    NotDirectOrThread,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Classification {
    Forward(InboundPost),
    Skip(SkipReason),
}

#[derive(Debug, thiserror::Error)]
pub enum ClassifyError {
    #[error("malformed event frame: {0}")]
    Frame(serde_json::Error),

    #[error("malformed embedded post: {0}")]
    Post(serde_json::Error),
}

/// Classify one text frame from the event stream.
///
/// # Errors
///
/// Returns an error when the frame or its embedded post is not valid JSON
/// of the expected shape.
pub fn classify_frame(text: &str, bot_user_id: Option<&str>) -> Result<Classification, ClassifyError> {
    let event: RawEvent = serde_json::from_str(text).map_err(ClassifyError::Frame)?;
    classify_event(&event, bot_user_id)
}

/// Classify an already decoded event.
///
/// # Errors
///
/// Returns an error when the embedded post cannot be parsed.
pub fn classify_event(event: &RawEvent, bot_user_id: Option<&str>) -> Result<Classification, ClassifyError> {
    if event.event != POSTED_EVENT {
        return Ok(Classification::Skip(SkipReason::NotPosted));
    }

    let Some(data) = &event.data else {
        return Ok(Classification::Skip(SkipReason::MissingPost));
    };
    let Some(raw_post) = data.post.as_deref().filter(|p| !p.is_empty()) else {
        return Ok(Classification::Skip(SkipReason::MissingPost));
    };

    let raw: Value = serde_json::from_str(raw_post).map_err(ClassifyError::Post)?;
    let post = Post::deserialize(&raw).map_err(ClassifyError::Post)?;

    if bot_user_id.is_some_and(|bot| !bot.is_empty() && bot == post.user_id) {
        return Ok(Classification::Skip(SkipReason::OwnMessage));
    }

    let channel_type = data.channel_type.clone().unwrap_or_default();
    let is_direct = channel_type == DIRECT_CHANNEL_TYPE;
    if !is_direct && !post.is_thread_reply() {
        return Ok(Classification::Skip(SkipReason::NotDirectOrThread));
    }

    Ok(Classification::Forward(InboundPost { post, raw, channel_type }))
}

#[cfg(test)]
#[path = "classifier_test.rs"]
mod tests;
