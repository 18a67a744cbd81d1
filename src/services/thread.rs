//! Thread reads with caller-chosen ordering and size.
//!
//! The directory returns replies in server order. This module sorts them by
//! creation time and truncates to the requested limit; the root post is
//! always returned separately and never counts against the limit.

use std::cmp::Reverse;

use tracing::info;

use crate::mattermost::Directory;
use crate::mattermost::types::{DirectoryError, Post};

pub const DEFAULT_THREAD_LIMIT: i64 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ThreadOrder {
    #[default]
    Asc,
    Desc,
}

impl ThreadOrder {
    /// Parse an order name. Only the exact lowercase names are accepted.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "asc" => Some(Self::Asc),
            "desc" => Some(Self::Desc),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Thread {
    pub root: Post,
    pub replies: Vec<Post>,
}

/// Fetch a thread and shape its replies.
///
/// `limit <= 0` returns every reply.
///
/// # Errors
///
/// Propagates directory failures, including a 404 for an unknown root.
pub async fn fetch_thread(
    directory: &dyn Directory,
    root_id: &str,
    limit: i64,
    order: ThreadOrder,
) -> Result<Thread, DirectoryError> {
    let (root, replies) = directory.get_thread(root_id).await?;
    let replies = arrange_replies(replies, limit, order);
    info!(%root_id, replies = replies.len(), ?order, "thread retrieved");
    Ok(Thread { root, replies })
}

/// Sort by `create_at` (stable for equal timestamps), then keep the first `limit`.
#[must_use]
pub fn arrange_replies(mut replies: Vec<Post>, limit: i64, order: ThreadOrder) -> Vec<Post> {
    match order {
        ThreadOrder::Asc => replies.sort_by_key(|p| p.create_at),
        ThreadOrder::Desc => replies.sort_by_key(|p| Reverse(p.create_at)),
    }
    match usize::try_from(limit) {
        Ok(limit) if limit > 0 => replies.truncate(limit),
        _ => {}
    }
    replies
}

#[cfg(test)]
#[path = "thread_test.rs"]
mod tests;
