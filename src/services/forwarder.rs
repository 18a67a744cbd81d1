//! Forwarder: enrich accepted posts and deliver them to the webhook.
//!
//! DESIGN
//! ======
//! The receive loop never waits on webhook I/O. It pushes accepted posts
//! into a bounded queue with `try_send`; a single worker drains the queue
//! in order and calls [`Forwarder::forward`] for each post.
//!
//! ERROR HANDLING
//! ==============
//! Delivery is best-effort and at-most-once. An unknown author, a non-2xx
//! response or an unreachable webhook is logged and the post is dropped.
//! Nothing is retried and no error leaves `forward`; the returned
//! [`ForwardOutcome`] only reports what happened.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use super::classifier::InboundPost;
use super::user_cache::UserCache;
use crate::mattermost::types::{FileRef, UserProfile};

/// Header carrying the shared secret on every webhook call.
pub const WEBHOOK_SECRET_HEADER: &str = "X-Webhook-Secret";
const ERROR_BODY_LOG_LIMIT: usize = 500;

// =============================================================================
// PAYLOAD
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Dm,
    ThreadPost,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PayloadUser {
    pub id: String,
    pub username: String,
}

/// JSON body posted to the webhook for one forwarded event.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForwardPayload {
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub event_ts: i64,
    pub post_id: String,
    pub root_id: Option<String>,
    pub channel_id: String,
    pub channel_type: String,
    pub user: PayloadUser,
    pub text: String,
    pub files: Vec<FileRef>,
    /// The full post as received, for consumers that need more than the summary fields.
    pub raw: Value,
}

impl ForwardPayload {
    #[must_use]
    pub fn build(inbound: &InboundPost, author: &UserProfile) -> Self {
        let post = &inbound.post;
        let kind = if inbound.is_direct() { EventKind::Dm } else { EventKind::ThreadPost };
        Self {
            kind,
            event_ts: post.create_at,
            post_id: post.id.clone(),
            root_id: post.root_id.clone(),
            channel_id: post.channel_id.clone(),
            channel_type: inbound.channel_type.clone(),
            user: PayloadUser { id: author.id.clone(), username: author.username.clone() },
            text: post.message.clone(),
            files: post.file_refs(),
            raw: inbound.raw.clone(),
        }
    }
}

// =============================================================================
// FORWARDER
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForwardOutcome {
    Delivered,
    /// The author could not be resolved; nothing was sent.
    UnknownAuthor,
    /// The webhook answered with a non-success status.
    Rejected { status: u16 },
    /// The webhook could not be reached.
    Unreachable,
}

#[derive(Debug, thiserror::Error)]
pub enum ForwardError {
    #[error("HTTP client build failed: {0}")]
    HttpClientBuild(String),
}

pub struct Forwarder {
    http: reqwest::Client,
    webhook_url: String,
    secret: String,
    users: UserCache,
}

impl Forwarder {
    /// # Errors
    ///
    /// Returns an error if the HTTP client fails to build.
    pub fn new(webhook_url: String, secret: String, timeout: Duration, users: UserCache) -> Result<Self, ForwardError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ForwardError::HttpClientBuild(e.to_string()))?;
        Ok(Self { http, webhook_url, secret, users })
    }

    /// Resolve the author, build the payload and make one delivery attempt.
    pub async fn forward(&self, inbound: &InboundPost) -> ForwardOutcome {
        let post = &inbound.post;
        let Some(author) = self.users.get(&post.user_id).await else {
            warn!(user_id = %post.user_id, post_id = %post.id, "unable to resolve author; skipping event");
            return ForwardOutcome::UnknownAuthor;
        };

        let payload = ForwardPayload::build(inbound, &author);
        let outcome = self.deliver(&payload).await;
        if outcome == ForwardOutcome::Delivered {
            info!(kind = ?payload.kind, post_id = %payload.post_id, "forwarded event to webhook");
        }
        outcome
    }

    async fn deliver(&self, payload: &ForwardPayload) -> ForwardOutcome {
        let response = self
            .http
            .post(&self.webhook_url)
            .header(WEBHOOK_SECRET_HEADER, &self.secret)
            .json(payload)
            .send()
            .await;

        let response = match response {
            Ok(response) => response,
            Err(e) => {
                error!(error = %e, post_id = %payload.post_id, "webhook unreachable; dropping event");
                return ForwardOutcome::Unreachable;
            }
        };

        let status = response.status();
        if status.is_success() {
            return ForwardOutcome::Delivered;
        }

        let body = response.text().await.unwrap_or_default();
        let body: String = body.chars().take(ERROR_BODY_LOG_LIMIT).collect();
        error!(status = status.as_u16(), %body, post_id = %payload.post_id, "webhook rejected event; dropping");
        ForwardOutcome::Rejected { status: status.as_u16() }
    }
}

// =============================================================================
// QUEUE + WORKER
// =============================================================================

/// Producer side of the forward queue, held by the connection manager.
#[derive(Clone)]
pub struct ForwardQueue {
    tx: mpsc::Sender<InboundPost>,
}

impl ForwardQueue {
    #[must_use]
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<InboundPost>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    /// Best-effort, non-blocking enqueue. Returns `false` when the post was dropped.
    pub fn enqueue(&self, inbound: InboundPost) -> bool {
        match self.tx.try_send(inbound) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(inbound)) => {
                warn!(post_id = %inbound.post.id, "forward queue full; dropping event");
                false
            }
            Err(mpsc::error::TrySendError::Closed(inbound)) => {
                warn!(post_id = %inbound.post.id, "forward queue closed; dropping event");
                false
            }
        }
    }
}

/// Spawn the worker that drains the queue in order.
///
/// Once `shutdown` flips to `true` the worker finishes the forward in
/// progress, if any, and exits without starting another.
pub fn spawn_forward_worker(
    forwarder: Arc<Forwarder>,
    mut rx: mpsc::Receiver<InboundPost>,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            if *shutdown.borrow_and_update() {
                break;
            }
            tokio::select! {
                biased;
                _ = shutdown.changed() => break,
                next = rx.recv() => {
                    let Some(inbound) = next else { break };
                    forwarder.forward(&inbound).await;
                }
            }
        }
        info!("forward worker stopped");
    })
}

#[cfg(test)]
#[path = "forwarder_test.rs"]
mod tests;
