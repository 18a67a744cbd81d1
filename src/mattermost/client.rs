//! Mattermost REST API v4 client.
//!
//! Thin HTTP wrapper over the handful of endpoints the bridge needs. Every
//! call carries the bot's bearer token and goes through [`RetryPolicy`]:
//! transport failures, 408 and 5xx responses are retried with exponential
//! back-off, anything else is returned to the caller as-is.
//!
//! Ids and usernames are appended as single percent-encoded path segments,
//! so a value containing `/`, `?` or `#` can never address another endpoint.

use std::time::Duration;

use reqwest::{Method, Url};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{info, warn};

use super::Directory;
use super::types::{Channel, CreatePostRequest, DirectoryError, Post, PostList, UserProfile};

const DEFAULT_RETRIES: u32 = 3;
const DEFAULT_RETRY_BASE: Duration = Duration::from_secs(2);
const ERROR_BODY_LOG_LIMIT: usize = 500;

/// Retry schedule for transient failures: the n-th retry waits `base * 2^(n-1)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub retries: u32,
    pub base: Duration,
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (1-based).
    #[must_use]
    pub fn delay(&self, attempt: u32) -> Duration {
        self.base.saturating_mul(1 << attempt.saturating_sub(1).min(16))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { retries: DEFAULT_RETRIES, base: DEFAULT_RETRY_BASE }
    }
}

// =============================================================================
// CLIENT
// =============================================================================

pub struct DirectoryClient {
    http: reqwest::Client,
    base_url: Url,
    token: String,
    retry: RetryPolicy,
}

impl DirectoryClient {
    /// Build a client for `base_url` (e.g. `https://chat.example.com/api/v4`).
    ///
    /// # Errors
    ///
    /// Returns an error if `base_url` is not an absolute http(s) URL or the
    /// HTTP client fails to build.
    pub fn new(base_url: &str, token: String, timeout: Duration, retry: RetryPolicy) -> Result<Self, DirectoryError> {
        let base_url = Url::parse(base_url).map_err(|e| DirectoryError::InvalidUrl(format!("{base_url}: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(DirectoryError::InvalidUrl(base_url.to_string()));
        }
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DirectoryError::HttpClientBuild(e.to_string()))?;
        Ok(Self { http, base_url, token, retry })
    }

    /// Endpoint URL under the API base, one percent-encoded segment per element.
    fn url(&self, segments: &[&str]) -> Result<Url, DirectoryError> {
        if let Some(bad) = segments.iter().find(|s| matches!(**s, "" | "." | "..")) {
            return Err(DirectoryError::InvalidId((*bad).to_string()));
        }
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| DirectoryError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Send one request with retries and return the raw success body.
    async fn send<B: Serialize + ?Sized>(
        &self,
        method: Method,
        segments: &[&str],
        body: Option<&B>,
    ) -> Result<String, DirectoryError> {
        let url = self.url(segments)?;
        let mut attempt = 0;
        loop {
            match self.send_once(method.clone(), &url, body).await {
                Err(e) if e.retryable() && attempt < self.retry.retries => {
                    attempt += 1;
                    let delay = self.retry.delay(attempt);
                    warn!(error = %e, %url, attempt, delay_ms = delay.as_millis(), "mattermost request failed; retrying");
                    tokio::time::sleep(delay).await;
                }
                result => return result,
            }
        }
    }

    async fn send_once<B: Serialize + ?Sized>(
        &self,
        method: Method,
        url: &Url,
        body: Option<&B>,
    ) -> Result<String, DirectoryError> {
        let mut request = self.http.request(method, url.clone()).bearer_auth(&self.token);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| DirectoryError::Request(e.to_string()))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| DirectoryError::Request(e.to_string()))?;

        if !status.is_success() {
            return Err(DirectoryError::Status { status: status.as_u16(), body: truncate(&text) });
        }
        Ok(text)
    }

    async fn get_json<T: DeserializeOwned>(&self, segments: &[&str]) -> Result<T, DirectoryError> {
        let text = self.send::<()>(Method::GET, segments, None).await?;
        parse_body(&text)
    }

    async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        segments: &[&str],
        body: &B,
    ) -> Result<T, DirectoryError> {
        let text = self.send(Method::POST, segments, Some(body)).await?;
        parse_body(&text)
    }
}

#[async_trait::async_trait]
impl Directory for DirectoryClient {
    async fn get_user(&self, user_id: &str) -> Result<Option<UserProfile>, DirectoryError> {
        info!(%user_id, "fetching user");
        not_found_as_none(self.get_json(&["users", user_id]).await)
    }

    async fn get_user_by_username(&self, username: &str) -> Result<Option<UserProfile>, DirectoryError> {
        info!(%username, "fetching user by username");
        not_found_as_none(self.get_json(&["users", "username", username]).await)
    }

    async fn get_post(&self, post_id: &str) -> Result<Post, DirectoryError> {
        info!(%post_id, "fetching post");
        self.get_json(&["posts", post_id]).await
    }

    async fn get_thread(&self, root_id: &str) -> Result<(Post, Vec<Post>), DirectoryError> {
        info!(%root_id, "fetching thread");
        let root = self.get_post(root_id).await?;
        let list: PostList = self.get_json(&["posts", root_id, "thread"]).await?;
        Ok((root, thread_replies(list, root_id)))
    }

    async fn create_post(&self, request: &CreatePostRequest) -> Result<Post, DirectoryError> {
        info!(channel_id = %request.channel_id, root_id = ?request.root_id, "creating post");
        let post: Post = self.post_json(&["posts"], request).await?;
        info!(post_id = %post.id, "post created");
        Ok(post)
    }

    async fn create_direct_channel(&self, user_a: &str, user_b: &str) -> Result<Channel, DirectoryError> {
        info!(%user_a, %user_b, "creating direct channel");
        self.post_json(&["channels", "direct"], &[user_a, user_b]).await
    }
}

// =============================================================================
// PARSING
// =============================================================================

/// Parse a JSON success body. A proxy or login page answering with HTML is a
/// parse failure, not a user-facing payload.
fn parse_body<T: DeserializeOwned>(text: &str) -> Result<T, DirectoryError> {
    if text.trim_start().starts_with('<') {
        return Err(DirectoryError::Parse(format!("expected JSON, got HTML: {}", truncate(text))));
    }
    serde_json::from_str(text).map_err(|e| DirectoryError::Parse(e.to_string()))
}

/// Replies of a thread listing in server order, root excluded.
fn thread_replies(mut list: PostList, root_id: &str) -> Vec<Post> {
    list.order
        .iter()
        .filter(|id| id.as_str() != root_id)
        .filter_map(|id| list.posts.remove(id))
        .collect()
}

fn not_found_as_none<T>(result: Result<T, DirectoryError>) -> Result<Option<T>, DirectoryError> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.is_not_found() => Ok(None),
        Err(e) => Err(e),
    }
}

fn truncate(text: &str) -> String {
    match text.char_indices().nth(ERROR_BODY_LOG_LIMIT) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

#[cfg(test)]
#[path = "client_test.rs"]
mod tests;
