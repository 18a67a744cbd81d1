//! Mattermost REST directory access, event stream and wire types.
//!
//! DESIGN
//! ======
//! Everything that talks to the Mattermost REST API goes through the
//! [`Directory`] trait. The production implementation is
//! [`client::DirectoryClient`]; tests swap in an in-memory directory so the
//! cache, forwarder and routes can be exercised without a server.

pub mod client;
pub mod stream;
pub mod types;

use types::{Channel, CreatePostRequest, DirectoryError, Post, UserProfile};

/// Request/response calls against the chat platform.
#[async_trait::async_trait]
pub trait Directory: Send + Sync {
    /// Fetch a user by id. `Ok(None)` when the server answers 404.
    async fn get_user(&self, user_id: &str) -> Result<Option<UserProfile>, DirectoryError>;

    /// Fetch a user by username. `Ok(None)` when the server answers 404.
    async fn get_user_by_username(&self, username: &str) -> Result<Option<UserProfile>, DirectoryError>;

    async fn get_post(&self, post_id: &str) -> Result<Post, DirectoryError>;

    /// Fetch a thread root and its replies, root excluded from the replies,
    /// in whatever order the server listed them.
    async fn get_thread(&self, root_id: &str) -> Result<(Post, Vec<Post>), DirectoryError>;

    async fn create_post(&self, request: &CreatePostRequest) -> Result<Post, DirectoryError>;

    /// Create (or fetch the existing) direct channel between two users.
    async fn create_direct_channel(&self, user_a: &str, user_b: &str) -> Result<Channel, DirectoryError>;
}
