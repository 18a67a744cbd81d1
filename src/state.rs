//! Shared application state.
//!
//! DESIGN
//! ======
//! `AppState` is built once in `main` and lives for the process. Axum
//! handlers get it through the `State` extractor; the forwarder gets the
//! same `UserCache` handle, so the HTTP surface and the ingestion pipeline
//! share one directory client and one cache.

use std::sync::Arc;

use crate::mattermost::Directory;
use crate::services::user_cache::UserCache;

/// Shared application state, injected into Axum handlers via State extractor.
/// Clone is required by Axum; all inner fields are Arc-wrapped or Clone.
#[derive(Clone)]
pub struct AppState {
    pub directory: Arc<dyn Directory>,
    pub users: UserCache,
    /// The bridge's own user id. `None` disables DM replies.
    pub bot_user_id: Option<String>,
    /// Expected `X-API-Key` value for every route except `/health`.
    pub api_key: Arc<str>,
}

impl AppState {
    #[must_use]
    pub fn new(directory: Arc<dyn Directory>, bot_user_id: Option<String>, api_key: &str) -> Self {
        let users = UserCache::new(directory.clone());
        Self { directory, users, bot_user_id, api_key: Arc::from(api_key) }
    }
}

// =============================================================================
// TEST HELPERS
// =============================================================================
