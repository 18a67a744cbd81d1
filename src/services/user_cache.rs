//! User cache: lazily filled id → profile map.
//!
//! DESIGN
//! ======
//! Profiles are treated as immutable for the life of the process, so
//! entries are never invalidated. Lookups take the read lock only; a miss
//! drops it, fetches through the directory, then takes the write lock to
//! insert. Two tasks missing on the same id may both fetch; the last insert
//! wins and both see an identical profile.
//!
//! ERROR HANDLING
//! ==============
//! Failed or empty fetches are logged and reported as `None`. Nothing is
//! cached for them, so the next lookup asks the server again.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::warn;

use crate::mattermost::Directory;
use crate::mattermost::types::UserProfile;

#[derive(Clone)]
pub struct UserCache {
    entries: Arc<RwLock<HashMap<String, UserProfile>>>,
    directory: Arc<dyn Directory>,
}

impl UserCache {
    #[must_use]
    pub fn new(directory: Arc<dyn Directory>) -> Self {
        Self { entries: Arc::new(RwLock::new(HashMap::new())), directory }
    }

    /// Return the profile for `user_id`, fetching it on first use.
    pub async fn get(&self, user_id: &str) -> Option<UserProfile> {
        if let Some(profile) = self.entries.read().await.get(user_id) {
            return Some(profile.clone());
        }

        match self.directory.get_user(user_id).await {
            Ok(Some(profile)) => {
                self.entries
                    .write()
                    .await
                    .insert(user_id.to_string(), profile.clone());
                Some(profile)
            }
            Ok(None) => {
                warn!(%user_id, "user not found");
                None
            }
            Err(e) => {
                warn!(error = %e, %user_id, "user lookup failed");
                None
            }
        }
    }
}

#[cfg(test)]
#[path = "user_cache_test.rs"]
mod tests;
