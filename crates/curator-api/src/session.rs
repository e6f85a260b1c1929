//! Server-side session store.
//!
//! Session payloads are sealed at rest with the token vault; a tampered
//! entry reads as a miss (and is invalidated), so a corrupted session can
//! only ever degrade to "logged out".

use curator_core::{AccessToken, AppError, MemoryCache, SealedCache, TokenVault};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const SESSION_COOKIE: &str = "curator_session";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserSession {
    pub userid: String,
    pub username: String,
    pub access_token: AccessToken,
}

pub struct SessionStore {
    cache: SealedCache<MemoryCache>,
}

impl SessionStore {
    pub fn new(vault: TokenVault) -> Self {
        Self {
            cache: SealedCache::new(MemoryCache::new(), vault),
        }
    }

    /// Open a session and return its id (the cookie value).
    pub async fn create(&self, user: &UserSession) -> Result<String, AppError> {
        let session_id = Uuid::new_v4().to_string();
        let payload = serde_json::to_string(user)?;
        self.cache.set(&session_id, &payload).await?;
        Ok(session_id)
    }

    pub async fn get(&self, session_id: &str) -> Result<Option<UserSession>, AppError> {
        let Some(payload) = self.cache.get(session_id).await? else {
            return Ok(None);
        };
        Ok(Some(serde_json::from_str(&payload)?))
    }

    pub async fn destroy(&self, session_id: &str) -> Result<(), AppError> {
        self.cache.delete(session_id).await
    }
}
