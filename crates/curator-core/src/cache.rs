//! Sealed cache store with integrity recovery
//!
//! Cached values are sealed with the token vault before they reach the
//! backend. A value that fails authentication on read is treated as a cache
//! miss: the compromised key is deleted from the backend and `None` is
//! returned to the caller. Write- and delete-path errors always propagate;
//! a failing invalidation must not be swallowed.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::AppError;
use crate::vault::TokenVault;

#[async_trait]
pub trait CacheBackend: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, AppError>;
    async fn set(&self, key: &str, value: String) -> Result<(), AppError>;
    async fn delete(&self, key: &str) -> Result<(), AppError>;
}

/// Process-local backend. Sufficient for a single-process deployment; the
/// trait seam exists so a shared backend can be dropped in.
#[derive(Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheBackend for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>, AppError> {
        Ok(self.entries.lock().unwrap().get(key).cloned())
    }

    async fn set(&self, key: &str, value: String) -> Result<(), AppError> {
        self.entries.lock().unwrap().insert(key.to_string(), value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), AppError> {
        self.entries.lock().unwrap().remove(key);
        Ok(())
    }
}

pub struct SealedCache<B> {
    backend: B,
    vault: TokenVault,
}

impl<B: CacheBackend> SealedCache<B> {
    pub fn new(backend: B, vault: TokenVault) -> Self {
        Self { backend, vault }
    }

    /// Read a value. Tamper detection degrades to a miss after invalidating
    /// the key; a failing invalidation propagates.
    pub async fn get(&self, key: &str) -> Result<Option<String>, AppError> {
        let Some(sealed) = self.backend.get(key).await? else {
            return Ok(None);
        };

        match self.vault.unseal_str(&sealed) {
            Ok(value) => Ok(Some(value)),
            Err(err) => {
                tracing::warn!(key = %key, error = %err, "Cache value failed integrity check, invalidating");
                self.backend.delete(key).await?;
                Ok(None)
            }
        }
    }

    pub async fn set(&self, key: &str, value: &str) -> Result<(), AppError> {
        let sealed = self.vault.seal_str(value)?;
        self.backend.set(key, sealed).await
    }

    pub async fn delete(&self, key: &str) -> Result<(), AppError> {
        self.backend.delete(key).await
    }
}
