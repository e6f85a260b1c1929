//! MediaWiki (Wikimedia Commons) client.
//!
//! The worker talks to the wiki exclusively through the `WikiClient` trait:
//! title blacklist checks, duplicate lookup by content hash, chunked upload
//! under the hash-lock contract, and MediaInfo SDC/label writes.

pub mod client;
pub mod download;
pub mod hash_lock;
pub mod oauth;

use std::collections::BTreeMap;
use std::path::Path;

use async_trait::async_trait;
use curator_core::models::{ErrorLink, Label};
use curator_core::sdc::Statement;
use serde::{Deserialize, Serialize};

pub use client::{MediaWikiClient, MediaWikiClientFactory};
pub use download::{download_to_temp, StreamingDownload};
pub use hash_lock::{HashLockGuard, HashLockRegistry};
pub use oauth::OAuth1;

#[derive(Debug, thiserror::Error)]
pub enum WikiError {
    /// Another worker holds the upload lock for this content hash. Retriable;
    /// never mark the job failed on this.
    #[error("Hash lock held for content {sha1}")]
    HashLock { sha1: String },

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("MediaWiki API error {code}: {info}")]
    Api { code: String, info: String },

    #[error("Upstream error ({status}): {body}")]
    Upstream { status: u16, body: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl WikiError {
    pub fn is_transient(&self) -> bool {
        match self {
            WikiError::HashLock { .. } | WikiError::Network(_) => true,
            WikiError::Upstream { status, .. } => *status >= 500 || *status == 429,
            // MediaWiki signals replication pressure via maxlag/readonly.
            WikiError::Api { code, .. } => code == "maxlag" || code == "readonly",
            _ => false,
        }
    }
}

/// Receipt for a finished upload; `url` is the file page URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadReceipt {
    pub title: String,
    pub url: String,
}

/// Builds a `WikiClient` bound to one job's unsealed credentials. The
/// worker constructs a fresh client per job, so the factory is the seam
/// tests mock.
pub trait WikiClientFactory: Send + Sync {
    fn create(
        &self,
        token: &curator_core::AccessToken,
        username: &str,
    ) -> std::sync::Arc<dyn WikiClient>;
}

#[async_trait]
pub trait WikiClient: Send + Sync {
    /// `Some(reason)` when the wiki's title blacklist blocks creation.
    async fn check_title_blacklisted(&self, title: &str) -> Result<Option<String>, WikiError>;

    /// File pages whose content hash matches; links carry the file *page*
    /// URL (`/wiki/File:…`), not the raw media URL.
    async fn find_duplicates(&self, content_sha1: &str) -> Result<Vec<ErrorLink>, WikiError>;

    /// Existing MediaInfo statements for a file title, `None` when the page
    /// does not exist yet.
    async fn fetch_sdc(&self, title: &str) -> Result<Option<Vec<Statement>>, WikiError>;

    /// Chunked upload under the hash-lock contract: raises
    /// `WikiError::HashLock` unchanged when another worker owns the hash.
    async fn upload_chunked(
        &self,
        local_path: &Path,
        content_sha1: &str,
        target_title: &str,
        wikitext: &str,
        edit_summary: &str,
        edit_group: &str,
    ) -> Result<UploadReceipt, WikiError>;

    /// Write the merged claim list (and labels) and trigger a null edit.
    async fn apply_sdc(
        &self,
        title: &str,
        statements: &[Statement],
        labels: Option<&BTreeMap<String, Label>>,
        edit_summary: &str,
    ) -> Result<(), WikiError>;
}
