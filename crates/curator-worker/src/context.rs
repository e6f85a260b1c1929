//! Worker context: everything a job needs, built once at startup and
//! threaded through the call graph. No process-global mutable state.

use async_trait::async_trait;
use curator_commons::{download_to_temp, WikiClientFactory, WikiError};
use curator_core::models::{UploadDelta, UploadRequest};
use curator_core::TokenVault;
use curator_db::{UploadRepository, UserRepository};
use curator_handlers::HandlerRegistry;
use tempfile::NamedTempFile;

use crate::retry::RetryPolicy;

/// Streams provider media to a scoped temp file, returning the file and its
/// hex SHA-1. Seam for tests; production uses plain HTTP.
#[async_trait]
pub trait MediaFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<(NamedTempFile, String), WikiError>;
}

pub struct HttpMediaFetcher {
    client: reqwest::Client,
}

impl HttpMediaFetcher {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl MediaFetcher for HttpMediaFetcher {
    async fn fetch(&self, url: &str) -> Result<(NamedTempFile, String), WikiError> {
        download_to_temp(&self.client, url).await
    }
}

/// Receives per-request status deltas as the worker drives the state
/// machine. The live progress hub implements this; tests record.
pub trait ProgressSink: Send + Sync {
    fn publish_update(&self, batchid: i64, delta: UploadDelta);
    fn publish_complete(&self, batchid: i64);
}

/// Sink for deployments without a web surface (CLI backfills).
pub struct NoopProgress;

impl ProgressSink for NoopProgress {
    fn publish_update(&self, _batchid: i64, _delta: UploadDelta) {}
    fn publish_complete(&self, _batchid: i64) {}
}

pub struct WorkerContext {
    pub uploads: UploadRepository,
    pub users: UserRepository,
    pub registry: HandlerRegistry,
    pub vault: TokenVault,
    pub wiki_factory: std::sync::Arc<dyn WikiClientFactory>,
    pub media: std::sync::Arc<dyn MediaFetcher>,
    pub progress: std::sync::Arc<dyn ProgressSink>,
    pub retry: RetryPolicy,
}

impl WorkerContext {
    /// Announce the request's current state to batch subscribers.
    pub fn publish(&self, request: &UploadRequest) {
        self.progress.publish_update(
            request.batchid,
            UploadDelta {
                id: request.id,
                status: request.status,
                success: request.success.clone(),
                error: request.error.clone(),
                updated_at: request.updated_at,
                last_edited_by: None,
            },
        );
    }
}
