//! Upload queue: worker pool, wake channel, and poll fallback.
//!
//! Submissions arrive over an in-process channel for low latency; a poll
//! loop over `queued` rows provides at-least-once delivery after a crash or
//! a dropped send. The status-as-lease guard in the state machine makes the
//! inevitable double deliveries harmless.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Semaphore};
use tokio::time::sleep;

use crate::context::WorkerContext;
use crate::ingest;

#[derive(Clone)]
pub struct UploadQueueConfig {
    pub max_workers: usize,
    pub poll_interval_ms: u64,
}

impl Default for UploadQueueConfig {
    fn default() -> Self {
        Self {
            max_workers: 1,
            poll_interval_ms: 1000,
        }
    }
}

pub struct UploadQueue {
    submit_tx: mpsc::Sender<i64>,
    shutdown_tx: mpsc::Sender<()>,
}

impl UploadQueue {
    pub fn start(ctx: Arc<WorkerContext>, config: UploadQueueConfig) -> Self {
        let (submit_tx, submit_rx) = mpsc::channel(256);
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

        tokio::spawn(worker_pool(ctx, config, submit_rx, shutdown_rx));

        Self {
            submit_tx,
            shutdown_tx,
        }
    }

    /// Wake the pool for a freshly persisted request. Best-effort: a full
    /// channel is fine, the poll fallback will find the row.
    pub async fn submit(&self, upload_id: i64) {
        if self.submit_tx.send(upload_id).await.is_err() {
            tracing::warn!(upload_id, "Worker pool is gone, relying on poll fallback");
        }
    }

    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(()).await;
    }
}

async fn worker_pool(
    ctx: Arc<WorkerContext>,
    config: UploadQueueConfig,
    mut submit_rx: mpsc::Receiver<i64>,
    mut shutdown_rx: mpsc::Receiver<()>,
) {
    tracing::info!(
        max_workers = config.max_workers,
        poll_interval_ms = config.poll_interval_ms,
        "Upload worker pool started"
    );

    let semaphore = Arc::new(Semaphore::new(config.max_workers));
    let poll_interval = Duration::from_millis(config.poll_interval_ms);

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => {
                tracing::info!("Upload worker pool shutting down");
                break;
            }
            Some(upload_id) = submit_rx.recv() => {
                dispatch(&ctx, &semaphore, upload_id);
            }
            _ = sleep(poll_interval) => {
                match ctx.uploads.list_queued_ids(config.max_workers as i64).await {
                    Ok(ids) => {
                        for upload_id in ids {
                            dispatch(&ctx, &semaphore, upload_id);
                        }
                    }
                    Err(err) => {
                        tracing::error!(error = %err, "Failed to poll for queued uploads");
                    }
                }
            }
        }
    }
}

fn dispatch(ctx: &Arc<WorkerContext>, semaphore: &Arc<Semaphore>, upload_id: i64) {
    let permit = match Arc::clone(semaphore).try_acquire_owned() {
        Ok(permit) => permit,
        Err(_) => {
            // All workers busy; the poll fallback redelivers this id.
            tracing::debug!(upload_id, "No worker available, deferring");
            return;
        }
    };

    let ctx = Arc::clone(ctx);
    tokio::spawn(async move {
        let _permit = permit;
        match ingest::process_one(&ctx, upload_id).await {
            Ok(true) => {}
            Ok(false) => {
                tracing::debug!(upload_id, "Request was not queued, skipped");
            }
            Err(err) => {
                tracing::error!(upload_id, error = %err, "Upload processing errored");
            }
        }
    });
}
