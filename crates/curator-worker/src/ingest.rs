//! The upload state machine.
//!
//! `process_one` drives a single request from `queued` to exactly one
//! terminal state. The row's status is the lease: re-delivery of an id that
//! is no longer `queued` is a no-op. The post-acquisition execution runs
//! under the retry driver while the row stays `in_progress`; the terminal
//! transition is applied exactly once afterwards.

use curator_commons::{UploadReceipt, WikiError};
use curator_core::models::{ErrorLink, UploadError, UploadRequest, UploadStatus};
use curator_core::{AppError, TaskError, TaskResultExt};
use curator_handlers::HandlerError;

use crate::context::WorkerContext;
use curator_db::StatusUpdate;

enum Outcome {
    Completed { receipt: UploadReceipt },
    Duplicate { links: Vec<ErrorLink> },
    Blacklisted { reason: String },
}

/// Process one upload request end to end. Returns `false` when the request
/// was not in `queued` (another worker owns it or it already finished).
#[tracing::instrument(skip(ctx))]
pub async fn process_one(ctx: &WorkerContext, upload_id: i64) -> Result<bool, AppError> {
    let Some(request) = ctx.uploads.acquire_for_processing(upload_id).await? else {
        return Ok(false);
    };
    tracing::info!(upload_id, batchid = request.batchid, "Processing upload");
    ctx.publish(&request);

    let outcome = ctx.retry.run(|| execute_upload(ctx, &request)).await;

    let (status, update) = match outcome {
        Ok(Outcome::Completed { receipt }) => {
            let result = serde_json::to_string(&receipt).ok();
            (
                UploadStatus::Completed,
                StatusUpdate {
                    success: Some(receipt.url),
                    result,
                    ..Default::default()
                },
            )
        }
        Ok(Outcome::Duplicate { links }) => (
            UploadStatus::Duplicate,
            StatusUpdate {
                error: Some(UploadError::Duplicate {
                    message: "File already exists".to_string(),
                    links,
                }),
                ..Default::default()
            },
        ),
        Ok(Outcome::Blacklisted { reason }) => (
            UploadStatus::Failed,
            StatusUpdate {
                error: Some(UploadError::Blacklisted {
                    message: "Title is blacklisted".to_string(),
                    reason,
                }),
                ..Default::default()
            },
        ),
        Err(err) => {
            tracing::warn!(upload_id, error = %err, "Upload failed");
            (
                UploadStatus::Failed,
                StatusUpdate {
                    error: Some(UploadError::Error {
                        message: err.to_string(),
                    }),
                    ..Default::default()
                },
            )
        }
    };

    // Terminal transition; the sealed token is wiped in the same statement.
    ctx.uploads.update_status(upload_id, status, update).await?;

    if let Some(updated) = ctx.uploads.get_by_id(upload_id).await? {
        ctx.publish(&updated);
    }
    if ctx.uploads.count_open_for_batch(request.batchid).await? == 0 {
        ctx.progress.publish_complete(request.batchid);
    }

    tracing::info!(upload_id, status = %status, "Upload finished");
    Ok(true)
}

async fn execute_upload(
    ctx: &WorkerContext,
    request: &UploadRequest,
) -> Result<Outcome, TaskError> {
    let sealed = request
        .access_token
        .as_deref()
        .ok_or_else(|| TaskError::unrecoverable(anyhow::anyhow!("Missing access token")))?;
    let token = ctx.vault.unseal(sealed).unrecoverable()?;

    let username = ctx
        .users
        .get_username(&request.userid)
        .await
        .map_err(TaskError::unrecoverable)?
        .ok_or_else(|| TaskError::unrecoverable(anyhow::anyhow!("Unknown user")))?;
    let wiki = ctx.wiki_factory.create(&token, &username);

    let handler = ctx
        .registry
        .get(&request.handler)
        .map_err(TaskError::unrecoverable)?;

    let image = handler
        .fetch_image_metadata(&request.key, request.collection.as_deref())
        .await
        .map_err(task_error_from_handler)?;

    if let Some(reason) = wiki
        .check_title_blacklisted(&request.filename)
        .await
        .map_err(task_error_from_wiki)?
    {
        return Ok(Outcome::Blacklisted { reason });
    }

    // Temp file lives to the end of this scope and is deleted on every exit
    // path, including errors.
    let (media_file, content_sha1) = ctx
        .media
        .fetch(&image.urls.original)
        .await
        .map_err(task_error_from_wiki)?;

    let duplicates = wiki
        .find_duplicates(&content_sha1)
        .await
        .map_err(task_error_from_wiki)?;
    if !duplicates.is_empty() && !request.copyright_override {
        return Ok(Outcome::Duplicate { links: duplicates });
    }

    let proposed = match &request.sdc {
        Some(statements) => statements.clone(),
        None => handler.build_sdc(&image),
    };
    let merged = match wiki
        .fetch_sdc(&request.filename)
        .await
        .map_err(task_error_from_wiki)?
    {
        Some(existing) => curator_core::sdc::merge_statements(&existing, &proposed),
        None => proposed,
    };

    let edit_summary = format!("Uploaded {} image {}", handler.name(), image.id);
    let edit_group = format!("{:x}", request.batchid);

    let receipt = wiki
        .upload_chunked(
            media_file.path(),
            &content_sha1,
            &request.filename,
            request.wikitext.as_deref().unwrap_or_default(),
            &edit_summary,
            &edit_group,
        )
        .await
        .map_err(task_error_from_wiki)?;

    wiki.apply_sdc(
        &request.filename,
        &merged,
        request.labels.as_ref(),
        &edit_summary,
    )
    .await
    .map_err(task_error_from_wiki)?;

    Ok(Outcome::Completed { receipt })
}

fn task_error_from_handler(err: HandlerError) -> TaskError {
    if err.is_transient() {
        TaskError::recoverable(err)
    } else {
        TaskError::unrecoverable(err)
    }
}

/// A held hash lock stays retriable all the way up to the driver; the job is
/// never failed because of it.
fn task_error_from_wiki(err: WikiError) -> TaskError {
    if err.is_transient() {
        TaskError::recoverable(err)
    } else {
        TaskError::unrecoverable(err)
    }
}
