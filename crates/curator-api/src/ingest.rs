//! Upload submission service shared by the REST route and the live channel.

use curator_core::models::NewUploadItem;
use curator_core::AppError;

use crate::protocol::UploadCreatedItem;
use crate::session::UserSession;
use crate::state::AppState;

/// Persist one batch of upload requests and wake the worker once per row.
/// The handler tag is resolved before anything is written, so an unknown tag
/// fails the submission and never reaches a worker.
pub async fn create_uploads(
    state: &AppState,
    session: &UserSession,
    handler: &str,
    items: &[NewUploadItem],
) -> Result<Vec<UploadCreatedItem>, AppError> {
    if items.is_empty() {
        return Err(AppError::InvalidInput("No items to upload".to_string()));
    }
    state.registry.get(handler)?;

    let sealed = state.vault.seal(&session.access_token)?;
    let requests = state
        .uploads
        .create_upload_request(&session.userid, &session.username, handler, items, &sealed)
        .await?;

    for request in &requests {
        state.queue.submit(request.id).await;
    }

    Ok(requests
        .into_iter()
        .map(|request| UploadCreatedItem {
            id: request.id,
            status: request.status,
            image_id: request.key,
            input: request.collection,
            batch_id: request.batchid,
        })
        .collect())
}
