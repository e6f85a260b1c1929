//! Upload submission and batch listing routes.

use axum::extract::{Path, State};
use axum::Json;
use curator_core::models::{BatchUploadItem, NewUploadItem};
use serde::Deserialize;

use crate::auth::AuthSession;
use crate::error::HttpAppError;
use crate::ingest::create_uploads;
use crate::protocol::UploadCreatedItem;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct UploadPayload {
    pub handler: String,
    pub items: Vec<NewUploadItem>,
}

pub async fn upload(
    State(state): State<AppState>,
    AuthSession(session): AuthSession,
    Json(payload): Json<UploadPayload>,
) -> Result<Json<Vec<UploadCreatedItem>>, HttpAppError> {
    let created = create_uploads(&state, &session, &payload.handler, &payload.items).await?;
    Ok(Json(created))
}

pub async fn uploads_by_batch(
    State(state): State<AppState>,
    AuthSession(_session): AuthSession,
    Path(batch_id): Path<i64>,
) -> Result<Json<Vec<BatchUploadItem>>, HttpAppError> {
    let items = state.uploads.get_upload_request(batch_id).await?;
    Ok(Json(items))
}
