//! Admin listing routes, gated by the configurable admin predicate.

use axum::extract::{Query, State};
use axum::Json;
use curator_core::models::{Batch, BatchUploadItem, User};
use serde::{Deserialize, Serialize};

use crate::auth::{require_admin, AuthSession};
use crate::error::HttpAppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct Pagination {
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_page() -> i64 {
    1
}

fn default_limit() -> i64 {
    100
}

impl Pagination {
    fn offset(&self) -> i64 {
        (self.page.max(1) - 1) * self.limit()
    }

    fn limit(&self) -> i64 {
        self.limit.clamp(1, 500)
    }
}

#[derive(Debug, Serialize)]
pub struct Listing<T> {
    pub items: Vec<T>,
    pub total: i64,
}

pub async fn batches(
    State(state): State<AppState>,
    AuthSession(session): AuthSession,
    Query(pagination): Query<Pagination>,
) -> Result<Json<Listing<Batch>>, HttpAppError> {
    require_admin(&state, &session)?;
    let items = state
        .batches
        .get_batches(pagination.offset(), pagination.limit(), None)
        .await?;
    let total = state.batches.count_batches(None).await?;
    Ok(Json(Listing { items, total }))
}

pub async fn users(
    State(state): State<AppState>,
    AuthSession(session): AuthSession,
    Query(pagination): Query<Pagination>,
) -> Result<Json<Listing<User>>, HttpAppError> {
    require_admin(&state, &session)?;
    let items = state
        .users
        .get_users(pagination.offset(), pagination.limit())
        .await?;
    let total = state.users.count_users().await?;
    Ok(Json(Listing { items, total }))
}

pub async fn upload_requests(
    State(state): State<AppState>,
    AuthSession(session): AuthSession,
    Query(pagination): Query<Pagination>,
) -> Result<Json<Listing<BatchUploadItem>>, HttpAppError> {
    require_admin(&state, &session)?;
    let items = state
        .uploads
        .get_all(pagination.offset(), pagination.limit())
        .await?;
    let total = state.uploads.count_all().await?;
    Ok(Json(Listing { items, total }))
}
