//! REST routes.

pub mod admin;
pub mod collections;
pub mod ingest;
pub mod presets;

use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;

use crate::state::AppState;
use crate::ws;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(root))
        .route("/ws", get(ws::ws_handler))
        .route("/api/ingest/upload", post(ingest::upload))
        .route("/api/ingest/uploads/{batch_id}", get(ingest::uploads_by_batch))
        .route("/api/collections/images", post(collections::images))
        .route("/api/collections/sdc", post(collections::sdc))
        .route("/api/presets", get(presets::list).put(presets::upsert))
        .route("/api/admin/batches", get(admin::batches))
        .route("/api/admin/users", get(admin::users))
        .route("/api/admin/upload_requests", get(admin::upload_requests))
}

async fn root() -> Json<serde_json::Value> {
    Json(json!({ "message": "Welcome to the Curator API" }))
}
