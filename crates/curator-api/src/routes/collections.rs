//! Collection preview routes: browse a provider album and derive its SDC.

use std::collections::HashMap;

use axum::extract::State;
use axum::Json;
use curator_core::sdc::Statement;
use curator_core::AppError;
use serde::Deserialize;

use crate::auth::AuthSession;
use crate::error::HttpAppError;
use crate::protocol::CollectionImagesData;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ImagesRequest {
    pub handler: String,
    pub input: String,
}

#[derive(Debug, Deserialize)]
pub struct SdcRequest {
    pub handler: String,
    pub input: String,
    #[serde(default)]
    pub images: Vec<String>,
}

pub async fn images(
    State(state): State<AppState>,
    AuthSession(_session): AuthSession,
    Json(payload): Json<ImagesRequest>,
) -> Result<Json<CollectionImagesData>, HttpAppError> {
    let handler = state.registry.get(&payload.handler)?;

    let mut images = handler
        .fetch_collection(&payload.input)
        .await
        .map_err(AppError::from)?;
    if images.is_empty() {
        return Err(AppError::NotFound("Collection not found".to_string()).into());
    }

    let image_ids: Vec<String> = images.keys().cloned().collect();
    let existing = handler
        .fetch_existing_pages(&image_ids)
        .await
        .map_err(AppError::from)?;
    for (image_id, pages) in existing {
        if let Some(image) = images.get_mut(&image_id) {
            image.existing = Some(pages);
        }
    }

    let creator = images
        .values()
        .next()
        .map(|image| image.creator.clone())
        .expect("non-empty collection");

    Ok(Json(CollectionImagesData {
        creator,
        images: images.into_values().collect(),
    }))
}

/// Canonical SDC for selected images of a collection. Image id values may be
/// comma-separated bundles; unknown ids are skipped.
pub async fn sdc(
    State(state): State<AppState>,
    AuthSession(_session): AuthSession,
    Json(payload): Json<SdcRequest>,
) -> Result<Json<HashMap<String, Vec<Statement>>>, HttpAppError> {
    let handler = state.registry.get(&payload.handler)?;

    let expanded: Vec<String> = payload
        .images
        .iter()
        .flat_map(|bundle| bundle.split(','))
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .collect();

    let images = handler
        .fetch_collection(&payload.input)
        .await
        .map_err(AppError::from)?;

    let mut result = HashMap::new();
    for image_id in expanded {
        if let Some(image) = images.get(&image_id) {
            result.insert(image_id, handler.build_sdc(image));
        }
    }
    Ok(Json(result))
}
