//! Per-user preset routes.

use axum::extract::State;
use axum::Json;
use curator_core::models::Preset;
use serde::Deserialize;

use crate::auth::AuthSession;
use crate::error::HttpAppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct PresetPayload {
    pub handler: String,
    pub name: String,
    #[serde(default)]
    pub wikitext: Option<String>,
    #[serde(default)]
    pub is_default: bool,
}

pub async fn list(
    State(state): State<AppState>,
    AuthSession(session): AuthSession,
) -> Result<Json<Vec<Preset>>, HttpAppError> {
    let presets = state.presets.get_presets(&session.userid).await?;
    Ok(Json(presets))
}

pub async fn upsert(
    State(state): State<AppState>,
    AuthSession(session): AuthSession,
    Json(payload): Json<PresetPayload>,
) -> Result<Json<Preset>, HttpAppError> {
    // Presets can be saved before the user's first upload.
    state
        .users
        .upsert(&session.userid, &session.username)
        .await?;
    let preset = state
        .presets
        .upsert_preset(
            &session.userid,
            &payload.handler,
            &payload.name,
            payload.wikitext.as_deref(),
            payload.is_default,
        )
        .await?;
    Ok(Json(preset))
}
