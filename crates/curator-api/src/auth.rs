//! Session extraction and the admin predicate.

use axum::extract::FromRequestParts;
use axum::http::header::COOKIE;
use axum::http::request::Parts;
use curator_core::AppError;

use crate::error::HttpAppError;
use crate::session::{UserSession, SESSION_COOKIE};
use crate::state::AppState;

/// Extracts the logged-in user from the sealed session cookie. Rejects with
/// 401 when the cookie is absent, unknown, or fails integrity.
pub struct AuthSession(pub UserSession);

impl FromRequestParts<AppState> for AuthSession {
    type Rejection = HttpAppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let session_id = parts
            .headers
            .get(COOKIE)
            .and_then(|value| value.to_str().ok())
            .and_then(session_id_from_cookies)
            .ok_or(AppError::Unauthorized)?;

        let session = state
            .sessions
            .get(&session_id)
            .await?
            .ok_or(AppError::Unauthorized)?;

        Ok(AuthSession(session))
    }
}

/// 403 unless the configured admin predicate admits the user.
pub fn require_admin(state: &AppState, session: &UserSession) -> Result<(), HttpAppError> {
    if state.config.is_admin(&session.username) {
        Ok(())
    } else {
        Err(AppError::Forbidden.into())
    }
}

fn session_id_from_cookies(header: &str) -> Option<String> {
    header.split(';').find_map(|pair| {
        let (name, value) = pair.trim().split_once('=')?;
        (name == SESSION_COOKIE).then(|| value.to_string())
    })
}
