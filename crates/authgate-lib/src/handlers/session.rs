//! Session introspection for API clients.
use crate::error::AppError;
use crate::middleware::session_tokens;
use crate::AppState;
use authgate_common::Principal;
use axum::{extract::State, http::HeaderMap, Json};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

/// Body of `GET /session`
#[derive(Debug, Serialize)]
pub struct SessionInfo {
    pub principal: Principal,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// `GET /session`: details of the session the request carries
pub async fn session_info(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<SessionInfo>, AppError> {
    let now = state.gateway.clock().now();
    let session = session_tokens(&headers, &state.settings.session.cookie_name)
        .into_iter()
        .find_map(|token| state.sessions.get(token, now))
        .ok_or(AppError::SessionNotFound)?;

    Ok(Json(SessionInfo {
        principal: session.principal,
        created_at: session.created_at,
        expires_at: session.expires_at,
    }))
}
