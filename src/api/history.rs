// Session history retrieval with ownership checks.
use crate::api::errors::ApiError;
use crate::auth;
use crate::events;
use crate::state::AppState;
use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/api/session-history", get(session_history))
}

#[derive(Debug, Deserialize)]
struct HistoryQuery {
    #[serde(rename = "sessionId", default)]
    session_id: Option<String>,
}

async fn session_history(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Value>, ApiError> {
    let user_id = auth::authenticated_user(state.storage.as_ref(), &headers)
        .ok_or(ApiError::Authentication)?;
    let session_id = query
        .session_id
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or(ApiError::Validation("session_id_required"))?;

    let session = state
        .storage
        .get_session(session_id)
        .map_err(ApiError::storage)?
        .ok_or(ApiError::NotFound("session_not_found"))?;
    if session.user_id != user_id {
        // Another user's session: deny without returning its contents.
        return Err(ApiError::Authorization);
    }

    // Stored events were sanitized at write time; a corrupt blob reads as
    // an empty history rather than an error.
    Ok(Json(json!({ "events": events::decode_events(&session.events) })))
}
