// The message endpoint: validate, authenticate, run one exchange.
use crate::api::errors::ApiError;
use crate::auth;
use crate::events::Content;
use crate::state::AppState;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::routing::post;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/api/agent", post(send_message))
}

#[derive(Debug, Deserialize)]
struct AgentRequest {
    #[serde(default)]
    message: Option<Value>,
}

async fn send_message(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: String,
) -> Result<Json<Value>, ApiError> {
    // The body is read raw so empty and unparsable payloads get distinct
    // client errors before any session or runtime work starts.
    if body.trim().is_empty() {
        return Err(ApiError::Validation("empty_body"));
    }
    let request: AgentRequest =
        serde_json::from_str(&body).map_err(|_| ApiError::Validation("invalid_json"))?;
    let message = match request.message {
        Some(message) if !message.is_null() => message,
        _ => return Err(ApiError::Validation("message_required")),
    };
    let content = Content::from_message(&message).ok_or(ApiError::Validation("invalid_message"))?;

    let user_id = auth::authenticated_user(state.storage.as_ref(), &headers)
        .ok_or(ApiError::Authentication)?;

    let outcome = state.reconciler.exchange(&user_id, content).await?;
    Ok(Json(json!({
        "events": outcome.events,
        "userId": outcome.user_id,
        "sessionId": outcome.session_id,
    })))
}
