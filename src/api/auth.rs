// Login/logout: validates the username and manages the identity cookie.
use crate::api::errors::ApiError;
use crate::auth;
use crate::state::AppState;
use axum::extract::{Form, State};
use axum::http::header::SET_COOKIE;
use axum::http::HeaderValue;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/auth/login", post(login))
        .route("/api/auth/logout", post(logout))
}

#[derive(Debug, Deserialize)]
struct LoginForm {
    #[serde(default)]
    username: String,
}

async fn login(
    State(state): State<Arc<AppState>>,
    Form(form): Form<LoginForm>,
) -> Result<Response, ApiError> {
    let username = form.username.trim();
    if username.is_empty() {
        return Err(ApiError::Validation("username_required"));
    }
    let known = state.storage.get_user(username).map_err(ApiError::storage)?;
    if known.is_none() {
        return Err(ApiError::NotFound("user_not_found"));
    }
    let cookie = auth::identity_cookie(username, state.config.server.production);
    Ok(with_set_cookie(
        Json(json!({ "success": true })).into_response(),
        &cookie,
    ))
}

async fn logout(State(state): State<Arc<AppState>>) -> Response {
    // Clearing is unconditional: no identity check, no store access.
    let cookie = auth::clear_identity_cookie(state.config.server.production);
    with_set_cookie(Json(json!({ "success": true })).into_response(), &cookie)
}

fn with_set_cookie(mut response: Response, cookie: &str) -> Response {
    if let Ok(value) = HeaderValue::from_str(cookie) {
        response.headers_mut().append(SET_COOKIE, value);
    }
    response
}
