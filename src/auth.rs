// Identity-cookie handling: the username cookie is the sole credential.
use crate::storage::StorageBackend;
use axum::http::header::COOKIE;
use axum::http::HeaderMap;
use tracing::warn;

pub const COOKIE_NAME: &str = "username";
pub const COOKIE_MAX_AGE_SECONDS: u64 = 3600;

/// Builds the `Set-Cookie` value for a successful login. The cookie is
/// scoped to the whole site, hidden from client script, and expires one
/// hour after issuance. `secure` is set for production deployments only so
/// local HTTP testing keeps working.
pub fn identity_cookie(username: &str, secure: bool) -> String {
    format!(
        "{COOKIE_NAME}={username}; Path=/; HttpOnly; SameSite=Lax; Max-Age={COOKIE_MAX_AGE_SECONDS}{}",
        secure_suffix(secure)
    )
}

pub fn clear_identity_cookie(secure: bool) -> String {
    format!(
        "{COOKIE_NAME}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0{}",
        secure_suffix(secure)
    )
}

fn secure_suffix(secure: bool) -> &'static str {
    if secure {
        "; Secure"
    } else {
        ""
    }
}

/// Resolves the authenticated identity from request headers. Absent,
/// malformed, or unknown usernames resolve to `None`; a store failure is
/// logged and likewise treated as not authenticated.
pub fn authenticated_user(storage: &dyn StorageBackend, headers: &HeaderMap) -> Option<String> {
    let username = cookie_value(headers, COOKIE_NAME)?;
    match storage.get_user(&username) {
        Ok(Some(user)) => Some(user.user_id),
        Ok(None) => None,
        Err(err) => {
            warn!("identity lookup failed, treating request as unauthenticated: {err}");
            None
        }
    }
}

pub fn cookie_value(headers: &HeaderMap, cookie_name: &str) -> Option<String> {
    let raw = headers.get(COOKIE)?.to_str().ok()?;
    for part in raw.split(';') {
        let mut pieces = part.trim().splitn(2, '=');
        let key = pieces.next()?.trim();
        let value = pieces.next()?.trim();
        if key == cookie_name && !value.is_empty() {
            return Some(value.to_string());
        }
    }
    None
}
