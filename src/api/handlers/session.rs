//! Session cookie helpers for the public surface.

use axum::http::{
    header::{InvalidHeaderValue, COOKIE},
    HeaderMap, HeaderValue,
};

use super::state::AuthConfig;
use crate::{
    api::error::ApiError,
    store::{sessions::lookup_session, Store},
};

pub const SESSION_COOKIE_NAME: &str = "oth_session";

/// Build the `HttpOnly` cookie carrying the session token.
pub(super) fn session_cookie(
    config: &AuthConfig,
    token: &str,
) -> Result<HeaderValue, InvalidHeaderValue> {
    let ttl_seconds = config.session_ttl_seconds();
    let mut cookie = format!(
        "{SESSION_COOKIE_NAME}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={ttl_seconds}"
    );
    if config.secure_cookies() {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

pub(super) fn extract_session_token(headers: &HeaderMap) -> Option<String> {
    // Browsers may split cookies over several headers.
    for header in headers.get_all(COOKIE) {
        let Ok(value) = header.to_str() else {
            continue;
        };
        for pair in value.split(';') {
            let mut parts = pair.trim().splitn(2, '=');
            let key = parts.next().map(str::trim);
            let val = parts.next().map(str::trim);
            if let (Some(SESSION_COOKIE_NAME), Some(val)) = (key, val) {
                if !val.is_empty() {
                    return Some(val.to_string());
                }
            }
        }
    }
    None
}

/// Resolve the caller's session cookie into a user id.
///
/// Missing cookie, unknown token and expired session are all `Forbidden`.
pub(super) async fn require_session(headers: &HeaderMap, store: &Store) -> Result<i64, ApiError> {
    let Some(token) = extract_session_token(headers) else {
        return Err(ApiError::Forbidden);
    };
    match lookup_session(store.pool(), &token).await {
        Ok(Some(record)) => Ok(record.user_id),
        Ok(None) => Err(ApiError::Forbidden),
        Err(err) => Err(ApiError::internal("Failed to lookup session", err)),
    }
}
