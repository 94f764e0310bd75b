use axum::{
    extract::Extension,
    http::{header::SET_COOKIE, HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use std::sync::Arc;
use tracing::{debug, instrument};

use super::{session::session_cookie, state::AuthState, Credentials};
use crate::{
    api::error::ApiError,
    store::{sessions::create_session, users::lookup_login_record, Store},
};

#[utoipa::path(
    post,
    path = "/login",
    request_body = Credentials,
    responses(
        (status = 200, description = "Authenticated; the session cookie is set", headers(
            ("set-cookie" = String, description = "oth_session cookie")
        )),
        (status = 400, description = "Missing email or password"),
        (status = 401, description = "Unknown email or wrong password"),
    ),
    tag = "auth"
)]
#[instrument(skip_all)]
pub async fn login(
    store: Extension<Store>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<Credentials>>,
) -> Result<impl IntoResponse, ApiError> {
    let Some(Json(credentials)) = payload else {
        return Err(ApiError::BadRequest("invalid payload"));
    };
    let (email, password) = credentials.into_parts()?;

    let record = lookup_login_record(store.pool(), &email)
        .await
        .map_err(|err| ApiError::internal("Failed to lookup login record", err))?;

    // Unknown accounts are verified against a dummy hash so both failures take
    // the same time and produce the same response.
    let hasher = auth_state.hasher();
    let (user_id, stored_hash) = match record {
        Some(record) => (Some(record.user_id), record.password_hash),
        None => (None, hasher.dummy_hash().to_string()),
    };
    let verified = hasher
        .verify(password, stored_hash)
        .await
        .map_err(|err| ApiError::internal("Failed to verify password", err))?;

    let Some(user_id) = user_id.filter(|_| verified) else {
        debug!("login rejected");
        return Err(ApiError::Unauthorized);
    };

    let token = create_session(
        store.pool(),
        user_id,
        auth_state.config().session_ttl_seconds(),
    )
    .await
    .map_err(|err| ApiError::internal("Failed to create session", err))?;

    let cookie = session_cookie(auth_state.config(), &token)
        .map_err(|err| ApiError::internal("Failed to build session cookie", err))?;

    let mut headers = HeaderMap::new();
    headers.insert(SET_COOKIE, cookie);

    debug!(user_id, "login succeeded");

    Ok((StatusCode::OK, headers))
}
