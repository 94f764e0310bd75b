//! Session to permission resolution.
//!
//! Both surfaces answer with the same JSON array. The public route reads the
//! session from the cookie; the internal route takes it from the path and
//! trusts the caller, relying on the listener being reachable only from a
//! private network.

use axum::{
    extract::{Extension, Path},
    http::HeaderMap,
    Json,
};
use tracing::{debug, instrument};

use super::session::require_session;
use crate::{
    api::error::ApiError,
    store::{permissions::permission_names_for_user, sessions::lookup_session, Store},
};

#[utoipa::path(
    get,
    path = "/permissions",
    responses(
        (status = 200, description = "Permission names of the session user", body = [String]),
        (status = 403, description = "Missing, unknown or expired session"),
    ),
    tag = "permissions"
)]
#[instrument(skip_all)]
pub async fn permissions(
    headers: HeaderMap,
    store: Extension<Store>,
) -> Result<Json<Vec<String>>, ApiError> {
    let user_id = require_session(&headers, &store).await?;
    resolve(&store, user_id).await.map(Json)
}

#[utoipa::path(
    get,
    path = "/permissions/{session_id}",
    params(
        ("session_id" = String, Path, description = "Raw session token issued by /login")
    ),
    responses(
        (status = 200, description = "Permission names; empty when the user no longer exists", body = [String]),
        (status = 403, description = "Unknown or expired session"),
        (status = 500, description = "Store failure"),
    ),
    tag = "internal"
)]
#[instrument(skip_all)]
pub async fn session_permissions(
    Path(session_id): Path<String>,
    store: Extension<Store>,
) -> Result<Json<Vec<String>>, ApiError> {
    let record = lookup_session(store.pool(), &session_id)
        .await
        .map_err(|err| ApiError::internal("Failed to lookup session", err))?
        .ok_or(ApiError::Forbidden)?;

    resolve(&store, record.user_id).await.map(Json)
}

async fn resolve(store: &Store, user_id: i64) -> Result<Vec<String>, ApiError> {
    let names = permission_names_for_user(store.pool(), user_id)
        .await
        .map_err(|err| ApiError::internal("Failed to load permissions", err))?;

    Ok(names.unwrap_or_else(|| {
        debug!(user_id, "session references a deleted user");
        Vec::new()
    }))
}
