use axum::{extract::Extension, http::StatusCode, Json};
use std::sync::Arc;
use tracing::{debug, instrument};

use super::{state::AuthState, valid_email, Credentials};
use crate::{
    api::error::ApiError,
    store::{
        users::{insert_user, SignupOutcome},
        Store,
    },
};

#[utoipa::path(
    post,
    path = "/register",
    request_body = Credentials,
    responses(
        (status = 200, description = "User created without permissions"),
        (status = 400, description = "Missing or malformed email or password"),
        (status = 409, description = "Email already registered"),
    ),
    tag = "auth"
)]
#[instrument(skip_all)]
pub async fn register(
    store: Extension<Store>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<Credentials>>,
) -> Result<StatusCode, ApiError> {
    let Some(Json(credentials)) = payload else {
        return Err(ApiError::BadRequest("invalid payload"));
    };
    let (email, password) = credentials.into_parts()?;

    if !valid_email(&email) {
        return Err(ApiError::BadRequest("invalid email"));
    }

    let password_hash = auth_state
        .hasher()
        .hash(password)
        .await
        .map_err(|err| ApiError::internal("Failed to hash password", err))?;

    // The UNIQUE constraint on email settles concurrent registrations.
    match insert_user(store.pool(), &email, &password_hash).await {
        Ok(SignupOutcome::Created(user_id)) => {
            debug!(user_id, "user registered");
            Ok(StatusCode::OK)
        }
        Ok(SignupOutcome::Conflict) => Err(ApiError::Conflict("email already registered")),
        Err(err) => Err(ApiError::internal("Failed to insert user", err)),
    }
}
