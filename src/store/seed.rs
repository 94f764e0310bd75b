//! Startup bootstrap of the root account.

use anyhow::{bail, Context, Result};
use tracing::info;

use super::{
    permissions::{grant_in, MANAGE_PERMISSIONS},
    users::{insert_user, lookup_login_record, SignupOutcome},
    Store,
};

/// Ensure `email` exists and holds `MANAGE_PERMISSIONS`, returning its user id.
///
/// Runs in one transaction and is idempotent: an existing account keeps its
/// password, and an existing grant is left alone.
///
/// # Errors
/// Returns an error if any statement fails; nothing is written in that case.
pub async fn ensure_root_user(store: &Store, email: &str, password_hash: &str) -> Result<i64> {
    let mut tx = store.pool().begin().await.context("begin seed transaction")?;

    let user_id = match lookup_login_record(&mut *tx, email).await? {
        Some(record) => record.user_id,
        None => match insert_user(&mut *tx, email, password_hash).await? {
            SignupOutcome::Created(user_id) => {
                info!(user_id, "root user created");
                user_id
            }
            SignupOutcome::Conflict => bail!("root user {email} appeared during seeding"),
        },
    };

    grant_in(&mut tx, user_id, MANAGE_PERMISSIONS).await?;

    tx.commit().await.context("commit seed transaction")?;

    Ok(user_id)
}
