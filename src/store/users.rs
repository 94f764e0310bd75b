//! User rows: creation, credential lookup by email, deletion.

use anyhow::{Context, Result};
use sqlx::{sqlite::SqliteExecutor, Row};
use tracing::{info_span, Instrument};

/// Outcome when attempting to create a new user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignupOutcome {
    Created(i64),
    Conflict,
}

/// Minimal fields needed to verify a login attempt.
pub struct LoginRecord {
    pub user_id: i64,
    pub password_hash: String,
}

impl std::fmt::Debug for LoginRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginRecord")
            .field("user_id", &self.user_id)
            .field("password_hash", &"***")
            .finish()
    }
}

/// Insert a user; the UNIQUE constraint on `email` decides conflicts, so two
/// concurrent registrations of the same address yield exactly one row.
///
/// # Errors
/// Returns an error for any database failure other than a duplicate email.
pub async fn insert_user<'c, E>(executor: E, email: &str, password_hash: &str) -> Result<SignupOutcome>
where
    E: SqliteExecutor<'c>,
{
    let query = "INSERT INTO users (email, password_hash) VALUES (?, ?)";
    let span = info_span!(
        "db.query",
        db.system = "sqlite",
        db.operation = "INSERT",
        db.statement = query
    );
    let result = sqlx::query(query)
        .bind(email)
        .bind(password_hash)
        .execute(executor)
        .instrument(span)
        .await;

    match result {
        Ok(done) => Ok(SignupOutcome::Created(done.last_insert_rowid())),
        Err(err) if is_unique_violation(&err) => Ok(SignupOutcome::Conflict),
        Err(err) => Err(err).context("failed to insert user"),
    }
}

/// Look up login data by exact (case-sensitive) email.
///
/// # Errors
/// Returns an error if the query fails.
pub async fn lookup_login_record<'c, E>(executor: E, email: &str) -> Result<Option<LoginRecord>>
where
    E: SqliteExecutor<'c>,
{
    let query = "SELECT id, password_hash FROM users WHERE email = ?";
    let span = info_span!(
        "db.query",
        db.system = "sqlite",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(email)
        .fetch_optional(executor)
        .instrument(span)
        .await
        .context("failed to lookup login record")?;

    row.map(|row| -> Result<LoginRecord, sqlx::Error> {
        Ok(LoginRecord {
            user_id: row.try_get("id")?,
            password_hash: row.try_get("password_hash")?,
        })
    })
    .transpose()
    .context("failed to decode login record")
}

/// Delete a user and, through the cascade, their permission grants.
/// Sessions are left untouched and become dangling.
///
/// Returns `true` if a row was removed.
///
/// # Errors
/// Returns an error if the statement fails.
#[cfg(test)]
pub(crate) async fn delete_user<'c, E>(executor: E, user_id: i64) -> Result<bool>
where
    E: SqliteExecutor<'c>,
{
    let query = "DELETE FROM users WHERE id = ?";
    let span = info_span!(
        "db.query",
        db.system = "sqlite",
        db.operation = "DELETE",
        db.statement = query
    );
    let done = sqlx::query(query)
        .bind(user_id)
        .execute(executor)
        .instrument(span)
        .await
        .context("failed to delete user")?;

    Ok(done.rows_affected() > 0)
}

pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.is_unique_violation(),
        _ => false,
    }
}
