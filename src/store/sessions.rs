//! Session store: the only channel of trust between the public and internal surfaces.
//!
//! Flow Overview: the public surface calls [`create_session`] after a password
//! check and hands the raw token to the browser. Either surface later calls
//! [`lookup_session`] with that token. Only the SHA-256 of a token is ever
//! written, so a copy of the database cannot be replayed as cookies.
//!
//! Sessions have a fixed lifetime measured from creation; reads never extend
//! it. Expired rows are invisible to reads and removed by the sweeper.

use anyhow::{anyhow, Context, Result};
use base64ct::{Base64UrlUnpadded, Encoding};
use rand::{rngs::OsRng, RngCore};
use sha2::{Digest, Sha256};
use sqlx::{Row, SqlitePool};
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, info_span, Instrument};

use super::{users::is_unique_violation, Store};

const SESSION_TOKEN_BYTES: usize = 32;
const CREATE_ATTEMPTS: usize = 3;

/// Payload resolved from a live session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionRecord {
    pub user_id: i64,
    pub expires_at_unix: i64,
}

/// Create a new session token for the auth cookie.
///
/// # Errors
/// Returns an error if the OS random source fails.
pub fn generate_session_token() -> Result<String> {
    let mut bytes = [0u8; SESSION_TOKEN_BYTES];
    OsRng
        .try_fill_bytes(&mut bytes)
        .context("failed to generate session token")?;
    Ok(Base64UrlUnpadded::encode_string(&bytes))
}

/// Hash a session token so raw values never touch the database.
#[must_use]
pub fn hash_session_token(token: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hasher.finalize().to_vec()
}

/// Store a fresh session for `user_id` and return the raw token.
///
/// # Errors
/// Returns an error if the insert fails or no unique token is found after retries.
pub async fn create_session(pool: &SqlitePool, user_id: i64, ttl_seconds: i64) -> Result<String> {
    let query = r"
        INSERT INTO sessions (token_hash, user_id, created_at, expires_at)
        VALUES (
            ?,
            ?,
            CAST(strftime('%s', 'now') AS INTEGER),
            CAST(strftime('%s', 'now') AS INTEGER) + ?
        )
    ";
    let span = info_span!(
        "db.query",
        db.system = "sqlite",
        db.operation = "INSERT",
        db.statement = query
    );

    for _ in 0..CREATE_ATTEMPTS {
        let token = generate_session_token()?;
        let token_hash = hash_session_token(&token);
        let result = sqlx::query(query)
            .bind(token_hash)
            .bind(user_id)
            .bind(ttl_seconds)
            .execute(pool)
            .instrument(span.clone())
            .await;

        match result {
            Ok(_) => return Ok(token),
            Err(err) if is_unique_violation(&err) => {
                debug!("session token collision, retrying");
            }
            Err(err) => return Err(err).context("failed to insert session"),
        }
    }

    Err(anyhow!("failed to generate unique session token"))
}

/// Resolve a raw session token.
///
/// Returns `Ok(None)` when the session is unknown or expired; callers must not
/// tell the two apart.
///
/// # Errors
/// Returns an error only if the store itself fails.
pub async fn lookup_session(pool: &SqlitePool, token: &str) -> Result<Option<SessionRecord>> {
    if token.is_empty() {
        return Ok(None);
    }
    let token_hash = hash_session_token(token);

    let query = r"
        SELECT user_id, expires_at
        FROM sessions
        WHERE token_hash = ?
          AND expires_at > CAST(strftime('%s', 'now') AS INTEGER)
        LIMIT 1
    ";
    let span = info_span!(
        "db.query",
        db.system = "sqlite",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(token_hash)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to lookup session")?;

    row.map(|row| -> Result<SessionRecord, sqlx::Error> {
        Ok(SessionRecord {
            user_id: row.try_get("user_id")?,
            expires_at_unix: row.try_get("expires_at")?,
        })
    })
    .transpose()
    .context("failed to decode session")
}

/// Delete every expired session, returning how many rows were removed.
///
/// # Errors
/// Returns an error if the statement fails.
pub async fn purge_expired_sessions(pool: &SqlitePool) -> Result<u64> {
    let query = "DELETE FROM sessions WHERE expires_at <= CAST(strftime('%s', 'now') AS INTEGER)";
    let span = info_span!(
        "db.query",
        db.system = "sqlite",
        db.operation = "DELETE",
        db.statement = query
    );
    let done = sqlx::query(query)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to purge expired sessions")?;

    Ok(done.rows_affected())
}

/// Spawn a background task that periodically removes expired sessions.
pub fn spawn_session_sweeper(store: Store, every: Duration) -> tokio::task::JoinHandle<()> {
    let every = if every.is_zero() {
        Duration::from_secs(1)
    } else {
        every
    };

    tokio::spawn(async move {
        let mut ticker = interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            match purge_expired_sessions(store.pool()).await {
                Ok(0) => {}
                Ok(removed) => info!(removed, "expired sessions purged"),
                Err(err) => error!("session sweep failed: {err:#}"),
            }
        }
    })
}
