//! Permission names and the user/permission join.

use anyhow::{Context, Result};
use sqlx::{sqlite::SqliteConnection, Row, SqlitePool};
use tracing::{info_span, Instrument};

/// Name of the permission granted to the seeded root account.
pub const MANAGE_PERMISSIONS: &str = "MANAGE_PERMISSIONS";

/// Resolve the permission names held by a user.
///
/// Returns `Ok(None)` when the user does not exist (dangling reference) and
/// `Ok(Some(vec![]))` when the user exists but holds nothing. Order is unspecified.
///
/// # Errors
/// Returns an error if the query fails.
pub async fn permission_names_for_user(
    pool: &SqlitePool,
    user_id: i64,
) -> Result<Option<Vec<String>>> {
    // LEFT JOINs keep one NULL row for a user without grants, so "no rows"
    // means the user is gone.
    let query = r"
        SELECT permissions.name AS name
        FROM users
        LEFT JOIN user_permissions ON user_permissions.user_id = users.id
        LEFT JOIN permissions ON permissions.id = user_permissions.permission_id
        WHERE users.id = ?
    ";
    let span = info_span!(
        "db.query",
        db.system = "sqlite",
        db.operation = "SELECT",
        db.statement = query
    );
    let rows = sqlx::query(query)
        .bind(user_id)
        .fetch_all(pool)
        .instrument(span)
        .await
        .context("failed to load user permissions")?;

    if rows.is_empty() {
        return Ok(None);
    }

    let mut names = Vec::with_capacity(rows.len());
    for row in rows {
        let name: Option<String> = row
            .try_get("name")
            .context("failed to decode permission name")?;
        names.extend(name);
    }

    Ok(Some(names))
}

/// Grant a permission by name, creating the permission if needed.
/// Granting twice is a no-op.
///
/// # Errors
/// Returns an error if the user does not exist or a statement fails.
pub async fn grant_permission(pool: &SqlitePool, user_id: i64, name: &str) -> Result<()> {
    let mut tx = pool.begin().await.context("begin grant transaction")?;
    grant_in(&mut tx, user_id, name).await?;
    tx.commit().await.context("commit grant transaction")?;
    Ok(())
}

/// Same as [`grant_permission`] on a caller-owned connection or transaction.
pub(crate) async fn grant_in(conn: &mut SqliteConnection, user_id: i64, name: &str) -> Result<()> {
    let permission_id = ensure_permission(conn, name).await?;

    let query = "INSERT OR IGNORE INTO user_permissions (user_id, permission_id) VALUES (?, ?)";
    let span = info_span!(
        "db.query",
        db.system = "sqlite",
        db.operation = "INSERT",
        db.statement = query
    );
    sqlx::query(query)
        .bind(user_id)
        .bind(permission_id)
        .execute(&mut *conn)
        .instrument(span)
        .await
        .with_context(|| format!("failed to grant permission {name}"))?;

    Ok(())
}

/// Return the id of the permission named `name`, inserting it if absent.
async fn ensure_permission(conn: &mut SqliteConnection, name: &str) -> Result<i64> {
    let query = "INSERT OR IGNORE INTO permissions (name) VALUES (?)";
    let span = info_span!(
        "db.query",
        db.system = "sqlite",
        db.operation = "INSERT",
        db.statement = query
    );
    sqlx::query(query)
        .bind(name)
        .execute(&mut *conn)
        .instrument(span)
        .await
        .with_context(|| format!("failed to insert permission {name}"))?;

    let query = "SELECT id FROM permissions WHERE name = ?";
    let span = info_span!(
        "db.query",
        db.system = "sqlite",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(name)
        .fetch_one(&mut *conn)
        .instrument(span)
        .await
        .with_context(|| format!("failed to load permission {name}"))?;

    row.try_get("id").context("failed to decode permission id")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{
        users::{delete_user, insert_user, SignupOutcome},
        Store, StoreConfig,
    };

    async fn store_with_user(email: &str) -> Result<(Store, i64)> {
        let store = Store::open(&StoreConfig::in_memory()).await?;
        match insert_user(store.pool(), email, "hash").await? {
            SignupOutcome::Created(user_id) => Ok((store, user_id)),
            SignupOutcome::Conflict => anyhow::bail!("unexpected conflict for {email}"),
        }
    }

    #[tokio::test]
    async fn user_without_grants_has_empty_list() -> Result<()> {
        let (store, user_id) = store_with_user("empty@example.com").await?;
        let names = permission_names_for_user(store.pool(), user_id).await?;
        assert_eq!(names, Some(Vec::new()));
        Ok(())
    }

    #[tokio::test]
    async fn missing_user_is_none() -> Result<()> {
        let store = Store::open(&StoreConfig::in_memory()).await?;
        let names = permission_names_for_user(store.pool(), 4242).await?;
        assert_eq!(names, None);
        Ok(())
    }

    #[tokio::test]
    async fn grants_are_deduplicated() -> Result<()> {
        let (store, user_id) = store_with_user("grant@example.com").await?;

        grant_permission(store.pool(), user_id, MANAGE_PERMISSIONS).await?;
        grant_permission(store.pool(), user_id, MANAGE_PERMISSIONS).await?;
        grant_permission(store.pool(), user_id, "READ_REPORTS").await?;

        let mut names = permission_names_for_user(store.pool(), user_id)
            .await?
            .unwrap_or_default();
        names.sort();
        assert_eq!(
            names,
            vec!["MANAGE_PERMISSIONS".to_string(), "READ_REPORTS".to_string()]
        );

        let permission_rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM permissions")
            .fetch_one(store.pool())
            .await?;
        assert_eq!(permission_rows, 2);
        Ok(())
    }

    #[tokio::test]
    async fn permission_rows_are_shared_between_users() -> Result<()> {
        let (store, first) = store_with_user("first@example.com").await?;
        let SignupOutcome::Created(second) =
            insert_user(store.pool(), "second@example.com", "hash").await?
        else {
            anyhow::bail!("expected a created user");
        };

        grant_permission(store.pool(), first, "AUDIT").await?;
        grant_permission(store.pool(), second, "AUDIT").await?;

        let permission_rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM permissions")
            .fetch_one(store.pool())
            .await?;
        assert_eq!(permission_rows, 1);
        assert_eq!(
            permission_names_for_user(store.pool(), second).await?,
            Some(vec!["AUDIT".to_string()])
        );
        Ok(())
    }

    #[tokio::test]
    async fn granting_to_missing_user_fails() -> Result<()> {
        let store = Store::open(&StoreConfig::in_memory()).await?;
        assert!(grant_permission(store.pool(), 999, "AUDIT").await.is_err());
        Ok(())
    }

    #[tokio::test]
    async fn deleting_user_cascades_grants() -> Result<()> {
        let (store, user_id) = store_with_user("cascade@example.com").await?;
        grant_permission(store.pool(), user_id, MANAGE_PERMISSIONS).await?;

        delete_user(store.pool(), user_id).await?;

        let grants: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM user_permissions")
            .fetch_one(store.pool())
            .await?;
        assert_eq!(grants, 0);
        assert_eq!(permission_names_for_user(store.pool(), user_id).await?, None);
        Ok(())
    }
}
