//! Persistent store shared by the public and internal surfaces.
//!
//! A single [`Store`] handle is opened at startup, checked with a ping before
//! any listener accepts traffic, cloned into every request handler, and
//! closed on shutdown. All tables live in one `SQLite` database:
//!
//! - `users`, `permissions`, `user_permissions`: identity and authorization data.
//! - `sessions`: the only bridge between the two HTTP surfaces.

pub mod permissions;
pub mod seed;
pub mod sessions;
pub mod users;

use anyhow::{Context, Result};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions},
    Connection,
};
use std::{str::FromStr, time::Duration};
use tracing::{debug, info_span, Instrument};

const SCHEMA_SQL: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/sql/schema.sql"));

const IN_MEMORY_DSN: &str = "sqlite::memory:";
const DEFAULT_MAX_CONNECTIONS: u32 = 5;
const DEFAULT_ACQUIRE_TIMEOUT_SECONDS: u64 = 5;
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone, Debug)]
pub struct StoreConfig {
    dsn: String,
    max_connections: u32,
    acquire_timeout: Duration,
}

impl StoreConfig {
    #[must_use]
    pub fn new(dsn: String) -> Self {
        Self {
            dsn,
            max_connections: DEFAULT_MAX_CONNECTIONS,
            acquire_timeout: Duration::from_secs(DEFAULT_ACQUIRE_TIMEOUT_SECONDS),
        }
    }

    /// Private in-memory database, shared by every connection of the pool.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(IN_MEMORY_DSN.to_string())
    }

    #[must_use]
    pub fn with_max_connections(mut self, max_connections: u32) -> Self {
        self.max_connections = max_connections.max(1);
        self
    }

    #[must_use]
    pub fn with_acquire_timeout_seconds(mut self, seconds: u64) -> Self {
        self.acquire_timeout = Duration::from_secs(seconds.max(1));
        self
    }

    #[must_use]
    pub fn dsn(&self) -> &str {
        &self.dsn
    }

    #[must_use]
    pub fn max_connections(&self) -> u32 {
        self.max_connections
    }

    #[must_use]
    pub fn acquire_timeout(&self) -> Duration {
        self.acquire_timeout
    }

    fn is_in_memory(&self) -> bool {
        self.dsn.contains(":memory:") || self.dsn.contains("mode=memory")
    }
}

/// Handle to the identity, permission and session tables.
#[derive(Clone, Debug)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    /// Connect, apply the schema and verify the database answers.
    ///
    /// # Errors
    /// Returns an error if the DSN is invalid, the database is unreachable, or
    /// the schema cannot be applied.
    pub async fn open(config: &StoreConfig) -> Result<Self> {
        let mut options = SqliteConnectOptions::from_str(config.dsn())
            .with_context(|| format!("Invalid database DSN: {}", config.dsn()))?
            .create_if_missing(true)
            .foreign_keys(true)
            .busy_timeout(BUSY_TIMEOUT);

        if !config.is_in_memory() {
            options = options.journal_mode(SqliteJournalMode::Wal);
        }

        // Keep one connection alive at all times; an in-memory database is
        // dropped together with its last connection.
        let pool = SqlitePoolOptions::new()
            .min_connections(1)
            .max_connections(config.max_connections())
            .acquire_timeout(config.acquire_timeout())
            .idle_timeout(None)
            .max_lifetime(None)
            .test_before_acquire(true)
            .connect_with(options)
            .await
            .context("Failed to connect to database")?;

        let store = Self { pool };
        store.apply_schema().await?;
        store.ping().await.context("Database health check failed")?;

        Ok(store)
    }

    #[must_use]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Acquire a connection and ping it.
    ///
    /// # Errors
    /// Returns an error if no connection can be acquired or the ping fails.
    pub async fn ping(&self) -> Result<()> {
        let acquire_span = info_span!("db.acquire", db.system = "sqlite", db.operation = "ACQUIRE");
        let mut conn = self
            .pool
            .acquire()
            .instrument(acquire_span)
            .await
            .context("Failed to acquire database connection")?;

        let ping_span = info_span!("db.ping", db.system = "sqlite", db.operation = "PING");
        conn.ping()
            .instrument(ping_span)
            .await
            .context("Failed to ping database")
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    async fn apply_schema(&self) -> Result<()> {
        let mut tx = self.pool.begin().await.context("begin schema transaction")?;

        for (index, statement) in split_sql_statements(SCHEMA_SQL).iter().enumerate() {
            sqlx::query(statement)
                .execute(&mut *tx)
                .await
                .with_context(|| format!("Failed to execute schema statement {}", index + 1))?;
        }

        tx.commit().await.context("commit schema transaction")?;
        debug!("database schema applied");

        Ok(())
    }
}

fn split_sql_statements(sql: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();

    for line in sql.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with("--") {
            continue;
        }
        current.push_str(line);
        current.push('\n');

        if trimmed.ends_with(';') {
            let statement = current.trim();
            if !statement.is_empty() {
                statements.push(statement.to_string());
            }
            current.clear();
        }
    }

    let leftover = current.trim();
    if !leftover.is_empty() {
        statements.push(leftover.to_string());
    }

    statements
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::Row;

    #[test]
    fn split_sql_statements_skips_comments() {
        let sql = "-- header;\nCREATE TABLE a (id INTEGER);\n\n-- note\nCREATE TABLE b (\n  id INTEGER\n);\n";
        let statements = split_sql_statements(sql);
        assert_eq!(statements.len(), 2);
        assert_eq!(statements[0], "CREATE TABLE a (id INTEGER);");
        assert!(statements[1].starts_with("CREATE TABLE b ("));
    }

    #[test]
    fn split_sql_statements_keeps_trailing_statement() {
        let statements = split_sql_statements("SELECT 1;\nSELECT 2");
        assert_eq!(statements, vec!["SELECT 1;".to_string(), "SELECT 2".to_string()]);
    }

    #[test]
    fn schema_has_every_table() {
        let statements = split_sql_statements(SCHEMA_SQL);
        for table in ["users", "permissions", "user_permissions", "sessions"] {
            let needle = format!("CREATE TABLE IF NOT EXISTS {table} (");
            assert!(
                statements.iter().any(|s| s.starts_with(&needle)),
                "missing table {table}"
            );
        }
    }

    #[test]
    fn store_config_clamps_values() {
        let config = StoreConfig::new("sqlite://oth.db".to_string())
            .with_max_connections(0)
            .with_acquire_timeout_seconds(0);
        assert_eq!(config.max_connections(), 1);
        assert_eq!(config.acquire_timeout(), Duration::from_secs(1));
        assert!(!config.is_in_memory());
        assert!(StoreConfig::in_memory().is_in_memory());
    }

    #[tokio::test]
    async fn open_applies_schema_and_pings() -> Result<()> {
        let store = Store::open(&StoreConfig::in_memory()).await?;
        store.ping().await?;

        let rows = sqlx::query("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")
            .fetch_all(store.pool())
            .await?;
        let tables: Vec<String> = rows.iter().map(|row| row.get("name")).collect();
        for table in ["permissions", "sessions", "user_permissions", "users"] {
            assert!(tables.iter().any(|name| name == table), "missing {table}");
        }

        store.close().await;
        Ok(())
    }

    #[tokio::test]
    async fn open_is_idempotent_on_existing_schema() -> Result<()> {
        let store = Store::open(&StoreConfig::in_memory()).await?;
        // Re-applying must not fail on existing tables.
        store.apply_schema().await?;
        Ok(())
    }
}
