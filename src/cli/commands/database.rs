use crate::store::StoreConfig;
use anyhow::{Context, Result};
use clap::{Arg, ArgMatches, Command};

pub const ARG_DSN: &str = "dsn";
pub const ARG_DB_MAX_CONNECTIONS: &str = "db-max-connections";
pub const ARG_DB_ACQUIRE_TIMEOUT_SECONDS: &str = "db-acquire-timeout-seconds";

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_DSN)
                .short('d')
                .long(ARG_DSN)
                .help("Database connection string")
                .long_help("SQLite connection string, e.g. sqlite://oth.db?mode=rwc or sqlite::memory:")
                .default_value("sqlite://oth.db?mode=rwc")
                .env("OTH_DSN"),
        )
        .arg(
            Arg::new(ARG_DB_MAX_CONNECTIONS)
                .long(ARG_DB_MAX_CONNECTIONS)
                .help("Maximum number of pooled database connections")
                .default_value("5")
                .env("OTH_DB_MAX_CONNECTIONS")
                .value_parser(clap::value_parser!(u32).range(1..)),
        )
        .arg(
            Arg::new(ARG_DB_ACQUIRE_TIMEOUT_SECONDS)
                .long(ARG_DB_ACQUIRE_TIMEOUT_SECONDS)
                .help("Seconds to wait for a pooled connection before failing the request")
                .default_value("5")
                .env("OTH_DB_ACQUIRE_TIMEOUT_SECONDS")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
}

#[derive(Debug)]
pub struct Options {
    pub dsn: String,
    pub max_connections: u32,
    pub acquire_timeout_seconds: u64,
}

impl Options {
    /// # Errors
    /// Returns an error if a required argument is missing.
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        Ok(Self {
            dsn: matches
                .get_one::<String>(ARG_DSN)
                .cloned()
                .context("missing required argument: --dsn")?,
            max_connections: matches
                .get_one::<u32>(ARG_DB_MAX_CONNECTIONS)
                .copied()
                .unwrap_or(5),
            acquire_timeout_seconds: matches
                .get_one::<u64>(ARG_DB_ACQUIRE_TIMEOUT_SECONDS)
                .copied()
                .unwrap_or(5),
        })
    }

    #[must_use]
    pub fn store_config(&self) -> StoreConfig {
        StoreConfig::new(self.dsn.clone())
            .with_max_connections(self.max_connections)
            .with_acquire_timeout_seconds(self.acquire_timeout_seconds)
    }
}
