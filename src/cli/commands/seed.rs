use crate::api::handlers::valid_email;
use anyhow::{bail, Result};
use clap::{builder::BoolishValueParser, Arg, ArgAction, ArgMatches, Command};
use secrecy::{ExposeSecret, SecretString};

pub const ARG_SEED: &str = "seed";
pub const ARG_ROOT_EMAIL: &str = "root-email";
pub const ARG_ROOT_PASSWORD: &str = "root-password";

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_SEED)
                .long(ARG_SEED)
                .help("Create the root account with MANAGE_PERMISSIONS at startup")
                .env("OTH_SEED")
                .action(ArgAction::SetTrue)
                .value_parser(BoolishValueParser::new()),
        )
        .arg(
            Arg::new(ARG_ROOT_EMAIL)
                .long(ARG_ROOT_EMAIL)
                .help("Email of the seeded root account")
                .env("OTH_ROOT_EMAIL"),
        )
        .arg(
            Arg::new(ARG_ROOT_PASSWORD)
                .long(ARG_ROOT_PASSWORD)
                .help("Password of the seeded root account")
                .env("OTH_ROOT_PASSWORD")
                .hide_env_values(true),
        )
}

/// Credentials of the root account created by `--seed`.
#[derive(Debug)]
pub struct RootAccount {
    pub email: String,
    pub password: SecretString,
}

#[derive(Debug)]
pub struct Options {
    pub root: Option<RootAccount>,
}

impl Options {
    /// # Errors
    /// Returns an error if `--seed` is set without usable root credentials.
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        if !matches.get_flag(ARG_SEED) {
            return Ok(Self { root: None });
        }

        let Some(email) = matches.get_one::<String>(ARG_ROOT_EMAIL).cloned() else {
            bail!("missing required argument: --{ARG_ROOT_EMAIL} (required with --{ARG_SEED})");
        };
        let Some(password) = matches
            .get_one::<String>(ARG_ROOT_PASSWORD)
            .map(|value| SecretString::from(value.clone()))
        else {
            bail!("missing required argument: --{ARG_ROOT_PASSWORD} (required with --{ARG_SEED})");
        };

        if !valid_email(&email) {
            bail!("invalid --{ARG_ROOT_EMAIL}: {email}");
        }
        if password.expose_secret().is_empty() {
            bail!("--{ARG_ROOT_PASSWORD} must not be empty");
        }

        Ok(Self {
            root: Some(RootAccount { email, password }),
        })
    }
}
