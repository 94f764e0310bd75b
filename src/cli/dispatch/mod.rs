//! Command-line argument dispatch.
//!
//! Maps validated CLI matches to the action to run, such as starting both
//! HTTP surfaces with their full configuration.

use crate::cli::actions::{server::Args, Action};
use crate::cli::commands::{auth, database, network, seed};
use anyhow::Result;

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let network_opts = network::Options::parse(matches)?;
    let database_opts = database::Options::parse(matches)?;
    let auth_opts = auth::Options::parse(matches);
    let seed_opts = seed::Options::parse(matches)?;

    Ok(Action::Server(Args {
        public_addr: network_opts.public_addr,
        internal_addr: network_opts.internal_addr,
        static_dir: network_opts.static_dir,
        store: database_opts.store_config(),
        auth: auth_opts.auth_config(),
        session_sweep_seconds: auth_opts.session_sweep_seconds,
        root: seed_opts.root,
    }))
}
