use anyhow::{bail, Context, Result};
use clap::{Arg, ArgMatches, Command};
use std::{
    net::{IpAddr, SocketAddr},
    path::PathBuf,
};
use tracing::warn;

pub const ARG_PORT: &str = "port";
pub const ARG_ADDRESS: &str = "address";
pub const ARG_INTERNAL_PORT: &str = "internal-port";
pub const ARG_INTERNAL_ADDRESS: &str = "internal-address";
pub const ARG_STATIC_DIR: &str = "static-dir";

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_PORT)
                .short('p')
                .long(ARG_PORT)
                .help("Port of the public surface")
                .default_value("8080")
                .env("OTH_PORT")
                .value_parser(clap::value_parser!(u16)),
        )
        .arg(
            Arg::new(ARG_ADDRESS)
                .long(ARG_ADDRESS)
                .help("Address of the public surface")
                .default_value("::")
                .env("OTH_ADDRESS")
                .value_parser(clap::value_parser!(IpAddr)),
        )
        .arg(
            Arg::new(ARG_INTERNAL_PORT)
                .long(ARG_INTERNAL_PORT)
                .help("Port of the internal surface")
                .default_value("8081")
                .env("OTH_INTERNAL_PORT")
                .value_parser(clap::value_parser!(u16)),
        )
        .arg(
            Arg::new(ARG_INTERNAL_ADDRESS)
                .long(ARG_INTERNAL_ADDRESS)
                .help("Address of the internal surface")
                .long_help(
                    "Address of the internal surface. The internal routes are not authenticated, \
                     so bind a loopback or private network address only.",
                )
                .default_value("127.0.0.1")
                .env("OTH_INTERNAL_ADDRESS")
                .value_parser(clap::value_parser!(IpAddr)),
        )
        .arg(
            Arg::new(ARG_STATIC_DIR)
                .long(ARG_STATIC_DIR)
                .help("Directory served by the public surface for unmatched paths")
                .env("OTH_STATIC_DIR")
                .value_parser(clap::value_parser!(PathBuf)),
        )
}

#[derive(Debug)]
pub struct Options {
    pub public_addr: SocketAddr,
    pub internal_addr: SocketAddr,
    pub static_dir: Option<PathBuf>,
}

impl Options {
    /// # Errors
    /// Returns an error if both surfaces would share a port.
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        let port = matches
            .get_one::<u16>(ARG_PORT)
            .copied()
            .context("missing required argument: --port")?;
        let address = matches
            .get_one::<IpAddr>(ARG_ADDRESS)
            .copied()
            .context("missing required argument: --address")?;
        let internal_port = matches
            .get_one::<u16>(ARG_INTERNAL_PORT)
            .copied()
            .context("missing required argument: --internal-port")?;
        let internal_address = matches
            .get_one::<IpAddr>(ARG_INTERNAL_ADDRESS)
            .copied()
            .context("missing required argument: --internal-address")?;

        if port != 0 && port == internal_port {
            bail!("--{ARG_INTERNAL_PORT} must differ from --{ARG_PORT} ({port})");
        }

        if internal_address.is_unspecified() {
            warn!(
                "internal surface bound to {internal_address}; it is unauthenticated and must not be publicly reachable"
            );
        }

        Ok(Self {
            public_addr: SocketAddr::new(address, port),
            internal_addr: SocketAddr::new(internal_address, internal_port),
            static_dir: matches.get_one::<PathBuf>(ARG_STATIC_DIR).cloned(),
        })
    }
}
