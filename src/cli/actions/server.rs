use crate::{
    api::{self, AuthConfig, AuthState},
    cli::{commands::seed::RootAccount, telemetry},
    store::{seed::ensure_root_user, sessions::spawn_session_sweeper, Store, StoreConfig},
};
use anyhow::{Context, Result};
use secrecy::ExposeSecret;
use std::{net::SocketAddr, path::PathBuf, sync::Arc, time::Duration};
use tokio::{net::TcpListener, signal};
use tracing::{debug, error, info};

#[derive(Debug)]
pub struct Args {
    pub public_addr: SocketAddr,
    pub internal_addr: SocketAddr,
    pub static_dir: Option<PathBuf>,
    pub store: StoreConfig,
    pub auth: AuthConfig,
    pub session_sweep_seconds: u64,
    pub root: Option<RootAccount>,
}

/// Execute the server action.
/// # Errors
/// Returns an error if the store cannot be opened or seeded, a listener cannot
/// be bound, or either server fails.
pub async fn execute(args: Args) -> Result<()> {
    debug!("Server args: {:?}", args);

    let auth_state = Arc::new(AuthState::new(args.auth)?);

    // The store must answer before any listener accepts traffic.
    let store = Store::open(&args.store).await?;
    info!("Connected to database");

    if let Some(root) = &args.root {
        seed_root(&store, &auth_state, root).await?;
    }

    let public_listener = TcpListener::bind(args.public_addr)
        .await
        .with_context(|| format!("Failed to bind public surface on {}", args.public_addr))?;
    let internal_listener = TcpListener::bind(args.internal_addr)
        .await
        .with_context(|| format!("Failed to bind internal surface on {}", args.internal_addr))?;

    let sweeper = spawn_session_sweeper(
        store.clone(),
        Duration::from_secs(args.session_sweep_seconds),
    );

    let public_app = api::public_router(store.clone(), auth_state, args.static_dir.as_deref());
    let internal_app = api::internal_router(store.clone());

    let result = api::serve(
        public_listener,
        internal_listener,
        public_app,
        internal_app,
        shutdown_signal(),
    )
    .await;

    sweeper.abort();
    store.close().await;
    telemetry::shutdown_tracer();

    result
}

async fn seed_root(store: &Store, auth_state: &AuthState, root: &RootAccount) -> Result<()> {
    let password_hash = auth_state
        .hasher()
        .hash(root.password.expose_secret().to_string())
        .await
        .context("Failed to hash root password")?;

    let user_id = ensure_root_user(store, &root.email, &password_hash)
        .await
        .context("Failed to seed root user")?;

    info!(user_id, "Root user seeded");

    Ok(())
}

/// Wait for Ctrl-C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {err}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                error!("Failed to install SIGTERM handler: {err}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received Ctrl+C, initiating shutdown"),
        () = terminate => info!("Received SIGTERM, initiating shutdown"),
    }
}
