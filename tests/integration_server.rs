//! End-to-end tests for the `oth` service.
//!
//! The first suite spawns the real `oth` binary against a temporary `SQLite`
//! file, seeds the root account, and drives both listeners over HTTP. The
//! second serves the routers in-process to check graceful shutdown.

use anyhow::{bail, Context, Result};
use oth::{
    api::{self, AuthConfig, AuthState},
    store::{Store, StoreConfig},
};
use reqwest::{header::SET_COOKIE, StatusCode};
use serde_json::json;
use std::{
    net::{SocketAddr, TcpListener},
    path::PathBuf,
    process::{Child, Command, Stdio},
    sync::Arc,
    time::Duration,
};
use tokio::time::sleep;

const ROOT_EMAIL: &str = "root@example.com";
const ROOT_PASSWORD: &str = "rootpass";

struct ChildGuard(Child);

impl Drop for ChildGuard {
    fn drop(&mut self) {
        let _ = self.0.kill();
        let _ = self.0.wait();
    }
}

struct TempDir(PathBuf);

impl TempDir {
    fn new() -> Result<Self> {
        let path = std::env::temp_dir().join(format!("oth-it-{}", ulid::Ulid::new()));
        std::fs::create_dir_all(&path).context("failed to create temp dir")?;
        Ok(Self(path))
    }
}

impl Drop for TempDir {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.0);
    }
}

fn free_port() -> Result<u16> {
    let listener = TcpListener::bind("127.0.0.1:0")?;
    Ok(listener.local_addr()?.port())
}

struct TestServer {
    _child: ChildGuard,
    _dir: TempDir,
    dsn: String,
    public_url: String,
    internal_url: String,
}

impl TestServer {
    async fn start() -> Result<Self> {
        let dir = TempDir::new()?;
        let dsn = format!("sqlite://{}?mode=rwc", dir.0.join("oth.db").display());
        let port = free_port()?;
        let internal_port = free_port()?;
        let port_arg = port.to_string();
        let internal_port_arg = internal_port.to_string();

        let child = Command::new(env!("CARGO_BIN_EXE_oth"))
            .args([
                "--address",
                "127.0.0.1",
                "--port",
                port_arg.as_str(),
                "--internal-port",
                internal_port_arg.as_str(),
                "--dsn",
                dsn.as_str(),
                "--hash-memory-kib",
                "8",
                "--hash-iterations",
                "1",
                "--seed",
                "--root-email",
                ROOT_EMAIL,
                "--root-password",
                ROOT_PASSWORD,
            ])
            .env_remove("OTEL_EXPORTER_OTLP_ENDPOINT")
            .env_remove("OTH_SECURE_COOKIES")
            .env_remove("OTH_STATIC_DIR")
            .stdout(Stdio::null())
            .stderr(Stdio::inherit())
            .spawn()
            .context("failed to spawn oth binary")?;

        let server = Self {
            _child: ChildGuard(child),
            _dir: dir,
            dsn,
            public_url: format!("http://127.0.0.1:{port}"),
            internal_url: format!("http://127.0.0.1:{internal_port}"),
        };
        server.wait_until_ready().await?;
        Ok(server)
    }

    async fn wait_until_ready(&self) -> Result<()> {
        let client = reqwest::Client::new();
        for _ in 0..100 {
            let public = client.get(format!("{}/health", self.public_url)).send().await;
            let internal = client
                .get(format!("{}/health", self.internal_url))
                .send()
                .await;
            if let (Ok(public), Ok(internal)) = (public, internal) {
                if public.status().is_success() && internal.status().is_success() {
                    return Ok(());
                }
            }
            sleep(Duration::from_millis(100)).await;
        }
        bail!("oth did not become ready")
    }

    async fn expire_all_sessions(&self) -> Result<()> {
        let store = Store::open(&StoreConfig::new(self.dsn.clone())).await?;
        sqlx::query("UPDATE sessions SET expires_at = 0")
            .execute(store.pool())
            .await?;
        store.close().await;
        Ok(())
    }
}

fn session_token(response: &reqwest::Response) -> Option<String> {
    let cookie = response.headers().get(SET_COOKIE)?.to_str().ok()?;
    let pair = cookie.split(';').next()?;
    pair.strip_prefix("oth_session=").map(str::to_string)
}

#[tokio::test]
async fn seeded_root_resolves_permissions_until_expiry() -> Result<()> {
    let server = TestServer::start().await?;
    let client = reqwest::Client::builder().cookie_store(true).build()?;

    let response = client
        .post(format!("{}/login", server.public_url))
        .json(&json!({"email": ROOT_EMAIL, "password": ROOT_PASSWORD}))
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let token = session_token(&response).context("login did not set a session cookie")?;

    let response = client
        .get(format!("{}/permissions", server.public_url))
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.json::<Vec<String>>().await?,
        vec!["MANAGE_PERMISSIONS".to_string()]
    );

    let internal = reqwest::Client::new();
    let response = internal
        .get(format!("{}/permissions/{token}", server.internal_url))
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.json::<Vec<String>>().await?,
        vec!["MANAGE_PERMISSIONS".to_string()]
    );

    server.expire_all_sessions().await?;

    let response = client
        .get(format!("{}/permissions", server.public_url))
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = internal
        .get(format!("{}/permissions/{token}", server.internal_url))
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    Ok(())
}

#[tokio::test]
async fn registered_user_logs_in_with_no_permissions() -> Result<()> {
    let server = TestServer::start().await?;
    let client = reqwest::Client::builder().cookie_store(true).build()?;
    let credentials = json!({"email": "new@example.com", "password": "secret"});

    let response = client
        .post(format!("{}/register", server.public_url))
        .json(&credentials)
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::OK);

    let response = client
        .post(format!("{}/register", server.public_url))
        .json(&credentials)
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = client
        .post(format!("{}/login", server.public_url))
        .json(&credentials)
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::OK);

    let response = client
        .get(format!("{}/permissions", server.public_url))
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.json::<Vec<String>>().await?.is_empty());

    // A wrong password for the seeded account is still rejected.
    let response = client
        .post(format!("{}/login", server.public_url))
        .json(&json!({"email": ROOT_EMAIL, "password": "wrong"}))
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    Ok(())
}

#[tokio::test]
async fn public_listener_does_not_serve_internal_routes() -> Result<()> {
    let server = TestServer::start().await?;
    let client = reqwest::Client::new();

    let response = client
        .get(format!("{}/permissions/anything", server.public_url))
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = client
        .post(format!("{}/login", server.internal_url))
        .json(&json!({"email": ROOT_EMAIL, "password": ROOT_PASSWORD}))
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    Ok(())
}

#[tokio::test]
async fn serve_stops_both_listeners_on_shutdown() -> Result<()> {
    let store = Store::open(&StoreConfig::in_memory()).await?;
    let config = AuthConfig::new()
        .with_hash_memory_kib(8)
        .with_hash_iterations(1);
    let auth_state = Arc::new(AuthState::new(config)?);

    let public_listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let internal_listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let public_addr: SocketAddr = public_listener.local_addr()?;
    let internal_addr: SocketAddr = internal_listener.local_addr()?;

    let (tx, rx) = tokio::sync::oneshot::channel::<()>();
    let server = tokio::spawn(api::serve(
        public_listener,
        internal_listener,
        api::public_router(store.clone(), auth_state, None),
        api::internal_router(store.clone()),
        async move {
            let _ = rx.await;
        },
    ));

    let client = reqwest::Client::new();
    let response = client
        .get(format!("http://{public_addr}/health"))
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let response = client
        .get(format!("http://{internal_addr}/health"))
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::OK);

    let _ = tx.send(());
    tokio::time::timeout(Duration::from_secs(5), server).await???;

    // Fresh client so no pooled connection outlives the server.
    assert!(reqwest::Client::new()
        .get(format!("http://{internal_addr}/health"))
        .send()
        .await
        .is_err());

    store.close().await;
    Ok(())
}
