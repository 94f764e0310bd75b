//! HTTP surfaces.
//!
//! [`public_router`] serves browsers; [`internal_router`] serves trusted
//! backends and must only be bound to a private address. They share nothing
//! but the [`Store`].

use crate::store::Store;
use anyhow::Result;
use axum::{
    body::Body,
    extract::MatchedPath,
    http::{HeaderName, HeaderValue, Request},
    routing::{get, post},
    Extension, Router,
};
use std::{
    future::{Future, IntoFuture},
    path::Path,
    sync::Arc,
};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    request_id::PropagateRequestIdLayer, services::ServeDir, set_header::SetRequestHeaderLayer,
    trace::TraceLayer,
};
use tracing::{info, info_span, Span};
use ulid::Ulid;

pub mod error;
pub mod handlers;
mod openapi;

pub use error::ApiError;
pub use handlers::state::{AuthConfig, AuthState};
pub use openapi::openapi;

const REQUEST_ID_HEADER: &str = "x-request-id";

/// Browser-facing routes: `/login`, `/register`, `/permissions`, `/health`.
///
/// When `static_dir` is set, unmatched paths are served from that directory.
#[must_use]
pub fn public_router(store: Store, auth_state: Arc<AuthState>, static_dir: Option<&Path>) -> Router {
    let router = Router::new()
        .route("/login", post(handlers::login::login))
        .route("/register", post(handlers::register::register))
        .route("/permissions", get(handlers::permissions::permissions))
        .route("/health", get(handlers::health::health));

    let router = match static_dir {
        Some(dir) => router.fallback_service(ServeDir::new(dir)),
        None => router,
    };

    with_layers(router.layer(Extension(auth_state)), store)
}

/// Server-to-server routes: `/permissions/:session_id`, `/health`.
///
/// There is no authentication here; reachability is the access control.
#[must_use]
pub fn internal_router(store: Store) -> Router {
    let router = Router::new()
        .route(
            "/permissions/:session_id",
            get(handlers::permissions::session_permissions),
        )
        .route("/health", get(handlers::health::health));

    with_layers(router, store)
}

fn with_layers(router: Router, store: Store) -> Router {
    router.layer(
        ServiceBuilder::new()
            .layer(SetRequestHeaderLayer::if_not_present(
                HeaderName::from_static(REQUEST_ID_HEADER),
                |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
            ))
            .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                REQUEST_ID_HEADER,
            )))
            .layer(TraceLayer::new_for_http().make_span_with(make_span))
            .layer(Extension(store)),
    )
}

/// Serve both surfaces until `shutdown` resolves, then drain in-flight requests.
///
/// # Errors
/// Returns an error if either server fails.
pub async fn serve<F>(
    public_listener: TcpListener,
    internal_listener: TcpListener,
    public_app: Router,
    internal_app: Router,
    shutdown: F,
) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let (tx, rx) = tokio::sync::watch::channel(false);
    let mut public_rx = rx.clone();
    let mut internal_rx = rx;

    info!("Public surface listening on {}", public_listener.local_addr()?);
    info!(
        "Internal surface listening on {}",
        internal_listener.local_addr()?
    );

    let public = axum::serve(public_listener, public_app.into_make_service())
        .with_graceful_shutdown(async move {
            let _ = public_rx.wait_for(|stop| *stop).await;
        })
        .into_future();
    let internal = axum::serve(internal_listener, internal_app.into_make_service())
        .with_graceful_shutdown(async move {
            let _ = internal_rx.wait_for(|stop| *stop).await;
        })
        .into_future();

    let trigger = tokio::spawn(async move {
        shutdown.await;
        info!("Gracefully shutdown");
        let _ = tx.send(true);
    });

    let result = tokio::try_join!(public, internal);
    trigger.abort();
    result?;

    Ok(())
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}
