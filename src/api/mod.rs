//! HTTP surface: router construction and the server lifecycle.
//!
//! `serve` owns the ordering that makes shutdown graceful: the listener
//! stops accepting on the shutdown signal, and only after the server has
//! drained does the connection manager close the store connection — a
//! pending retry is cancelled rather than left racing the exit.

pub mod handlers;
mod openapi;

pub use openapi::{ApiDoc, openapi};

use crate::{
    auth::{AuthService, TokenIssuer},
    cli::globals::GlobalArgs,
    store::{ConnectionManager, PgConnector, SharedStoreHandle},
};
use anyhow::Result;
use axum::{
    Router,
    body::Body,
    extract::{Extension, MatchedPath},
    http::{
        HeaderName, HeaderValue, Method, Request,
        header::{AUTHORIZATION, CONTENT_TYPE},
    },
    routing::{get, post},
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::PropagateRequestIdLayer,
    set_header::SetRequestHeaderLayer,
    trace::TraceLayer,
};
use tracing::{Span, info, info_span};
use ulid::Ulid;
use utoipa_swagger_ui::SwaggerUi;

/// Build the application router around the injected state.
#[must_use]
pub fn router(globals: GlobalArgs, store: SharedStoreHandle, auth: Arc<AuthService>) -> Router {
    let cors = CorsLayer::new()
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .allow_methods([Method::GET, Method::POST])
        .allow_origin(Any);

    Router::new()
        .route("/api/auth/login", post(handlers::login))
        .route("/api/auth/signup", post(handlers::signup))
        .route("/api/auth/me", get(handlers::me))
        .route("/health", get(handlers::health))
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", openapi()))
        .fallback(handlers::not_found)
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static("x-request-id"),
                    |_req: &Request<Body>| {
                        HeaderValue::from_str(Ulid::new().to_string().as_str()).ok()
                    },
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    "x-request-id",
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(cors)
                .layer(Extension(globals))
                .layer(Extension(store))
                .layer(Extension(auth)),
        )
}

/// Start the server and run until the shutdown signal.
///
/// # Errors
///
/// Returns an error if the listener cannot bind or the server fails.
pub async fn serve(
    port: u16,
    manager: Arc<ConnectionManager<PgConnector>>,
    globals: GlobalArgs,
) -> Result<()> {
    let tokens = TokenIssuer::new(&globals.session_secret, globals.session_ttl_seconds);
    let store: SharedStoreHandle = manager.clone();
    let auth = Arc::new(AuthService::new(store.clone(), tokens));

    let app = router(globals, store, auth);

    let listener = TcpListener::bind(format!("::0:{port}")).await?;
    info!("Listening on [::]:{}", port);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Close the store connection before the process exits; this also
    // cancels any retry the manager still has pending.
    manager.shutdown().await;
    info!("Gracefully shutdown");

    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutdown signal received");
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
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
