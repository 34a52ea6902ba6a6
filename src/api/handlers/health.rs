//! Health endpoint: a read-only snapshot of the connection manager.
//!
//! This handler must never probe or establish a connection itself; it
//! reports whatever state the manager last recorded.

use crate::store::{ConnectionState, SharedStoreHandle};
use axum::{
    extract::Extension,
    http::{HeaderMap, HeaderValue},
    response::{IntoResponse, Json},
};
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct Health {
    pub status: String,
    /// Store connection state: `connected`, `disconnected`, `connecting`
    /// or `disconnecting`.
    pub database: String,
    pub atlas_connection: String,
    pub timestamp: String,
}

#[utoipa::path(
    get,
    path= "/health",
    responses (
        (status = 200, description = "Service status with store connection state", body = Health),
    ),
    tag= "health"
)]
pub async fn health(store: Extension<SharedStoreHandle>) -> impl IntoResponse {
    let snapshot = store.snapshot();

    let health = Health {
        status: "Server is running".to_string(),
        database: snapshot.state.as_str().to_string(),
        atlas_connection: if snapshot.state == ConnectionState::Connected {
            "active".to_string()
        } else {
            "inactive".to_string()
        },
        timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
    };

    (app_headers(), Json(health))
}

fn app_headers() -> HeaderMap {
    let short_hash = if crate::GIT_COMMIT_HASH.len() > 7 {
        &crate::GIT_COMMIT_HASH[0..7]
    } else {
        ""
    };

    format!(
        "{}:{}:{}",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
        short_hash
    )
    .parse::<HeaderValue>()
    .map(|value| {
        let mut headers = HeaderMap::new();
        headers.insert("X-App", value);
        headers
    })
    .unwrap_or_default()
}
