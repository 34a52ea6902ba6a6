//! Credential validation surface for protected calls.

use crate::{api::handlers::message_response, auth::AuthService};
use axum::{
    Json,
    extract::Extension,
    http::{StatusCode, header::AUTHORIZATION, HeaderMap},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::instrument;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct MeResponse {
    pub user: MeUser,
}

/// Identity as attested by the presented credential.
#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct MeUser {
    pub id: Uuid,
    pub username: String,
    pub role: String,
}

#[utoipa::path(
    get,
    path= "/api/auth/me",
    responses (
        (status = 200, description = "Credential is valid", body = MeResponse, content_type = "application/json"),
        (status = 401, description = "Missing, invalid or expired credential"),
    ),
    tag= "auth"
)]
#[instrument(skip_all)]
pub async fn me(auth: Extension<Arc<AuthService>>, headers: HeaderMap) -> Response {
    let Some(token) = bearer_token(&headers) else {
        return message_response(StatusCode::UNAUTHORIZED, "Missing authorization header");
    };

    match auth.verify(token) {
        Ok(claims) => (
            StatusCode::OK,
            Json(MeResponse {
                user: MeUser {
                    id: claims.sub,
                    username: claims.username,
                    role: claims.role,
                },
            }),
        )
            .into_response(),
        Err(_) => message_response(StatusCode::UNAUTHORIZED, "Invalid or expired token"),
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}
