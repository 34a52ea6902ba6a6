//! Login handler.

use crate::{
    api::handlers::{AuthBody, auth_error_response, message_response},
    auth::{AuthService, Credentials},
    cli::globals::GlobalArgs,
};
use axum::{
    Json,
    extract::Extension,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, instrument};
use utoipa::ToSchema;

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[utoipa::path(
    post,
    path= "/api/auth/login",
    request_body = LoginRequest,
    responses (
        (status = 200, description = "Login successful", body = AuthBody, content_type = "application/json"),
        (status = 400, description = "Missing or malformed payload"),
        (status = 401, description = "Invalid username or password"),
        (status = 503, description = "Persistent store unreachable"),
    ),
    tag= "auth"
)]
#[instrument(skip_all)]
pub async fn login(
    auth: Extension<Arc<AuthService>>,
    globals: Extension<GlobalArgs>,
    payload: Option<Json<LoginRequest>>,
) -> Response {
    let request = match payload {
        Some(Json(request)) => request,
        None => return message_response(StatusCode::BAD_REQUEST, "Missing payload"),
    };

    if request.username.is_empty() || request.password.is_empty() {
        return message_response(
            StatusCode::BAD_REQUEST,
            "Please enter both username and password",
        );
    }

    let credentials = Credentials {
        username: request.username,
        password: request.password,
    };

    match auth.authenticate(&credentials).await {
        Ok(response) => {
            debug!("login successful");
            (
                StatusCode::OK,
                Json(AuthBody {
                    token: response.token,
                    user: response.user,
                }),
            )
                .into_response()
        }
        Err(err) => auth_error_response(&globals, err),
    }
}
