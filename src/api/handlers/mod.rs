//! Route handlers and the helpers they share: payload validators, the error
//! envelope, and the mapping from [`AuthError`] to HTTP responses.

pub mod health;
pub mod login;
pub mod me;
pub mod signup;

pub use self::health::health;
pub use self::login::login;
pub use self::me::me;
pub use self::signup::signup;

use crate::{auth::AuthError, cli::globals::GlobalArgs, session::Profile};
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use regex::Regex;
use serde::Serialize;
use serde_json::json;
use tracing::error;
use utoipa::ToSchema;

/// Passwords shorter than this are rejected before any store access.
pub const MIN_PASSWORD_LENGTH: usize = 6;

/// Lightweight email sanity check used before persisting data.
#[must_use]
pub fn valid_email(email: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").is_ok_and(|re| re.is_match(email))
}

/// Usernames: 3-32 word characters, dots or dashes.
#[must_use]
pub fn valid_username(username: &str) -> bool {
    Regex::new(r"^[\w.-]{3,32}$").is_ok_and(|re| re.is_match(username))
}

/// Body of every successful login/signup: the credential plus the profile
/// the client persists next to it.
#[derive(ToSchema, Serialize, Debug)]
pub struct AuthBody {
    pub token: String,
    pub user: Profile,
}

/// `{message}` response for client-correctable failures.
pub(crate) fn message_response(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "message": message }))).into_response()
}

/// Generic `{message, error}` envelope for handler faults. The `error`
/// detail is suppressed to an empty object in production deployments.
pub(crate) fn failure_response(globals: &GlobalArgs, detail: &str) -> Response {
    let error = if globals.is_production() {
        json!({})
    } else {
        json!({ "detail": detail })
    };

    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "message": "Something went wrong!", "error": error })),
    )
        .into_response()
}

/// Normalize an [`AuthError`] into the HTTP surface.
pub(crate) fn auth_error_response(globals: &GlobalArgs, err: AuthError) -> Response {
    match err {
        AuthError::InvalidCredentials => {
            message_response(StatusCode::UNAUTHORIZED, "Invalid username or password")
        }
        AuthError::DuplicateUsername => {
            message_response(StatusCode::CONFLICT, "Username already exists")
        }
        AuthError::Validation(message) => message_response(StatusCode::BAD_REQUEST, &message),
        AuthError::Unavailable => message_response(
            StatusCode::SERVICE_UNAVAILABLE,
            "Service temporarily unavailable. Please try again later.",
        ),
        AuthError::InvalidToken => {
            message_response(StatusCode::UNAUTHORIZED, "Invalid or expired token")
        }
        err @ (AuthError::CorruptRole(_)
        | AuthError::Database(_)
        | AuthError::Password
        | AuthError::Token) => {
            error!("auth handler fault: {err}");
            failure_response(globals, &err.to_string())
        }
    }
}

/// Fallback for unmatched routes.
pub async fn not_found() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "message": "Route not found" })),
    )
}
