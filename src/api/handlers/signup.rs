//! Signup handler.
//!
//! Payload shape is validated here, before the service is involved; the
//! uniqueness of the username is NOT checked here, the store's constraint
//! decides and the service maps the violation.

use crate::{
    api::handlers::{
        AuthBody, MIN_PASSWORD_LENGTH, auth_error_response, message_response, valid_email,
        valid_username,
    },
    auth::{AuthService, NewUser},
    cli::globals::GlobalArgs,
    session::Role,
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
#[serde(rename_all = "camelCase")]
pub struct SignupRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub bio: Option<String>,
    pub role: String,
}

#[utoipa::path(
    post,
    path= "/api/auth/signup",
    request_body = SignupRequest,
    responses (
        (status = 200, description = "Registration successful", body = AuthBody, content_type = "application/json"),
        (status = 400, description = "Missing or malformed payload"),
        (status = 409, description = "Username already exists"),
        (status = 503, description = "Persistent store unreachable"),
    ),
    tag= "auth"
)]
#[instrument(skip_all)]
pub async fn signup(
    auth: Extension<Arc<AuthService>>,
    globals: Extension<GlobalArgs>,
    payload: Option<Json<SignupRequest>>,
) -> Response {
    let request = match payload {
        Some(Json(request)) => request,
        None => return message_response(StatusCode::BAD_REQUEST, "Missing payload"),
    };

    if let Err(message) = validate(&request) {
        debug!("rejecting signup: {message}");
        return message_response(StatusCode::BAD_REQUEST, message);
    }

    // validate() already vouched for the role string.
    let Some(role) = Role::parse(&request.role) else {
        return message_response(StatusCode::BAD_REQUEST, "Role must be student or instructor");
    };

    let new_user = NewUser {
        username: request.username,
        email: request.email,
        password: request.password,
        first_name: request.first_name,
        last_name: request.last_name,
        bio: request.bio,
        role,
    };

    match auth.register(new_user).await {
        Ok(response) => {
            debug!("registration successful");
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

fn validate(request: &SignupRequest) -> Result<(), &'static str> {
    let required = [
        &request.username,
        &request.email,
        &request.password,
        &request.first_name,
        &request.last_name,
    ];
    if required.iter().any(|field| field.is_empty()) {
        return Err("Please fill in all required fields");
    }

    if !valid_username(&request.username) {
        return Err("Invalid username");
    }

    if !valid_email(&request.email) {
        return Err("Invalid email address");
    }

    if request.password.len() < MIN_PASSWORD_LENGTH {
        return Err("Password must be at least 6 characters");
    }

    if Role::parse(&request.role).is_none() {
        return Err("Role must be student or instructor");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> SignupRequest {
        SignupRequest {
            username: "alice".to_string(),
            email: "alice@example.com".to_string(),
            password: "hunter22".to_string(),
            first_name: "Alice".to_string(),
            last_name: "Doe".to_string(),
            bio: None,
            role: "student".to_string(),
        }
    }

    #[test]
    fn accepts_a_well_formed_request() {
        assert!(validate(&request()).is_ok());
    }

    #[test]
    fn rejects_empty_required_fields() {
        let mut bad = request();
        bad.first_name = String::new();
        assert_eq!(validate(&bad), Err("Please fill in all required fields"));
    }

    #[test]
    fn rejects_bad_email() {
        let mut bad = request();
        bad.email = "not-an-email".to_string();
        assert_eq!(validate(&bad), Err("Invalid email address"));
    }

    #[test]
    fn rejects_short_password() {
        let mut bad = request();
        bad.password = "abc".to_string();
        assert_eq!(validate(&bad), Err("Password must be at least 6 characters"));
    }

    #[test]
    fn rejects_unknown_role() {
        let mut bad = request();
        bad.role = "admin".to_string();
        assert_eq!(validate(&bad), Err("Role must be student or instructor"));
    }

    #[test]
    fn camel_case_payload_decodes() {
        let body = r#"{
            "username": "alice",
            "email": "alice@example.com",
            "password": "hunter22",
            "firstName": "Alice",
            "lastName": "Doe",
            "role": "instructor"
        }"#;
        let request: SignupRequest = serde_json::from_str(body).unwrap();
        assert_eq!(request.first_name, "Alice");
        assert!(request.bio.is_none());
    }
}
