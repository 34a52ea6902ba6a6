//! HTTP transport between the client session core and the auth service.
//!
//! [`AuthApi`] is the seam the controller talks through; [`AuthClient`] is
//! the production implementation. Transport outcomes are reduced to
//! [`ApiError`] here; the controller turns those into the user-facing error
//! taxonomy.

use crate::session::Role;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error};
use uuid::Uuid;

/// Requests time out after this long, like the frontend's submit calls.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Serialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    pub username: String,
    pub email: String,
    pub password: String,
    /// Checked locally against `password`; never sent over the wire.
    #[serde(skip)]
    pub confirm_password: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    pub role: Role,
}

/// Raw `{token, user}` body. Both fields stay optional so a response missing
/// either is detected by the controller instead of failing decode.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthPayload {
    pub token: Option<String>,
    pub user: Option<UserPayload>,
}

/// Profile as it appears on the wire. The role stays an open string here;
/// whether it names a known role is the controller's call.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPayload {
    pub id: Uuid,
    pub username: String,
    pub role: String,
    pub display_name: String,
    pub email: String,
}

/// Transport-level failure. Not user-facing: the controller normalizes.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request timed out")]
    Timeout,
    #[error("network unreachable")]
    Network,
    #[error("server answered {status}")]
    Status { status: StatusCode, message: String },
    #[error("malformed response body")]
    Decode,
}

/// Transport to the auth service. Swappable so controller tests run with a
/// fake and make zero network calls.
#[allow(async_fn_in_trait)]
pub trait AuthApi {
    async fn authenticate(&self, credentials: &Credentials) -> Result<AuthPayload, ApiError>;
    async fn register(&self, registration: &Registration) -> Result<AuthPayload, ApiError>;
}

/// reqwest-backed [`AuthApi`] against the service's `/api/auth` surface.
#[derive(Debug, Clone)]
pub struct AuthClient {
    http: reqwest::Client,
    base_url: String,
}

impl AuthClient {
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be built.
    pub fn new(base_url: &str) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .user_agent(crate::APP_USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn post_json<B: Serialize>(&self, path: &str, body: &B) -> Result<AuthPayload, ApiError> {
        let url = format!("{}{path}", self.base_url);
        debug!("POST {url}");

        let response = self
            .http
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        if status.is_success() {
            return response.json().await.map_err(|err| {
                error!("failed to decode auth response: {err}");
                ApiError::Decode
            });
        }

        // Error bodies carry a `{message}` envelope; keep it verbatim so
        // client-correctable failures surface the server's wording.
        let message = response
            .json::<ErrorBody>()
            .await
            .ok()
            .and_then(|body| body.message)
            .unwrap_or_default();

        Err(ApiError::Status { status, message })
    }
}

impl AuthApi for AuthClient {
    async fn authenticate(&self, credentials: &Credentials) -> Result<AuthPayload, ApiError> {
        self.post_json("/api/auth/login", credentials).await
    }

    async fn register(&self, registration: &Registration) -> Result<AuthPayload, ApiError> {
        self.post_json("/api/auth/signup", registration).await
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

fn map_transport_error(err: reqwest::Error) -> ApiError {
    if err.is_timeout() {
        ApiError::Timeout
    } else {
        error!("transport failure: {err}");
        ApiError::Network
    }
}
