//! Login/signup/logout orchestration for one context.
//!
//! The controller owns the only path that writes a session: transport
//! result → role check → store write → bus publish. Every failure is
//! normalized into [`SessionError`] before it reaches presentation; no raw
//! transport error escapes this module.

use crate::session::{
    ApiError, AuthApi, Credentials, Profile, Registration, Role, Route, Session, SessionBus,
    SessionChanged, SessionStore,
    client::AuthPayload,
    store::PersistenceError,
};
use reqwest::StatusCode;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;
use tracing::{debug, warn};

/// User-facing failure taxonomy. The `Display` strings are the messages the
/// presentation layer shows verbatim.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Invalid username or password.")]
    InvalidCredentials,
    #[error("{0}")]
    DuplicateUsername(String),
    #[error("{0}")]
    Validation(String),
    #[error("Network error. Please check if the server is running.")]
    NetworkUnavailable,
    #[error("Request timeout. Please check your connection.")]
    Timeout,
    #[error("Server error. Please try again later.")]
    ServerFault,
    #[error("Invalid login response. Missing token or user.")]
    MalformedResponse,
    #[error("Unknown user role. Please contact support.")]
    UnknownRole,
    #[error("Could not save your session. Please sign in again.")]
    Persistence(#[from] PersistenceError),
    #[error("Sign-in was cancelled.")]
    Cancelled,
}

impl SessionError {
    fn from_api(err: ApiError) -> Self {
        match err {
            ApiError::Timeout => Self::Timeout,
            ApiError::Network => Self::NetworkUnavailable,
            ApiError::Decode => Self::MalformedResponse,
            ApiError::Status { status, message } => match status {
                StatusCode::UNAUTHORIZED => Self::InvalidCredentials,
                StatusCode::BAD_REQUEST => Self::Validation(non_empty(
                    message,
                    "Invalid request data.",
                )),
                StatusCode::CONFLICT => Self::DuplicateUsername(non_empty(
                    message,
                    "That username is already taken.",
                )),
                _ => Self::ServerFault,
            },
        }
    }
}

fn non_empty(message: String, fallback: &str) -> String {
    if message.is_empty() {
        fallback.to_string()
    } else {
        message
    }
}

/// Successful login/signup outcome: the session plus where to send the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Login {
    pub session: Session,
    pub destination: Route,
}

/// Orchestrates auth calls for one mounted login/signup surface.
pub struct SessionController<A: AuthApi> {
    api: A,
    store: SessionStore,
    bus: SessionBus,
    mounted: AtomicBool,
}

impl<A: AuthApi> SessionController<A> {
    pub fn new(api: A, store: SessionStore, bus: SessionBus) -> Self {
        Self {
            api,
            store,
            bus,
            mounted: AtomicBool::new(true),
        }
    }

    /// Mark the owning surface as gone. An auth call still in flight will
    /// have its result discarded: nothing is written after this.
    pub fn unmount(&self) {
        self.mounted.store(false, Ordering::SeqCst);
    }

    fn is_mounted(&self) -> bool {
        self.mounted.load(Ordering::SeqCst)
    }

    /// Authenticate, persist the session, notify, and return the role's
    /// destination.
    ///
    /// # Errors
    ///
    /// Returns a [`SessionError`] from the taxonomy; on any error no session
    /// is left in the store.
    pub async fn login(&self, credentials: Credentials) -> Result<Login, SessionError> {
        if credentials.username.is_empty() || credentials.password.is_empty() {
            return Err(SessionError::Validation(
                "Please enter both username and password".to_string(),
            ));
        }

        let payload = self
            .api
            .authenticate(&credentials)
            .await
            .map_err(SessionError::from_api)?;

        self.accept(payload)
    }

    /// Register, persist the session, notify, and return the destination.
    /// Rejects locally (no network call) on empty required fields or a
    /// password/confirmation mismatch.
    ///
    /// # Errors
    ///
    /// Returns a [`SessionError`] from the taxonomy.
    pub async fn signup(&self, registration: Registration) -> Result<Login, SessionError> {
        validate_registration(&registration)?;

        let payload = self
            .api
            .register(&registration)
            .await
            .map_err(SessionError::from_api)?;

        self.accept(payload)
    }

    /// Clear the stored session and notify this and other contexts.
    pub fn logout(&self) {
        self.store.clear();
        self.bus.publish(SessionChanged::LoggedOut);
        debug!("session cleared");
    }

    /// Shared tail of login/signup: validate the payload, fail closed on
    /// anything suspicious, then write-then-publish.
    fn accept(&self, payload: AuthPayload) -> Result<Login, SessionError> {
        if !self.is_mounted() {
            debug!("discarding auth result: surface unmounted while in flight");
            return Err(SessionError::Cancelled);
        }

        let (token, user) = match (payload.token, payload.user) {
            (Some(token), Some(user)) if !token.is_empty() => (token, user),
            _ => {
                warn!("auth response missing token or user");
                return Err(SessionError::MalformedResponse);
            }
        };

        // Role first: an unknown role must not leave a session behind or
        // guess a destination.
        let role = Role::parse(&user.role).ok_or_else(|| {
            warn!(role = %user.role, "unknown role in auth response");
            SessionError::UnknownRole
        })?;

        let session = Session {
            credential: token,
            profile: Profile {
                id: user.id,
                username: user.username,
                role,
                display_name: user.display_name,
                email: user.email,
            },
        };

        // A session the local store refused to keep is a failed login, even
        // though the server accepted the credentials.
        self.store.write(&session)?;
        self.bus.publish(SessionChanged::LoggedIn);

        Ok(Login {
            destination: role.dashboard(),
            session,
        })
    }
}

fn validate_registration(registration: &Registration) -> Result<(), SessionError> {
    let required = [
        &registration.username,
        &registration.email,
        &registration.password,
        &registration.first_name,
        &registration.last_name,
    ];
    if required.iter().any(|field| field.is_empty()) {
        return Err(SessionError::Validation(
            "Please fill in all required fields".to_string(),
        ));
    }

    if registration.password != registration.confirm_password {
        return Err(SessionError::Validation(
            "Passwords do not match".to_string(),
        ));
    }

    Ok(())
}
