//! Client-side session core.
//!
//! Everything a frontend context (one open tab or window) needs to hold a
//! session: durable per-origin storage ([`store::SessionStore`]), change
//! propagation to listeners in this and other contexts ([`bus::SessionBus`]),
//! render gating for protected views ([`gate::AccessGate`]), and the
//! login/signup/logout orchestration ([`controller::SessionController`]).
//!
//! The credential is opaque here: the client never validates its signature.
//! The only thing a context may do with it is read the standard `exp` claim
//! (unverified) for best-effort expiry detection during a storage read.

pub mod bus;
pub mod client;
pub mod controller;
pub mod gate;
pub mod store;

use jsonwebtoken::{Algorithm, DecodingKey, Validation, errors::ErrorKind};
use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::ToSchema;
use uuid::Uuid;

pub use bus::{SessionBus, SessionChanged, SessionHub, Subscription};
pub use client::{ApiError, AuthApi, AuthClient, Credentials, Registration};
pub use controller::{Login, SessionController, SessionError};
pub use gate::{AccessGate, AuthorizationDecision};
pub use store::{LocalStorage, PersistenceError, SessionStore};

/// Role carried by a profile. Closed set: anything else coming off the wire
/// is rejected instead of being mapped to a default destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Instructor,
}

impl Role {
    #[must_use]
    pub fn parse(role: &str) -> Option<Self> {
        match role {
            "student" => Some(Self::Student),
            "instructor" => Some(Self::Instructor),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Student => "student",
            Self::Instructor => "instructor",
        }
    }

    /// The application surface this role lands on after login.
    #[must_use]
    pub const fn dashboard(self) -> Route {
        match self {
            Self::Student => Route::StudentDashboard,
            Self::Instructor => Route::InstructorDashboard,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// User profile stored alongside the credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub id: Uuid,
    pub username: String,
    pub role: Role,
    pub display_name: String,
    pub email: String,
}

/// The paired credential + profile identifying a logged-in user in one
/// context. Written and cleared together, never partially present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub credential: String,
    pub profile: Profile,
}

/// Application surfaces the session core can send a context to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Login,
    StudentDashboard,
    InstructorDashboard,
}

impl Route {
    #[must_use]
    pub const fn path(self) -> &'static str {
        match self {
            Self::Login => "/login",
            Self::StudentDashboard => "/student/dashboard",
            Self::InstructorDashboard => "/instructor/dashboard",
        }
    }
}

/// Routing seam between the session core and the host application.
/// UX-only: real access control lives on the API.
pub trait Navigator: Send + Sync {
    fn navigate(&self, route: Route);
}

#[derive(Deserialize)]
struct ExpClaims {
    #[allow(dead_code)]
    exp: i64,
}

/// Best-effort expiry check on an otherwise opaque credential.
///
/// Returns `true` only when the credential parses as a JWT whose `exp` is in
/// the past. The signature is NOT verified (the client has no key), and a
/// credential that is not JWT-shaped or carries no `exp` is treated as still
/// valid; the service remains the authority.
#[must_use]
pub(crate) fn credential_expired(credential: &str) -> bool {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.insecure_disable_signature_validation();
    validation.validate_aud = false;

    match jsonwebtoken::decode::<ExpClaims>(credential, &DecodingKey::from_secret(&[]), &validation)
    {
        Ok(_) => false,
        Err(err) => matches!(err.kind(), ErrorKind::ExpiredSignature),
    }
}
