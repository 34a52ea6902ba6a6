//! Service-side authentication.
//!
//! [`AuthService`] verifies credentials against the persistent store and
//! issues signed session credentials. It holds the connection manager only
//! through the read-only [`StoreHandle`] seam: when the manager does not
//! report `connected`, both operations fail fast with [`AuthError::Unavailable`]
//! and never touch the store.

pub mod password;
pub mod token;

pub use token::{Claims, TokenIssuer};

use crate::{
    session::{Profile, Role},
    store::{ConnectionState, StoreHandle},
};
use sqlx::{PgPool, Row};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, instrument};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid username or password")]
    InvalidCredentials,
    #[error("Username already exists")]
    DuplicateUsername,
    #[error("{0}")]
    Validation(String),
    #[error("persistent store is unreachable")]
    Unavailable,
    #[error("invalid or expired session token")]
    InvalidToken,
    #[error("stored role {0:?} is not recognized")]
    CorruptRole(String),
    #[error(transparent)]
    Database(sqlx::Error),
    #[error("failed to process password")]
    Password,
    #[error("failed to issue session token")]
    Token,
}

/// Login input.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// Validated registration input; the role is already a known one by the
/// time it reaches the service.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub bio: Option<String>,
    pub role: Role,
}

/// What both operations hand back: the signed credential plus the profile
/// the client persists next to it.
#[derive(Debug, Clone)]
pub struct AuthResponse {
    pub token: String,
    pub user: Profile,
}

pub struct AuthService {
    store: Arc<dyn StoreHandle>,
    tokens: TokenIssuer,
}

impl AuthService {
    #[must_use]
    pub fn new(store: Arc<dyn StoreHandle>, tokens: TokenIssuer) -> Self {
        Self { store, tokens }
    }

    /// Fast-fail gate: a pool is handed out only while the manager reports
    /// `connected`. No store access is attempted otherwise.
    fn pool(&self) -> Result<PgPool, AuthError> {
        if self.store.snapshot().state != ConnectionState::Connected {
            debug!("rejecting auth call: store is not connected");
            return Err(AuthError::Unavailable);
        }
        self.store.pool().ok_or(AuthError::Unavailable)
    }

    /// Verify credentials and issue a session token.
    ///
    /// # Errors
    ///
    /// `InvalidCredentials` for a bad username or password (indistinguishable
    /// on purpose), `Unavailable` when the store is unreachable.
    #[instrument(skip_all, fields(username = %credentials.username))]
    pub async fn authenticate(&self, credentials: &Credentials) -> Result<AuthResponse, AuthError> {
        let pool = self.pool()?;

        let row = match sqlx::query(
            "SELECT id, username, email, password_hash, role, first_name, last_name \
             FROM users WHERE username = $1",
        )
        .bind(&credentials.username)
        .fetch_one(&pool)
        .await
        {
            Ok(row) => row,
            Err(sqlx::Error::RowNotFound) => {
                debug!("user not found");
                return Err(AuthError::InvalidCredentials);
            }
            Err(err) => {
                error!("failed to fetch user: {err}");
                return Err(AuthError::Database(err));
            }
        };

        let stored_hash: String = row.get("password_hash");
        if !password::verify(&credentials.password, &stored_hash) {
            debug!("password mismatch");
            return Err(AuthError::InvalidCredentials);
        }

        let user = profile_from_row(&row)?;
        let token = self.issue(&user)?;

        Ok(AuthResponse { token, user })
    }

    /// Create a user and issue a session token. Uniqueness is enforced by
    /// the store's constraint; the violation is mapped, not pre-checked.
    ///
    /// # Errors
    ///
    /// `DuplicateUsername` when the username is taken, `Unavailable` when
    /// the store is unreachable.
    #[instrument(skip_all, fields(username = %new_user.username))]
    pub async fn register(&self, new_user: NewUser) -> Result<AuthResponse, AuthError> {
        let pool = self.pool()?;

        let password_hash = password::hash(&new_user.password).map_err(|err| {
            error!("failed to hash password: {err}");
            AuthError::Password
        })?;

        let id = Uuid::new_v4();
        if let Err(err) = sqlx::query(
            "INSERT INTO users (id, username, email, password_hash, role, first_name, last_name, bio) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(id)
        .bind(&new_user.username)
        .bind(&new_user.email)
        .bind(&password_hash)
        .bind(new_user.role.as_str())
        .bind(&new_user.first_name)
        .bind(&new_user.last_name)
        .bind(new_user.bio.as_deref().unwrap_or_default())
        .execute(&pool)
        .await
        {
            if err
                .as_database_error()
                .is_some_and(|db_err| db_err.is_unique_violation())
            {
                debug!("username already exists");
                return Err(AuthError::DuplicateUsername);
            }
            error!("failed to insert user: {err}");
            return Err(AuthError::Database(err));
        }

        let user = Profile {
            id,
            display_name: display_name(&new_user.first_name, &new_user.last_name),
            username: new_user.username,
            role: new_user.role,
            email: new_user.email,
        };
        let token = self.issue(&user)?;

        Ok(AuthResponse { token, user })
    }

    /// Validate the credential presented on a protected call.
    ///
    /// # Errors
    ///
    /// `InvalidToken` for anything the issuer rejects.
    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        self.tokens.verify(token).map_err(|err| {
            debug!("token rejected: {err}");
            AuthError::InvalidToken
        })
    }

    fn issue(&self, user: &Profile) -> Result<String, AuthError> {
        self.tokens.issue(user).map_err(|err| {
            error!("failed to issue token: {err}");
            AuthError::Token
        })
    }
}

fn display_name(first_name: &str, last_name: &str) -> String {
    format!("{first_name} {last_name}").trim().to_string()
}

fn profile_from_row(row: &sqlx::postgres::PgRow) -> Result<Profile, AuthError> {
    let role: String = row.get("role");
    let role = Role::parse(&role).ok_or_else(|| {
        error!(role = %role, "stored role is outside the known set");
        AuthError::CorruptRole(role.clone())
    })?;

    let first_name: String = row.get("first_name");
    let last_name: String = row.get("last_name");

    Ok(Profile {
        id: row.get("id"),
        username: row.get("username"),
        role,
        display_name: display_name(&first_name, &last_name),
        email: row.get("email"),
    })
}
