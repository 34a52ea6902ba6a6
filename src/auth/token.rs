//! Session credential issuance and validation.
//!
//! Credentials are HS256 JWTs. Only the service holds the signing secret;
//! clients treat the token as opaque.

use crate::session::Profile;
use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Claims carried by a session credential.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id.
    pub sub: Uuid,
    pub username: String,
    pub role: String,
    /// Issued at, seconds since the epoch.
    pub iat: i64,
    /// Expiry, seconds since the epoch.
    pub exp: i64,
    /// Unique token id.
    pub jti: String,
}

/// Issues and validates session credentials with one symmetric secret.
pub struct TokenIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl_seconds: i64,
}

impl TokenIssuer {
    #[must_use]
    pub fn new(secret: &SecretString, ttl_seconds: i64) -> Self {
        let secret = secret.expose_secret().as_bytes();
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation: Validation::new(Algorithm::HS256),
            ttl_seconds,
        }
    }

    /// Issue a credential for `profile`.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding fails.
    pub fn issue(&self, profile: &Profile) -> Result<String, jsonwebtoken::errors::Error> {
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: profile.id,
            username: profile.username.clone(),
            role: profile.role.to_string(),
            iat: now,
            exp: now + self.ttl_seconds,
            jti: Uuid::new_v4().to_string(),
        };

        encode(&Header::default(), &claims, &self.encoding)
    }

    /// Validate a credential: signature and expiry.
    ///
    /// # Errors
    ///
    /// Returns an error for a tampered, foreign or expired token.
    pub fn verify(&self, token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
        decode::<Claims>(token, &self.decoding, &self.validation).map(|data| data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Role;

    fn issuer(ttl_seconds: i64) -> TokenIssuer {
        TokenIssuer::new(&SecretString::from("test-secret".to_string()), ttl_seconds)
    }

    fn profile() -> Profile {
        Profile {
            id: Uuid::new_v4(),
            username: "alice".to_string(),
            role: Role::Instructor,
            display_name: "Alice Doe".to_string(),
            email: "alice@example.com".to_string(),
        }
    }

    #[test]
    fn issue_then_verify_round_trips_claims() {
        let issuer = issuer(3600);
        let profile = profile();

        let token = issuer.issue(&profile).unwrap();
        let claims = issuer.verify(&token).unwrap();

        assert_eq!(claims.sub, profile.id);
        assert_eq!(claims.username, "alice");
        assert_eq!(claims.role, "instructor");
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn expired_token_fails_verification() {
        // Past the default leeway.
        let issuer = issuer(-120);
        let token = issuer.issue(&profile()).unwrap();
        assert!(issuer.verify(&token).is_err());
    }

    #[test]
    fn foreign_secret_fails_verification() {
        let token = issuer(3600).issue(&profile()).unwrap();
        let other = TokenIssuer::new(&SecretString::from("other-secret".to_string()), 3600);
        assert!(other.verify(&token).is_err());
    }

    #[test]
    fn client_expiry_peek_agrees_with_the_service() {
        let expired = issuer(-120).issue(&profile()).unwrap();
        let fresh = issuer(3600).issue(&profile()).unwrap();

        assert!(crate::session::credential_expired(&expired));
        assert!(!crate::session::credential_expired(&fresh));
    }

    #[test]
    fn tokens_carry_unique_ids() {
        let issuer = issuer(3600);
        let profile = profile();
        let first = issuer.verify(&issuer.issue(&profile).unwrap()).unwrap();
        let second = issuer.verify(&issuer.issue(&profile).unwrap()).unwrap();
        assert_ne!(first.jti, second.jti);
    }
}
