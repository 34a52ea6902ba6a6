use secrecy::SecretString;

/// Process-wide configuration shared with the request handlers.
#[derive(Clone)]
pub struct GlobalArgs {
    /// Deployment environment tag; `production` suppresses error details in
    /// response envelopes.
    pub environment: String,
    /// Symmetric secret the session credentials are signed with.
    pub session_secret: SecretString,
    /// Session credential lifetime in seconds.
    pub session_ttl_seconds: i64,
}

impl GlobalArgs {
    #[must_use]
    pub fn new(environment: String, session_secret: SecretString, session_ttl_seconds: i64) -> Self {
        Self {
            environment,
            session_secret,
            session_ttl_seconds,
        }
    }

    #[must_use]
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

impl std::fmt::Debug for GlobalArgs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GlobalArgs")
            .field("environment", &self.environment)
            .field("session_secret", &"***")
            .field("session_ttl_seconds", &self.session_ttl_seconds)
            .finish()
    }
}
