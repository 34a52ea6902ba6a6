//! OpenAPI document for the HTTP surface.

use crate::{
    api::handlers,
    session::{Profile, Role},
};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::health::health,
        handlers::login::login,
        handlers::signup::signup,
        handlers::me::me,
    ),
    components(schemas(
        handlers::health::Health,
        handlers::login::LoginRequest,
        handlers::signup::SignupRequest,
        handlers::me::MeResponse,
        handlers::me::MeUser,
        handlers::AuthBody,
        Profile,
        Role,
    )),
    tags(
        (name = "auth", description = "Login, signup and credential validation"),
        (name = "health", description = "Service and store connection status"),
    )
)]
pub struct ApiDoc;

/// The generated OpenAPI spec.
#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn documents_every_route() {
        let doc = openapi();
        let paths = &doc.paths.paths;
        for path in ["/health", "/api/auth/login", "/api/auth/signup", "/api/auth/me"] {
            assert!(paths.contains_key(path), "missing path: {path}");
        }
    }
}
