use axum::extract::FromRequestParts;
use axum::http::StatusCode;
use axum::http::request::Parts;
use axum::response::Response;

use bakery_auth::{Principal, Role};
use bakery_core::UserId;

use crate::app::errors::json_error;

/// Authenticated caller, inserted by [`crate::middleware::auth_middleware`].
///
/// Extracting it from a request without a valid token yields 401, so
/// handlers that take a `PrincipalContext` are protected routes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrincipalContext {
    principal: Principal,
    email: String,
}

impl PrincipalContext {
    pub fn new(principal: Principal, email: String) -> Self {
        Self { principal, email }
    }

    pub fn principal(&self) -> &Principal {
        &self.principal
    }

    pub fn user_id(&self) -> UserId {
        self.principal.user_id
    }

    pub fn role(&self) -> Role {
        self.principal.role
    }

    pub fn email(&self) -> &str {
        &self.email
    }
}

#[axum::async_trait]
impl<S: Send + Sync> FromRequestParts<S> for PrincipalContext {
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts.extensions.get::<PrincipalContext>().cloned().ok_or_else(|| {
            json_error(StatusCode::UNAUTHORIZED, "unauthenticated", "missing bearer token")
        })
    }
}
