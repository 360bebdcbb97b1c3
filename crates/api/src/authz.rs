//! Route-level authorization.
//!
//! Handlers call [`require`] before touching services. Rules that depend on
//! data (ownership, assignment) are enforced by the services themselves.

use bakery_auth::{AuthzError, Permission, authorize};

use crate::context::PrincipalContext;

pub fn require(principal: &PrincipalContext, permission: &Permission) -> Result<(), AuthzError> {
    authorize(principal.principal(), permission).inspect_err(|e| {
        tracing::debug!(user_id = %principal.user_id(), error = %e, "request denied");
    })
}
