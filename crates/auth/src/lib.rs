//! `bakery-auth`: authentication and role-based authorization.
//!
//! This crate is intentionally decoupled from HTTP and storage.

pub mod authorize;
pub mod claims;
pub mod jwt;
pub mod password;
pub mod permissions;
pub mod principal;
pub mod roles;
pub mod user;

pub use authorize::{authorize, AuthzError};
pub use claims::{JwtClaims, TokenValidationError, validate_claims};
pub use jwt::{Hs256Jwt, JwtValidator, TokenError};
pub use password::{DEFAULT_COST, hash_password, verify_password, PasswordError};
pub use permissions::{Permission, role_permissions};
pub use principal::Principal;
pub use roles::Role;
pub use user::{MIN_PASSWORD_LEN, NewUser, User, UserStatus, UserUpdate, normalize_email};
