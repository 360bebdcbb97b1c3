//! HS256 token issuing and verification.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use thiserror::Error;

use bakery_core::UserId;

use crate::{JwtClaims, Role, TokenValidationError, validate_claims};

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("malformed or badly signed token: {0}")]
    Invalid(#[from] jsonwebtoken::errors::Error),

    #[error(transparent)]
    Claims(#[from] TokenValidationError),
}

/// Verifies bearer tokens into claims.
pub trait JwtValidator: Send + Sync {
    fn validate(&self, token: &str, now: DateTime<Utc>) -> Result<JwtClaims, TokenError>;
}

/// Symmetric (HS256) token issuer + validator.
pub struct Hs256Jwt {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl Hs256Jwt {
    pub fn new(secret: &[u8], ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            ttl,
        }
    }

    /// Sign a token for `user_id`, valid from `now` for the configured TTL.
    pub fn issue(
        &self,
        user_id: UserId,
        email: &str,
        role: Role,
        now: DateTime<Utc>,
    ) -> Result<String, TokenError> {
        let claims = JwtClaims {
            sub: user_id,
            email: email.to_string(),
            role,
            issued_at: now,
            expires_at: now + self.ttl,
        };
        Ok(jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &self.encoding,
        )?)
    }
}

impl JwtValidator for Hs256Jwt {
    fn validate(&self, token: &str, now: DateTime<Utc>) -> Result<JwtClaims, TokenError> {
        // Expiry lives in our own RFC 3339 claims, checked by `validate_claims`.
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.required_spec_claims.clear();

        let data = jsonwebtoken::decode::<JwtClaims>(token, &self.decoding, &validation)?;
        validate_claims(&data.claims, now)?;
        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issued_tokens_validate() {
        let jwt = Hs256Jwt::new(b"secret", Duration::hours(24));
        let user = UserId::new();
        let now = Utc::now();
        let token = jwt.issue(user, "baker@bakery.pe", Role::Baker, now).unwrap();

        let claims = jwt.validate(&token, now).unwrap();
        assert_eq!(claims.sub, user);
        assert_eq!(claims.role, Role::Baker);
        assert_eq!(claims.email, "baker@bakery.pe");
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let now = Utc::now();
        let token = Hs256Jwt::new(b"one", Duration::hours(1))
            .issue(UserId::new(), "x@y.pe", Role::Customer, now)
            .unwrap();

        let err = Hs256Jwt::new(b"two", Duration::hours(1))
            .validate(&token, now)
            .unwrap_err();
        assert!(matches!(err, TokenError::Invalid(_)));
    }

    #[test]
    fn expired_tokens_are_rejected() {
        let jwt = Hs256Jwt::new(b"secret", Duration::hours(1));
        let issued = Utc::now() - Duration::hours(3);
        let token = jwt.issue(UserId::new(), "x@y.pe", Role::Driver, issued).unwrap();

        let err = jwt.validate(&token, Utc::now()).unwrap_err();
        assert!(matches!(err, TokenError::Claims(TokenValidationError::Expired)));
    }
}
