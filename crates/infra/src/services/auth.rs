use chrono::Utc;
use serde::{Deserialize, Serialize};

use bakery_auth::{
    NewUser, Principal, Role, User, UserStatus, hash_password, normalize_email, verify_password,
};
use bakery_core::UserId;

use super::{Services, UserProfile};
use crate::error::{ServiceError, ServiceResult};

/// Identity returned alongside a fresh token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionUser {
    pub id: UserId,
    pub full_name: String,
    pub email: String,
    pub role: Role,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginResult {
    pub token: String,
    pub user: SessionUser,
}

/// Public self-registration. The role is always `customer`.
#[derive(Debug, Clone, Deserialize)]
pub struct Registration {
    pub full_name: String,
    pub email: String,
    pub password: String,
    pub phone: Option<String>,
    pub default_address: Option<String>,
}

impl Services {
    pub async fn login(&self, email: &str, password: &str) -> ServiceResult<LoginResult> {
        let email = normalize_email(email).map_err(|_| ServiceError::InvalidCredentials)?;

        let mut uow = self.begin().await?;
        let Some(user) = uow.user_by_email(&email).await? else {
            tracing::warn!(email = %email, "login for unknown email");
            return Err(ServiceError::InvalidCredentials);
        };
        drop(uow);

        if !verify_password(password, &user.password_hash) {
            tracing::warn!(user_id = %user.id, "login with wrong password");
            return Err(ServiceError::InvalidCredentials);
        }
        if !user.is_active() {
            return Err(ServiceError::InactiveAccount);
        }

        let token = self.jwt.issue(user.id, &user.email, user.role, Utc::now())?;
        tracing::info!(user_id = %user.id, role = %user.role, "user logged in");
        Ok(LoginResult {
            token,
            user: SessionUser {
                id: user.id,
                full_name: user.full_name,
                email: user.email,
                role: user.role,
            },
        })
    }

    pub async fn register(&self, input: Registration) -> ServiceResult<UserId> {
        let profile = self
            .create_user(NewUser {
                full_name: input.full_name,
                email: input.email,
                password: input.password,
                role: Role::Customer,
                phone: input.phone,
                default_address: input.default_address,
            })
            .await?;
        Ok(profile.id)
    }

    /// Profile of the signed-in user.
    pub async fn me(&self, principal: &Principal) -> ServiceResult<UserProfile> {
        let mut uow = self.begin().await?;
        let user = uow
            .user(principal.user_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("user"))?;
        Ok(UserProfile::from(&user))
    }

    /// Create an active admin with `email` unless an account already uses it.
    ///
    /// Returns whether an account was created.
    pub async fn ensure_admin(&self, email: &str, password: &str) -> ServiceResult<bool> {
        let input = NewUser {
            full_name: "Administrator".to_string(),
            email: email.to_string(),
            password: password.to_string(),
            role: Role::Admin,
            phone: None,
            default_address: None,
        }
        .validated()?;

        let mut uow = self.begin().await?;
        if let Some(existing) = uow.user_by_email(&input.email).await? {
            if existing.role != Role::Admin || existing.status != UserStatus::Active {
                tracing::warn!(
                    user_id = %existing.id,
                    "bootstrap admin email belongs to a non-admin or inactive account"
                );
            }
            return Ok(false);
        }
        let hash = hash_password(&input.password, self.password_cost)?;
        let admin: User = input.into_user(hash, Utc::now());
        uow.insert_user(&admin).await?;
        uow.commit().await?;

        tracing::info!(user_id = %admin.id, "bootstrap admin created");
        Ok(true)
    }
}
