use chrono::{DateTime, Utc};
use serde::Serialize;

use bakery_auth::{NewUser, Principal, Role, User, UserStatus, UserUpdate, hash_password};
use bakery_core::UserId;

use super::Services;
use crate::error::{ServiceError, ServiceResult};

/// A user as shown to administrators (no password hash).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserProfile {
    pub id: UserId,
    pub full_name: String,
    pub email: String,
    pub role: Role,
    pub phone: Option<String>,
    pub default_address: Option<String>,
    pub status: UserStatus,
    pub created_at: DateTime<Utc>,
}

impl From<&User> for UserProfile {
    fn from(u: &User) -> Self {
        Self {
            id: u.id,
            full_name: u.full_name.clone(),
            email: u.email.clone(),
            role: u.role,
            phone: u.phone.clone(),
            default_address: u.default_address.clone(),
            status: u.status,
            created_at: u.created_at,
        }
    }
}

/// Contact details embedded in order and delivery listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CustomerSummary {
    pub id: UserId,
    pub full_name: String,
    pub email: String,
    pub phone: Option<String>,
}

impl From<&User> for CustomerSummary {
    fn from(u: &User) -> Self {
        Self {
            id: u.id,
            full_name: u.full_name.clone(),
            email: u.email.clone(),
            phone: u.phone.clone(),
        }
    }
}

impl Services {
    pub async fn list_users(&self) -> ServiceResult<Vec<UserProfile>> {
        let mut uow = self.begin().await?;
        let users = uow.users().await?;
        Ok(users.iter().map(UserProfile::from).collect())
    }

    pub async fn create_user(&self, input: NewUser) -> ServiceResult<UserProfile> {
        let input = input.validated()?;
        let mut uow = self.begin().await?;
        if uow.user_by_email(&input.email).await?.is_some() {
            return Err(ServiceError::conflict("email is already registered"));
        }
        let hash = hash_password(&input.password, self.password_cost)?;
        let user = input.into_user(hash, Utc::now());
        uow.insert_user(&user).await?;
        uow.commit().await?;

        tracing::info!(user_id = %user.id, role = %user.role, "user created");
        Ok(UserProfile::from(&user))
    }

    pub async fn update_user(&self, id: UserId, update: UserUpdate) -> ServiceResult<UserProfile> {
        let mut uow = self.begin().await?;
        let mut user = uow.user(id).await?.ok_or_else(|| ServiceError::not_found("user"))?;
        update.apply(&mut user)?;
        uow.update_user(&user).await?;
        uow.commit().await?;

        tracing::info!(user_id = %user.id, "user updated");
        Ok(UserProfile::from(&user))
    }

    /// Soft delete: the account is kept for order history but can no longer sign in.
    pub async fn deactivate_user(&self, actor: &Principal, id: UserId) -> ServiceResult<()> {
        if actor.user_id == id {
            return Err(ServiceError::conflict("you cannot deactivate your own account"));
        }
        let mut uow = self.begin().await?;
        let mut user = uow.user(id).await?.ok_or_else(|| ServiceError::not_found("user"))?;
        user.status = UserStatus::Inactive;
        uow.update_user(&user).await?;
        uow.commit().await?;

        tracing::info!(user_id = %id, "user deactivated");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::testkit::{TestEnv, new_user};

    #[tokio::test]
    async fn create_rejects_duplicate_email() {
        let env = TestEnv::new();
        env.services
            .create_user(new_user("Ana", "ana@bakery.test", Role::Baker))
            .await
            .unwrap();
        let err = env
            .services
            .create_user(new_user("Ana 2", "ANA@bakery.test", Role::Driver))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Domain(bakery_core::DomainError::Conflict(_))));
    }

    #[tokio::test]
    async fn admins_cannot_deactivate_themselves() {
        let env = TestEnv::new();
        let admin = env.user(Role::Admin).await;
        let err = env.services.deactivate_user(&admin, admin.user_id).await.unwrap_err();
        assert!(matches!(err, ServiceError::Domain(bakery_core::DomainError::Conflict(_))));

        let baker = env.user(Role::Baker).await;
        env.services.deactivate_user(&admin, baker.user_id).await.unwrap();
        let users = env.services.list_users().await.unwrap();
        let stored = users.iter().find(|u| u.id == baker.user_id).unwrap();
        assert_eq!(stored.status, UserStatus::Inactive);
    }

    #[tokio::test]
    async fn update_changes_role_and_phone() {
        let env = TestEnv::new();
        let driver = env.user(Role::Customer).await;
        let updated = env
            .services
            .update_user(
                driver.user_id,
                UserUpdate {
                    role: Some(Role::Driver),
                    phone: Some("999 111 222".into()),
                    ..UserUpdate::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.role, Role::Driver);
        assert_eq!(updated.phone.as_deref(), Some("999 111 222"));
    }
}
