//! User accounts.

use core::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use bakery_core::{DomainError, DomainResult, UserId};

use crate::Role;

/// Minimum accepted password length.
pub const MIN_PASSWORD_LEN: usize = 6;

/// User account status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum UserStatus {
    /// Can authenticate and transact.
    #[default]
    Active,
    /// Soft-deleted; kept for order and ledger history.
    Inactive,
    Suspended,
}

impl UserStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserStatus::Active => "active",
            UserStatus::Inactive => "inactive",
            UserStatus::Suspended => "suspended",
        }
    }
}

impl FromStr for UserStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "active" => Ok(UserStatus::Active),
            "inactive" => Ok(UserStatus::Inactive),
            "suspended" => Ok(UserStatus::Suspended),
            other => Err(DomainError::validation(format!("unknown user status '{other}'"))),
        }
    }
}

/// A user account. The password hash never leaves the service layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    pub full_name: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub phone: Option<String>,
    pub default_address: Option<String>,
    pub status: UserStatus,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn is_active(&self) -> bool {
        self.status == UserStatus::Active
    }

    /// Active account holding `role`.
    pub fn is_active_with_role(&self, role: Role) -> bool {
        self.is_active() && self.role == role
    }
}

/// Validated input for a new account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub full_name: String,
    pub email: String,
    pub password: String,
    pub role: Role,
    pub phone: Option<String>,
    pub default_address: Option<String>,
}

impl NewUser {
    /// Validate and normalize. The email is lowercased.
    pub fn validated(mut self) -> DomainResult<Self> {
        self.full_name = self.full_name.trim().to_string();
        if self.full_name.is_empty() {
            return Err(DomainError::validation("full_name cannot be empty"));
        }
        self.email = normalize_email(&self.email)?;
        if self.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(DomainError::validation(format!(
                "password must be at least {MIN_PASSWORD_LEN} characters"
            )));
        }
        self.phone = non_blank(self.phone);
        self.default_address = non_blank(self.default_address);
        Ok(self)
    }

    pub fn into_user(self, password_hash: String, now: DateTime<Utc>) -> User {
        User {
            id: UserId::new(),
            full_name: self.full_name,
            email: self.email,
            password_hash,
            role: self.role,
            phone: self.phone,
            default_address: self.default_address,
            status: UserStatus::Active,
            created_at: now,
        }
    }
}

/// Partial update applied by an administrator. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserUpdate {
    pub full_name: Option<String>,
    pub role: Option<Role>,
    pub phone: Option<String>,
    pub status: Option<UserStatus>,
    pub default_address: Option<String>,
}

impl UserUpdate {
    pub fn apply(self, user: &mut User) -> DomainResult<()> {
        if let Some(name) = self.full_name {
            let name = name.trim();
            if name.is_empty() {
                return Err(DomainError::validation("full_name cannot be empty"));
            }
            user.full_name = name.to_string();
        }
        if let Some(role) = self.role {
            user.role = role;
        }
        if let Some(phone) = self.phone {
            user.phone = non_blank(Some(phone));
        }
        if let Some(status) = self.status {
            user.status = status;
        }
        if let Some(address) = self.default_address {
            user.default_address = non_blank(Some(address));
        }
        Ok(())
    }
}

/// Trim + lowercase, and require a plausible `local@domain.tld` shape.
pub fn normalize_email(raw: &str) -> DomainResult<String> {
    let email = raw.trim().to_lowercase();
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
        }
        None => false,
    };
    if !valid || email.chars().any(char::is_whitespace) {
        return Err(DomainError::validation("email is not a valid address"));
    }
    Ok(email)
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user() -> NewUser {
        NewUser {
            full_name: "  Rosa Quispe ".to_string(),
            email: " Rosa@Bakery.PE ".to_string(),
            password: "secret1".to_string(),
            role: Role::Customer,
            phone: Some("   ".to_string()),
            default_address: Some("Av. Larco 123".to_string()),
        }
    }

    #[test]
    fn validation_normalizes_fields() {
        let u = new_user().validated().unwrap();
        assert_eq!(u.full_name, "Rosa Quispe");
        assert_eq!(u.email, "rosa@bakery.pe");
        assert_eq!(u.phone, None);
        assert_eq!(u.default_address.as_deref(), Some("Av. Larco 123"));
    }

    #[test]
    fn short_passwords_are_rejected() {
        let mut u = new_user();
        u.password = "12345".to_string();
        assert!(matches!(u.validated(), Err(DomainError::Validation(_))));
    }

    #[test]
    fn malformed_emails_are_rejected() {
        for bad in ["", "no-at-sign", "@bakery.pe", "a@b", "a@.pe", "a b@c.pe", "a@b@c.pe"] {
            assert!(normalize_email(bad).is_err(), "{bad} should be rejected");
        }
    }

    #[test]
    fn new_accounts_start_active() {
        let user = new_user().validated().unwrap().into_user("hash".into(), Utc::now());
        assert!(user.is_active());
        assert!(user.is_active_with_role(Role::Customer));
        assert!(!user.is_active_with_role(Role::Driver));
    }

    #[test]
    fn update_only_touches_given_fields() {
        let mut user = new_user().validated().unwrap().into_user("hash".into(), Utc::now());
        UserUpdate {
            role: Some(Role::Driver),
            status: Some(UserStatus::Suspended),
            ..Default::default()
        }
        .apply(&mut user)
        .unwrap();

        assert_eq!(user.role, Role::Driver);
        assert_eq!(user.status, UserStatus::Suspended);
        assert_eq!(user.full_name, "Rosa Quispe");
    }

    #[test]
    fn status_parses_case_insensitively() {
        assert_eq!("INACTIVE".parse::<UserStatus>().unwrap(), UserStatus::Inactive);
        assert!("gone".parse::<UserStatus>().is_err());
    }
}
