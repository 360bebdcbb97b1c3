use thiserror::Error;

use crate::{Permission, Principal, role_permissions};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("forbidden: role '{role}' lacks permission '{permission}'")]
    Forbidden { role: String, permission: String },
}

/// Authorize a principal against a required permission.
///
/// - No IO
/// - No panics
/// - No business logic (pure policy check)
pub fn authorize(principal: &Principal, required: &Permission) -> Result<(), AuthzError> {
    let granted = role_permissions(principal.role);

    if granted
        .iter()
        .any(|p| p.is_wildcard() || p.as_str() == required.as_str())
    {
        Ok(())
    } else {
        Err(AuthzError::Forbidden {
            role: principal.role.to_string(),
            permission: required.as_str().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Role;
    use bakery_core::UserId;

    fn principal(role: Role) -> Principal {
        Principal::new(UserId::new(), role)
    }

    #[test]
    fn admin_wildcard_grants_everything() {
        assert!(authorize(&principal(Role::Admin), &Permission::USERS_MANAGE).is_ok());
        assert!(authorize(&principal(Role::Admin), &Permission::new("anything.at.all")).is_ok());
    }

    #[test]
    fn baker_manages_production_but_not_users() {
        let baker = principal(Role::Baker);
        assert!(authorize(&baker, &Permission::PRODUCTION_WRITE).is_ok());
        assert!(authorize(&baker, &Permission::REPORTS_READ).is_ok());
        assert!(authorize(&baker, &Permission::USERS_MANAGE).is_err());
        assert!(authorize(&baker, &Permission::PRODUCTION_DELETE).is_err());
        assert!(authorize(&baker, &Permission::PRODUCTS_WRITE).is_err());
    }

    #[test]
    fn driver_can_drive_but_not_assign() {
        let driver = principal(Role::Driver);
        assert!(authorize(&driver, &Permission::DELIVERIES_DRIVE).is_ok());
        assert!(authorize(&driver, &Permission::DELIVERIES_ASSIGN).is_err());
        assert!(authorize(&driver, &Permission::DELIVERIES_READ_ALL).is_err());
    }

    #[test]
    fn customer_only_places_and_reads_own_orders() {
        let customer = principal(Role::Customer);
        assert!(authorize(&customer, &Permission::ORDERS_PLACE).is_ok());
        assert!(authorize(&customer, &Permission::ORDERS_READ_OWN).is_ok());
        assert!(authorize(&customer, &Permission::ORDERS_READ_ALL).is_err());
        assert!(authorize(&customer, &Permission::INVENTORY_WRITE).is_err());
    }

    #[test]
    fn denial_names_role_and_permission() {
        let err = authorize(&principal(Role::Customer), &Permission::REPORTS_READ).unwrap_err();
        assert_eq!(
            err.to_string(),
            "forbidden: role 'customer' lacks permission 'reports.read'"
        );
    }
}
