use std::borrow::Cow;

use serde::{Deserialize, Serialize};

use crate::Role;

/// Permission identifier.
///
/// Permissions are modeled as opaque strings (e.g. "inventory.write").
/// The wildcard permission `"*"` grants everything.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permission(Cow<'static, str>);

impl Permission {
    pub const WILDCARD: Permission = Permission::from_static("*");

    pub const USERS_MANAGE: Permission = Permission::from_static("users.manage");
    pub const CATEGORIES_WRITE: Permission = Permission::from_static("catalog.categories.write");
    pub const PRODUCTS_WRITE: Permission = Permission::from_static("catalog.products.write");
    pub const INVENTORY_READ: Permission = Permission::from_static("inventory.read");
    pub const INVENTORY_WRITE: Permission = Permission::from_static("inventory.write");
    pub const INVENTORY_DELETE: Permission = Permission::from_static("inventory.delete");
    pub const SUPPLIERS_READ: Permission = Permission::from_static("suppliers.read");
    pub const SUPPLIERS_WRITE: Permission = Permission::from_static("suppliers.write");
    pub const SUPPLIERS_DELETE: Permission = Permission::from_static("suppliers.delete");
    pub const RECIPES_READ: Permission = Permission::from_static("recipes.read");
    pub const RECIPES_WRITE: Permission = Permission::from_static("recipes.write");
    pub const PRODUCTION_READ: Permission = Permission::from_static("production.read");
    pub const PRODUCTION_WRITE: Permission = Permission::from_static("production.write");
    pub const PRODUCTION_DELETE: Permission = Permission::from_static("production.delete");
    pub const ORDERS_PLACE: Permission = Permission::from_static("orders.place");
    pub const ORDERS_READ_OWN: Permission = Permission::from_static("orders.read_own");
    pub const ORDERS_READ_ALL: Permission = Permission::from_static("orders.read_all");
    pub const ORDERS_PLACE_FOR_OTHERS: Permission = Permission::from_static("orders.place_for_others");
    pub const ORDERS_UPDATE_STATUS: Permission = Permission::from_static("orders.update_status");
    pub const PAYMENTS_CONFIRM: Permission = Permission::from_static("payments.confirm");
    pub const DELIVERIES_READ_ALL: Permission = Permission::from_static("deliveries.read_all");
    pub const DELIVERIES_ASSIGN: Permission = Permission::from_static("deliveries.assign");
    pub const DELIVERIES_DRIVE: Permission = Permission::from_static("deliveries.drive");
    pub const REPORTS_READ: Permission = Permission::from_static("reports.read");

    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub const fn from_static(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_wildcard(&self) -> bool {
        self.as_str() == "*"
    }
}

impl core::fmt::Display for Permission {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Role → permission policy.
pub fn role_permissions(role: Role) -> Vec<Permission> {
    // Read access any signed-in account gets.
    let authenticated = [
        Permission::INVENTORY_READ,
        Permission::SUPPLIERS_READ,
        Permission::RECIPES_READ,
        Permission::PRODUCTION_READ,
        Permission::ORDERS_PLACE,
        Permission::ORDERS_READ_OWN,
    ];

    match role {
        Role::Admin => vec![Permission::WILDCARD],
        Role::Baker => authenticated
            .into_iter()
            .chain([
                Permission::CATEGORIES_WRITE,
                Permission::INVENTORY_WRITE,
                Permission::SUPPLIERS_WRITE,
                Permission::RECIPES_WRITE,
                Permission::PRODUCTION_WRITE,
                Permission::ORDERS_READ_ALL,
                Permission::ORDERS_PLACE_FOR_OTHERS,
                Permission::ORDERS_UPDATE_STATUS,
                Permission::DELIVERIES_READ_ALL,
                Permission::REPORTS_READ,
            ])
            .collect(),
        Role::Driver => authenticated
            .into_iter()
            .chain([Permission::DELIVERIES_DRIVE])
            .collect(),
        Role::Customer => authenticated.into_iter().collect(),
    }
}
