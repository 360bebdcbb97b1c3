use core::str::FromStr;

use serde::{Deserialize, Serialize};

use bakery_core::DomainError;

/// Role identifier used for RBAC.
///
/// Every account holds exactly one role. The set is closed: back-office staff
/// (`Admin`, `Baker`), delivery staff (`Driver`) and storefront users
/// (`Customer`).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Baker,
    Driver,
    Customer,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::Admin, Role::Baker, Role::Driver, Role::Customer];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Baker => "baker",
            Role::Driver => "driver",
            Role::Customer => "customer",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Role::Admin => "Full system administrator",
            Role::Baker => "Runs production, recipes and stock",
            Role::Driver => "Delivers orders",
            Role::Customer => "Places orders from the storefront",
        }
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "baker" => Ok(Role::Baker),
            "driver" => Ok(Role::Driver),
            "customer" => Ok(Role::Customer),
            other => Err(DomainError::validation(format!("unknown role '{other}'"))),
        }
    }
}
