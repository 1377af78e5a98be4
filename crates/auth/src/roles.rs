use core::str::FromStr;

use serde::{Deserialize, Serialize};

use dealflow_core::DomainError;

/// Role held by an actor inside their company.
///
/// The set is closed. Input strings go through [`Role::normalize`]; anything it does
/// not recognise is treated as "no role" by callers, never as an error.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    SuperAdmin,
    CompanyAdmin,
    SalesManager,
    SalesRep,
    CompanyUser,
}

impl Role {
    pub const ALL: [Role; 5] = [
        Role::SuperAdmin,
        Role::CompanyAdmin,
        Role::SalesManager,
        Role::SalesRep,
        Role::CompanyUser,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::SuperAdmin => "super_admin",
            Role::CompanyAdmin => "company_admin",
            Role::SalesManager => "sales_manager",
            Role::SalesRep => "sales_rep",
            Role::CompanyUser => "company_user",
        }
    }

    /// Normalize a raw role string.
    ///
    /// Trim, lowercase, spaces to underscores, then resolve aliases
    /// (`admin`/`company admin` → `company_admin`, `regular_user` → `sales_rep`).
    pub fn normalize(raw: &str) -> Option<Role> {
        let key = raw.trim().to_lowercase().replace(' ', "_");
        match key.as_str() {
            "super_admin" => Some(Role::SuperAdmin),
            "company_admin" | "admin" => Some(Role::CompanyAdmin),
            "sales_manager" => Some(Role::SalesManager),
            "sales_rep" | "regular_user" => Some(Role::SalesRep),
            "company_user" => Some(Role::CompanyUser),
            _ => None,
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
        Role::normalize(s).ok_or_else(|| DomainError::validation(format!("unknown role '{s}'")))
    }
}
