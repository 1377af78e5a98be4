//! Static role → permission table.
//!
//! Each role's grant is a hand-maintained, pre-expanded constant list. There is no
//! inheritance between roles; `super_admin` simply lists the whole universe.
//! The lookup map is built once per process and is read-only afterwards.

use std::collections::{BTreeSet, HashMap};
use std::sync::LazyLock;

use crate::{Permission, Role};

/// Ordered set of permissions granted to a role.
pub type PermissionSet = BTreeSet<Permission>;

const COMPANY_ADMIN: &[Permission] = &[
    Permission::ViewCompanyData,
    Permission::ManageCompanySettings,
    Permission::ManageCompanyUsers,
    Permission::ManageBilling,
    Permission::ManagePipelines,
    Permission::ManageSupportTickets,
    Permission::ManageIntegrations,
    Permission::ManageWorkflows,
    Permission::ViewTeamData,
    Permission::ManageTeamUsers,
    Permission::DeleteRecords,
    Permission::ViewReports,
    Permission::ExportData,
    Permission::ViewOwnData,
    Permission::CreateRecords,
    Permission::EditRecords,
];

const SALES_MANAGER: &[Permission] = &[
    Permission::ViewTeamData,
    Permission::ManageTeamUsers,
    Permission::DeleteRecords,
    Permission::ViewReports,
    Permission::ExportData,
    Permission::ViewOwnData,
    Permission::CreateRecords,
    Permission::EditRecords,
];

const SALES_REP: &[Permission] = &[
    Permission::ViewOwnData,
    Permission::CreateRecords,
    Permission::EditRecords,
];

const COMPANY_USER: &[Permission] = &[Permission::ViewOwnData, Permission::CreateRecords];

fn grants(role: Role) -> &'static [Permission] {
    match role {
        Role::SuperAdmin => &Permission::ALL,
        Role::CompanyAdmin => COMPANY_ADMIN,
        Role::SalesManager => SALES_MANAGER,
        Role::SalesRep => SALES_REP,
        Role::CompanyUser => COMPANY_USER,
    }
}

static TABLE: LazyLock<HashMap<Role, PermissionSet>> = LazyLock::new(|| {
    Role::ALL
        .iter()
        .map(|role| (*role, grants(*role).iter().copied().collect()))
        .collect()
});

static NO_PERMISSIONS: PermissionSet = BTreeSet::new();

/// Permissions granted to an already-normalized role.
pub fn permissions_for(role: Role) -> &'static PermissionSet {
    TABLE.get(&role).unwrap_or(&NO_PERMISSIONS)
}

/// Permissions granted to a raw role string.
///
/// The string is normalized first. Unknown roles get the empty set.
pub fn permissions_for_role(raw_role: &str) -> &'static PermissionSet {
    match Role::normalize(raw_role) {
        Some(role) => permissions_for(role),
        None => {
            tracing::debug!(role = raw_role, "unknown role resolved to no permissions");
            &NO_PERMISSIONS
        }
    }
}
