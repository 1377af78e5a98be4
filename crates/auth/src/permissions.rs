use core::str::FromStr;

use serde::{Deserialize, Serialize};

use dealflow_core::DomainError;

/// Capability tag.
///
/// The serialized form is a stable token (e.g. `view_company_data`) and is what
/// clients see in permission lists. Permissions only exist as entries of the static
/// role table; nothing combines or derives them at runtime.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    ViewAllCompanies,
    ManageCompanies,
    ManageSystem,
    ViewCompanyData,
    ManageCompanySettings,
    ManageCompanyUsers,
    ManageBilling,
    ManagePipelines,
    ManageSupportTickets,
    ManageIntegrations,
    ManageWorkflows,
    ViewTeamData,
    ManageTeamUsers,
    DeleteRecords,
    ViewReports,
    ExportData,
    ViewOwnData,
    CreateRecords,
    EditRecords,
}

impl Permission {
    /// The full permission universe.
    pub const ALL: [Permission; 19] = [
        Permission::ViewAllCompanies,
        Permission::ManageCompanies,
        Permission::ManageSystem,
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

    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::ViewAllCompanies => "view_all_companies",
            Permission::ManageCompanies => "manage_companies",
            Permission::ManageSystem => "manage_system",
            Permission::ViewCompanyData => "view_company_data",
            Permission::ManageCompanySettings => "manage_company_settings",
            Permission::ManageCompanyUsers => "manage_company_users",
            Permission::ManageBilling => "manage_billing",
            Permission::ManagePipelines => "manage_pipelines",
            Permission::ManageSupportTickets => "manage_support_tickets",
            Permission::ManageIntegrations => "manage_integrations",
            Permission::ManageWorkflows => "manage_workflows",
            Permission::ViewTeamData => "view_team_data",
            Permission::ManageTeamUsers => "manage_team_users",
            Permission::DeleteRecords => "delete_records",
            Permission::ViewReports => "view_reports",
            Permission::ExportData => "export_data",
            Permission::ViewOwnData => "view_own_data",
            Permission::CreateRecords => "create_records",
            Permission::EditRecords => "edit_records",
        }
    }
}

impl core::fmt::Display for Permission {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Permission {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Permission::ALL
            .iter()
            .copied()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| DomainError::validation(format!("unknown permission '{s}'")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn tokens_are_unique_and_parse_back() {
        let tokens: HashSet<&str> = Permission::ALL.iter().map(|p| p.as_str()).collect();
        assert_eq!(tokens.len(), Permission::ALL.len());

        for p in Permission::ALL {
            assert_eq!(p.as_str().parse::<Permission>().unwrap(), p);
        }
    }

    #[test]
    fn serde_matches_token() {
        let json = serde_json::to_string(&Permission::ViewCompanyData).unwrap();
        assert_eq!(json, "\"view_company_data\"");
        let back: Permission = serde_json::from_str("\"manage_billing\"").unwrap();
        assert_eq!(back, Permission::ManageBilling);
    }

    #[test]
    fn unknown_token_is_rejected() {
        assert!("view_everything".parse::<Permission>().is_err());
    }
}
