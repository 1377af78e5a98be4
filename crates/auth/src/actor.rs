use serde::{Deserialize, Serialize};

use dealflow_core::{CompanyId, TeamId, UserId};

use crate::Role;

/// The two role fields a user record can carry.
///
/// User records expose both a free-form display role and a normalized role.
/// Precedence rule: the normalized field wins; the display field is consulted only
/// when the normalized one is absent (missing or blank). The winner still goes
/// through [`Role::normalize`], so a garbage value yields no role at all.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleFields {
    pub role: Option<String>,
    pub normalized_role: Option<String>,
}

impl RoleFields {
    pub fn effective(&self) -> Option<Role> {
        present(self.normalized_role.as_deref())
            .or_else(|| present(self.role.as_deref()))
            .and_then(Role::normalize)
    }
}

/// A role field counts as absent when missing or blank.
fn present(value: Option<&str>) -> Option<&str> {
    value.filter(|s| !s.trim().is_empty())
}

/// Canonical authenticated principal for one request.
///
/// Every actor belongs to exactly one company. Super-admins belong to their home
/// company like anyone else.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: UserId,
    pub company_id: CompanyId,
    pub team_id: Option<TeamId>,
    /// `None` when the source role was missing or unrecognised.
    pub role: Option<Role>,
    pub manager_id: Option<UserId>,
}

impl Actor {
    pub fn new(id: UserId, company_id: CompanyId, role: Option<Role>) -> Self {
        Self {
            id,
            company_id,
            team_id: None,
            role,
            manager_id: None,
        }
    }

    /// Build an actor from a user record's raw role fields.
    pub fn from_role_fields(id: UserId, company_id: CompanyId, fields: &RoleFields) -> Self {
        Self::new(id, company_id, fields.effective())
    }

    pub fn with_team(mut self, team_id: TeamId) -> Self {
        self.team_id = Some(team_id);
        self
    }

    pub fn with_manager(mut self, manager_id: UserId) -> Self {
        self.manager_id = Some(manager_id);
        self
    }

    pub fn is(&self, role: Role) -> bool {
        self.role == Some(role)
    }

    pub fn is_super_admin(&self) -> bool {
        self.is(Role::SuperAdmin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(role: Option<&str>, normalized: Option<&str>) -> RoleFields {
        RoleFields {
            role: role.map(str::to_string),
            normalized_role: normalized.map(str::to_string),
        }
    }

    #[test]
    fn normalized_field_wins() {
        let f = fields(Some("Company Admin"), Some("sales_rep"));
        assert_eq!(f.effective(), Some(Role::SalesRep));
    }

    #[test]
    fn display_field_used_when_normalized_missing_or_blank() {
        assert_eq!(fields(Some("Sales Manager"), None).effective(), Some(Role::SalesManager));
        assert_eq!(fields(Some("admin"), Some("  ")).effective(), Some(Role::CompanyAdmin));
    }

    #[test]
    fn unknown_normalized_value_does_not_fall_back() {
        // A present-but-unknown normalized role still wins and yields nothing.
        assert_eq!(fields(Some("company_admin"), Some("owner")).effective(), None);
    }

    #[test]
    fn no_fields_means_no_role() {
        let actor = Actor::from_role_fields(UserId::new(), CompanyId::new(), &RoleFields::default());
        assert_eq!(actor.role, None);
        assert!(!actor.is_super_admin());
    }
}
