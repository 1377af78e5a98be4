//! In-memory user directory for tests and dev.
//!
//! Serves both rosters the core consumes: [`UserRoster`] for notification fan-out
//! and [`TeamRoster`] for team-tier scoping.

use std::collections::BTreeMap;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use dealflow_auth::{Actor, Role, RoleFields, TeamLookupError, TeamRoster};
use dealflow_core::{CompanyId, TeamId, UserId};
use dealflow_notify::{RosterEntry, RosterError, UserRoster};

#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("user directory lock poisoned")]
    Poisoned,
    #[error("invalid directory seed: {0}")]
    Seed(#[from] serde_json::Error),
}

/// One user row as the directory stores it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryUser {
    pub id: UserId,
    pub company_id: CompanyId,
    #[serde(flatten)]
    pub roles: RoleFields,
    pub team_id: Option<TeamId>,
    pub manager_id: Option<UserId>,
    #[serde(default = "active_by_default")]
    pub active: bool,
}

fn active_by_default() -> bool {
    true
}

impl DirectoryUser {
    pub fn new(company_id: CompanyId, role: Role) -> Self {
        Self {
            id: UserId::new(),
            company_id,
            roles: RoleFields {
                role: Some(role.as_str().to_string()),
                normalized_role: Some(role.as_str().to_string()),
            },
            team_id: None,
            manager_id: None,
            active: true,
        }
    }

    pub fn with_team(mut self, team_id: TeamId) -> Self {
        self.team_id = Some(team_id);
        self
    }

    pub fn with_manager(mut self, manager_id: UserId) -> Self {
        self.manager_id = Some(manager_id);
        self
    }

    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }

    pub fn role(&self) -> Option<Role> {
        self.roles.effective()
    }

    /// The request identity this user acts as.
    pub fn actor(&self) -> Actor {
        let mut actor = Actor::from_role_fields(self.id, self.company_id, &self.roles);
        actor.team_id = self.team_id;
        actor.manager_id = self.manager_id;
        actor
    }

    fn roster_entry(&self) -> RosterEntry {
        RosterEntry {
            user_id: self.id,
            company_id: self.company_id,
            role: self.role(),
            team_id: self.team_id,
        }
    }
}

#[derive(Debug, Default)]
pub struct UserDirectory {
    users: RwLock<BTreeMap<UserId, DirectoryUser>>,
}

impl UserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Directory seeded from a JSON array of users.
    pub fn from_json(json: &str) -> Result<Self, DirectoryError> {
        let directory = Self::new();
        directory.load_json(json)?;
        Ok(directory)
    }

    /// Upsert every user in a JSON array. Returns how many were loaded.
    pub fn load_json(&self, json: &str) -> Result<usize, DirectoryError> {
        let users: Vec<DirectoryUser> = serde_json::from_str(json)?;
        let count = users.len();
        let mut rows = self.users.write().map_err(|_| DirectoryError::Poisoned)?;
        for user in users {
            rows.insert(user.id, user);
        }
        info!(users = count, "user directory seeded");
        Ok(count)
    }

    /// Insert or replace a user.
    pub fn upsert(&self, user: DirectoryUser) -> Result<(), DirectoryError> {
        let mut users = self.users.write().map_err(|_| DirectoryError::Poisoned)?;
        users.insert(user.id, user);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.users.read().map(|u| u.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, id: UserId) -> Option<DirectoryUser> {
        self.users.read().ok()?.get(&id).cloned()
    }

    pub fn deactivate(&self, id: UserId) -> bool {
        match self.users.write() {
            Ok(mut users) => match users.get_mut(&id) {
                Some(user) => {
                    user.active = false;
                    true
                }
                None => false,
            },
            Err(_) => false,
        }
    }

    fn active_matching<F>(&self, keep: F) -> Result<Vec<RosterEntry>, RosterError>
    where
        F: Fn(&DirectoryUser) -> bool,
    {
        let users = self
            .users
            .read()
            .map_err(|_| RosterError::Unavailable("user directory lock poisoned".to_string()))?;
        Ok(users
            .values()
            .filter(|u| u.active && keep(u))
            .map(DirectoryUser::roster_entry)
            .collect())
    }
}

impl UserRoster for UserDirectory {
    fn active_users(&self, company_id: CompanyId, roles: Option<&[Role]>) -> Result<Vec<RosterEntry>, RosterError> {
        self.active_matching(|u| {
            u.company_id == company_id && roles.is_none_or(|rs| u.role().is_some_and(|r| rs.contains(&r)))
        })
    }

    fn active_super_admins(&self) -> Result<Vec<RosterEntry>, RosterError> {
        self.active_matching(|u| u.role() == Some(Role::SuperAdmin))
    }
}

impl TeamRoster for UserDirectory {
    fn team_members(&self, company_id: CompanyId, team_id: TeamId) -> Result<Vec<UserId>, TeamLookupError> {
        let users = self
            .users
            .read()
            .map_err(|_| TeamLookupError("user directory lock poisoned".to_string()))?;
        Ok(users
            .values()
            .filter(|u| u.company_id == company_id && u.team_id == Some(team_id))
            .map(|u| u.id)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_filter_and_active_flag() {
        let company = CompanyId::new();
        let dir = UserDirectory::new();
        let admin = DirectoryUser::new(company, Role::CompanyAdmin);
        let rep = DirectoryUser::new(company, Role::SalesRep);
        let gone = DirectoryUser::new(company, Role::CompanyAdmin).inactive();
        let elsewhere = DirectoryUser::new(CompanyId::new(), Role::CompanyAdmin);
        for u in [&admin, &rep, &gone, &elsewhere] {
            dir.upsert(u.clone()).unwrap();
        }

        let admins = dir.active_users(company, Some(&[Role::CompanyAdmin])).unwrap();
        assert_eq!(admins.iter().map(|e| e.user_id).collect::<Vec<_>>(), vec![admin.id]);
        assert_eq!(dir.active_users(company, None).unwrap().len(), 2);

        assert!(dir.deactivate(rep.id));
        assert_eq!(dir.active_users(company, None).unwrap().len(), 1);
        assert!(!dir.deactivate(UserId::new()));
    }

    #[test]
    fn super_admins_span_companies() {
        let dir = UserDirectory::new();
        let a = DirectoryUser::new(CompanyId::new(), Role::SuperAdmin);
        let b = DirectoryUser::new(CompanyId::new(), Role::SuperAdmin);
        dir.upsert(a.clone()).unwrap();
        dir.upsert(b.clone()).unwrap();
        dir.upsert(DirectoryUser::new(CompanyId::new(), Role::SuperAdmin).inactive()).unwrap();

        let mut ids: Vec<_> = dir.active_super_admins().unwrap().into_iter().map(|e| e.user_id).collect();
        ids.sort();
        let mut expected = vec![a.id, b.id];
        expected.sort();
        assert_eq!(ids, expected);
    }

    #[test]
    fn team_members_stay_inside_the_company() {
        let company = CompanyId::new();
        let team = TeamId::new();
        let dir = UserDirectory::new();
        let m = DirectoryUser::new(company, Role::SalesManager).with_team(team);
        let r = DirectoryUser::new(company, Role::SalesRep).with_team(team);
        let foreign = DirectoryUser::new(CompanyId::new(), Role::SalesRep).with_team(team);
        for u in [&m, &r, &foreign] {
            dir.upsert(u.clone()).unwrap();
        }

        let members = dir.team_members(company, team).unwrap();
        assert_eq!(members.len(), 2);
        assert!(!members.contains(&foreign.id));
    }

    #[test]
    fn actor_carries_team_and_manager() {
        let company = CompanyId::new();
        let team = TeamId::new();
        let boss = UserId::new();
        let user = DirectoryUser::new(company, Role::SalesRep).with_team(team).with_manager(boss);

        let actor = user.actor();
        assert_eq!(actor.role, Some(Role::SalesRep));
        assert_eq!(actor.team_id, Some(team));
        assert_eq!(actor.manager_id, Some(boss));
    }

    #[test]
    fn seeds_from_json() {
        let company = CompanyId::new();
        let admin = UserId::new();
        let json = format!(
            r#"[
                {{"id": "{admin}", "company_id": "{company}", "role": "Company Admin"}},
                {{"id": "{}", "company_id": "{company}", "normalized_role": "sales_rep", "active": false}}
            ]"#,
            UserId::new()
        );

        let dir = UserDirectory::from_json(&json).unwrap();
        assert_eq!(dir.len(), 2);
        let seeded = dir.get(admin).unwrap();
        assert!(seeded.active);
        assert_eq!(seeded.role(), Some(Role::CompanyAdmin));
        assert_eq!(dir.active_users(company, None).unwrap().len(), 1);
    }

    #[test]
    fn malformed_seed_is_an_error() {
        assert!(matches!(UserDirectory::from_json("{\"id\": 1}"), Err(DirectoryError::Seed(_))));
        assert!(UserDirectory::new().is_empty());
    }

    #[test]
    fn poisoned_lock_surfaces_on_upsert() {
        let dir = UserDirectory::new();
        let _ = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = dir.users.write().unwrap();
            panic!("writer died");
        }));

        let err = dir.upsert(DirectoryUser::new(CompanyId::new(), Role::SalesRep)).unwrap_err();
        assert!(matches!(err, DirectoryError::Poisoned));
        assert!(dir.active_super_admins().is_err());
    }
}
