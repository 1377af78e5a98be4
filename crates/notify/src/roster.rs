use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use dealflow_auth::Role;
use dealflow_core::{CompanyId, TeamId, UserId};

/// Active user as seen by the fan-out resolver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterEntry {
    pub user_id: UserId,
    pub company_id: CompanyId,
    pub role: Option<Role>,
    pub team_id: Option<TeamId>,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RosterError {
    #[error("roster unavailable: {0}")]
    Unavailable(String),
}

/// Read-only view of active users.
pub trait UserRoster: Send + Sync {
    /// Active users of one company, optionally restricted to some roles.
    fn active_users(&self, company_id: CompanyId, roles: Option<&[Role]>) -> Result<Vec<RosterEntry>, RosterError>;

    /// Active super-admins across all companies.
    fn active_super_admins(&self) -> Result<Vec<RosterEntry>, RosterError>;
}

impl<R> UserRoster for Arc<R>
where
    R: UserRoster + ?Sized,
{
    fn active_users(&self, company_id: CompanyId, roles: Option<&[Role]>) -> Result<Vec<RosterEntry>, RosterError> {
        (**self).active_users(company_id, roles)
    }

    fn active_super_admins(&self) -> Result<Vec<RosterEntry>, RosterError> {
        (**self).active_super_admins()
    }
}
