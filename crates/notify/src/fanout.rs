//! Notification fan-out: who hears about a mutation.
//!
//! The resolver assembles a raw candidate list per rule, then de-duplicates by
//! user id keeping first-seen order. It only reads the roster.

use std::collections::HashSet;

use serde::Serialize;
use tracing::debug;

use dealflow_auth::{Actor, Role};
use dealflow_core::{CompanyId, UserId};

use crate::event::{EntityEvent, FanoutRule};
use crate::roster::{RosterEntry, RosterError, UserRoster};

/// One notification recipient.
///
/// `company_id` is the recipient's own company; the notification row is scoped
/// to it.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Recipient {
    pub user_id: UserId,
    pub company_id: CompanyId,
}

impl From<&RosterEntry> for Recipient {
    fn from(entry: &RosterEntry) -> Self {
        Self {
            user_id: entry.user_id,
            company_id: entry.company_id,
        }
    }
}

const COMPANY_ADMINS: &[Role] = &[Role::CompanyAdmin];
const ADMINS: &[Role] = &[Role::CompanyAdmin, Role::SuperAdmin];
const ADMINS_AND_MANAGERS: &[Role] = &[Role::CompanyAdmin, Role::SalesManager, Role::SuperAdmin];

pub struct FanoutResolver<'a, R: UserRoster + ?Sized> {
    roster: &'a R,
}

impl<'a, R: UserRoster + ?Sized> FanoutResolver<'a, R> {
    pub fn new(roster: &'a R) -> Self {
        Self { roster }
    }

    pub fn resolve(
        &self,
        actor: &Actor,
        company_id: CompanyId,
        event: &EntityEvent,
    ) -> Result<Vec<Recipient>, RosterError> {
        let rule = event.fanout_rule();
        let raw = match rule {
            FanoutRule::Broad => self.broad(actor, company_id)?,
            FanoutRule::Narrow => self.company_roles_except_actor(actor, company_id, ADMINS)?,
            FanoutRule::ManagerInclusiveDeletion => {
                self.company_roles_except_actor(actor, company_id, ADMINS_AND_MANAGERS)?
            }
        };

        let recipients = dedup_recipients(raw);
        debug!(
            actor_id = %actor.id,
            company_id = %company_id,
            entity = %event.entity,
            action = %event.action,
            ?rule,
            recipients = recipients.len(),
            "fan-out resolved"
        );
        Ok(recipients)
    }

    /// Broad rule: breadth depends on who acted.
    ///
    /// - super-admin: everyone active in the actor's own company
    /// - company admin: everyone active in the company, then all super-admins
    /// - anyone else: the company's admins, all super-admins, then the actor
    ///
    /// The actor is always part of the result.
    fn broad(&self, actor: &Actor, company_id: CompanyId) -> Result<Vec<Recipient>, RosterError> {
        let mut raw: Vec<Recipient> = match actor.role {
            Some(Role::SuperAdmin) => self.users(actor.company_id, None)?,
            Some(Role::CompanyAdmin) => {
                let mut all = self.users(company_id, None)?;
                all.extend(self.super_admins()?);
                all
            }
            _ => {
                let mut admins = self.users(company_id, Some(COMPANY_ADMINS))?;
                admins.extend(self.super_admins()?);
                admins
            }
        };

        raw.push(Recipient {
            user_id: actor.id,
            company_id: actor.company_id,
        });
        Ok(raw)
    }

    fn company_roles_except_actor(
        &self,
        actor: &Actor,
        company_id: CompanyId,
        roles: &[Role],
    ) -> Result<Vec<Recipient>, RosterError> {
        let mut raw = self.users(company_id, Some(roles))?;
        raw.retain(|r| r.user_id != actor.id);
        Ok(raw)
    }

    fn users(&self, company_id: CompanyId, roles: Option<&[Role]>) -> Result<Vec<Recipient>, RosterError> {
        Ok(self
            .roster
            .active_users(company_id, roles)?
            .iter()
            .map(Recipient::from)
            .collect())
    }

    fn super_admins(&self) -> Result<Vec<Recipient>, RosterError> {
        Ok(self.roster.active_super_admins()?.iter().map(Recipient::from).collect())
    }
}

/// Remove repeated user ids, keeping the first occurrence.
pub fn dedup_recipients(raw: Vec<Recipient>) -> Vec<Recipient> {
    let mut seen = HashSet::with_capacity(raw.len());
    raw.into_iter().filter(|r| seen.insert(r.user_id)).collect()
}
