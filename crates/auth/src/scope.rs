//! Access scope resolution.
//!
//! Four tiers, evaluated in order, first match wins:
//!
//! 1. super-admin: unrestricted (optionally narrowed to an explicit company)
//! 2. `view_company_data` or the entity's company-admin permission: actor's company
//! 3. `view_team_data`: records owned by the actor's team members, or the actor's
//!    own records when they have no team
//! 4. `view_own_data`: the actor's own records
//!
//! An actor matching none of the tiers gets an empty scope, not an error. Every
//! tier below super-admin keeps the actor's company pinned.
//!
//! Rows without a company id belong to no tenant. Below super-admin they are in
//! scope only when the actor owns them, in the list form and the record form alike.

use thiserror::Error;
use tracing::debug;

use dealflow_core::{CompanyId, TeamId, UserId};

use crate::{EntityDescriptor, EntityKind, Permission, ScopedRecord, TenantContext};

/// A query that can be narrowed by scope filters.
///
/// Implemented by the record stores (in-memory query, SQL builder).
pub trait ScopableQuery: Sized {
    fn filter_company(self, column: &'static str, company_id: CompanyId) -> Self;
    /// Rows of `company_id`, plus rows with no company whose `owner_column` is `owner`.
    fn filter_company_or_owned(
        self,
        company_column: &'static str,
        company_id: CompanyId,
        owner_column: &'static str,
        owner: UserId,
    ) -> Self;
    fn filter_owners(self, column: &'static str, owners: &[UserId]) -> Self;
    fn match_nothing(self) -> Self;
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("team roster lookup failed: {0}")]
pub struct TeamLookupError(pub String);

/// Lookup of team membership, used by the team tier.
pub trait TeamRoster {
    fn team_members(&self, company_id: CompanyId, team_id: TeamId) -> Result<Vec<UserId>, TeamLookupError>;
}

impl<T: TeamRoster + ?Sized> TeamRoster for std::sync::Arc<T> {
    fn team_members(&self, company_id: CompanyId, team_id: TeamId) -> Result<Vec<UserId>, TeamLookupError> {
        (**self).team_members(company_id, team_id)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ScopeError {
    #[error(transparent)]
    TeamLookup(#[from] TeamLookupError),
}

/// Which tier applies to an actor for an entity.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ScopeTier {
    Unrestricted,
    Company,
    Team,
    Own,
    None,
}

/// Resolved row filter.
///
/// `actor_id` is the owner whose company-less rows stay visible.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScopeFilter {
    Unrestricted,
    Company {
        company_id: CompanyId,
        actor_id: UserId,
    },
    Owners {
        company_id: CompanyId,
        owners: Vec<UserId>,
        actor_id: UserId,
    },
    Nothing,
}

impl ScopeFilter {
    /// Narrow `query` according to this filter and the entity layout.
    pub fn apply<Q: ScopableQuery>(&self, query: Q, entity: &EntityDescriptor) -> Q {
        match self {
            ScopeFilter::Unrestricted => query,
            ScopeFilter::Company { company_id, actor_id } => pin_company(query, entity, *company_id, *actor_id),
            ScopeFilter::Owners {
                company_id,
                owners,
                actor_id,
            } => {
                let query = pin_company(query, entity, *company_id, *actor_id);
                match entity.owner_column {
                    Some(column) => query.filter_owners(column, owners),
                    None => query.match_nothing(),
                }
            }
            ScopeFilter::Nothing => query.match_nothing(),
        }
    }

    /// Boolean form of [`Self::apply`] for one fetched record.
    pub fn permits<R: ScopedRecord + ?Sized>(&self, record: &R, entity: &EntityDescriptor) -> bool {
        match self {
            ScopeFilter::Unrestricted => true,
            ScopeFilter::Company { company_id, actor_id } => in_company(record, entity, *company_id, *actor_id),
            ScopeFilter::Owners {
                company_id,
                owners,
                actor_id,
            } => {
                in_company(record, entity, *company_id, *actor_id)
                    && entity.owner_column.is_some()
                    && record.owner_id().is_some_and(|o| owners.contains(&o))
            }
            ScopeFilter::Nothing => false,
        }
    }
}

pub(crate) fn pin_company<Q: ScopableQuery>(
    query: Q,
    entity: &EntityDescriptor,
    company_id: CompanyId,
    actor_id: UserId,
) -> Q {
    match (entity.company_column, entity.owner_column) {
        (Some(company), Some(owner)) => query.filter_company_or_owned(company, company_id, owner, actor_id),
        (Some(company), None) => query.filter_company(company, company_id),
        (None, _) => query,
    }
}

fn in_company<R: ScopedRecord + ?Sized>(
    record: &R,
    entity: &EntityDescriptor,
    company_id: CompanyId,
    actor_id: UserId,
) -> bool {
    if entity.company_column.is_none() {
        return true;
    }
    match record.company_id() {
        Some(c) => c == company_id,
        None => entity.owner_column.is_some() && record.owner_id() == Some(actor_id),
    }
}

/// Entity-aware scope resolver for one request.
pub struct AccessScopeResolver<'a, T: TeamRoster + ?Sized> {
    ctx: &'a TenantContext,
    teams: &'a T,
}

impl<'a, T: TeamRoster + ?Sized> AccessScopeResolver<'a, T> {
    pub fn new(ctx: &'a TenantContext, teams: &'a T) -> Self {
        Self { ctx, teams }
    }

    /// Tier selection. Pure: reads only the actor's role.
    pub fn tier(&self, entity: EntityKind) -> ScopeTier {
        if self.ctx.is_super_admin() {
            return ScopeTier::Unrestricted;
        }

        let descriptor = entity.descriptor();
        let entity_admin = descriptor
            .company_admin_permission
            .is_some_and(|p| self.ctx.has_permission(p));

        if entity_admin || self.ctx.has_permission(Permission::ViewCompanyData) {
            ScopeTier::Company
        } else if self.ctx.has_permission(Permission::ViewTeamData) {
            ScopeTier::Team
        } else if self.ctx.has_permission(Permission::ViewOwnData) {
            ScopeTier::Own
        } else {
            ScopeTier::None
        }
    }

    pub fn resolve(&self, entity: EntityKind) -> Result<ScopeFilter, ScopeError> {
        self.resolve_for_company(entity, None)
    }

    /// Resolve with an optional explicit company argument.
    ///
    /// Super-admins are narrowed to that company. Anyone else asking for a company
    /// other than their own gets an empty scope.
    pub fn resolve_for_company(
        &self,
        entity: EntityKind,
        company: Option<CompanyId>,
    ) -> Result<ScopeFilter, ScopeError> {
        let actor = self.ctx.actor();
        let tier = self.tier(entity);

        if tier != ScopeTier::Unrestricted && company.is_some_and(|c| c != actor.company_id) {
            debug!(actor_id = %actor.id, entity = %entity, "explicit company outside tenant; empty scope");
            return Ok(ScopeFilter::Nothing);
        }

        let company_id = actor.company_id;
        let actor_id = actor.id;
        let has_owner = entity.descriptor().owner_column.is_some();

        let filter = match tier {
            ScopeTier::Unrestricted => match company {
                Some(company_id) => ScopeFilter::Company { company_id, actor_id },
                None => ScopeFilter::Unrestricted,
            },
            ScopeTier::Company => ScopeFilter::Company { company_id, actor_id },
            ScopeTier::Team | ScopeTier::Own if !has_owner => ScopeFilter::Company { company_id, actor_id },
            ScopeTier::Team => ScopeFilter::Owners {
                company_id,
                owners: self.team_owners()?,
                actor_id,
            },
            ScopeTier::Own => ScopeFilter::Owners {
                company_id,
                owners: vec![actor_id],
                actor_id,
            },
            ScopeTier::None => ScopeFilter::Nothing,
        };

        debug!(actor_id = %actor.id, entity = %entity, ?tier, "scope resolved");
        Ok(filter)
    }

    /// Narrow a list/search query to the actor's scope.
    pub fn scope_query<Q: ScopableQuery>(&self, entity: EntityKind, query: Q) -> Result<Q, ScopeError> {
        let filter = self.resolve(entity)?;
        Ok(filter.apply(query, &entity.descriptor()))
    }

    /// Single-record form of the same tiers.
    ///
    /// `false` is for the caller to turn into a forbidden response.
    pub fn can_access_record<R: ScopedRecord + ?Sized>(
        &self,
        entity: EntityKind,
        record: &R,
    ) -> Result<bool, ScopeError> {
        Ok(self.resolve(entity)?.permits(record, &entity.descriptor()))
    }

    /// Owners visible under the team tier. Always contains the actor; a missing
    /// team degrades to the actor alone.
    fn team_owners(&self) -> Result<Vec<UserId>, ScopeError> {
        let actor = self.ctx.actor();
        let Some(team_id) = actor.team_id else {
            return Ok(vec![actor.id]);
        };

        let mut owners = vec![actor.id];
        for member in self.teams.team_members(actor.company_id, team_id)? {
            if !owners.contains(&member) {
                owners.push(member);
            }
        }
        Ok(owners)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Actor, Role};
    use std::collections::HashMap;

    #[derive(Default)]
    struct Teams(HashMap<TeamId, Vec<UserId>>);

    impl TeamRoster for Teams {
        fn team_members(&self, _company_id: CompanyId, team_id: TeamId) -> Result<Vec<UserId>, TeamLookupError> {
            Ok(self.0.get(&team_id).cloned().unwrap_or_default())
        }
    }

    struct BrokenTeams;

    impl TeamRoster for BrokenTeams {
        fn team_members(&self, _company_id: CompanyId, _team_id: TeamId) -> Result<Vec<UserId>, TeamLookupError> {
            Err(TeamLookupError("connection reset".to_string()))
        }
    }

    struct Row {
        company: Option<CompanyId>,
        owner: Option<UserId>,
    }

    impl ScopedRecord for Row {
        fn company_id(&self) -> Option<CompanyId> {
            self.company
        }

        fn owner_id(&self) -> Option<UserId> {
            self.owner
        }
    }

    fn ctx(role: Option<Role>, company: CompanyId) -> TenantContext {
        TenantContext::new(Actor::new(UserId::new(), company, role))
    }

    #[test]
    fn tiers_follow_role_table() {
        let company = CompanyId::new();
        let teams = Teams::default();
        let cases = [
            (Some(Role::SuperAdmin), ScopeTier::Unrestricted),
            (Some(Role::CompanyAdmin), ScopeTier::Company),
            (Some(Role::SalesManager), ScopeTier::Team),
            (Some(Role::SalesRep), ScopeTier::Own),
            (Some(Role::CompanyUser), ScopeTier::Own),
            (None, ScopeTier::None),
        ];

        for (role, expected) in cases {
            let context = ctx(role, company);
            assert_eq!(context.resolver(&teams).tier(EntityKind::Contact), expected, "{role:?}");
        }
    }

    #[test]
    fn manager_stays_on_team_tier_for_pipelines() {
        let teams = Teams::default();
        let manager = ctx(Some(Role::SalesManager), CompanyId::new());
        assert_eq!(manager.resolver(&teams).tier(EntityKind::Pipeline), ScopeTier::Team);
    }

    #[test]
    fn manager_without_team_sees_only_own_records() {
        let company = CompanyId::new();
        let manager = ctx(Some(Role::SalesManager), company);
        let filter = manager.resolver(&Teams::default()).resolve(EntityKind::Contact).unwrap();

        assert_eq!(
            filter,
            ScopeFilter::Owners {
                company_id: company,
                owners: vec![manager.actor().id],
                actor_id: manager.actor().id,
            }
        );
    }

    #[test]
    fn manager_with_team_sees_members_records() {
        let company = CompanyId::new();
        let team = TeamId::new();
        let rep = UserId::new();
        let manager = TenantContext::new(
            Actor::new(UserId::new(), company, Some(Role::SalesManager)).with_team(team),
        );
        let teams = Teams(HashMap::from([(team, vec![rep, manager.actor().id])]));

        let resolver = manager.resolver(&teams);
        let filter = resolver.resolve(EntityKind::Deal).unwrap();
        assert_eq!(
            filter,
            ScopeFilter::Owners {
                company_id: company,
                owners: vec![manager.actor().id, rep],
                actor_id: manager.actor().id,
            }
        );

        let reps_deal = Row { company: Some(company), owner: Some(rep) };
        let outsider = Row { company: Some(company), owner: Some(UserId::new()) };
        assert!(resolver.can_access_record(EntityKind::Deal, &reps_deal).unwrap());
        assert!(!resolver.can_access_record(EntityKind::Deal, &outsider).unwrap());
    }

    #[test]
    fn team_lookup_failure_is_surfaced() {
        let manager = TenantContext::new(
            Actor::new(UserId::new(), CompanyId::new(), Some(Role::SalesManager)).with_team(TeamId::new()),
        );
        let err = manager.resolver(&BrokenTeams).resolve(EntityKind::Quote).unwrap_err();
        assert!(matches!(err, ScopeError::TeamLookup(_)));
    }

    #[test]
    fn roleless_actor_gets_empty_scope() {
        let nobody = ctx(None, CompanyId::new());
        let teams = Teams::default();
        let resolver = nobody.resolver(&teams);
        assert_eq!(resolver.resolve(EntityKind::Contact).unwrap(), ScopeFilter::Nothing);

        let own = Row { company: Some(nobody.company_id()), owner: Some(nobody.actor().id) };
        assert!(!resolver.can_access_record(EntityKind::Contact, &own).unwrap());
    }

    #[test]
    fn super_admin_can_be_narrowed_to_a_company() {
        let target = CompanyId::new();
        let sa = ctx(Some(Role::SuperAdmin), CompanyId::new());
        let teams = Teams::default();
        let resolver = sa.resolver(&teams);
        assert_eq!(resolver.resolve(EntityKind::Deal).unwrap(), ScopeFilter::Unrestricted);
        assert_eq!(
            resolver.resolve_for_company(EntityKind::Deal, Some(target)).unwrap(),
            ScopeFilter::Company {
                company_id: target,
                actor_id: sa.actor().id,
            }
        );
    }

    #[test]
    fn foreign_company_argument_yields_nothing_for_admin() {
        let admin = ctx(Some(Role::CompanyAdmin), CompanyId::new());
        let filter = admin
            .resolver(&Teams::default())
            .resolve_for_company(EntityKind::Deal, Some(CompanyId::new()))
            .unwrap();
        assert_eq!(filter, ScopeFilter::Nothing);
    }

    #[test]
    fn rep_sees_own_company_row_for_companies() {
        let company = CompanyId::new();
        let rep = ctx(Some(Role::SalesRep), company);
        let filter = rep.resolver(&Teams::default()).resolve(EntityKind::Company).unwrap();
        assert_eq!(
            filter,
            ScopeFilter::Company {
                company_id: company,
                actor_id: rep.actor().id,
            }
        );
    }

    #[test]
    fn owner_filter_honours_company_pin() {
        let company = CompanyId::new();
        let me = UserId::new();
        let mate = UserId::new();
        let filter = ScopeFilter::Owners {
            company_id: company,
            owners: vec![me, mate],
            actor_id: me,
        };
        let deals = EntityKind::Deal.descriptor();

        assert!(filter.permits(&Row { company: Some(company), owner: Some(mate) }, &deals));
        assert!(filter.permits(&Row { company: None, owner: Some(me) }, &deals));
        assert!(!filter.permits(&Row { company: None, owner: Some(mate) }, &deals));
        assert!(!filter.permits(&Row { company: Some(CompanyId::new()), owner: Some(me) }, &deals));
        assert!(!filter.permits(&Row { company: Some(company), owner: None }, &deals));
    }

    #[test]
    fn company_less_rows_follow_ownership_on_every_tier() {
        let company = CompanyId::new();
        let teams = Teams::default();

        for role in [Role::CompanyAdmin, Role::SalesManager, Role::SalesRep] {
            let context = ctx(Some(role), company);
            let resolver = context.resolver(&teams);
            let mine = Row { company: None, owner: Some(context.actor().id) };
            let stray = Row { company: None, owner: Some(UserId::new()) };

            assert!(resolver.can_access_record(EntityKind::Contact, &mine).unwrap(), "{role:?}");
            assert!(!resolver.can_access_record(EntityKind::Contact, &stray).unwrap(), "{role:?}");
            assert_eq!(
                resolver.can_access_record(EntityKind::Contact, &mine).unwrap(),
                context.validate_record_access(&mine),
                "{role:?}"
            );
        }
    }

    #[test]
    fn company_less_company_rows_are_out_of_scope() {
        let admin = ctx(Some(Role::CompanyAdmin), CompanyId::new());
        let row = Row { company: None, owner: Some(admin.actor().id) };
        assert!(!admin.resolver(&Teams::default()).can_access_record(EntityKind::Company, &row).unwrap());
    }
}
