use dealflow_core::CompanyId;

use crate::authorize::has_permission;
use crate::scope::{pin_company, AccessScopeResolver, ScopableQuery, TeamRoster};
use crate::{Actor, EntityDescriptor, Permission, ScopedRecord};

/// Tenant context for one request.
///
/// Built once from the actor and dropped with the request; never shared across
/// requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantContext {
    actor: Actor,
}

impl TenantContext {
    pub fn new(actor: Actor) -> Self {
        Self { actor }
    }

    pub fn actor(&self) -> &Actor {
        &self.actor
    }

    pub fn company_id(&self) -> CompanyId {
        self.actor.company_id
    }

    pub fn is_super_admin(&self) -> bool {
        self.actor.is_super_admin()
    }

    pub fn has_permission(&self, permission: Permission) -> bool {
        has_permission(&self.actor, permission)
    }

    pub fn can_access_company(&self, company_id: CompanyId) -> bool {
        self.is_super_admin() || company_id == self.actor.company_id
    }

    /// Pin a query to the actor's company.
    ///
    /// Super-admins get the query back untouched. Entities without a company
    /// column are left alone; use the scope resolver for owner-level narrowing.
    /// Company-less rows stay visible to their owner, matching
    /// [`validate_record_access`](Self::validate_record_access).
    pub fn enforce_scope<Q: ScopableQuery>(&self, query: Q, entity: &EntityDescriptor) -> Q {
        if self.is_super_admin() {
            return query;
        }

        pin_company(query, entity, self.actor.company_id, self.actor.id)
    }

    /// Tenant-level check for a single record.
    ///
    /// Company match, or ownership when the record carries no company id.
    pub fn validate_record_access<R: ScopedRecord + ?Sized>(&self, record: &R) -> bool {
        if self.is_super_admin() {
            return true;
        }

        match record.company_id() {
            Some(company_id) => company_id == self.actor.company_id,
            None => record.owner_id() == Some(self.actor.id),
        }
    }

    pub fn resolver<'a, T>(&'a self, teams: &'a T) -> AccessScopeResolver<'a, T>
    where
        T: TeamRoster + ?Sized,
    {
        AccessScopeResolver::new(self, teams)
    }
}
