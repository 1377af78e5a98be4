//! Scope filters rendered as SQL.

use sqlx::{Postgres, QueryBuilder};
use uuid::Uuid;

use dealflow_auth::{EntityDescriptor, ScopableQuery};
use dealflow_core::{CompanyId, UserId};

/// `SELECT * FROM <table>` narrowed by a scope filter.
///
/// Column and table names come from entity descriptors (static strings); every
/// value is a bind parameter.
pub struct PgScopedSelect<'args> {
    builder: QueryBuilder<'args, Postgres>,
    has_where: bool,
}

impl<'args> PgScopedSelect<'args> {
    pub fn new(entity: &EntityDescriptor) -> Self {
        Self {
            builder: QueryBuilder::new(format!("SELECT * FROM {}", entity.table)),
            has_where: false,
        }
    }

    pub fn sql(&self) -> &str {
        self.builder.sql()
    }

    /// Hand the builder back for caller clauses (`ORDER BY`, `LIMIT`) and execution.
    ///
    /// Further predicates must start with `AND` when [`Self::has_where`] is true.
    pub fn into_builder(self) -> QueryBuilder<'args, Postgres> {
        self.builder
    }

    pub fn has_where(&self) -> bool {
        self.has_where
    }

    fn clause(&mut self) {
        self.builder.push(if self.has_where { " AND " } else { " WHERE " });
        self.has_where = true;
    }
}

impl ScopableQuery for PgScopedSelect<'_> {
    fn filter_company(mut self, column: &'static str, company_id: CompanyId) -> Self {
        self.clause();
        self.builder.push(column).push(" = ").push_bind(*company_id.as_uuid());
        self
    }

    fn filter_company_or_owned(
        mut self,
        company_column: &'static str,
        company_id: CompanyId,
        owner_column: &'static str,
        owner: UserId,
    ) -> Self {
        self.clause();
        self.builder
            .push("(")
            .push(company_column)
            .push(" = ")
            .push_bind(*company_id.as_uuid())
            .push(" OR (")
            .push(company_column)
            .push(" IS NULL AND ")
            .push(owner_column)
            .push(" = ")
            .push_bind(*owner.as_uuid())
            .push("))");
        self
    }

    fn filter_owners(mut self, column: &'static str, owners: &[UserId]) -> Self {
        let owners: Vec<Uuid> = owners.iter().map(|o| *o.as_uuid()).collect();
        self.clause();
        self.builder.push(column).push(" = ANY(").push_bind(owners).push(")");
        self
    }

    fn match_nothing(mut self) -> Self {
        self.clause();
        self.builder.push("FALSE");
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dealflow_auth::{Actor, EntityKind, Role, TeamLookupError, TeamRoster, TenantContext};
    use dealflow_core::TeamId;

    struct NoTeams;

    impl TeamRoster for NoTeams {
        fn team_members(&self, _: CompanyId, _: TeamId) -> Result<Vec<UserId>, TeamLookupError> {
            Ok(Vec::new())
        }
    }

    fn scoped(role: Role, entity: EntityKind) -> String {
        let ctx = TenantContext::new(Actor::new(UserId::new(), CompanyId::new(), Some(role)));
        let query = PgScopedSelect::new(&entity.descriptor());
        ctx.resolver(&NoTeams).scope_query(entity, query).unwrap().sql().to_string()
    }

    #[test]
    fn super_admin_is_unfiltered() {
        assert_eq!(scoped(Role::SuperAdmin, EntityKind::Deal), "SELECT * FROM deals");
    }

    #[test]
    fn company_tier_binds_the_tenant() {
        assert_eq!(
            scoped(Role::CompanyAdmin, EntityKind::Contact),
            "SELECT * FROM contacts WHERE (company_id = $1 OR (company_id IS NULL AND owner_id = $2))"
        );
        assert_eq!(scoped(Role::CompanyAdmin, EntityKind::Company), "SELECT * FROM companies WHERE id = $1");
    }

    #[test]
    fn own_tier_uses_the_owner_column() {
        assert_eq!(
            scoped(Role::SalesRep, EntityKind::File),
            "SELECT * FROM files WHERE (company_id = $1 OR (company_id IS NULL AND uploaded_by = $2)) AND uploaded_by = ANY($3)"
        );
        assert_eq!(
            scoped(Role::SalesManager, EntityKind::Pipeline),
            "SELECT * FROM pipelines WHERE (company_id = $1 OR (company_id IS NULL AND created_by = $2)) AND created_by = ANY($3)"
        );
    }

    #[test]
    fn nothing_renders_false() {
        let q = PgScopedSelect::new(&EntityKind::Quote.descriptor()).match_nothing();
        assert_eq!(q.sql(), "SELECT * FROM quotes WHERE FALSE");
        assert!(q.has_where());
    }
}
