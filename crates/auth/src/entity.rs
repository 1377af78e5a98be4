//! Entity types subject to tenant scoping.

use serde::{Deserialize, Serialize};

use dealflow_core::{CompanyId, UserId};

use crate::Permission;

/// Scoped entity type.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Contact,
    Deal,
    Activity,
    Quote,
    File,
    Pipeline,
    SupportTicket,
    Company,
    User,
}

/// Storage layout facts the scope resolver needs about an entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityDescriptor {
    pub kind: EntityKind,
    pub table: &'static str,
    /// Column holding the tenant id. For `companies` it is the primary key.
    pub company_column: Option<&'static str>,
    /// Column holding the owning user id, if rows have an owner.
    pub owner_column: Option<&'static str>,
    /// Permission that grants company-wide visibility for this entity on top of
    /// `view_company_data`.
    pub company_admin_permission: Option<Permission>,
}

impl EntityKind {
    pub const ALL: [EntityKind; 9] = [
        EntityKind::Contact,
        EntityKind::Deal,
        EntityKind::Activity,
        EntityKind::Quote,
        EntityKind::File,
        EntityKind::Pipeline,
        EntityKind::SupportTicket,
        EntityKind::Company,
        EntityKind::User,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Contact => "contact",
            EntityKind::Deal => "deal",
            EntityKind::Activity => "activity",
            EntityKind::Quote => "quote",
            EntityKind::File => "file",
            EntityKind::Pipeline => "pipeline",
            EntityKind::SupportTicket => "support_ticket",
            EntityKind::Company => "company",
            EntityKind::User => "user",
        }
    }

    /// Human label used in notification text.
    pub fn label(&self) -> &'static str {
        match self {
            EntityKind::SupportTicket => "support ticket",
            other => other.as_str(),
        }
    }

    pub fn descriptor(&self) -> EntityDescriptor {
        let (table, company_column, owner_column, company_admin_permission) = match self {
            EntityKind::Contact => ("contacts", Some("company_id"), Some("owner_id"), None),
            EntityKind::Deal => ("deals", Some("company_id"), Some("owner_id"), None),
            EntityKind::Activity => ("activities", Some("company_id"), Some("owner_id"), None),
            EntityKind::Quote => ("quotes", Some("company_id"), Some("owner_id"), None),
            EntityKind::File => ("files", Some("company_id"), Some("uploaded_by"), None),
            EntityKind::Pipeline => (
                "pipelines",
                Some("company_id"),
                Some("created_by"),
                Some(Permission::ManagePipelines),
            ),
            EntityKind::SupportTicket => (
                "support_tickets",
                Some("company_id"),
                Some("created_by"),
                Some(Permission::ManageSupportTickets),
            ),
            EntityKind::Company => ("companies", Some("id"), None, Some(Permission::ManageCompanies)),
            EntityKind::User => (
                "users",
                Some("company_id"),
                Some("id"),
                Some(Permission::ManageCompanyUsers),
            ),
        };

        EntityDescriptor {
            kind: *self,
            table,
            company_column,
            owner_column,
            company_admin_permission,
        }
    }
}

impl core::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fetched record, as far as scoping is concerned.
pub trait ScopedRecord {
    fn company_id(&self) -> Option<CompanyId>;
    fn owner_id(&self) -> Option<UserId>;
}

impl<R: ScopedRecord + ?Sized> ScopedRecord for &R {
    fn company_id(&self) -> Option<CompanyId> {
        (**self).company_id()
    }

    fn owner_id(&self) -> Option<UserId> {
        (**self).owner_id()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_entity_except_company_has_an_owner_column() {
        for kind in EntityKind::ALL {
            let d = kind.descriptor();
            assert_eq!(d.kind, kind);
            assert!(d.company_column.is_some());
            assert_eq!(d.owner_column.is_none(), kind == EntityKind::Company);
        }
    }

    #[test]
    fn labels_are_human_readable() {
        assert_eq!(EntityKind::SupportTicket.label(), "support ticket");
        assert_eq!(EntityKind::Deal.label(), "deal");
    }
}
