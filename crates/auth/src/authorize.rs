use thiserror::Error;

use crate::capability::{permissions_for, PermissionSet};
use crate::{Actor, EntityKind, Permission};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("forbidden: missing permission '{0}'")]
    Forbidden(Permission),

    #[error("{entity} record is outside the actor's scope")]
    RecordOutOfScope { entity: EntityKind },
}

/// Permissions the actor holds. An actor without a role holds nothing.
pub fn permissions_of(actor: &Actor) -> &'static PermissionSet {
    static NONE: PermissionSet = PermissionSet::new();

    match actor.role {
        Some(role) => permissions_for(role),
        None => &NONE,
    }
}

/// Pure permission check.
///
/// - No IO
/// - No panics
/// - Unknown role means `false`
pub fn has_permission(actor: &Actor, permission: Permission) -> bool {
    permissions_of(actor).contains(&permission)
}

/// Handler-facing form of [`has_permission`].
pub fn authorize(actor: &Actor, permission: Permission) -> Result<(), AuthzError> {
    if has_permission(actor, permission) {
        Ok(())
    } else {
        tracing::debug!(
            actor_id = %actor.id,
            role = ?actor.role,
            permission = permission.as_str(),
            "permission denied"
        );
        Err(AuthzError::Forbidden(permission))
    }
}

/// Client-facing permission token list, sorted.
pub fn permission_tokens_for(actor: &Actor) -> Vec<&'static str> {
    let mut tokens: Vec<&'static str> = permissions_of(actor).iter().map(|p| p.as_str()).collect();
    tokens.sort_unstable();
    tokens
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Role;
    use dealflow_core::{CompanyId, UserId};

    fn actor(role: Option<Role>) -> Actor {
        Actor::new(UserId::new(), CompanyId::new(), role)
    }

    #[test]
    fn sales_rep_cannot_manage_billing() {
        let rep = actor(Some(Role::SalesRep));
        assert!(!has_permission(&rep, Permission::ManageBilling));
        assert_eq!(
            authorize(&rep, Permission::ManageBilling),
            Err(AuthzError::Forbidden(Permission::ManageBilling))
        );
    }

    #[test]
    fn company_admin_can_manage_billing() {
        assert!(authorize(&actor(Some(Role::CompanyAdmin)), Permission::ManageBilling).is_ok());
    }

    #[test]
    fn roleless_actor_is_denied_everything() {
        let nobody = actor(None);
        for p in Permission::ALL {
            assert!(!has_permission(&nobody, p));
        }
        assert!(permission_tokens_for(&nobody).is_empty());
    }

    #[test]
    fn tokens_are_sorted() {
        let tokens = permission_tokens_for(&actor(Some(Role::SalesRep)));
        assert_eq!(tokens, vec!["create_records", "edit_records", "view_own_data"]);
    }
}
