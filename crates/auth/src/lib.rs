//! `dealflow-auth`: permission checks and tenant scoping.
//!
//! Pure logic: no IO, no HTTP, no storage. Team membership is the only thing read
//! from outside, through [`scope::TeamRoster`].

pub mod actor;
pub mod authorize;
pub mod capability;
pub mod claims;
pub mod entity;
pub mod permissions;
pub mod roles;
pub mod scope;
pub mod tenant;

pub use actor::{Actor, RoleFields};
pub use authorize::{authorize, has_permission, permission_tokens_for, permissions_of, AuthzError};
pub use capability::{permissions_for, permissions_for_role, PermissionSet};
pub use claims::{validate_claims, ActorClaims, TokenValidationError};
pub use entity::{EntityDescriptor, EntityKind, ScopedRecord};
pub use permissions::Permission;
pub use roles::Role;
pub use scope::{
    AccessScopeResolver, ScopableQuery, ScopeError, ScopeFilter, ScopeTier, TeamLookupError, TeamRoster,
};
pub use tenant::TenantContext;
