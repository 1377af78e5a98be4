//! `dealflow-core`: identifiers and error primitives shared by every crate.
//!
//! Nothing in here knows about roles, scoping or notifications.

pub mod error;
pub mod id;

pub use error::{DomainError, DomainResult};
pub use id::{CompanyId, NotificationId, RecordId, TeamId, UserId};
