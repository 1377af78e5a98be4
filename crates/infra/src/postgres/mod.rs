//! Postgres adapters.
//!
//! Schema lives in `migrations/` at the workspace root.

pub mod notifications;
pub mod scope_sql;

pub use notifications::{PostgresNotificationRepository, PostgresNotificationStore};
pub use scope_sql::PgScopedSelect;
