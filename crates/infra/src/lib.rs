//! Infrastructure layer: config, in-memory adapters, Postgres.

pub mod config;
pub mod directory;
pub mod postgres;
pub mod records;

pub use config::{ConfigError, CoreConfig};
pub use directory::{DirectoryError, DirectoryUser, UserDirectory};
pub use records::{InMemoryRecordStore, RecordQuery, RecordRow, RecordStoreError};
