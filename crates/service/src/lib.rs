//! Service composition: wires the core to its adapters and owns the lifecycle of
//! the background pieces (connection registry, push worker).

pub mod app;

pub use app::{Core, CoreError};
