use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use dealflow_core::CompanyId;

/// Message delivered to every live connection of a company.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RealtimeMessage {
    pub company_id: CompanyId,
    pub payload: serde_json::Value,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RealtimeError {
    #[error("realtime registry is not running")]
    NotRunning,

    #[error("realtime registry lock poisoned")]
    Poisoned,

    #[error("realtime transport error: {0}")]
    Transport(String),

    #[error("realtime payload serialization failed: {0}")]
    Serialize(String),
}

/// Broadcast primitive: `(company_id, message)`.
///
/// Returns how many live connections the message was handed to, when the transport
/// can tell (`0` otherwise). Delivery is best-effort; callers must not depend on it.
pub trait RealtimeChannel: Send + Sync {
    fn broadcast(&self, company_id: CompanyId, payload: &serde_json::Value) -> Result<usize, RealtimeError>;
}

impl<C> RealtimeChannel for Arc<C>
where
    C: RealtimeChannel + ?Sized,
{
    fn broadcast(&self, company_id: CompanyId, payload: &serde_json::Value) -> Result<usize, RealtimeError> {
        (**self).broadcast(company_id, payload)
    }
}
