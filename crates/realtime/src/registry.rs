//! Registry of live realtime connections, keyed by company.

use std::collections::HashMap;
use std::sync::{mpsc, Mutex};

use tracing::{debug, info};

use dealflow_core::CompanyId;

use crate::channel::{RealtimeChannel, RealtimeError, RealtimeMessage};
use crate::subscription::Subscription;

#[derive(Debug, Default)]
struct RegistryState {
    running: bool,
    connections: HashMap<CompanyId, Vec<mpsc::Sender<RealtimeMessage>>>,
}

/// In-process connection registry.
///
/// Owned and injected by the composition root, with an explicit lifecycle:
/// `start()` before accepting connections, `shutdown()` to close all of them.
/// Broadcasting to a stopped registry fails with [`RealtimeError::NotRunning`].
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    state: Mutex<RegistryState>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&self) -> Result<(), RealtimeError> {
        let mut state = self.state.lock().map_err(|_| RealtimeError::Poisoned)?;
        state.running = true;
        info!("realtime connection registry started");
        Ok(())
    }

    /// Stop accepting connections and close every open one.
    ///
    /// Returns how many connections were closed.
    pub fn shutdown(&self) -> Result<usize, RealtimeError> {
        let mut state = self.state.lock().map_err(|_| RealtimeError::Poisoned)?;
        state.running = false;
        let closed = state.connections.values().map(Vec::len).sum();
        state.connections.clear();
        info!(closed, "realtime connection registry stopped");
        Ok(closed)
    }

    pub fn is_running(&self) -> bool {
        self.state.lock().map(|s| s.running).unwrap_or(false)
    }

    /// Register a live connection for a company.
    pub fn connect(&self, company_id: CompanyId) -> Result<Subscription<RealtimeMessage>, RealtimeError> {
        let mut state = self.state.lock().map_err(|_| RealtimeError::Poisoned)?;
        if !state.running {
            return Err(RealtimeError::NotRunning);
        }

        let (tx, rx) = mpsc::channel();
        state.connections.entry(company_id).or_default().push(tx);
        debug!(company_id = %company_id, "realtime connection registered");

        Ok(Subscription::new(rx))
    }

    /// Live connections currently registered for a company (dead ones are only
    /// pruned on broadcast).
    pub fn connection_count(&self, company_id: CompanyId) -> usize {
        self.state
            .lock()
            .map(|s| s.connections.get(&company_id).map_or(0, Vec::len))
            .unwrap_or(0)
    }
}

impl RealtimeChannel for ConnectionRegistry {
    fn broadcast(&self, company_id: CompanyId, payload: &serde_json::Value) -> Result<usize, RealtimeError> {
        let mut state = self.state.lock().map_err(|_| RealtimeError::Poisoned)?;
        if !state.running {
            return Err(RealtimeError::NotRunning);
        }

        let Some(senders) = state.connections.get_mut(&company_id) else {
            return Ok(0);
        };

        let message = RealtimeMessage {
            company_id,
            payload: payload.clone(),
        };

        // Drop disconnected subscribers while publishing.
        senders.retain(|tx| tx.send(message.clone()).is_ok());
        let delivered = senders.len();

        if senders.is_empty() {
            state.connections.remove(&company_id);
        }

        Ok(delivered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn running() -> ConnectionRegistry {
        let registry = ConnectionRegistry::new();
        registry.start().unwrap();
        registry
    }

    #[test]
    fn broadcast_reaches_only_the_company() {
        let registry = running();
        let a = CompanyId::new();
        let b = CompanyId::new();
        let sub_a = registry.connect(a).unwrap();
        let sub_b = registry.connect(b).unwrap();

        let delivered = registry.broadcast(a, &json!({"hello": "a"})).unwrap();
        assert_eq!(delivered, 1);

        let msg = sub_a.try_recv().unwrap();
        assert_eq!(msg.company_id, a);
        assert_eq!(msg.payload, json!({"hello": "a"}));
        assert!(sub_b.try_recv().is_err());
    }

    #[test]
    fn dropped_connections_are_pruned() {
        let registry = running();
        let company = CompanyId::new();
        let keep = registry.connect(company).unwrap();
        drop(registry.connect(company).unwrap());
        assert_eq!(registry.connection_count(company), 2);

        assert_eq!(registry.broadcast(company, &json!(1)).unwrap(), 1);
        assert_eq!(registry.connection_count(company), 1);
        assert!(keep.try_recv().is_ok());
    }

    #[test]
    fn stopped_registry_rejects_connections_and_broadcasts() {
        let registry = ConnectionRegistry::new();
        let company = CompanyId::new();
        assert_eq!(registry.connect(company).unwrap_err(), RealtimeError::NotRunning);

        registry.start().unwrap();
        let sub = registry.connect(company).unwrap();
        assert_eq!(registry.shutdown().unwrap(), 1);
        assert!(!registry.is_running());
        assert_eq!(registry.broadcast(company, &json!(1)).unwrap_err(), RealtimeError::NotRunning);
        assert!(sub.recv().is_err());
    }

    #[test]
    fn broadcast_without_listeners_is_not_an_error() {
        let registry = running();
        assert_eq!(registry.broadcast(CompanyId::new(), &json!(null)).unwrap(), 0);
    }
}
