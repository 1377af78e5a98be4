//! Redis pub/sub transport for realtime messages (optional).
//!
//! Each company gets its own channel, `<prefix>:<company_id>`, so a gateway
//! process only subscribes to the tenants it has connections for. Pub/sub is not
//! durable; that matches the best-effort contract of the push.

use std::sync::mpsc;
use std::thread;

use redis::Commands;
use tracing::warn;

use dealflow_core::CompanyId;

use crate::channel::{RealtimeChannel, RealtimeError, RealtimeMessage};
use crate::subscription::Subscription;

/// Redis-backed [`RealtimeChannel`].
#[derive(Debug, Clone)]
pub struct RedisRealtimeChannel {
    client: redis::Client,
    prefix: String,
}

impl RedisRealtimeChannel {
    pub fn new(redis_url: impl AsRef<str>, prefix: impl Into<String>) -> Result<Self, RealtimeError> {
        let client = redis::Client::open(redis_url.as_ref())
            .map_err(|e| RealtimeError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            prefix: prefix.into(),
        })
    }

    pub fn channel_name(&self, company_id: CompanyId) -> String {
        format!("{}:{}", self.prefix, company_id)
    }

    /// Listen to one company's channel on a background thread.
    pub fn subscribe(&self, company_id: CompanyId) -> Subscription<RealtimeMessage> {
        let (tx, rx) = mpsc::channel();

        let client = self.client.clone();
        let channel = self.channel_name(company_id);

        thread::spawn(move || {
            let mut conn = match client.get_connection() {
                Ok(c) => c,
                Err(e) => {
                    warn!(error = %e, channel = %channel, "realtime redis subscribe failed");
                    return;
                }
            };

            let mut pubsub = conn.as_pubsub();
            if pubsub.subscribe(&channel).is_err() {
                return;
            }

            loop {
                let msg = match pubsub.get_message() {
                    Ok(m) => m,
                    Err(_) => return,
                };

                let raw: String = match msg.get_payload() {
                    Ok(p) => p,
                    Err(_) => continue,
                };

                let payload: serde_json::Value = match serde_json::from_str(&raw) {
                    Ok(v) => v,
                    Err(_) => continue,
                };

                if tx.send(RealtimeMessage { company_id, payload }).is_err() {
                    return;
                }
            }
        });

        Subscription::new(rx)
    }
}

impl RealtimeChannel for RedisRealtimeChannel {
    fn broadcast(&self, company_id: CompanyId, payload: &serde_json::Value) -> Result<usize, RealtimeError> {
        let body = serde_json::to_string(payload).map_err(|e| RealtimeError::Serialize(e.to_string()))?;

        let mut conn = self
            .client
            .get_connection()
            .map_err(|e| RealtimeError::Transport(e.to_string()))?;

        let receivers: i64 = conn
            .publish(self.channel_name(company_id), body)
            .map_err(|e| RealtimeError::Transport(e.to_string()))?;

        Ok(usize::try_from(receivers).unwrap_or(0))
    }
}
