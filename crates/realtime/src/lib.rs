//! `dealflow-realtime`: the live-update side channel.
//!
//! Mechanics only: a broadcast primitive keyed by company, the registry of live
//! connections, and an optional Redis transport. Nothing here is durable; the
//! notification table is the source of truth.

pub mod channel;
pub mod registry;
pub mod subscription;

#[cfg(feature = "redis")]
pub mod redis_pubsub;

pub use channel::{RealtimeChannel, RealtimeError, RealtimeMessage};
pub use registry::ConnectionRegistry;
pub use subscription::Subscription;

#[cfg(feature = "redis")]
pub use redis_pubsub::RedisRealtimeChannel;
