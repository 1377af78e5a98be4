//! Runtime configuration read from the environment.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use dealflow_notify::PushWorkerConfig;

pub const PUSH_QUEUE_CAPACITY: &str = "DEALFLOW_PUSH_QUEUE_CAPACITY";
pub const PUSH_POLL_MS: &str = "DEALFLOW_PUSH_POLL_MS";
pub const PUSH_WORKER_NAME: &str = "DEALFLOW_PUSH_WORKER_NAME";
pub const NOTIFICATION_RETENTION_DAYS: &str = "DEALFLOW_NOTIFICATION_RETENTION_DAYS";
pub const DATABASE_URL: &str = "DATABASE_URL";
pub const REDIS_URL: &str = "REDIS_URL";
pub const DIRECTORY_FILE: &str = "DEALFLOW_DIRECTORY_FILE";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreConfig {
    pub push_queue_capacity: usize,
    pub push_poll_interval: Duration,
    pub push_worker_name: String,
    /// Read notifications older than this are purged.
    pub notification_retention_days: u32,
    pub database_url: Option<String>,
    pub redis_url: Option<String>,
    /// JSON array of users loaded into the directory at startup.
    pub directory_file: Option<PathBuf>,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            push_queue_capacity: 1024,
            push_poll_interval: Duration::from_millis(250),
            push_worker_name: "realtime-push".to_string(),
            notification_retention_days: 90,
            database_url: None,
            redis_url: None,
            directory_file: None,
        }
    }
}

impl CoreConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup. Unset or blank keys take their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = Self::default();

        let push_queue_capacity = match get(PUSH_QUEUE_CAPACITY) {
            Some(raw) => parse_positive(PUSH_QUEUE_CAPACITY, &raw)?,
            None => defaults.push_queue_capacity,
        };

        let push_poll_interval = match get(PUSH_POLL_MS) {
            Some(raw) => Duration::from_millis(
                raw.parse::<u64>()
                    .map_err(|_| ConfigError::Invalid { key: PUSH_POLL_MS, value: raw.clone() })?,
            ),
            None => defaults.push_poll_interval,
        };

        let notification_retention_days = match get(NOTIFICATION_RETENTION_DAYS) {
            Some(raw) => parse_positive(NOTIFICATION_RETENTION_DAYS, &raw)?,
            None => defaults.notification_retention_days,
        };

        Ok(Self {
            push_queue_capacity,
            push_poll_interval,
            push_worker_name: get(PUSH_WORKER_NAME).unwrap_or(defaults.push_worker_name),
            notification_retention_days,
            database_url: get(DATABASE_URL),
            redis_url: get(REDIS_URL),
            directory_file: get(DIRECTORY_FILE).map(PathBuf::from),
        })
    }

    pub fn push_worker(&self) -> PushWorkerConfig {
        PushWorkerConfig::default()
            .with_name(self.push_worker_name.clone())
            .with_capacity(self.push_queue_capacity)
            .with_poll_interval(self.push_poll_interval)
    }

    pub fn retention(&self) -> chrono::Duration {
        chrono::Duration::days(i64::from(self.notification_retention_days))
    }
}

fn parse_positive<T>(key: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr + PartialOrd + Default,
{
    match raw.parse::<T>() {
        Ok(v) if v > T::default() => Ok(v),
        _ => Err(ConfigError::Invalid {
            key,
            value: raw.to_string(),
        }),
    }
}
