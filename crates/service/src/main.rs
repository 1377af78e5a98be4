use std::io::BufRead;
use std::sync::Arc;

use anyhow::Context;
use chrono::Utc;

use dealflow_infra::postgres::PostgresNotificationStore;
use dealflow_infra::{CoreConfig, UserDirectory};
use dealflow_notify::{InMemoryNotificationStore, NotificationStore};
use dealflow_service::Core;

fn main() -> anyhow::Result<()> {
    dealflow_observability::init();

    let config = CoreConfig::from_env().context("invalid configuration")?;

    let store: Arc<dyn NotificationStore> = match config.database_url.as_deref() {
        Some(url) => Arc::new(PostgresNotificationStore::connect_lazy(url).context("failed to set up Postgres")?),
        None => {
            tracing::warn!("DATABASE_URL not set; notifications are kept in memory");
            Arc::new(InMemoryNotificationStore::new())
        }
    };

    let directory = Arc::new(load_directory(&config)?);
    let core = start(&config, directory, store)?;

    tracing::info!("running; close stdin to stop (send `purge` to run retention)");
    for line in std::io::stdin().lock().lines() {
        match line?.trim() {
            "purge" => {
                core.purge_expired(Utc::now());
            }
            "stats" => tracing::info!(stats = ?core.push_stats(), "push stats"),
            _ => {}
        }
    }

    let stats = core.shutdown();
    tracing::info!(?stats, "shutdown complete");
    Ok(())
}

fn load_directory(config: &CoreConfig) -> anyhow::Result<UserDirectory> {
    let Some(path) = config.directory_file.as_deref() else {
        tracing::warn!("DEALFLOW_DIRECTORY_FILE not set; user directory starts empty and fan-out reaches nobody");
        return Ok(UserDirectory::new());
    };
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read user directory {}", path.display()))?;
    UserDirectory::from_json(&json).with_context(|| format!("failed to load user directory {}", path.display()))
}

#[cfg(feature = "redis")]
fn start(
    config: &CoreConfig,
    directory: Arc<UserDirectory>,
    store: Arc<dyn NotificationStore>,
) -> anyhow::Result<Core<UserDirectory>> {
    match config.redis_url.as_deref() {
        Some(url) => {
            let channel = dealflow_realtime::RedisRealtimeChannel::new(url, "dealflow:realtime")
                .context("failed to set up Redis")?;
            Ok(Core::start_with_channel(config, directory, store, Arc::new(channel))?)
        }
        None => Ok(Core::start(config, directory, store)?),
    }
}

#[cfg(not(feature = "redis"))]
fn start(
    config: &CoreConfig,
    directory: Arc<UserDirectory>,
    store: Arc<dyn NotificationStore>,
) -> anyhow::Result<Core<UserDirectory>> {
    if config.redis_url.is_some() {
        tracing::warn!("REDIS_URL set but built without the `redis` feature; using in-process realtime");
    }
    Ok(Core::start(config, directory, store)?)
}
