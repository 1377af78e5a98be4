use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{info, warn};

use dealflow_auth::{
    authorize, Actor, AuthzError, EntityKind, Permission, ScopableQuery, ScopeError, ScopedRecord, TeamRoster,
    TenantContext,
};
use dealflow_core::CompanyId;
use dealflow_infra::CoreConfig;
use dealflow_notify::{
    DispatchReport, EntityEvent, NotificationContent, NotificationDispatcher, NotificationStore, PushError, PushStats,
    PushWorker, PushWorkerHandle, UserRoster,
};
use dealflow_realtime::{ConnectionRegistry, RealtimeChannel, RealtimeError, RealtimeMessage, Subscription};

#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Authz(#[from] AuthzError),

    #[error(transparent)]
    Scope(#[from] ScopeError),

    #[error("push worker failed to start: {0}")]
    Push(#[from] PushError),

    #[error(transparent)]
    Realtime(#[from] RealtimeError),
}

type SharedStore = Arc<dyn NotificationStore>;

/// The running core.
///
/// `D` is the user directory: it answers both fan-out roster lookups and
/// team-membership lookups.
pub struct Core<D> {
    directory: Arc<D>,
    registry: Arc<ConnectionRegistry>,
    dispatcher: NotificationDispatcher<SharedStore, Arc<D>>,
    push: PushWorkerHandle,
    retention: chrono::Duration,
}

impl<D> Core<D>
where
    D: UserRoster + TeamRoster + 'static,
{
    /// Start with pushes going to the in-process connection registry.
    pub fn start(config: &CoreConfig, directory: Arc<D>, store: SharedStore) -> Result<Self, CoreError> {
        Self::start_inner(config, directory, store, None)
    }

    /// Start with pushes going to an external channel (e.g. Redis) instead.
    ///
    /// The in-process registry still runs for local connections but receives no
    /// pushes.
    pub fn start_with_channel(
        config: &CoreConfig,
        directory: Arc<D>,
        store: SharedStore,
        channel: Arc<dyn RealtimeChannel>,
    ) -> Result<Self, CoreError> {
        Self::start_inner(config, directory, store, Some(channel))
    }

    fn start_inner(
        config: &CoreConfig,
        directory: Arc<D>,
        store: SharedStore,
        channel: Option<Arc<dyn RealtimeChannel>>,
    ) -> Result<Self, CoreError> {
        let registry = Arc::new(ConnectionRegistry::new());
        registry.start()?;

        let channel: Arc<dyn RealtimeChannel> = match channel {
            Some(channel) => channel,
            None => registry.clone(),
        };
        let (queue, push) = PushWorker::spawn(config.push_worker(), channel)?;
        let dispatcher = NotificationDispatcher::new(store, directory.clone(), queue);

        info!(
            push_queue_capacity = config.push_queue_capacity,
            retention_days = config.notification_retention_days,
            "core started"
        );

        Ok(Self {
            directory,
            registry,
            dispatcher,
            push,
            retention: config.retention(),
        })
    }

    pub fn tenant(&self, actor: Actor) -> TenantContext {
        TenantContext::new(actor)
    }

    pub fn authorize(&self, actor: &Actor, permission: Permission) -> Result<(), CoreError> {
        Ok(authorize(actor, permission)?)
    }

    /// Narrow a list query to what `actor` may see of `entity`.
    pub fn scope_query<Q: ScopableQuery>(&self, actor: &Actor, entity: EntityKind, query: Q) -> Result<Q, CoreError> {
        let ctx = TenantContext::new(actor.clone());
        Ok(ctx.resolver(&*self.directory).scope_query(entity, query)?)
    }

    /// Check one fetched record; out of scope becomes `RecordOutOfScope`.
    pub fn scope_record<R: ScopedRecord + ?Sized>(
        &self,
        actor: &Actor,
        entity: EntityKind,
        record: &R,
    ) -> Result<(), CoreError> {
        let ctx = TenantContext::new(actor.clone());
        if ctx.resolver(&*self.directory).can_access_record(entity, record)? {
            Ok(())
        } else {
            Err(AuthzError::RecordOutOfScope { entity }.into())
        }
    }

    /// Notify about a mutation with content derived from the event.
    ///
    /// Never fails; see [`DispatchReport`] for what happened.
    pub fn notify(&self, actor: &Actor, company_id: CompanyId, event: &EntityEvent) -> DispatchReport {
        let content = NotificationContent::for_event(actor, event);
        self.dispatcher.notify(actor, company_id, event, &content)
    }

    pub fn notify_with(
        &self,
        actor: &Actor,
        company_id: CompanyId,
        event: &EntityEvent,
        content: &NotificationContent,
    ) -> DispatchReport {
        self.dispatcher.notify(actor, company_id, event, content)
    }

    /// For the transactional path (`prepare` / `publish`).
    pub fn dispatcher(&self) -> &NotificationDispatcher<SharedStore, Arc<D>> {
        &self.dispatcher
    }

    pub fn notifications(&self) -> &dyn NotificationStore {
        self.dispatcher.store().as_ref()
    }

    pub fn connect(&self, company_id: CompanyId) -> Result<Subscription<RealtimeMessage>, CoreError> {
        Ok(self.registry.connect(company_id)?)
    }

    /// Delete read notifications older than the retention window.
    pub fn purge_expired(&self, now: DateTime<Utc>) -> usize {
        let cutoff = now - self.retention;
        match self.notifications().purge_read_before(cutoff) {
            Ok(purged) => {
                info!(purged, %cutoff, "expired notifications purged");
                purged
            }
            Err(err) => {
                warn!(error = %err, "notification retention purge failed");
                0
            }
        }
    }

    pub fn push_stats(&self) -> PushStats {
        self.push.stats()
    }

    /// Drain queued pushes, then close live connections.
    pub fn shutdown(self) -> PushStats {
        let stats = self.push.shutdown();
        match self.registry.shutdown() {
            Ok(closed) => info!(closed, ?stats, "core stopped"),
            Err(err) => warn!(error = %err, "connection registry shutdown failed"),
        }
        stats
    }
}
