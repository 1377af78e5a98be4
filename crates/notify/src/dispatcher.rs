//! Notification dispatch.
//!
//! Resolve recipients, write one row per recipient, then hand each stored row to
//! the push queue. Nothing in here returns an error to the caller: a failure at any
//! step is logged and the primary business action carries on.

use serde::Serialize;
use tracing::{info, warn};

use dealflow_auth::Actor;
use dealflow_core::{CompanyId, NotificationId};

use crate::event::EntityEvent;
use crate::fanout::FanoutResolver;
use crate::notification::{NewNotification, Notification, NotificationContent};
use crate::push::PushQueue;
use crate::roster::UserRoster;
use crate::store::NotificationStore;

/// What happened to one event's notifications.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DispatchReport {
    /// Recipients after de-duplication.
    pub recipients: usize,
    pub persisted: Vec<NotificationId>,
    /// Rows the store refused.
    pub failed: usize,
    pub pushes_enqueued: usize,
    /// Set when the whole event was skipped (roster lookup failed).
    pub skipped: Option<String>,
}

pub struct NotificationDispatcher<S, R> {
    store: S,
    roster: R,
    push: PushQueue,
}

impl<S, R> NotificationDispatcher<S, R>
where
    S: NotificationStore,
    R: UserRoster,
{
    pub fn new(store: S, roster: R, push: PushQueue) -> Self {
        Self { store, roster, push }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn push_queue(&self) -> &PushQueue {
        &self.push
    }

    /// Notify everyone the event's fan-out rule selects, through the dispatcher's
    /// own store.
    pub fn notify(
        &self,
        actor: &Actor,
        company_id: CompanyId,
        event: &EntityEvent,
        content: &NotificationContent,
    ) -> DispatchReport {
        let rows = match self.resolve_rows(actor, company_id, event, content) {
            Ok(rows) => rows,
            Err(reason) => {
                return DispatchReport {
                    skipped: Some(reason),
                    ..DispatchReport::default()
                };
            }
        };

        let mut report = DispatchReport {
            recipients: rows.len(),
            ..DispatchReport::default()
        };

        for row in rows {
            let recipient_id = row.recipient_id;
            match self.store.insert(row) {
                Ok(stored) => {
                    report.persisted.push(stored.id);
                    if self.push.enqueue(&stored).is_ok() {
                        report.pushes_enqueued += 1;
                    }
                }
                Err(err) => {
                    report.failed += 1;
                    warn!(
                        recipient_id = %recipient_id,
                        entity = %event.entity,
                        action = %event.action,
                        error = %err,
                        "notification row not created"
                    );
                }
            }
        }

        info!(
            actor_id = %actor.id,
            company_id = %company_id,
            entity = %event.entity,
            action = %event.action,
            recipients = report.recipients,
            persisted = report.persisted.len(),
            "notifications dispatched"
        );
        report
    }

    /// Transactional path, step one: resolved rows for the caller to write inside
    /// its own transaction. Empty when fan-out failed (already logged).
    pub fn prepare(
        &self,
        actor: &Actor,
        company_id: CompanyId,
        event: &EntityEvent,
        content: &NotificationContent,
    ) -> Vec<NewNotification> {
        self.resolve_rows(actor, company_id, event, content).unwrap_or_default()
    }

    /// Transactional path, step two: push rows the caller has committed.
    ///
    /// Returns how many pushes were queued.
    pub fn publish(&self, committed: &[Notification]) -> usize {
        committed.iter().filter(|n| self.push.enqueue(n).is_ok()).count()
    }

    fn resolve_rows(
        &self,
        actor: &Actor,
        company_id: CompanyId,
        event: &EntityEvent,
        content: &NotificationContent,
    ) -> Result<Vec<NewNotification>, String> {
        let recipients = FanoutResolver::new(&self.roster)
            .resolve(actor, company_id, event)
            .map_err(|err| {
                warn!(
                    actor_id = %actor.id,
                    company_id = %company_id,
                    entity = %event.entity,
                    action = %event.action,
                    error = %err,
                    "notification fan-out failed; skipping notifications for this event"
                );
                err.to_string()
            })?;

        Ok(recipients.iter().map(|r| content.for_recipient(r)).collect())
    }
}
