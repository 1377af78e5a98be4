//! Notification persistence boundary.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use thiserror::Error;

use dealflow_core::{CompanyId, NotificationId, UserId};

use crate::notification::{NewNotification, Notification};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NotificationStoreError {
    #[error("notification not found")]
    NotFound,

    /// Only the recipient may change a notification's read state.
    #[error("notification belongs to another recipient")]
    NotRecipient,

    #[error("notification store lock poisoned")]
    Poisoned,

    #[error("notification store backend error: {0}")]
    Backend(String),
}

/// Tenant-scoped notification storage.
///
/// Rows are created by the dispatcher and afterwards only touched by their
/// recipient (read flag) or by retention.
pub trait NotificationStore: Send + Sync {
    /// Persist a new row. Assigns id and `created_at`; `read` starts `false`.
    fn insert(&self, new: NewNotification) -> Result<Notification, NotificationStoreError>;

    fn get(&self, company_id: CompanyId, id: NotificationId) -> Result<Option<Notification>, NotificationStoreError>;

    /// Newest first.
    fn list_for_recipient(
        &self,
        company_id: CompanyId,
        recipient_id: UserId,
        unread_only: bool,
    ) -> Result<Vec<Notification>, NotificationStoreError>;

    fn unread_count(&self, company_id: CompanyId, recipient_id: UserId) -> Result<usize, NotificationStoreError>;

    /// Flip the read flag. Idempotent: an already-read row keeps its `read_at`.
    fn mark_read(
        &self,
        company_id: CompanyId,
        recipient_id: UserId,
        id: NotificationId,
        at: DateTime<Utc>,
    ) -> Result<Notification, NotificationStoreError>;

    fn mark_all_read(
        &self,
        company_id: CompanyId,
        recipient_id: UserId,
        at: DateTime<Utc>,
    ) -> Result<usize, NotificationStoreError>;

    /// Retention: delete read notifications created before `cutoff`.
    fn purge_read_before(&self, cutoff: DateTime<Utc>) -> Result<usize, NotificationStoreError>;
}

impl<S> NotificationStore for Arc<S>
where
    S: NotificationStore + ?Sized,
{
    fn insert(&self, new: NewNotification) -> Result<Notification, NotificationStoreError> {
        (**self).insert(new)
    }

    fn get(&self, company_id: CompanyId, id: NotificationId) -> Result<Option<Notification>, NotificationStoreError> {
        (**self).get(company_id, id)
    }

    fn list_for_recipient(
        &self,
        company_id: CompanyId,
        recipient_id: UserId,
        unread_only: bool,
    ) -> Result<Vec<Notification>, NotificationStoreError> {
        (**self).list_for_recipient(company_id, recipient_id, unread_only)
    }

    fn unread_count(&self, company_id: CompanyId, recipient_id: UserId) -> Result<usize, NotificationStoreError> {
        (**self).unread_count(company_id, recipient_id)
    }

    fn mark_read(
        &self,
        company_id: CompanyId,
        recipient_id: UserId,
        id: NotificationId,
        at: DateTime<Utc>,
    ) -> Result<Notification, NotificationStoreError> {
        (**self).mark_read(company_id, recipient_id, id, at)
    }

    fn mark_all_read(
        &self,
        company_id: CompanyId,
        recipient_id: UserId,
        at: DateTime<Utc>,
    ) -> Result<usize, NotificationStoreError> {
        (**self).mark_all_read(company_id, recipient_id, at)
    }

    fn purge_read_before(&self, cutoff: DateTime<Utc>) -> Result<usize, NotificationStoreError> {
        (**self).purge_read_before(cutoff)
    }
}

/// In-memory store for tests/dev.
///
/// Keyed by UUIDv7 ids, so key order is creation order.
#[derive(Debug, Default)]
pub struct InMemoryNotificationStore {
    rows: RwLock<BTreeMap<NotificationId, Notification>>,
}

impl InMemoryNotificationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.rows.read().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl NotificationStore for InMemoryNotificationStore {
    fn insert(&self, new: NewNotification) -> Result<Notification, NotificationStoreError> {
        let notification = new.into_notification(NotificationId::new(), Utc::now());
        let mut rows = self.rows.write().map_err(|_| NotificationStoreError::Poisoned)?;
        rows.insert(notification.id, notification.clone());
        Ok(notification)
    }

    fn get(&self, company_id: CompanyId, id: NotificationId) -> Result<Option<Notification>, NotificationStoreError> {
        let rows = self.rows.read().map_err(|_| NotificationStoreError::Poisoned)?;
        Ok(rows.get(&id).filter(|n| n.company_id == company_id).cloned())
    }

    fn list_for_recipient(
        &self,
        company_id: CompanyId,
        recipient_id: UserId,
        unread_only: bool,
    ) -> Result<Vec<Notification>, NotificationStoreError> {
        let rows = self.rows.read().map_err(|_| NotificationStoreError::Poisoned)?;
        Ok(rows
            .values()
            .rev()
            .filter(|n| n.company_id == company_id && n.recipient_id == recipient_id)
            .filter(|n| !unread_only || !n.read)
            .cloned()
            .collect())
    }

    fn unread_count(&self, company_id: CompanyId, recipient_id: UserId) -> Result<usize, NotificationStoreError> {
        let rows = self.rows.read().map_err(|_| NotificationStoreError::Poisoned)?;
        Ok(rows
            .values()
            .filter(|n| n.company_id == company_id && n.recipient_id == recipient_id && !n.read)
            .count())
    }

    fn mark_read(
        &self,
        company_id: CompanyId,
        recipient_id: UserId,
        id: NotificationId,
        at: DateTime<Utc>,
    ) -> Result<Notification, NotificationStoreError> {
        let mut rows = self.rows.write().map_err(|_| NotificationStoreError::Poisoned)?;
        let row = rows
            .get_mut(&id)
            .filter(|n| n.company_id == company_id)
            .ok_or(NotificationStoreError::NotFound)?;

        if row.recipient_id != recipient_id {
            return Err(NotificationStoreError::NotRecipient);
        }

        if !row.read {
            row.read = true;
            row.read_at = Some(at);
        }
        Ok(row.clone())
    }

    fn mark_all_read(
        &self,
        company_id: CompanyId,
        recipient_id: UserId,
        at: DateTime<Utc>,
    ) -> Result<usize, NotificationStoreError> {
        let mut rows = self.rows.write().map_err(|_| NotificationStoreError::Poisoned)?;
        let mut changed = 0;
        for row in rows
            .values_mut()
            .filter(|n| n.company_id == company_id && n.recipient_id == recipient_id && !n.read)
        {
            row.read = true;
            row.read_at = Some(at);
            changed += 1;
        }
        Ok(changed)
    }

    fn purge_read_before(&self, cutoff: DateTime<Utc>) -> Result<usize, NotificationStoreError> {
        let mut rows = self.rows.write().map_err(|_| NotificationStoreError::Poisoned)?;
        let before = rows.len();
        rows.retain(|_, n| !(n.read && n.created_at < cutoff));
        Ok(before - rows.len())
    }
}
