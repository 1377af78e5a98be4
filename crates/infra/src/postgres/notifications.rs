//! Postgres-backed notification persistence.
//!
//! ## Error Mapping
//!
//! Every SQLx error becomes `NotificationStoreError::Backend` carrying the
//! operation name. Missing rows and foreign recipients are checked explicitly and
//! reported as `NotFound` / `NotRecipient`, as the in-memory store does.
//!
//! ## Tenant Isolation
//!
//! Every read and write by id includes `company_id` in the WHERE clause.

use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::instrument;
use uuid::Uuid;

use dealflow_core::{CompanyId, NotificationId, UserId};
use dealflow_notify::{NewNotification, Notification, NotificationCategory, NotificationStore, NotificationStoreError};

const COLUMNS: &str =
    "id, company_id, recipient_id, title, message, category, link, read, read_at, created_at, metadata";

/// Async repository over the `notifications` table.
#[derive(Debug, Clone)]
pub struct PostgresNotificationRepository {
    pool: Arc<PgPool>,
}

impl PostgresNotificationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool: Arc::new(pool) }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Insert inside the caller's transaction, so the row commits or rolls back
    /// with the business write that caused it.
    #[instrument(
        skip(self, tx, new),
        fields(company_id = %new.company_id, recipient_id = %new.recipient_id),
        err
    )]
    pub async fn insert_in_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        new: NewNotification,
    ) -> Result<Notification, NotificationStoreError> {
        let notification = new.into_notification(NotificationId::new(), Utc::now());

        sqlx::query(
            r#"
            INSERT INTO notifications (
                id, company_id, recipient_id, title, message, category,
                link, read, read_at, created_at, metadata
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(notification.id.as_uuid())
        .bind(notification.company_id.as_uuid())
        .bind(notification.recipient_id.as_uuid())
        .bind(&notification.title)
        .bind(&notification.message)
        .bind(notification.category.as_str())
        .bind(&notification.link)
        .bind(notification.read)
        .bind(notification.read_at)
        .bind(notification.created_at)
        .bind(&notification.metadata)
        .execute(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error("insert_in_tx", e))?;

        Ok(notification)
    }

    /// Insert in a transaction of its own.
    pub async fn insert(&self, new: NewNotification) -> Result<Notification, NotificationStoreError> {
        let mut tx = self.pool.begin().await.map_err(|e| map_sqlx_error("begin", e))?;
        let notification = self.insert_in_tx(&mut tx, new).await?;
        tx.commit().await.map_err(|e| map_sqlx_error("commit", e))?;
        Ok(notification)
    }

    #[instrument(skip(self), fields(company_id = %company_id, notification_id = %id), err)]
    pub async fn get(
        &self,
        company_id: CompanyId,
        id: NotificationId,
    ) -> Result<Option<Notification>, NotificationStoreError> {
        let row = sqlx::query(&format!(
            "SELECT {COLUMNS} FROM notifications WHERE company_id = $1 AND id = $2"
        ))
        .bind(company_id.as_uuid())
        .bind(id.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("get", e))?;

        row.as_ref().map(notification_from_row).transpose()
    }

    #[instrument(skip(self), fields(company_id = %company_id, recipient_id = %recipient_id), err)]
    pub async fn list_for_recipient(
        &self,
        company_id: CompanyId,
        recipient_id: UserId,
        unread_only: bool,
    ) -> Result<Vec<Notification>, NotificationStoreError> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {COLUMNS}
            FROM notifications
            WHERE company_id = $1 AND recipient_id = $2 AND ($3 = FALSE OR read = FALSE)
            ORDER BY created_at DESC, id DESC
            "#
        ))
        .bind(company_id.as_uuid())
        .bind(recipient_id.as_uuid())
        .bind(unread_only)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_for_recipient", e))?;

        rows.iter().map(notification_from_row).collect()
    }

    #[instrument(skip(self), fields(company_id = %company_id, recipient_id = %recipient_id), err)]
    pub async fn unread_count(
        &self,
        company_id: CompanyId,
        recipient_id: UserId,
    ) -> Result<usize, NotificationStoreError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM notifications WHERE company_id = $1 AND recipient_id = $2 AND read = FALSE",
        )
        .bind(company_id.as_uuid())
        .bind(recipient_id.as_uuid())
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("unread_count", e))?;

        Ok(usize::try_from(count).unwrap_or_default())
    }

    /// Only the recipient may flip the flag. An already-read row keeps its `read_at`.
    #[instrument(
        skip(self, at),
        fields(company_id = %company_id, recipient_id = %recipient_id, notification_id = %id),
        err
    )]
    pub async fn mark_read(
        &self,
        company_id: CompanyId,
        recipient_id: UserId,
        id: NotificationId,
        at: DateTime<Utc>,
    ) -> Result<Notification, NotificationStoreError> {
        let mut tx = self.pool.begin().await.map_err(|e| map_sqlx_error("begin", e))?;

        let owner: Option<Uuid> = sqlx::query_scalar(
            "SELECT recipient_id FROM notifications WHERE company_id = $1 AND id = $2 FOR UPDATE",
        )
        .bind(company_id.as_uuid())
        .bind(id.as_uuid())
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("mark_read", e))?;

        match owner {
            None => return Err(NotificationStoreError::NotFound),
            Some(owner) if owner != *recipient_id.as_uuid() => {
                return Err(NotificationStoreError::NotRecipient);
            }
            Some(_) => {}
        }

        let row = sqlx::query(&format!(
            r#"
            UPDATE notifications
            SET read = TRUE, read_at = COALESCE(read_at, $3)
            WHERE company_id = $1 AND id = $2
            RETURNING {COLUMNS}
            "#
        ))
        .bind(company_id.as_uuid())
        .bind(id.as_uuid())
        .bind(at)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("mark_read", e))?;

        let notification = notification_from_row(&row)?;
        tx.commit().await.map_err(|e| map_sqlx_error("commit", e))?;
        Ok(notification)
    }

    #[instrument(skip(self, at), fields(company_id = %company_id, recipient_id = %recipient_id), err)]
    pub async fn mark_all_read(
        &self,
        company_id: CompanyId,
        recipient_id: UserId,
        at: DateTime<Utc>,
    ) -> Result<usize, NotificationStoreError> {
        let result = sqlx::query(
            r#"
            UPDATE notifications
            SET read = TRUE, read_at = $3
            WHERE company_id = $1 AND recipient_id = $2 AND read = FALSE
            "#,
        )
        .bind(company_id.as_uuid())
        .bind(recipient_id.as_uuid())
        .bind(at)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("mark_all_read", e))?;

        Ok(result.rows_affected() as usize)
    }

    /// Retention: delete read notifications created before `cutoff`.
    #[instrument(skip(self), err)]
    pub async fn purge_read_before(&self, cutoff: DateTime<Utc>) -> Result<usize, NotificationStoreError> {
        let result = sqlx::query("DELETE FROM notifications WHERE read = TRUE AND created_at < $1")
            .bind(cutoff)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("purge_read_before", e))?;

        Ok(result.rows_affected() as usize)
    }
}

/// Blocking [`NotificationStore`] over the async repository.
///
/// Owns a current-thread runtime and blocks on it, so it must not be called from
/// inside another async runtime.
pub struct PostgresNotificationStore {
    repo: PostgresNotificationRepository,
    runtime: tokio::runtime::Runtime,
}

impl PostgresNotificationStore {
    /// Lazily connecting pool: no connection is opened until the first query.
    pub fn connect_lazy(database_url: &str) -> Result<Self, NotificationStoreError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| NotificationStoreError::Backend(format!("failed to build runtime: {e}")))?;

        let pool = {
            let _guard = runtime.enter();
            PgPoolOptions::new()
                .max_connections(5)
                .connect_lazy(database_url)
                .map_err(|e| map_sqlx_error("connect", e))?
        };

        Ok(Self {
            repo: PostgresNotificationRepository::new(pool),
            runtime,
        })
    }

    pub fn repository(&self) -> &PostgresNotificationRepository {
        &self.repo
    }

    fn block<F: Future>(&self, fut: F) -> F::Output {
        self.runtime.block_on(fut)
    }
}

impl NotificationStore for PostgresNotificationStore {
    fn insert(&self, new: NewNotification) -> Result<Notification, NotificationStoreError> {
        self.block(self.repo.insert(new))
    }

    fn get(&self, company_id: CompanyId, id: NotificationId) -> Result<Option<Notification>, NotificationStoreError> {
        self.block(self.repo.get(company_id, id))
    }

    fn list_for_recipient(
        &self,
        company_id: CompanyId,
        recipient_id: UserId,
        unread_only: bool,
    ) -> Result<Vec<Notification>, NotificationStoreError> {
        self.block(self.repo.list_for_recipient(company_id, recipient_id, unread_only))
    }

    fn unread_count(&self, company_id: CompanyId, recipient_id: UserId) -> Result<usize, NotificationStoreError> {
        self.block(self.repo.unread_count(company_id, recipient_id))
    }

    fn mark_read(
        &self,
        company_id: CompanyId,
        recipient_id: UserId,
        id: NotificationId,
        at: DateTime<Utc>,
    ) -> Result<Notification, NotificationStoreError> {
        self.block(self.repo.mark_read(company_id, recipient_id, id, at))
    }

    fn mark_all_read(
        &self,
        company_id: CompanyId,
        recipient_id: UserId,
        at: DateTime<Utc>,
    ) -> Result<usize, NotificationStoreError> {
        self.block(self.repo.mark_all_read(company_id, recipient_id, at))
    }

    fn purge_read_before(&self, cutoff: DateTime<Utc>) -> Result<usize, NotificationStoreError> {
        self.block(self.repo.purge_read_before(cutoff))
    }
}

fn notification_from_row(row: &PgRow) -> Result<Notification, NotificationStoreError> {
    let decode = |e: sqlx::Error| map_sqlx_error("decode", e);

    let category: String = row.try_get("category").map_err(decode)?;
    let category = NotificationCategory::parse(&category)
        .ok_or_else(|| NotificationStoreError::Backend(format!("unknown notification category '{category}'")))?;

    Ok(Notification {
        id: NotificationId::from_uuid(row.try_get("id").map_err(decode)?),
        company_id: CompanyId::from_uuid(row.try_get("company_id").map_err(decode)?),
        recipient_id: UserId::from_uuid(row.try_get("recipient_id").map_err(decode)?),
        title: row.try_get("title").map_err(decode)?,
        message: row.try_get("message").map_err(decode)?,
        category,
        link: row.try_get("link").map_err(decode)?,
        read: row.try_get("read").map_err(decode)?,
        read_at: row.try_get("read_at").map_err(decode)?,
        created_at: row.try_get("created_at").map_err(decode)?,
        metadata: row.try_get("metadata").map_err(decode)?,
    })
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> NotificationStoreError {
    match err {
        sqlx::Error::RowNotFound => NotificationStoreError::NotFound,
        sqlx::Error::Database(db_err) => NotificationStoreError::Backend(format!(
            "database error in {}: {} (code {})",
            operation,
            db_err.message(),
            db_err.code().as_deref().unwrap_or("none")
        )),
        other => NotificationStoreError::Backend(format!("{operation}: {other}")),
    }
}
