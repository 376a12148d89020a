//! Notification storage.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use fulfillment_core::{BuyerId, NewNotification, Notification, NotificationId};

use super::RepositoryError;
use crate::services::notifications::{NotificationError, NotificationSink};

/// Read side of the notification store, scoped to one buyer.
#[async_trait]
pub trait NotificationRepository: Send + Sync {
    /// The buyer's notifications, newest first.
    async fn list_for_buyer(
        &self,
        buyer: BuyerId,
        limit: i64,
    ) -> Result<Vec<Notification>, RepositoryError>;

    /// Number of unread notifications.
    async fn unread_count(&self, buyer: BuyerId) -> Result<i64, RepositoryError>;

    /// Mark every unread notification of the buyer as read.
    /// Returns how many changed.
    async fn mark_all_read(&self, buyer: BuyerId) -> Result<u64, RepositoryError>;
}

#[derive(sqlx::FromRow)]
struct NotificationRow {
    id: Uuid,
    buyer_id: Uuid,
    title: String,
    message: String,
    kind: String,
    read: bool,
    link: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<NotificationRow> for Notification {
    type Error = RepositoryError;

    fn try_from(row: NotificationRow) -> Result<Self, Self::Error> {
        let kind = row
            .kind
            .parse()
            .map_err(|e| RepositoryError::DataCorruption(format!("notification {}: {e}", row.id)))?;

        Ok(Self {
            id: NotificationId::new(row.id),
            buyer_id: BuyerId::new(row.buyer_id),
            title: row.title,
            message: row.message,
            kind,
            read: row.read,
            link: row.link,
            created_at: row.created_at,
        })
    }
}

/// `PostgreSQL`-backed notification sink and repository.
#[derive(Clone)]
pub struct PgNotificationStore {
    pool: PgPool,
}

impl PgNotificationStore {
    /// Create a new notification store.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl NotificationSink for PgNotificationStore {
    async fn notify(&self, notification: NewNotification) -> Result<(), NotificationError> {
        let stored = Notification::from_new(notification, Utc::now());

        sqlx::query(
            r"
            INSERT INTO fulfillment.notification
                (id, buyer_id, title, message, kind, read, link, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ",
        )
        .bind(stored.id)
        .bind(stored.buyer_id)
        .bind(&stored.title)
        .bind(&stored.message)
        .bind(stored.kind.as_str())
        .bind(stored.read)
        .bind(stored.link.as_deref())
        .bind(stored.created_at)
        .execute(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        Ok(())
    }
}

#[async_trait]
impl NotificationRepository for PgNotificationStore {
    async fn list_for_buyer(
        &self,
        buyer: BuyerId,
        limit: i64,
    ) -> Result<Vec<Notification>, RepositoryError> {
        let rows = sqlx::query_as::<_, NotificationRow>(
            r"
            SELECT id, buyer_id, title, message, kind, read, link, created_at
            FROM fulfillment.notification
            WHERE buyer_id = $1
            ORDER BY created_at DESC
            LIMIT $2
            ",
        )
        .bind(buyer)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Notification::try_from).collect()
    }

    async fn unread_count(&self, buyer: BuyerId) -> Result<i64, RepositoryError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM fulfillment.notification WHERE buyer_id = $1 AND NOT read",
        )
        .bind(buyer)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    async fn mark_all_read(&self, buyer: BuyerId) -> Result<u64, RepositoryError> {
        let result = sqlx::query(
            "UPDATE fulfillment.notification SET read = TRUE WHERE buyer_id = $1 AND NOT read",
        )
        .bind(buyer)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}
