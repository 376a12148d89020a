//! Notification delivery and the buyer's notification feed.
//!
//! Delivery goes through a [`NotificationSink`] injected into the services
//! that emit notifications. Delivery is best-effort: [`deliver`] logs and
//! swallows failures, and [`Notifier`] runs it on its own task so the
//! operation that triggered the notification neither waits for nor fails
//! because of it.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tracing::{Instrument, instrument, warn};

use fulfillment_core::{BuyerId, NewNotification, Notification};

use crate::db::{NotificationRepository, RepositoryError};
use crate::error::{AppError, Envelope};

/// Maximum notifications returned by a feed request.
const FEED_LIMIT: i64 = 50;

/// Errors from notification delivery.
#[derive(Debug, Error)]
pub enum NotificationError {
    /// The backing store failed.
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    /// The sink is not accepting deliveries.
    #[error("notification delivery unavailable: {0}")]
    Unavailable(String),
}

/// Destination for user-facing alerts.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Deliver one notification.
    async fn notify(&self, notification: NewNotification) -> Result<(), NotificationError>;
}

/// Deliver a notification, logging instead of propagating failure.
pub async fn deliver(sink: &dyn NotificationSink, notification: NewNotification) {
    let buyer_id = notification.buyer_id;
    let title = notification.title.clone();
    if let Err(e) = sink.notify(notification).await {
        warn!(buyer_id = %buyer_id, title = %title, error = %e, "Notification delivery failed");
    }
}

/// Background delivery through a [`NotificationSink`].
///
/// Deliveries run on tasks owned by the notifier. Dropping the last clone
/// aborts any still in flight, so short-lived callers [`Notifier::drain`]
/// before exiting.
#[derive(Clone)]
pub struct Notifier {
    sink: Arc<dyn NotificationSink>,
    tasks: Arc<Mutex<JoinSet<()>>>,
}

impl Notifier {
    #[must_use]
    pub fn new(sink: Arc<dyn NotificationSink>) -> Self {
        Self {
            sink,
            tasks: Arc::default(),
        }
    }

    /// Start delivering `notification` without waiting for it.
    pub async fn dispatch(&self, notification: NewNotification) {
        let sink = self.sink.clone();
        let mut tasks = self.tasks.lock().await;
        // Reap finished deliveries.
        while tasks.try_join_next().is_some() {}
        tasks.spawn(async move { deliver(sink.as_ref(), notification).await }.in_current_span());
    }

    /// Wait for every dispatched delivery to finish.
    pub async fn drain(&self) {
        let mut tasks = self.tasks.lock().await;
        while tasks.join_next().await.is_some() {}
    }
}

/// A buyer's notifications with the unread total.
#[derive(Debug, Clone, Serialize)]
pub struct NotificationFeed {
    pub notifications: Vec<Notification>,
    pub unread: i64,
}

/// Read and acknowledge notifications.
#[derive(Clone)]
pub struct NotificationService {
    store: Arc<dyn NotificationRepository>,
}

impl NotificationService {
    /// Create a new notification service.
    #[must_use]
    pub fn new(store: Arc<dyn NotificationRepository>) -> Self {
        Self { store }
    }

    /// The buyer's most recent notifications, newest first.
    #[instrument(skip(self))]
    pub async fn list(&self, buyer: Option<BuyerId>) -> Envelope<NotificationFeed> {
        Envelope::from_result(self.try_list(buyer).await, "Notifications loaded")
    }

    /// Mark all of the buyer's notifications as read.
    #[instrument(skip(self))]
    pub async fn mark_all_read(&self, buyer: Option<BuyerId>) -> Envelope<u64> {
        Envelope::from_result(
            self.try_mark_all_read(buyer).await,
            "All notifications marked as read",
        )
    }

    async fn try_list(&self, buyer: Option<BuyerId>) -> Result<NotificationFeed, AppError> {
        let buyer = buyer.ok_or_else(|| AppError::rejected("Buyer is not identified"))?;
        let notifications = self.store.list_for_buyer(buyer, FEED_LIMIT).await?;
        let unread = self.store.unread_count(buyer).await?;
        Ok(NotificationFeed {
            notifications,
            unread,
        })
    }

    async fn try_mark_all_read(&self, buyer: Option<BuyerId>) -> Result<u64, AppError> {
        let buyer = buyer.ok_or_else(|| AppError::rejected("Buyer is not identified"))?;
        Ok(self.store.mark_all_read(buyer).await?)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use fulfillment_core::NotificationKind;

    use super::*;
    use crate::db::memory::MemoryNotificationStore;
    use crate::error::FailureKind;

    #[tokio::test]
    async fn test_deliver_swallows_failures() {
        let sink = MemoryNotificationStore::failing();
        deliver(
            &sink,
            NewNotification::new(BuyerId::generate(), NotificationKind::Order, "t", "m"),
        )
        .await;
        assert!(sink.delivered().await.is_empty());
    }

    #[tokio::test]
    async fn test_notifier_delivers_in_background() {
        let store = Arc::new(MemoryNotificationStore::new());
        let notifier = Notifier::new(store.clone());
        let buyer = BuyerId::generate();
        for title in ["first", "second"] {
            notifier
                .dispatch(NewNotification::new(buyer, NotificationKind::Order, title, "m"))
                .await;
        }

        notifier.drain().await;
        assert_eq!(store.delivered().await.len(), 2);
    }

    #[tokio::test]
    async fn test_feed_and_mark_all_read() {
        let store = Arc::new(MemoryNotificationStore::new());
        let buyer = BuyerId::generate();
        for title in ["first", "second"] {
            deliver(
                store.as_ref(),
                NewNotification::new(buyer, NotificationKind::System, title, "m"),
            )
            .await;
        }
        let service = NotificationService::new(store);

        let feed = service.list(Some(buyer)).await.into_payload().unwrap();
        assert_eq!(feed.unread, 2);
        assert_eq!(feed.notifications.first().unwrap().title, "second");

        let marked = service.mark_all_read(Some(buyer)).await;
        assert_eq!(marked.payload(), Some(&2));

        let feed = service.list(Some(buyer)).await.into_payload().unwrap();
        assert_eq!(feed.unread, 0);
        assert!(feed.notifications.iter().all(|n| n.read));
    }

    #[tokio::test]
    async fn test_missing_buyer_is_rejected() {
        let service = NotificationService::new(Arc::new(MemoryNotificationStore::new()));
        let envelope = service.mark_all_read(None).await;
        assert!(!envelope.ok);
        assert_eq!(envelope.error_kind(), Some(FailureKind::Rejected));
    }
}
