//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::config::ConsistencyConfig;
use crate::db::{
    CartRepository, Catalog, NotificationRepository, OrderRepository, PgCartRepository,
    PgCatalog, PgNotificationStore, PgOrderRepository,
};
use crate::services::{CartService, NotificationService, NotificationSink, OrderService};

/// The collaborators the services are built from.
pub struct Stores {
    pub orders: Arc<dyn OrderRepository>,
    pub carts: Arc<dyn CartRepository>,
    pub catalog: Arc<dyn Catalog>,
    pub sink: Arc<dyn NotificationSink>,
    pub notifications: Arc<dyn NotificationRepository>,
    pub consistency: ConsistencyConfig,
}

/// Application state shared across all handlers.
///
/// Cheaply cloneable via `Arc`.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    pool: Option<PgPool>,
    carts: CartService,
    orders: OrderService,
    notifications: NotificationService,
}

impl AppState {
    /// State backed by `PostgreSQL`.
    #[must_use]
    pub fn postgres(pool: PgPool, consistency: ConsistencyConfig) -> Self {
        let notifications = Arc::new(PgNotificationStore::new(pool.clone()));
        let stores = Stores {
            orders: Arc::new(PgOrderRepository::new(pool.clone())),
            carts: Arc::new(PgCartRepository::new(pool.clone())),
            catalog: Arc::new(PgCatalog::new(pool.clone())),
            sink: notifications.clone(),
            notifications,
            consistency,
        };
        Self::build(Some(pool), stores)
    }

    /// State over arbitrary stores, without a database pool.
    #[must_use]
    pub fn from_stores(stores: Stores) -> Self {
        Self::build(None, stores)
    }

    fn build(pool: Option<PgPool>, stores: Stores) -> Self {
        let carts = CartService::new(stores.carts, stores.catalog);
        let orders = OrderService::new(
            stores.orders,
            carts.clone(),
            stores.sink,
            stores.consistency,
        );
        let notifications = NotificationService::new(stores.notifications);

        Self {
            inner: Arc::new(AppStateInner {
                pool,
                carts,
                orders,
                notifications,
            }),
        }
    }

    /// The database pool, when running against `PostgreSQL`.
    #[must_use]
    pub fn pool(&self) -> Option<&PgPool> {
        self.inner.pool.as_ref()
    }

    #[must_use]
    pub fn carts(&self) -> &CartService {
        &self.inner.carts
    }

    #[must_use]
    pub fn orders(&self) -> &OrderService {
        &self.inner.orders
    }

    #[must_use]
    pub fn notifications(&self) -> &NotificationService {
        &self.inner.notifications
    }
}
