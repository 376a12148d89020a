//! In-memory stores.
//!
//! Used by tests and for running the service without a database. They
//! implement the same traits as the `PostgreSQL` stores and add a few knobs
//! the real stores cannot offer: simulated replica lag, write counters and
//! injected delivery failures.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;

use fulfillment_core::{BuyerId, NewNotification, Notification, Order, OrderId, ProductRef, RawCart};

use super::{
    Catalog, CatalogError, CartRepository, NotificationRepository, OrderRepository,
    RepositoryError,
};
use crate::services::notifications::{NotificationError, NotificationSink};

// =============================================================================
// Orders
// =============================================================================

#[derive(Default)]
struct OrderState {
    orders: HashMap<OrderId, Order>,
    history: HashMap<BuyerId, Vec<OrderId>>,
    /// Reads still to miss per freshly inserted order.
    lagging: HashMap<OrderId, usize>,
    lookups: usize,
}

impl OrderState {
    fn visible(&mut self, id: OrderId) -> Option<&Order> {
        self.lookups += 1;
        if let Some(remaining) = self.lagging.get_mut(&id) {
            if *remaining > 0 {
                *remaining -= 1;
                return None;
            }
        }
        self.orders.get(&id)
    }
}

/// In-memory [`OrderRepository`].
#[derive(Default)]
pub struct MemoryOrderStore {
    state: Mutex<OrderState>,
    read_lag: usize,
}

impl MemoryOrderStore {
    /// A store whose reads always see the latest write.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A store where each inserted order stays invisible to its first
    /// `misses` lookups, like a lagging read replica.
    #[must_use]
    pub fn with_read_lag(misses: usize) -> Self {
        Self {
            state: Mutex::default(),
            read_lag: misses,
        }
    }

    /// Order ids recorded in the buyer's history, oldest first.
    pub async fn history(&self, buyer: BuyerId) -> Vec<OrderId> {
        self.state
            .lock()
            .await
            .history
            .get(&buyer)
            .cloned()
            .unwrap_or_default()
    }

    /// Number of single-order lookups served so far.
    pub async fn lookups(&self) -> usize {
        self.state.lock().await.lookups
    }

    /// Number of stored orders.
    pub async fn len(&self) -> usize {
        self.state.lock().await.orders.len()
    }

    /// Whether the store holds no orders.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl OrderRepository for MemoryOrderStore {
    async fn insert(&self, order: &Order) -> Result<(), RepositoryError> {
        let mut state = self.state.lock().await;
        if state.orders.contains_key(&order.id) {
            return Err(RepositoryError::Conflict("order already exists".to_owned()));
        }
        state.orders.insert(order.id, order.clone());
        if self.read_lag > 0 {
            state.lagging.insert(order.id, self.read_lag);
        }
        Ok(())
    }

    async fn find_for_buyer(
        &self,
        id: OrderId,
        buyer: BuyerId,
    ) -> Result<Option<Order>, RepositoryError> {
        let mut state = self.state.lock().await;
        Ok(state
            .visible(id)
            .filter(|order| order.buyer_id == buyer)
            .cloned())
    }

    async fn find(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let mut state = self.state.lock().await;
        Ok(state.visible(id).cloned())
    }

    async fn save_status(&self, order: &Order) -> Result<bool, RepositoryError> {
        let mut state = self.state.lock().await;
        let Some(stored) = state.orders.get_mut(&order.id) else {
            return Ok(false);
        };
        stored.status = order.status;
        stored.payment_status = order.payment_status;
        stored.updated_at = order.updated_at;
        Ok(true)
    }

    async fn list_for_buyer(&self, buyer: BuyerId) -> Result<Vec<Order>, RepositoryError> {
        let state = self.state.lock().await;
        let mut orders: Vec<Order> = state
            .orders
            .values()
            .filter(|order| order.buyer_id == buyer)
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(orders)
    }

    async fn list_recent(&self, limit: i64) -> Result<Vec<Order>, RepositoryError> {
        let state = self.state.lock().await;
        let mut orders: Vec<Order> = state.orders.values().cloned().collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        orders.truncate(usize::try_from(limit).unwrap_or(0));
        Ok(orders)
    }

    async fn append_history(&self, buyer: BuyerId, id: OrderId) -> Result<(), RepositoryError> {
        let mut state = self.state.lock().await;
        let history = state.history.entry(buyer).or_default();
        if !history.contains(&id) {
            history.push(id);
        }
        Ok(())
    }

    async fn purge(&self, id: OrderId) -> Result<bool, RepositoryError> {
        let mut state = self.state.lock().await;
        let Some(order) = state.orders.remove(&id) else {
            return Ok(false);
        };
        state.lagging.remove(&id);
        if let Some(history) = state.history.get_mut(&order.buyer_id) {
            history.retain(|entry| *entry != id);
        }
        Ok(true)
    }
}

// =============================================================================
// Carts
// =============================================================================

/// In-memory [`CartRepository`] that counts writes.
#[derive(Default)]
pub struct MemoryCartStore {
    carts: Mutex<HashMap<BuyerId, RawCart>>,
    writes: AtomicUsize,
    failing_writes: AtomicBool,
}

impl MemoryCartStore {
    /// An empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Put a stored cart in place without counting it as a write.
    pub async fn seed(&self, buyer: BuyerId, cart: RawCart) {
        self.carts.lock().await.insert(buyer, cart);
    }

    /// The stored mapping, exactly as persisted.
    pub async fn snapshot(&self, buyer: BuyerId) -> RawCart {
        self.carts
            .lock()
            .await
            .get(&buyer)
            .cloned()
            .unwrap_or_default()
    }

    /// Number of successful `store` calls so far.
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Toggle write failures. Loads keep working.
    pub fn set_failing_writes(&self, failing: bool) {
        self.failing_writes.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl CartRepository for MemoryCartStore {
    async fn load(&self, buyer: BuyerId) -> Result<RawCart, RepositoryError> {
        Ok(self.snapshot(buyer).await)
    }

    async fn store(&self, buyer: BuyerId, cart: &RawCart) -> Result<(), RepositoryError> {
        if self.failing_writes.load(Ordering::SeqCst) {
            return Err(RepositoryError::Database(sqlx::Error::PoolTimedOut));
        }
        self.carts.lock().await.insert(buyer, cart.clone());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// =============================================================================
// Catalog
// =============================================================================

/// In-memory [`Catalog`].
#[derive(Default)]
pub struct MemoryCatalog {
    products: Mutex<HashSet<String>>,
}

impl MemoryCatalog {
    /// A catalog containing the given product references.
    #[must_use]
    pub fn with_products<I, S>(products: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            products: Mutex::new(products.into_iter().map(Into::into).collect()),
        }
    }

    /// Add a product.
    pub async fn add(&self, product: &str) {
        self.products.lock().await.insert(product.to_owned());
    }

    /// Remove a product, as if it had been deleted from the catalog.
    pub async fn remove(&self, product: &str) {
        self.products.lock().await.remove(product);
    }
}

#[async_trait]
impl Catalog for MemoryCatalog {
    async fn exists(&self, product: &ProductRef) -> Result<bool, CatalogError> {
        if !product.is_well_formed() {
            return Err(CatalogError::MalformedReference(product.to_string()));
        }
        Ok(self.products.lock().await.contains(product.as_str()))
    }
}

// =============================================================================
// Notifications
// =============================================================================

/// In-memory notification sink and repository that records deliveries.
#[derive(Default)]
pub struct MemoryNotificationStore {
    delivered: Mutex<Vec<Notification>>,
    failing: AtomicBool,
}

impl MemoryNotificationStore {
    /// A store that accepts every delivery.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that rejects every delivery.
    #[must_use]
    pub fn failing() -> Self {
        let store = Self::default();
        store.set_failing(true);
        store
    }

    /// Toggle delivery failures.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Every notification delivered so far, oldest first.
    ///
    /// Yields first so that deliveries already spawned on the current
    /// runtime land before the read.
    pub async fn delivered(&self) -> Vec<Notification> {
        tokio::task::yield_now().await;
        self.delivered.lock().await.clone()
    }
}

#[async_trait]
impl NotificationSink for MemoryNotificationStore {
    async fn notify(&self, notification: NewNotification) -> Result<(), NotificationError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(NotificationError::Unavailable(
                "delivery disabled".to_owned(),
            ));
        }
        self.delivered
            .lock()
            .await
            .push(Notification::from_new(notification, Utc::now()));
        Ok(())
    }
}

#[async_trait]
impl NotificationRepository for MemoryNotificationStore {
    async fn list_for_buyer(
        &self,
        buyer: BuyerId,
        limit: i64,
    ) -> Result<Vec<Notification>, RepositoryError> {
        let delivered = self.delivered.lock().await;
        Ok(delivered
            .iter()
            .rev()
            .filter(|n| n.buyer_id == buyer)
            .take(usize::try_from(limit).unwrap_or(0))
            .cloned()
            .collect())
    }

    async fn unread_count(&self, buyer: BuyerId) -> Result<i64, RepositoryError> {
        let delivered = self.delivered.lock().await;
        let count = delivered
            .iter()
            .filter(|n| n.buyer_id == buyer && !n.read)
            .count();
        Ok(i64::try_from(count).unwrap_or(i64::MAX))
    }

    async fn mark_all_read(&self, buyer: BuyerId) -> Result<u64, RepositoryError> {
        let mut delivered = self.delivered.lock().await;
        let mut changed = 0;
        for notification in delivered
            .iter_mut()
            .filter(|n| n.buyer_id == buyer && !n.read)
        {
            notification.read = true;
            changed += 1;
        }
        Ok(changed)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use fulfillment_core::{NotificationKind, RawAddress, normalize_address};
    use rust_decimal::Decimal;

    use super::*;

    fn order_for(buyer: BuyerId) -> Order {
        Order::new(
            buyer,
            Vec::new(),
            Decimal::ZERO,
            normalize_address(&RawAddress::default()),
            fulfillment_core::PaymentMethod::CashOnDelivery,
            Utc::now(),
        )
    }

    #[tokio::test]
    async fn test_read_lag_hides_fresh_orders() {
        let store = MemoryOrderStore::with_read_lag(2);
        let buyer = BuyerId::generate();
        let order = order_for(buyer);
        store.insert(&order).await.unwrap();

        assert!(store.find(order.id).await.unwrap().is_none());
        assert!(store.find_for_buyer(order.id, buyer).await.unwrap().is_none());
        assert!(store.find(order.id).await.unwrap().is_some());
        assert_eq!(store.lookups().await, 3);
    }

    #[tokio::test]
    async fn test_purge_removes_history() {
        let store = MemoryOrderStore::new();
        let buyer = BuyerId::generate();
        let order = order_for(buyer);
        store.insert(&order).await.unwrap();
        store.append_history(buyer, order.id).await.unwrap();

        assert!(store.purge(order.id).await.unwrap());
        assert!(store.history(buyer).await.is_empty());
        assert!(!store.purge(order.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_catalog_rejects_malformed_refs() {
        let catalog = MemoryCatalog::with_products(["p1"]);
        assert!(catalog.exists(&ProductRef::new("p1")).await.unwrap());
        assert!(!catalog.exists(&ProductRef::new("p2")).await.unwrap());
        assert!(matches!(
            catalog.exists(&ProductRef::new("bad ref")).await,
            Err(CatalogError::MalformedReference(_))
        ));
    }

    #[tokio::test]
    async fn test_mark_all_read_is_scoped_to_buyer() {
        let store = MemoryNotificationStore::new();
        let alice = BuyerId::generate();
        let bob = BuyerId::generate();
        for buyer in [alice, alice, bob] {
            store
                .notify(NewNotification::new(buyer, NotificationKind::System, "t", "m"))
                .await
                .unwrap();
        }

        assert_eq!(store.mark_all_read(alice).await.unwrap(), 2);
        assert_eq!(store.unread_count(alice).await.unwrap(), 0);
        assert_eq!(store.unread_count(bob).await.unwrap(), 1);
        assert_eq!(store.mark_all_read(alice).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_failing_sink_records_nothing() {
        let store = MemoryNotificationStore::failing();
        let result = store
            .notify(NewNotification::new(
                BuyerId::generate(),
                NotificationKind::Order,
                "t",
                "m",
            ))
            .await;
        assert!(result.is_err());
        assert!(store.delivered().await.is_empty());
    }
}
