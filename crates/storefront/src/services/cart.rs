//! Cart store: the buyer's pending selections.
//!
//! Mutations work on the stored mapping directly. Reads reconcile the stored
//! mapping against the live catalog and persist the cleaned version, so a
//! cart heals itself when products disappear. A read that finds nothing to
//! drop performs no write, which makes repeated reads idempotent.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tracing::{info, instrument, warn};

use fulfillment_core::{
    BuyerId, Cart, CartKey, ProductRef, VARIANT_SEPARATOR, coerce_quantity, parse_set_quantity,
};

use crate::db::{CartRepository, Catalog};
use crate::error::{AppError, Envelope};

/// A cart as returned to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CartView {
    /// Composite key (`product` or `product#variant`) to quantity.
    pub items: Cart,
    /// Sum of all quantities.
    pub item_count: u64,
}

impl From<Cart> for CartView {
    fn from(items: Cart) -> Self {
        let item_count = items.item_count();
        Self { items, item_count }
    }
}

/// Cart operations for one buyer at a time.
#[derive(Clone)]
pub struct CartService {
    carts: Arc<dyn CartRepository>,
    catalog: Arc<dyn Catalog>,
}

impl CartService {
    /// Create a new cart service.
    #[must_use]
    pub fn new(carts: Arc<dyn CartRepository>, catalog: Arc<dyn Catalog>) -> Self {
        Self { carts, catalog }
    }

    /// Add `quantity` of a product to the cart.
    ///
    /// Invalid or non-positive quantities count as 1.
    #[instrument(skip(self))]
    pub async fn add(
        &self,
        buyer: Option<BuyerId>,
        product: &str,
        variant: Option<&str>,
        quantity: &Value,
    ) -> Envelope<CartView> {
        Envelope::from_result(
            self.try_add(buyer, product, variant, quantity).await,
            "Added to cart",
        )
    }

    /// Overwrite the quantity of a product; zero, negative or non-numeric
    /// quantities remove it.
    #[instrument(skip(self))]
    pub async fn set(
        &self,
        buyer: Option<BuyerId>,
        product: &str,
        variant: Option<&str>,
        quantity: &Value,
    ) -> Envelope<CartView> {
        Envelope::from_result(
            self.try_set(buyer, product, variant, quantity).await,
            "Cart updated",
        )
    }

    /// Empty the cart.
    #[instrument(skip(self))]
    pub async fn clear(&self, buyer: Option<BuyerId>) -> Envelope<CartView> {
        Envelope::from_result(self.try_clear(buyer).await, "Cart cleared")
    }

    /// Read the cart, dropping entries that are no longer valid.
    #[instrument(skip(self))]
    pub async fn read(&self, buyer: Option<BuyerId>) -> Envelope<CartView> {
        Envelope::from_result(self.try_read(buyer).await, "Cart loaded")
    }

    /// Replace the buyer's cart with an empty one.
    pub(crate) async fn clear_for(&self, buyer: BuyerId) -> Result<(), AppError> {
        self.carts.store(buyer, &Cart::new().to_raw()).await?;
        info!(buyer_id = %buyer, "Cart cleared");
        Ok(())
    }

    async fn try_clear(&self, buyer: Option<BuyerId>) -> Result<CartView, AppError> {
        self.clear_for(require_buyer(buyer)?).await?;
        Ok(CartView::from(Cart::new()))
    }

    async fn try_read(&self, buyer: Option<BuyerId>) -> Result<CartView, AppError> {
        let buyer = require_buyer(buyer)?;
        Ok(CartView::from(self.reconcile(buyer).await?))
    }

    async fn try_add(
        &self,
        buyer: Option<BuyerId>,
        product: &str,
        variant: Option<&str>,
        quantity: &Value,
    ) -> Result<CartView, AppError> {
        let buyer = require_buyer(buyer)?;
        let key = cart_key(product, variant)?;
        let quantity = coerce_quantity(quantity);

        let (mut cart, _) = Cart::from_raw(&self.carts.load(buyer).await?);
        let total = cart.get(&key).unwrap_or(0).saturating_add(quantity);
        cart.insert(key, total);
        self.carts.store(buyer, &cart.to_raw()).await?;

        Ok(CartView::from(cart))
    }

    async fn try_set(
        &self,
        buyer: Option<BuyerId>,
        product: &str,
        variant: Option<&str>,
        quantity: &Value,
    ) -> Result<CartView, AppError> {
        let buyer = require_buyer(buyer)?;
        let key = cart_key(product, variant)?;

        let (mut cart, _) = Cart::from_raw(&self.carts.load(buyer).await?);
        match parse_set_quantity(quantity) {
            Some(quantity) => cart.insert(key, quantity),
            None => {
                cart.remove(&key);
            }
        }
        self.carts.store(buyer, &cart.to_raw()).await?;

        Ok(CartView::from(cart))
    }

    /// Drop entries with invalid quantities or unknown products and persist
    /// the result if anything was dropped.
    async fn reconcile(&self, buyer: BuyerId) -> Result<Cart, AppError> {
        let stored = self.carts.load(buyer).await?;
        let (mut cart, invalid) = Cart::from_raw(&stored);
        for key in &invalid {
            warn!(buyer_id = %buyer, key = %key, "Dropping cart entry with invalid quantity");
        }

        let mut known: HashMap<ProductRef, bool> = HashMap::new();
        for (key, _) in cart.iter() {
            let product = key.product();
            if known.contains_key(product) {
                continue;
            }
            let exists = match self.catalog.exists(product).await {
                Ok(exists) => exists,
                Err(e) => {
                    warn!(buyer_id = %buyer, product = %product, error = %e, "Catalog lookup failed");
                    false
                }
            };
            known.insert(product.clone(), exists);
        }

        let before = cart.len();
        cart.retain(|key, _| known.get(key.product()).copied().unwrap_or(false));
        let unavailable = before - cart.len();

        if invalid.is_empty() && unavailable == 0 {
            return Ok(cart);
        }

        info!(
            buyer_id = %buyer,
            invalid = invalid.len(),
            unavailable,
            "Reconciled cart"
        );
        // The cleaned cart is still the right answer if the write-back fails;
        // the next read retries it.
        if let Err(e) = self.carts.store(buyer, &cart.to_raw()).await {
            warn!(buyer_id = %buyer, error = %e, "Failed to persist reconciled cart");
        }
        Ok(cart)
    }
}

fn require_buyer(buyer: Option<BuyerId>) -> Result<BuyerId, AppError> {
    buyer.ok_or_else(|| AppError::rejected("Buyer is not identified"))
}

fn cart_key(product: &str, variant: Option<&str>) -> Result<CartKey, AppError> {
    let product = product.trim();
    if product.is_empty() {
        return Err(AppError::rejected("Product is required"));
    }
    if product.contains(VARIANT_SEPARATOR) {
        return Err(AppError::rejected("Invalid product reference"));
    }
    Ok(CartKey::new(ProductRef::new(product), variant))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use fulfillment_core::RawCart;

    use super::*;
    use crate::db::memory::{MemoryCartStore, MemoryCatalog};
    use crate::error::FailureKind;

    struct Fixture {
        carts: Arc<MemoryCartStore>,
        catalog: Arc<MemoryCatalog>,
        service: CartService,
        buyer: BuyerId,
    }

    fn fixture(products: &[&str]) -> Fixture {
        let carts = Arc::new(MemoryCartStore::new());
        let catalog = Arc::new(MemoryCatalog::with_products(products.iter().copied()));
        let service = CartService::new(carts.clone(), catalog.clone());
        Fixture {
            carts,
            catalog,
            service,
            buyer: BuyerId::generate(),
        }
    }

    fn raw(value: Value) -> RawCart {
        match value {
            Value::Object(map) => map,
            _ => RawCart::new(),
        }
    }

    async fn stored(f: &Fixture) -> RawCart {
        f.carts.snapshot(f.buyer).await
    }

    #[tokio::test]
    async fn test_add_accumulates_quantity() {
        let f = fixture(&["p1"]);
        f.service.add(Some(f.buyer), "p1", None, &json!(2)).await;
        let envelope = f.service.add(Some(f.buyer), "p1", None, &json!(3)).await;

        assert!(envelope.ok);
        assert_eq!(stored(&f).await, raw(json!({"p1": 5})));
        assert_eq!(envelope.payload().unwrap().item_count, 5);
    }

    #[tokio::test]
    async fn test_add_coerces_bad_quantity_to_one() {
        let f = fixture(&["p1"]);
        f.service.add(Some(f.buyer), "p1", Some("M"), &json!(-4)).await;
        f.service.add(Some(f.buyer), "p1", Some("M"), &json!("lots")).await;
        assert_eq!(stored(&f).await, raw(json!({"p1#M": 2})));
    }

    #[tokio::test]
    async fn test_variants_are_separate_entries() {
        let f = fixture(&["p1"]);
        f.service.add(Some(f.buyer), "p1", Some("S"), &json!(1)).await;
        f.service.add(Some(f.buyer), "p1", Some("L"), &json!(1)).await;
        f.service.add(Some(f.buyer), "p1", None, &json!(1)).await;
        assert_eq!(
            stored(&f).await,
            raw(json!({"p1#S": 1, "p1#L": 1, "p1": 1}))
        );
    }

    #[tokio::test]
    async fn test_set_overwrites_and_removes() {
        let f = fixture(&["p1", "p2"]);
        f.service.add(Some(f.buyer), "p1", None, &json!(2)).await;
        f.service.add(Some(f.buyer), "p2", None, &json!(2)).await;

        f.service.set(Some(f.buyer), "p1", None, &json!(7)).await;
        assert_eq!(stored(&f).await, raw(json!({"p1": 7, "p2": 2})));

        for quantity in [json!(0), json!(-1), json!("none")] {
            f.service.add(Some(f.buyer), "p2", None, &json!(1)).await;
            f.service.set(Some(f.buyer), "p2", None, &quantity).await;
            assert!(!stored(&f).await.contains_key("p2"));
        }
    }

    #[tokio::test]
    async fn test_clear_empties_cart() {
        let f = fixture(&["p1"]);
        f.service.add(Some(f.buyer), "p1", None, &json!(2)).await;
        let envelope = f.service.clear(Some(f.buyer)).await;
        assert!(envelope.ok);
        assert!(stored(&f).await.is_empty());
    }

    #[tokio::test]
    async fn test_read_drops_removed_products_once() {
        let f = fixture(&["p1", "p2"]);
        f.carts
            .seed(f.buyer, raw(json!({"p1": 1, "p2#XL": 2})))
            .await;
        f.catalog.remove("p2").await;

        let first = f.service.read(Some(f.buyer)).await;
        assert_eq!(
            serde_json::to_value(&first.payload().unwrap().items).unwrap(),
            json!({"p1": 1})
        );
        assert_eq!(f.carts.writes(), 1);

        let second = f.service.read(Some(f.buyer)).await;
        assert_eq!(first.payload(), second.payload());
        assert_eq!(f.carts.writes(), 1);
    }

    #[tokio::test]
    async fn test_read_drops_invalid_quantities_and_malformed_refs() {
        let f = fixture(&["p1"]);
        f.carts
            .seed(
                f.buyer,
                raw(json!({"p1": 2, "p1#S": 0, "p1#M": 1.5, "bad ref": 1, "p1#L": "3"})),
            )
            .await;

        let envelope = f.service.read(Some(f.buyer)).await;
        assert_eq!(envelope.payload().unwrap().item_count, 2);
        assert_eq!(stored(&f).await, raw(json!({"p1": 2})));
        assert_eq!(f.carts.writes(), 1);
    }

    #[tokio::test]
    async fn test_clean_read_does_not_write() {
        let f = fixture(&["p1"]);
        f.carts.seed(f.buyer, raw(json!({"p1#M": 3}))).await;

        let envelope = f.service.read(Some(f.buyer)).await;
        assert_eq!(envelope.payload().unwrap().item_count, 3);
        assert_eq!(f.carts.writes(), 0);
    }

    #[tokio::test]
    async fn test_failed_write_back_still_returns_cleaned_cart() {
        let f = fixture(&["p1"]);
        f.carts.seed(f.buyer, raw(json!({"p1": 2, "gone": 1}))).await;
        f.carts.set_failing_writes(true);

        let envelope = f.service.read(Some(f.buyer)).await;
        assert!(envelope.ok);
        assert_eq!(
            serde_json::to_value(&envelope.payload().unwrap().items).unwrap(),
            json!({"p1": 2})
        );
        assert_eq!(stored(&f).await, raw(json!({"p1": 2, "gone": 1})));
        assert_eq!(f.carts.writes(), 0);

        f.carts.set_failing_writes(false);
        f.service.read(Some(f.buyer)).await;
        assert_eq!(stored(&f).await, raw(json!({"p1": 2})));
        assert_eq!(f.carts.writes(), 1);
    }

    #[tokio::test]
    async fn test_missing_buyer_and_product_are_rejected() {
        let f = fixture(&["p1"]);
        let envelope = f.service.read(None).await;
        assert_eq!(envelope.error_kind(), Some(FailureKind::Rejected));

        let envelope = f.service.add(Some(f.buyer), "  ", None, &json!(1)).await;
        assert_eq!(envelope.error_kind(), Some(FailureKind::Rejected));

        let envelope = f.service.add(Some(f.buyer), "p1#M", None, &json!(1)).await;
        assert_eq!(envelope.error_kind(), Some(FailureKind::Rejected));
        assert_eq!(f.carts.writes(), 0);
    }
}
