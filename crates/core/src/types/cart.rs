//! Cart keys and the sparse cart mapping.
//!
//! A cart maps a composite key to a positive quantity. The key format is
//! `productRef` for products without variants and `productRef#variant`
//! otherwise. All splitting of stored keys goes through [`CartKey`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Separator between the product reference and the variant discriminator.
pub const VARIANT_SEPARATOR: char = '#';

/// The cart as persisted: raw keys to raw JSON quantities.
///
/// Stored carts may contain entries written by older clients or referencing
/// products that have since been removed; [`Cart::from_raw`] is the only
/// way to turn one into a typed cart.
pub type RawCart = serde_json::Map<String, Value>;

/// Opaque reference to a catalog product.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductRef(String);

impl ProductRef {
    /// Maximum accepted length of a product reference.
    pub const MAX_LENGTH: usize = 64;

    /// Wrap a product reference without validating it.
    #[must_use]
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    /// Whether the reference has a shape the catalog can look up:
    /// non-empty, bounded, ASCII alphanumerics plus `-` and `_`.
    #[must_use]
    pub fn is_well_formed(&self) -> bool {
        !self.0.is_empty()
            && self.0.len() <= Self::MAX_LENGTH
            && self
                .0
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    }

    /// Returns the reference as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ProductRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Composite cart key: a product reference and an optional variant
/// (e.g. a size).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CartKey {
    product: ProductRef,
    variant: Option<String>,
}

impl CartKey {
    /// Build a key. Blank variants are treated as absent.
    #[must_use]
    pub fn new(product: ProductRef, variant: Option<&str>) -> Self {
        let variant = variant
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_owned);
        Self { product, variant }
    }

    /// Split a stored key at the first separator.
    ///
    /// The variant is kept verbatim so that `parse(k).to_string() == k`.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        match raw.split_once(VARIANT_SEPARATOR) {
            Some((product, variant)) => Self {
                product: ProductRef::new(product),
                variant: Some(variant.to_owned()),
            },
            None => Self {
                product: ProductRef::new(raw),
                variant: None,
            },
        }
    }

    /// The product-reference portion of the key.
    #[must_use]
    pub const fn product(&self) -> &ProductRef {
        &self.product
    }

    /// The variant discriminator, if any.
    #[must_use]
    pub fn variant(&self) -> Option<&str> {
        self.variant.as_deref()
    }
}

impl std::fmt::Display for CartKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.variant {
            Some(variant) => write!(f, "{}{VARIANT_SEPARATOR}{variant}", self.product),
            None => write!(f, "{}", self.product),
        }
    }
}

/// Quantity of a stored entry, if it is a strictly positive integer.
///
/// Integral floats (`2.0`) are accepted; fractions, zero, negatives and
/// non-numbers are not.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)] // range checked
pub fn stored_quantity(value: &Value) -> Option<u32> {
    let Value::Number(n) = value else {
        return None;
    };
    if let Some(q) = n.as_u64() {
        return u32::try_from(q).ok().filter(|q| *q > 0);
    }
    n.as_f64()
        .filter(|f| f.is_finite() && f.fract() == 0.0 && *f >= 1.0 && *f <= f64::from(u32::MAX))
        .map(|f| f as u32)
}

/// A validated cart: every quantity is a positive integer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cart {
    entries: BTreeMap<CartKey, u32>,
}

impl Cart {
    /// An empty cart.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Typed view of a stored cart. Entries whose quantity is not a positive
    /// integer are returned separately as rejected keys.
    #[must_use]
    pub fn from_raw(raw: &RawCart) -> (Self, Vec<String>) {
        let mut cart = Self::new();
        let mut rejected = Vec::new();
        for (key, value) in raw {
            match stored_quantity(value) {
                Some(quantity) => {
                    cart.entries.insert(CartKey::parse(key), quantity);
                }
                None => rejected.push(key.clone()),
            }
        }
        (cart, rejected)
    }

    /// Serialize back to the stored representation.
    #[must_use]
    pub fn to_raw(&self) -> RawCart {
        self.entries
            .iter()
            .map(|(key, quantity)| (key.to_string(), Value::from(*quantity)))
            .collect()
    }

    /// Quantity stored for a key, if present.
    #[must_use]
    pub fn get(&self, key: &CartKey) -> Option<u32> {
        self.entries.get(key).copied()
    }

    /// Set the quantity for a key.
    pub fn insert(&mut self, key: CartKey, quantity: u32) {
        self.entries.insert(key, quantity);
    }

    /// Remove a key, returning its quantity.
    pub fn remove(&mut self, key: &CartKey) -> Option<u32> {
        self.entries.remove(key)
    }

    /// Keep only entries for which `keep` returns true.
    pub fn retain(&mut self, mut keep: impl FnMut(&CartKey, u32) -> bool) {
        self.entries.retain(|key, quantity| keep(key, *quantity));
    }

    /// Iterate over entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&CartKey, u32)> {
        self.entries.iter().map(|(key, quantity)| (key, *quantity))
    }

    /// Number of distinct entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cart has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sum of all quantities.
    #[must_use]
    pub fn item_count(&self) -> u64 {
        self.entries.values().map(|q| u64::from(*q)).sum()
    }
}

impl Serialize for Cart {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_raw().serialize(serializer)
    }
}
