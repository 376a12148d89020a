//! Lenient coercion of monetary amounts and quantities from submitted JSON.
//!
//! Checkout and cart input arrives from browsers as loosely typed JSON: numbers
//! may be strings, quantities may be fractional or negative. These helpers
//! turn such values into the typed amounts stored on orders and carts,
//! falling back to floor defaults instead of failing.

use std::str::FromStr;

use rust_decimal::Decimal;
use serde_json::Value;

/// Read a JSON number or numeric string as `f64`.
fn numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|n| n.is_finite())
}

/// Floor a positive number into a quantity; anything below 1 is `None`.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)] // clamped to u32 range first
fn floor_quantity(n: f64) -> Option<u32> {
    let floored = n.floor();
    (floored >= 1.0).then(|| floored.min(f64::from(u32::MAX)) as u32)
}

/// Coerce a monetary value to a non-negative decimal.
///
/// Missing, malformed and negative values become zero.
///
/// ```rust
/// # use fulfillment_core::coerce_amount;
/// # use rust_decimal::Decimal;
/// assert_eq!(coerce_amount(&serde_json::json!("19.90")), Decimal::new(1990, 2));
/// assert_eq!(coerce_amount(&serde_json::json!(-5)), Decimal::ZERO);
/// assert_eq!(coerce_amount(&serde_json::json!(null)), Decimal::ZERO);
/// ```
#[must_use]
pub fn coerce_amount(value: &Value) -> Decimal {
    let parsed = match value {
        Value::Number(n) => {
            let text = n.to_string();
            Decimal::from_str(&text)
                .or_else(|_| Decimal::from_scientific(&text))
                .ok()
        }
        Value::String(s) => Decimal::from_str(s.trim()).ok(),
        _ => None,
    };

    parsed
        .filter(|d| !d.is_sign_negative())
        .unwrap_or(Decimal::ZERO)
}

/// Coerce a quantity to a positive integer, defaulting to 1.
///
/// Used for line items and for cart additions, where a missing or invalid
/// quantity means "one more".
#[must_use]
pub fn coerce_quantity(value: &Value) -> u32 {
    numeric(value).and_then(floor_quantity).unwrap_or(1)
}

/// Interpret a quantity for the cart `Set` operation.
///
/// Returns `None` when the entry should be removed: zero, negative or
/// non-numeric input.
#[must_use]
pub fn parse_set_quantity(value: &Value) -> Option<u32> {
    numeric(value).and_then(floor_quantity)
}
