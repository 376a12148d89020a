//! Shipping address normalization.
//!
//! Checkout clients send whatever address fields they collected. Orders must
//! carry a complete address, so [`normalize_address`] fills every gap with a
//! default instead of rejecting the checkout. It never fails.

use serde::{Deserialize, Serialize};

/// Last name used when a combined name has a single token.
pub const LAST_NAME_PLACEHOLDER: &str = ".";
/// First name used when no name was given at all.
pub const FIRST_NAME_PLACEHOLDER: &str = "Customer";
/// Value for free-text fields the buyer left empty.
pub const FIELD_PLACEHOLDER: &str = "N/A";
/// Region used when neither state, province nor city was given.
pub const DEFAULT_STATE: &str = "VN";
pub const DEFAULT_POSTAL_CODE: &str = "70000";
pub const DEFAULT_PHONE: &str = "0000000000";

/// Address fields as submitted. Any field may be missing or blank.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawAddress {
    /// Combined display name, e.g. `"Jane Doe"`.
    #[serde(alias = "fullName", alias = "full_name")]
    pub name: Option<String>,
    #[serde(alias = "firstName")]
    pub first_name: Option<String>,
    #[serde(alias = "lastName")]
    pub last_name: Option<String>,
    pub email: Option<String>,
    #[serde(alias = "address")]
    pub street: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub province: Option<String>,
    #[serde(alias = "postalCode", alias = "zip", alias = "zipCode")]
    pub postal_code: Option<String>,
    pub country: Option<String>,
    pub phone: Option<String>,
}

/// A complete shipping address. Every field is non-empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingAddress {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub street: String,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub country: String,
    pub phone: String,
}

fn present(field: Option<&String>) -> Option<&str> {
    field.map(|s| s.trim()).filter(|s| !s.is_empty())
}

/// Split a combined name: the last whitespace-delimited token is the last
/// name, everything before it the first name.
fn split_name(full: &str) -> (String, String) {
    let tokens: Vec<&str> = full.split_whitespace().collect();
    match tokens.split_last() {
        Some((last, rest)) if !rest.is_empty() => (rest.join(" "), (*last).to_owned()),
        Some((only, _)) => ((*only).to_owned(), LAST_NAME_PLACEHOLDER.to_owned()),
        None => (
            FIRST_NAME_PLACEHOLDER.to_owned(),
            LAST_NAME_PLACEHOLDER.to_owned(),
        ),
    }
}

/// Derive a complete [`ShippingAddress`] from partial input.
///
/// ```rust
/// # use fulfillment_core::{RawAddress, normalize_address};
/// let raw = RawAddress {
///     name: Some("Jane Doe".into()),
///     ..RawAddress::default()
/// };
/// let address = normalize_address(&raw);
/// assert_eq!(address.first_name, "Jane");
/// assert_eq!(address.last_name, "Doe");
/// assert_eq!(address.postal_code, "70000");
/// ```
#[must_use]
pub fn normalize_address(raw: &RawAddress) -> ShippingAddress {
    let first = present(raw.first_name.as_ref());
    let last = present(raw.last_name.as_ref());

    let (first_name, last_name) = match (first, last) {
        (None, None) => split_name(present(raw.name.as_ref()).unwrap_or_default()),
        (first, last) => (
            first.unwrap_or(FIRST_NAME_PLACEHOLDER).to_owned(),
            last.unwrap_or(LAST_NAME_PLACEHOLDER).to_owned(),
        ),
    };

    let state = present(raw.state.as_ref())
        .or_else(|| present(raw.province.as_ref()))
        .or_else(|| present(raw.city.as_ref()))
        .unwrap_or(DEFAULT_STATE);

    let or_placeholder =
        |field: Option<&String>| present(field).unwrap_or(FIELD_PLACEHOLDER).to_owned();

    ShippingAddress {
        first_name,
        last_name,
        email: or_placeholder(raw.email.as_ref()),
        street: or_placeholder(raw.street.as_ref()),
        city: or_placeholder(raw.city.as_ref()),
        state: state.to_owned(),
        postal_code: present(raw.postal_code.as_ref())
            .unwrap_or(DEFAULT_POSTAL_CODE)
            .to_owned(),
        country: or_placeholder(raw.country.as_ref()),
        phone: present(raw.phone.as_ref())
            .unwrap_or(DEFAULT_PHONE)
            .to_owned(),
    }
}
