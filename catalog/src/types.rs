//! Domain types for the catalog and cart.
//!
//! Backends are loose about numbers: `price` and `quantity` may arrive as JSON
//! numbers, as numeric text, as `null`, or not at all. Decoding is total, see
//! [`coerce`].

use crate::error::DraftError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use uuid::Uuid;

// ============================================================================
// Identifiers
// ============================================================================

/// Identifier of a product, shared by the catalog and the cart
///
/// Assigned client-side from the creation timestamp in milliseconds.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct ProductId(String);

impl ProductId {
    /// Wraps an existing id
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Id for a product created at `millis` since the Unix epoch
    #[must_use]
    pub fn from_millis(millis: i64) -> Self {
        Self(millis.to_string())
    }

    /// Id derived from a creation timestamp
    #[must_use]
    pub fn from_timestamp(at: DateTime<Utc>) -> Self {
        Self::from_millis(at.timestamp_millis())
    }

    /// The id as text
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProductId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ProductId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

// Some backends hand ids back as numbers.
impl<'de> Deserialize<'de> for ProductId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        match serde_json::Value::deserialize(deserializer)? {
            serde_json::Value::String(id) => Ok(Self(id)),
            serde_json::Value::Number(id) => Ok(Self(id.to_string())),
            other => Err(serde::de::Error::custom(format!(
                "expected a string or numeric id, found {other}"
            ))),
        }
    }
}

/// Correlates a command with the settlement it produces
///
/// Every backend command carries a fresh one and its fulfilled or rejected
/// settlement echoes it, so a caller waiting on the broadcast can tell its
/// own outcome from a concurrent request of the same kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RequestId(Uuid);

impl RequestId {
    /// Creates a new random `RequestId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Get the inner UUID
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Products
// ============================================================================

/// A catalog product
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Product {
    /// Product id
    pub id: ProductId,
    /// Display name
    #[serde(default)]
    pub name: String,
    /// Unit price
    #[serde(default, deserialize_with = "coerce::price")]
    pub price: f64,
    /// Data URI or URL of the product image
    #[serde(default)]
    pub image: String,
    /// Free-form description
    #[serde(default)]
    pub description: String,
    /// Quantity carried by the record
    #[serde(default, deserialize_with = "coerce::quantity")]
    pub quantity: u32,
}

/// A product as entered by the user, before it has an id
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductDraft {
    /// Display name
    pub name: String,
    /// Unit price
    pub price: f64,
    /// Data URI or URL of the product image
    pub image: String,
    /// Free-form description
    pub description: String,
    /// Quantity in stock
    pub quantity: u32,
}

impl ProductDraft {
    /// Checks the draft can be submitted
    ///
    /// # Errors
    ///
    /// Returns [`DraftError`] if the name is blank, the price is negative or
    /// not finite, or there is no image.
    pub fn validate(&self) -> Result<(), DraftError> {
        if self.name.trim().is_empty() {
            return Err(DraftError::BlankName);
        }
        if !self.price.is_finite() || self.price < 0.0 {
            return Err(DraftError::InvalidPrice(self.price));
        }
        if self.image.trim().is_empty() {
            return Err(DraftError::MissingImage);
        }
        Ok(())
    }

    /// Turns the draft into a product with the given id
    #[must_use]
    pub fn into_product(self, id: ProductId) -> Product {
        Product {
            id,
            name: self.name.trim().to_string(),
            price: self.price,
            image: self.image,
            description: self.description,
            quantity: self.quantity,
        }
    }
}

// ============================================================================
// Cart
// ============================================================================

/// One cart line: a product and how many of it are in the cart
///
/// On the wire a cart line is the flat product object whose `quantity` holds
/// the cart quantity.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(from = "Product", into = "Product")]
pub struct CartItem {
    /// The product in the cart
    pub product: Product,
    /// Number of units in the cart
    pub quantity: u32,
}

impl CartItem {
    /// New cart line
    #[must_use]
    pub const fn new(product: Product, quantity: u32) -> Self {
        Self { product, quantity }
    }

    /// Id of the product on this line
    #[must_use]
    pub const fn id(&self) -> &ProductId {
        &self.product.id
    }

    /// The same line with another quantity
    #[must_use]
    pub fn with_quantity(&self, quantity: u32) -> Self {
        Self {
            product: self.product.clone(),
            quantity,
        }
    }

    /// `price × quantity`
    #[must_use]
    pub fn line_total(&self) -> f64 {
        self.product.price * f64::from(self.quantity)
    }
}

impl From<Product> for CartItem {
    fn from(product: Product) -> Self {
        let quantity = product.quantity;
        Self { product, quantity }
    }
}

impl From<CartItem> for Product {
    fn from(item: CartItem) -> Self {
        Self {
            quantity: item.quantity,
            ..item.product
        }
    }
}

// ============================================================================
// Coercion
// ============================================================================

/// Total numeric decoding for backend fields
///
/// Numbers pass through, numeric text is parsed with surrounding whitespace
/// ignored, and anything else (`null`, missing, malformed, non-finite) is `0`.
pub mod coerce {
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    /// Coerce a JSON value to a finite number
    #[must_use]
    pub fn number(value: &Value) -> f64 {
        let parsed = match value {
            Value::Number(number) => number.as_f64(),
            Value::String(text) => text.trim().parse::<f64>().ok(),
            _ => None,
        };
        parsed.filter(|n| n.is_finite()).unwrap_or(0.0)
    }

    /// Coerce a JSON value to a non-negative whole quantity
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)] // clamped first
    pub fn count(value: &Value) -> u32 {
        let n = number(value).trunc();
        if n <= 0.0 {
            0
        } else if n >= f64::from(u32::MAX) {
            u32::MAX
        } else {
            n as u32
        }
    }

    /// `deserialize_with` adapter for prices
    ///
    /// # Errors
    ///
    /// Only fails if the input is not valid JSON at all.
    pub fn price<'de, D>(deserializer: D) -> Result<f64, D::Error>
    where
        D: Deserializer<'de>,
    {
        Value::deserialize(deserializer).map(|value| number(&value))
    }

    /// `deserialize_with` adapter for quantities
    ///
    /// # Errors
    ///
    /// Only fails if the input is not valid JSON at all.
    pub fn quantity<'de, D>(deserializer: D) -> Result<u32, D::Error>
    where
        D: Deserializer<'de>,
    {
        Value::deserialize(deserializer).map(|value| count(&value))
    }
}
