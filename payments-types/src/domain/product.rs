//! Product catalog domain model.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Unique identifier for a Product (assigned by storage).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct ProductId(i64);

impl ProductId {
    /// Wraps a storage-assigned identifier.
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    /// Returns the raw identifier.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for ProductId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for ProductId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.parse()?))
    }
}

/// A catalog entry that can be ordered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub description: Option<String>,
    /// Unit price in the order's display currency
    #[schema(value_type = String, example = "100.00")]
    pub price: Decimal,
    pub category: Option<String>,
    pub image_url: Option<String>,
    pub stock_quantity: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl Product {
    /// Whether `quantity` units can be taken from stock.
    pub fn can_supply(&self, quantity: i32) -> bool {
        self.is_active && quantity > 0 && self.stock_quantity >= quantity
    }
}
