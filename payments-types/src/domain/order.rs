//! Order domain model.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::product::{Product, ProductId};
use crate::error::DomainError;

/// Unique identifier for an Order (assigned by storage).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct OrderId(i64);

impl OrderId {
    /// Wraps a storage-assigned identifier.
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    /// Returns the raw identifier.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for OrderId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.parse()?))
    }
}

/// Fulfilment status of an order.
///
/// The payment core only ever moves an order into `PendingPayment`,
/// `Processing` or `Cancelled`; the rest belong to fulfilment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Created,
    PendingPayment,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Created => "CREATED",
            OrderStatus::PendingPayment => "PENDING_PAYMENT",
            OrderStatus::Processing => "PROCESSING",
            OrderStatus::Shipped => "SHIPPED",
            OrderStatus::Delivered => "DELIVERED",
            OrderStatus::Cancelled => "CANCELLED",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = DomainError;

    /// Accepts `PENDING_PAYMENT`, `pending_payment` and `pending-payment`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().replace('-', "_").as_str() {
            "CREATED" => Ok(OrderStatus::Created),
            "PENDING_PAYMENT" => Ok(OrderStatus::PendingPayment),
            "PROCESSING" => Ok(OrderStatus::Processing),
            "SHIPPED" => Ok(OrderStatus::Shipped),
            "DELIVERED" => Ok(OrderStatus::Delivered),
            "CANCELLED" => Ok(OrderStatus::Cancelled),
            other => Err(DomainError::ValidationError(format!(
                "Unknown order status: {other}"
            ))),
        }
    }
}

/// One line of an order, priced at the time the order was placed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct OrderItem {
    pub product_id: ProductId,
    pub product_name: String,
    pub quantity: i32,
    #[schema(value_type = String, example = "100.00")]
    pub unit_price: Decimal,
    #[schema(value_type = String, example = "200.00")]
    pub subtotal: Decimal,
}

impl OrderItem {
    /// Prices `quantity` units of `product` from the catalog.
    ///
    /// # Validation
    /// - Quantity must be positive
    /// - Product must be active
    /// - Stock must cover the quantity
    pub fn from_product(product: &Product, quantity: i32) -> Result<Self, DomainError> {
        if quantity <= 0 {
            return Err(DomainError::InvalidQuantity(quantity));
        }
        if !product.is_active {
            return Err(DomainError::ProductInactive(product.id));
        }
        if product.stock_quantity < quantity {
            return Err(DomainError::InsufficientStock {
                product_id: product.id,
                available: product.stock_quantity,
                requested: quantity,
            });
        }

        Ok(Self {
            product_id: product.id,
            product_name: product.name.clone(),
            quantity,
            unit_price: product.price,
            subtotal: product.price * Decimal::from(quantity),
        })
    }
}

/// A customer order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Order {
    pub id: OrderId,
    pub customer_name: String,
    pub customer_email: String,
    pub customer_phone: Option<String>,
    pub items: Vec<OrderItem>,
    /// Sum of item subtotals, in `currency`
    #[schema(value_type = String, example = "100.00")]
    pub total_amount: Decimal,
    /// Display currency; absent means the settlement currency
    pub currency: Option<String>,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Sums the subtotals of `items`.
    pub fn total_of(items: &[OrderItem]) -> Decimal {
        items.iter().map(|item| item.subtotal).sum()
    }

    /// The currency the customer sees, falling back to settlement.
    pub fn display_currency(&self) -> &str {
        self.currency
            .as_deref()
            .filter(|c| !c.trim().is_empty())
            .unwrap_or(exchange_rates::SETTLEMENT_CURRENCY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shirt(stock: i32) -> Product {
        Product {
            id: ProductId::new(7),
            name: "Batik Shirt".into(),
            description: None,
            price: Decimal::new(2550, 2),
            category: None,
            image_url: None,
            stock_quantity: stock,
            is_active: true,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_item_subtotal() {
        let item = OrderItem::from_product(&shirt(10), 3).unwrap();
        assert_eq!(item.subtotal, Decimal::new(7650, 2));
        assert_eq!(item.product_name, "Batik Shirt");
    }

    #[test]
    fn test_item_rejects_bad_quantity() {
        let result = OrderItem::from_product(&shirt(10), 0);
        assert!(matches!(result, Err(DomainError::InvalidQuantity(0))));
    }

    #[test]
    fn test_item_rejects_insufficient_stock() {
        let result = OrderItem::from_product(&shirt(2), 3);
        assert!(matches!(
            result,
            Err(DomainError::InsufficientStock {
                available: 2,
                requested: 3,
                ..
            })
        ));
    }

    #[test]
    fn test_item_rejects_inactive_product() {
        let mut product = shirt(5);
        product.is_active = false;
        assert!(matches!(
            OrderItem::from_product(&product, 1),
            Err(DomainError::ProductInactive(_))
        ));
    }

    #[test]
    fn test_total_of_items() {
        let product = shirt(10);
        let items = vec![
            OrderItem::from_product(&product, 1).unwrap(),
            OrderItem::from_product(&product, 2).unwrap(),
        ];
        assert_eq!(Order::total_of(&items), Decimal::new(7650, 2));
    }

    #[test]
    fn test_order_status_parse() {
        assert_eq!(
            "pending-payment".parse::<OrderStatus>().unwrap(),
            OrderStatus::PendingPayment
        );
        assert_eq!(
            "CANCELLED".parse::<OrderStatus>().unwrap(),
            OrderStatus::Cancelled
        );
        assert!("lost".parse::<OrderStatus>().is_err());
    }

    #[test]
    fn test_order_status_serde() {
        let json = serde_json::to_string(&OrderStatus::PendingPayment).unwrap();
        assert_eq!(json, "\"PENDING_PAYMENT\"");
    }
}
