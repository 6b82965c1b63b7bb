//! Data Transfer Objects (DTOs) for requests and responses.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::{OrderId, OrderStatus, Payment, PaymentId, PaymentStatus, ProductId};
use crate::error::DomainError;

// ─────────────────────────────────────────────────────────────────────────────
// Catalog DTOs
// ─────────────────────────────────────────────────────────────────────────────

/// Request to add a product to the catalog.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreateProductRequest {
    #[schema(example = "Batik Shirt")]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[schema(value_type = String, example = "250000")]
    pub price: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[schema(example = 10)]
    pub stock_quantity: i32,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

impl CreateProductRequest {
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.name.trim().is_empty() {
            return Err(DomainError::ValidationError(
                "Product name cannot be empty".into(),
            ));
        }
        if self.price.is_sign_negative() {
            return Err(DomainError::ValidationError(
                "Product price cannot be negative".into(),
            ));
        }
        if self.stock_quantity < 0 {
            return Err(DomainError::ValidationError(
                "Stock quantity cannot be negative".into(),
            ));
        }
        Ok(())
    }
}

/// Query string for product search.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProductSearchQuery {
    /// Case-insensitive name fragment
    pub q: String,
}

// ─────────────────────────────────────────────────────────────────────────────
// Order DTOs
// ─────────────────────────────────────────────────────────────────────────────

/// One requested line of a new order.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OrderItemRequest {
    pub product_id: ProductId,
    #[schema(example = 1)]
    pub quantity: i32,
}

/// Request to place an order. Prices come from the catalog.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreateOrderRequest {
    #[schema(example = "Siti Rahma")]
    pub customer_name: String,
    #[schema(example = "siti@example.com")]
    pub customer_email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_phone: Option<String>,
    /// Display currency; omitted means IDR
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(example = "USD")]
    pub currency: Option<String>,
    pub items: Vec<OrderItemRequest>,
}

impl CreateOrderRequest {
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.customer_name.trim().is_empty() {
            return Err(DomainError::ValidationError(
                "Customer name cannot be empty".into(),
            ));
        }
        if !self.customer_email.contains('@') {
            return Err(DomainError::ValidationError(
                "Customer email is invalid".into(),
            ));
        }
        if self.items.is_empty() {
            return Err(DomainError::EmptyOrder);
        }
        if let Some(item) = self.items.iter().find(|i| i.quantity <= 0) {
            return Err(DomainError::InvalidQuantity(item.quantity));
        }
        Ok(())
    }
}

/// Request to move an order to a new status.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UpdateOrderStatusRequest {
    pub status: OrderStatus,
}

// ─────────────────────────────────────────────────────────────────────────────
// Payment DTOs
// ─────────────────────────────────────────────────────────────────────────────

/// Request to open a gateway checkout for an order.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreatePaymentRequest {
    pub order_id: OrderId,
    /// Falls back to the order's customer name when blank
    #[serde(default)]
    #[schema(example = "Siti Rahma")]
    pub customer_name: String,
    #[serde(default)]
    #[schema(example = "siti@example.com")]
    pub customer_email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_phone: Option<String>,
}

/// Response after creating a payment.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PaymentResponse {
    pub payment_id: PaymentId,
    pub order_id: OrderId,
    #[schema(example = "ORDER-12-1718000000000-9f1c2a3b4d5e6f70")]
    pub gateway_order_id: String,
    /// Checkout session token
    pub token: String,
    pub redirect_url: String,
    /// Amount in the display currency
    #[schema(value_type = String, example = "100.00")]
    pub amount: Decimal,
    #[schema(example = "USD")]
    pub currency: String,
    pub status: PaymentStatus,
    #[schema(example = "Payment created successfully")]
    pub message: String,
}

/// Payment state as reported for an order.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PaymentStatusResponse {
    pub payment_id: PaymentId,
    pub order_id: OrderId,
    /// Amount in the settlement currency
    #[schema(value_type = String, example = "1600000.00")]
    pub amount: Decimal,
    #[schema(example = "IDR")]
    pub currency: String,
    pub status: PaymentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_method: Option<String>,
    pub transaction_id: String,
    pub created_at: DateTime<Utc>,
}

impl From<&Payment> for PaymentStatusResponse {
    fn from(payment: &Payment) -> Self {
        Self {
            payment_id: payment.id,
            order_id: payment.order_id,
            amount: payment.amount,
            currency: payment.currency.clone(),
            status: payment.status,
            payment_method: payment.payment_type.clone(),
            transaction_id: payment.transaction_id.clone(),
            created_at: payment.created_at,
        }
    }
}

/// Acknowledgement returned to the gateway for every accepted notification.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct NotificationAck {
    #[schema(example = "success")]
    pub status: String,
    #[schema(example = "Notification processed")]
    pub message: String,
}

impl NotificationAck {
    pub fn processed() -> Self {
        Self {
            status: "success".into(),
            message: "Notification processed".into(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Currency DTOs
// ─────────────────────────────────────────────────────────────────────────────

/// A supported display currency.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CurrencyInfo {
    #[schema(example = "USD")]
    pub code: String,
    #[schema(example = "$")]
    pub symbol: String,
    /// Units of IDR per one unit of this currency
    #[schema(value_type = String, example = "16000")]
    pub rate_to_idr: Decimal,
}

/// Default currency for a region.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RegionCurrencyResponse {
    #[schema(example = "US")]
    pub region: String,
    #[schema(example = "USD")]
    pub currency: String,
}

/// Error body returned by every endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    /// HTTP status code
    #[schema(example = 404)]
    pub code: u16,
}
