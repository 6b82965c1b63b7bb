//! OpenAPI document and Swagger UI schemas.

#![allow(dead_code)] // Path functions are only used by utoipa for documentation generation

use payments_types::domain::{
    GatewayNotification, NotificationOutcome, Order, OrderId, OrderItem, OrderStatus, PaymentId,
    PaymentStatus, Product, ProductId,
};
use payments_types::dto::{
    CreateOrderRequest, CreatePaymentRequest, CreateProductRequest, CurrencyInfo, ErrorResponse,
    NotificationAck, OrderItemRequest, PaymentResponse, PaymentStatusResponse,
    RegionCurrencyResponse, UpdateOrderStatusRequest,
};
use utoipa::OpenApi;

// Dummy functions to generate path documentation
// These are not the actual handlers, just for OpenAPI path generation

/// Health check endpoint
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = 200, description = "Service is healthy", body = inline(serde_json::Value), example = json!({"status": "healthy"}))
    )
)]
async fn health() {}

// ─────────────────────────────────────────────────────────────────────────────
// Catalog
// ─────────────────────────────────────────────────────────────────────────────

/// Add a product to the catalog
#[utoipa::path(
    post,
    path = "/api/products",
    tag = "products",
    request_body = CreateProductRequest,
    responses(
        (status = 201, description = "Product created", body = Product),
        (status = 400, description = "Invalid product", body = ErrorResponse)
    )
)]
async fn create_product() {}

/// List active products
#[utoipa::path(
    get,
    path = "/api/products",
    tag = "products",
    responses(
        (status = 200, description = "Active products", body = Vec<Product>)
    )
)]
async fn list_products() {}

/// Get a product by ID
#[utoipa::path(
    get,
    path = "/api/products/{id}",
    tag = "products",
    params(
        ("id" = ProductId, Path, description = "Product ID")
    ),
    responses(
        (status = 200, description = "Product details", body = Product),
        (status = 404, description = "Product not found", body = ErrorResponse)
    )
)]
async fn get_product() {}

/// Search active products by name
#[utoipa::path(
    get,
    path = "/api/products/search",
    tag = "products",
    params(
        ("q" = String, Query, description = "Case-insensitive name fragment")
    ),
    responses(
        (status = 200, description = "Matching products", body = Vec<Product>),
        (status = 400, description = "Empty query", body = ErrorResponse)
    )
)]
async fn search_products() {}

/// List active products in a category
#[utoipa::path(
    get,
    path = "/api/products/category/{category}",
    tag = "products",
    params(
        ("category" = String, Path, description = "Category name")
    ),
    responses(
        (status = 200, description = "Products in the category", body = Vec<Product>)
    )
)]
async fn products_by_category() {}

// ─────────────────────────────────────────────────────────────────────────────
// Orders
// ─────────────────────────────────────────────────────────────────────────────

/// Place an order (takes stock)
#[utoipa::path(
    post,
    path = "/api/orders",
    tag = "orders",
    request_body = CreateOrderRequest,
    responses(
        (status = 201, description = "Order created", body = Order),
        (status = 400, description = "Invalid order", body = ErrorResponse),
        (status = 404, description = "Unknown product", body = ErrorResponse),
        (status = 409, description = "Insufficient stock", body = ErrorResponse)
    )
)]
async fn create_order() {}

/// Get an order by ID
#[utoipa::path(
    get,
    path = "/api/orders/{id}",
    tag = "orders",
    params(
        ("id" = OrderId, Path, description = "Order ID")
    ),
    responses(
        (status = 200, description = "Order details", body = Order),
        (status = 404, description = "Order not found", body = ErrorResponse)
    )
)]
async fn get_order() {}

/// Cancel an order (returns stock)
#[utoipa::path(
    delete,
    path = "/api/orders/{id}",
    tag = "orders",
    params(
        ("id" = OrderId, Path, description = "Order ID")
    ),
    responses(
        (status = 200, description = "Order cancelled", body = Order),
        (status = 404, description = "Order not found", body = ErrorResponse)
    )
)]
async fn cancel_order() {}

/// Move an order to a new status
#[utoipa::path(
    patch,
    path = "/api/orders/{id}/status",
    tag = "orders",
    request_body = UpdateOrderStatusRequest,
    params(
        ("id" = OrderId, Path, description = "Order ID")
    ),
    responses(
        (status = 200, description = "Order updated", body = Order),
        (status = 404, description = "Order not found", body = ErrorResponse),
        (status = 409, description = "Order is cancelled", body = ErrorResponse)
    )
)]
async fn update_order_status() {}

/// List a customer's orders, newest first
#[utoipa::path(
    get,
    path = "/api/orders/customer/{email}",
    tag = "orders",
    params(
        ("email" = String, Path, description = "Customer email")
    ),
    responses(
        (status = 200, description = "Customer orders", body = Vec<Order>)
    )
)]
async fn orders_by_customer() {}

/// List orders in a status
#[utoipa::path(
    get,
    path = "/api/orders/status/{status}",
    tag = "orders",
    params(
        ("status" = OrderStatus, Path, description = "Order status")
    ),
    responses(
        (status = 200, description = "Orders in the status", body = Vec<Order>),
        (status = 400, description = "Unknown status", body = ErrorResponse)
    )
)]
async fn orders_by_status() {}

// ─────────────────────────────────────────────────────────────────────────────
// Payments
// ─────────────────────────────────────────────────────────────────────────────

/// Open a gateway checkout for an order
#[utoipa::path(
    post,
    path = "/api/payments/create",
    tag = "payments",
    request_body = CreatePaymentRequest,
    responses(
        (status = 200, description = "Checkout created", body = PaymentResponse),
        (status = 404, description = "Order not found", body = ErrorResponse),
        (status = 409, description = "Order already has a payment", body = ErrorResponse),
        (status = 502, description = "Gateway rejected the transaction", body = ErrorResponse),
        (status = 503, description = "Gateway unavailable", body = ErrorResponse)
    )
)]
async fn create_payment() {}

/// Gateway payment notification
#[utoipa::path(
    post,
    path = "/api/payments/notification",
    tag = "payments",
    request_body = GatewayNotification,
    responses(
        (status = 200, description = "Notification processed", body = NotificationAck),
        (status = 401, description = "Invalid signature", body = ErrorResponse),
        (status = 404, description = "Unknown gateway order", body = ErrorResponse),
        (status = 500, description = "Reconciliation failed; safe to retry", body = ErrorResponse)
    )
)]
async fn payment_notification() {}

/// Payment status for an order
#[utoipa::path(
    get,
    path = "/api/payments/order/{order_id}",
    tag = "payments",
    params(
        ("order_id" = OrderId, Path, description = "Order ID")
    ),
    responses(
        (status = 200, description = "Payment details", body = PaymentStatusResponse),
        (status = 404, description = "No payment for the order", body = ErrorResponse)
    )
)]
async fn payment_for_order() {}

// ─────────────────────────────────────────────────────────────────────────────
// Currencies
// ─────────────────────────────────────────────────────────────────────────────

/// Supported display currencies
#[utoipa::path(
    get,
    path = "/api/currencies",
    tag = "currencies",
    responses(
        (status = 200, description = "Currencies with their IDR rate", body = Vec<CurrencyInfo>)
    )
)]
async fn list_currencies() {}

/// Default currency for a region
#[utoipa::path(
    get,
    path = "/api/currencies/region/{region}",
    tag = "currencies",
    params(
        ("region" = String, Path, description = "Two-letter region code", example = "US")
    ),
    responses(
        (status = 200, description = "Region currency", body = RegionCurrencyResponse)
    )
)]
async fn currency_for_region() {}

/// OpenAPI documentation for the storefront API.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Storefront Payments API",
        version = "1.0.0",
        description = "Catalog, orders and hosted-checkout payments settled in IDR.\n\n## Notifications\n\nThe gateway posts payment notifications to `/api/payments/notification`. Each one carries `signature_key = SHA512(order_id + status_code + gross_amount + server_key)`; unsigned or tampered notifications are rejected with 401.",
        license(name = "MIT"),
    ),
    paths(
        health,
        create_product,
        list_products,
        get_product,
        search_products,
        products_by_category,
        create_order,
        get_order,
        cancel_order,
        update_order_status,
        orders_by_customer,
        orders_by_status,
        create_payment,
        payment_notification,
        payment_for_order,
        list_currencies,
        currency_for_region,
    ),
    components(
        schemas(
            Product,
            ProductId,
            CreateProductRequest,
            Order,
            OrderId,
            OrderItem,
            OrderStatus,
            CreateOrderRequest,
            OrderItemRequest,
            UpdateOrderStatusRequest,
            PaymentId,
            PaymentStatus,
            CreatePaymentRequest,
            PaymentResponse,
            PaymentStatusResponse,
            GatewayNotification,
            NotificationAck,
            NotificationOutcome,
            CurrencyInfo,
            RegionCurrencyResponse,
            ErrorResponse,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "products", description = "Product catalog"),
        (name = "orders", description = "Order placement and lifecycle"),
        (name = "payments", description = "Gateway checkout and notifications"),
        (name = "currencies", description = "Display currencies and rates"),
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_lists_payment_routes() {
        let doc = ApiDoc::openapi();
        for path in [
            "/api/payments/create",
            "/api/payments/notification",
            "/api/payments/order/{order_id}",
            "/api/orders/{id}/status",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
    }
}
