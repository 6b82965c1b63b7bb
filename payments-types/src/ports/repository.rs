//! Repository port traits.
//!
//! These are the primary ports in our hexagonal architecture.
//! Adapters (SQLite, Postgres, in-memory mocks) implement them.

use crate::domain::{Order, OrderId, OrderStatus, Payment, Product, ProductId};
use crate::dto::{CreateOrderRequest, CreateProductRequest};
use crate::error::RepoError;

/// Catalog storage.
#[async_trait::async_trait]
pub trait ProductRepository: Send + Sync + 'static {
    async fn create_product(&self, req: CreateProductRequest) -> Result<Product, RepoError>;

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>, RepoError>;

    /// Lists products with `is_active` set.
    async fn list_active_products(&self) -> Result<Vec<Product>, RepoError>;

    /// Case-insensitive substring match on the product name.
    async fn search_products(&self, name: &str) -> Result<Vec<Product>, RepoError>;

    async fn list_products_by_category(&self, category: &str) -> Result<Vec<Product>, RepoError>;
}

/// Order storage.
///
/// Stock is owned here: creating an order takes stock, entering `Cancelled`
/// gives it back exactly once.
#[async_trait::async_trait]
pub trait OrderRepository: Send + Sync + 'static {
    // ─────────────────────────────────────────────────────────────────────────────
    // Order Operations (MUST be atomic)
    // ─────────────────────────────────────────────────────────────────────────────

    /// Prices the items from the catalog, decrements stock and stores the order
    /// in `Created`.
    async fn create_order(&self, req: CreateOrderRequest) -> Result<Order, RepoError>;

    /// Sets the order status, restoring stock when it enters `Cancelled`.
    async fn update_order_status(
        &self,
        id: OrderId,
        status: OrderStatus,
    ) -> Result<Order, RepoError>;

    // ─────────────────────────────────────────────────────────────────────────────
    // Queries
    // ─────────────────────────────────────────────────────────────────────────────

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>, RepoError>;

    /// Newest first.
    async fn list_orders_by_customer(&self, email: &str) -> Result<Vec<Order>, RepoError>;

    async fn list_orders_by_status(&self, status: OrderStatus) -> Result<Vec<Order>, RepoError>;
}

/// Payment storage.
///
/// Every write that touches a payment also writes the owning order's status
/// in the same storage transaction.
#[async_trait::async_trait]
pub trait PaymentRepository: Send + Sync + 'static {
    /// Inserts a new payment and moves its order to `PendingPayment`.
    ///
    /// Returns `RepoError::Conflict` when the order already has a payment.
    async fn create_payment(&self, payment: &Payment) -> Result<Payment, RepoError>;

    /// Persists the notification-driven state of `payment`.
    ///
    /// The write only happens if the stored version still equals
    /// `payment.version`; otherwise `RepoError::VersionConflict`. When
    /// `order_status` is set the order is moved in the same transaction.
    /// Returns the payment with its new version.
    async fn save_reconciliation(
        &self,
        payment: &Payment,
        order_status: Option<OrderStatus>,
    ) -> Result<Payment, RepoError>;

    async fn find_payment_by_order(&self, order_id: OrderId) -> Result<Option<Payment>, RepoError>;

    async fn find_payment_by_gateway_order_id(
        &self,
        gateway_order_id: &str,
    ) -> Result<Option<Payment>, RepoError>;
}

/// Everything the HTTP adapter needs from storage.
pub trait CommerceRepository: ProductRepository + OrderRepository + PaymentRepository {}

impl<T> CommerceRepository for T where T: ProductRepository + OrderRepository + PaymentRepository {}
