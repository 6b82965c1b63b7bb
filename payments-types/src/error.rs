//! Error types for the payments service.

use crate::domain::{OrderId, ProductId};

/// Domain-level errors (business rule violations).
#[derive(Debug, thiserror::Error)]
pub enum DomainError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Product not found: {0}")]
    ProductNotFound(ProductId),

    #[error("Product {0} is not available")]
    ProductInactive(ProductId),

    #[error("Insufficient stock for product {product_id}: available {available}, requested {requested}")]
    InsufficientStock {
        product_id: ProductId,
        available: i32,
        requested: i32,
    },

    #[error("Quantity must be positive, got {0}")]
    InvalidQuantity(i32),

    #[error("Order must contain at least one item")]
    EmptyOrder,

    /// Cancelled orders are closed; their stock has been returned.
    #[error("Order {0} is cancelled")]
    OrderCancelled(OrderId),
}

/// Repository-level errors (data access failures).
#[derive(Debug, thiserror::Error)]
pub enum RepoError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Transaction error: {0}")]
    Transaction(String),

    #[error("Entity not found")]
    NotFound,

    /// A uniqueness constraint rejected the write.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// The row changed since it was read.
    #[error("Version conflict: expected version {expected}")]
    VersionConflict { expected: i64 },
}

/// Outbound gateway call failures.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Transport failure or timeout.
    #[error("Payment gateway unavailable: {0}")]
    Unavailable(String),

    /// The gateway answered with a non-2xx status.
    #[error("Payment gateway rejected the request ({status}): {body}")]
    Rejected { status: u16, body: String },

    /// The gateway answered 2xx with a body we cannot use.
    #[error("Unexpected payment gateway response: {0}")]
    Protocol(String),
}

/// Errors from the payment reconciliation workflow.
#[derive(Debug, thiserror::Error)]
pub enum PaymentError {
    #[error("Order not found: {0}")]
    OrderNotFound(OrderId),

    #[error("Payment already exists for order {0}")]
    DuplicatePayment(OrderId),

    #[error("Failed to create payment: {0}")]
    PaymentCreationFailed(#[source] GatewayError),

    #[error("Invalid signature")]
    InvalidSignature,

    #[error("Payment not found for gateway order {0}")]
    PaymentNotFound(String),

    /// Payment and order could not be written together; nothing changed.
    #[error("Failed to reconcile payment {gateway_order_id}: {reason}")]
    PartialReconciliationFailure {
        gateway_order_id: String,
        reason: String,
    },

    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Repository(#[from] RepoError),
}

/// Application-level errors (for HTTP responses).
///
/// Maps cleanly to HTTP status codes.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Bad gateway: {0}")]
    BadGateway(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<DomainError> for AppError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::ProductNotFound(_) => AppError::NotFound(err.to_string()),
            DomainError::InsufficientStock { .. } | DomainError::OrderCancelled(_) => {
                AppError::Conflict(err.to_string())
            }
            DomainError::ValidationError(msg) => AppError::BadRequest(msg),
            e => AppError::BadRequest(e.to_string()),
        }
    }
}

impl From<RepoError> for AppError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::Domain(e) => e.into(),
            RepoError::NotFound => AppError::NotFound("Resource not found".into()),
            RepoError::Database(e) => AppError::Internal(e),
            RepoError::Transaction(e) => AppError::Internal(e),
            RepoError::Conflict(e) => AppError::Conflict(e),
            e @ RepoError::VersionConflict { .. } => AppError::Conflict(e.to_string()),
        }
    }
}

impl From<GatewayError> for AppError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::Unavailable(_) => AppError::ServiceUnavailable(err.to_string()),
            GatewayError::Rejected { .. } | GatewayError::Protocol(_) => {
                AppError::BadGateway(err.to_string())
            }
        }
    }
}

impl From<PaymentError> for AppError {
    fn from(err: PaymentError) -> Self {
        match err {
            PaymentError::OrderNotFound(_) | PaymentError::PaymentNotFound(_) => {
                AppError::NotFound(err.to_string())
            }
            PaymentError::DuplicatePayment(_) => AppError::Conflict(err.to_string()),
            PaymentError::PaymentCreationFailed(e) => e.into(),
            // Never echo which signed field mismatched.
            PaymentError::InvalidSignature => AppError::Unauthorized("Invalid signature".into()),
            PaymentError::PartialReconciliationFailure { .. } => {
                AppError::Internal(err.to_string())
            }
            PaymentError::Domain(e) => e.into(),
            PaymentError::Repository(e) => e.into(),
        }
    }
}
