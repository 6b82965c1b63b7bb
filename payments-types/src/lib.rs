//! # Payments Types
//!
//! Domain types and port traits for the storefront payments service.
//! This crate has ZERO external IO dependencies - only data structures,
//! business rules, webhook signature math, and trait definitions.
//!
//! ## Architecture
//!
//! This crate represents the **innermost core** of the hexagonal architecture:
//! - `domain/` - Pure domain types (Product, Order, Payment, gateway payloads)
//! - `ports/` - Trait definitions that adapters must implement
//! - `dto/` - Data Transfer Objects for API boundaries
//! - `error/` - Domain and application error types
//! - `signature/` - Gateway webhook digest

pub mod domain;
pub mod dto;
pub mod error;
pub mod ports;
pub mod signature;

// Re-export commonly used types
pub use domain::{
    CustomerDetails, GatewayNotification, GatewaySession, GatewayStatus, NotificationOutcome,
    Order, OrderId, OrderItem, OrderStatus, Payment, PaymentId, PaymentStatus, Product, ProductId,
    ServerKey, TransactionRequest,
};
pub use dto::*;
pub use error::{AppError, DomainError, GatewayError, PaymentError, RepoError};
pub use exchange_rates::{CurrencyCode, CurrencyConverter, RateProvider, SETTLEMENT_CURRENCY};
pub use ports::{
    CommerceRepository, OrderRepository, PaymentGateway, PaymentRepository, ProductRepository,
};
