//! # Payments Hex
//!
//! Application services and HTTP adapter for the storefront payments service.
//!
//! ## Architecture
//!
//! - `service` - Catalog, order and currency orchestration
//! - `reconciler` - Gateway checkout and notification reconciliation
//! - `inbound/` - HTTP adapter (Axum server)
//! - `openapi` - API documentation served by Swagger UI
//!
//! Both services are generic over the repository ports and the reconciler
//! over `G: PaymentGateway`, so adapters are injected at compile time.

pub mod inbound;
pub mod openapi;
pub mod reconciler;
pub mod service;

#[cfg(test)]
mod reconciler_tests;

pub use reconciler::{MAX_ATTEMPTS, PaymentReconciler, Reconciliation, reconcile};
pub use service::CommerceService;
