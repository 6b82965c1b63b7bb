//! Catalog & Order Application Service
//!
//! Orchestrates catalog and order operations through the repository ports.
//! Contains NO infrastructure logic - pure business orchestration.

use std::sync::Arc;

use payments_types::{
    AppError, CreateOrderRequest, CreateProductRequest, CurrencyConverter, CurrencyInfo, Order,
    OrderId, OrderRepository, OrderStatus, Product, ProductId, ProductRepository,
    RegionCurrencyResponse,
};

/// Application service for the catalog, orders and currency lookups.
///
/// Generic over the repository ports - the adapter is injected at compile time.
/// The repository is shared (`Arc`) with the payment reconciler.
pub struct CommerceService<R>
where
    R: ProductRepository + OrderRepository,
{
    repo: Arc<R>,
    converter: CurrencyConverter,
}

impl<R> CommerceService<R>
where
    R: ProductRepository + OrderRepository,
{
    /// Creates a new service over a shared repository.
    pub fn new(repo: Arc<R>, converter: CurrencyConverter) -> Self {
        Self { repo, converter }
    }

    /// Returns a reference to the underlying repository.
    pub fn repo(&self) -> &R {
        &self.repo
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Catalog
    // ─────────────────────────────────────────────────────────────────────────────

    pub async fn create_product(&self, req: CreateProductRequest) -> Result<Product, AppError> {
        req.validate()?;
        self.repo.create_product(req).await.map_err(Into::into)
    }

    pub async fn get_product(&self, id: ProductId) -> Result<Product, AppError> {
        self.repo
            .get_product(id)
            .await
            .map_err(Into::into)
            .and_then(|opt| opt.ok_or_else(|| AppError::NotFound(format!("Product {}", id))))
    }

    pub async fn list_products(&self) -> Result<Vec<Product>, AppError> {
        self.repo.list_active_products().await.map_err(Into::into)
    }

    pub async fn search_products(&self, query: &str) -> Result<Vec<Product>, AppError> {
        if query.trim().is_empty() {
            return Err(AppError::BadRequest("Search query cannot be empty".into()));
        }
        self.repo.search_products(query).await.map_err(Into::into)
    }

    pub async fn products_in_category(&self, category: &str) -> Result<Vec<Product>, AppError> {
        self.repo
            .list_products_by_category(category)
            .await
            .map_err(Into::into)
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Orders
    // ─────────────────────────────────────────────────────────────────────────────

    /// Places an order. The display currency must be one the converter knows,
    /// otherwise the payment amount would silently use a 1:1 rate.
    pub async fn create_order(&self, mut req: CreateOrderRequest) -> Result<Order, AppError> {
        req.validate()?;

        if let Some(code) = req.currency.as_deref().map(str::trim) {
            if code.is_empty() {
                req.currency = None;
            } else if !self.converter.is_supported(code) {
                return Err(AppError::BadRequest(format!(
                    "Unsupported currency: {}",
                    code
                )));
            }
        }

        let order = self.repo.create_order(req).await?;
        tracing::info!(order_id = %order.id, total = %order.total_amount, "Order created");
        Ok(order)
    }

    pub async fn get_order(&self, id: OrderId) -> Result<Order, AppError> {
        self.repo
            .get_order(id)
            .await
            .map_err(Into::into)
            .and_then(|opt| opt.ok_or_else(|| AppError::NotFound(format!("Order {}", id))))
    }

    pub async fn orders_for_customer(&self, email: &str) -> Result<Vec<Order>, AppError> {
        self.repo
            .list_orders_by_customer(email)
            .await
            .map_err(Into::into)
    }

    pub async fn orders_with_status(&self, status: OrderStatus) -> Result<Vec<Order>, AppError> {
        self.repo
            .list_orders_by_status(status)
            .await
            .map_err(Into::into)
    }

    pub async fn update_order_status(
        &self,
        id: OrderId,
        status: OrderStatus,
    ) -> Result<Order, AppError> {
        let order = self.repo.update_order_status(id, status).await?;
        tracing::info!(order_id = %id, status = %status, "Order status updated");
        Ok(order)
    }

    /// Cancels an order, returning its items to stock.
    pub async fn cancel_order(&self, id: OrderId) -> Result<Order, AppError> {
        self.update_order_status(id, OrderStatus::Cancelled).await
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Currencies
    // ─────────────────────────────────────────────────────────────────────────────

    pub fn supported_currencies(&self) -> Vec<CurrencyInfo> {
        payments_types::CurrencyCode::all()
            .iter()
            .filter(|c| self.converter.is_supported(c.code()))
            .map(|c| CurrencyInfo {
                code: c.code().to_string(),
                symbol: c.symbol().to_string(),
                rate_to_idr: self.converter.rate_to_base(c.code()),
            })
            .collect()
    }

    pub fn currency_for_region(&self, region: &str) -> RegionCurrencyResponse {
        RegionCurrencyResponse {
            region: region.trim().to_uppercase(),
            currency: exchange_rates::currency_for_region(region).to_string(),
        }
    }
}
