//! # Payments Client SDK
//!
//! A typed Rust client for the storefront payments API.

use payments_types::{
    CreateOrderRequest, CreatePaymentRequest, CreateProductRequest, CurrencyInfo,
    GatewayNotification, NotificationAck, Order, OrderId, OrderStatus, PaymentResponse,
    PaymentStatusResponse, Product, ProductId, RegionCurrencyResponse, UpdateOrderStatusRequest,
};
use reqwest::{Client, Method};
use serde::de::DeserializeOwned;

/// Error type for client operations.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ClientError {
    /// HTTP status of an API error, if this is one.
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Storefront API client.
pub struct PaymentsClient {
    base_url: String,
    http: Client,
}

impl PaymentsClient {
    /// Creates a new client.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http: Client::new(),
        }
    }

    /// Checks if the API is healthy.
    pub async fn health(&self) -> Result<bool, ClientError> {
        let resp = self
            .http
            .get(format!("{}/health", self.base_url))
            .send()
            .await?;
        Ok(resp.status().is_success())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Catalog
    // ─────────────────────────────────────────────────────────────────────────

    pub async fn create_product(&self, req: &CreateProductRequest) -> Result<Product, ClientError> {
        self.send(Method::POST, "/api/products", Some(req)).await
    }

    pub async fn get_product(&self, id: ProductId) -> Result<Product, ClientError> {
        self.get(&format!("/api/products/{}", id)).await
    }

    /// Lists active products.
    pub async fn list_products(&self) -> Result<Vec<Product>, ClientError> {
        self.get("/api/products").await
    }

    pub async fn search_products(&self, query: &str) -> Result<Vec<Product>, ClientError> {
        let resp = self
            .http
            .get(format!("{}/api/products/search", self.base_url))
            .query(&[("q", query)])
            .send()
            .await?;
        self.handle_response(resp).await
    }

    pub async fn products_in_category(&self, category: &str) -> Result<Vec<Product>, ClientError> {
        self.get(&format!("/api/products/category/{}", category))
            .await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Orders
    // ─────────────────────────────────────────────────────────────────────────

    pub async fn create_order(&self, req: &CreateOrderRequest) -> Result<Order, ClientError> {
        self.send(Method::POST, "/api/orders", Some(req)).await
    }

    pub async fn get_order(&self, id: OrderId) -> Result<Order, ClientError> {
        self.get(&format!("/api/orders/{}", id)).await
    }

    /// Cancels an order; its stock is returned.
    pub async fn cancel_order(&self, id: OrderId) -> Result<Order, ClientError> {
        self.send::<_, ()>(Method::DELETE, &format!("/api/orders/{}", id), None)
            .await
    }

    pub async fn update_order_status(
        &self,
        id: OrderId,
        status: OrderStatus,
    ) -> Result<Order, ClientError> {
        self.send(
            Method::PATCH,
            &format!("/api/orders/{}/status", id),
            Some(&UpdateOrderStatusRequest { status }),
        )
        .await
    }

    /// Lists a customer's orders, newest first.
    pub async fn orders_for_customer(&self, email: &str) -> Result<Vec<Order>, ClientError> {
        self.get(&format!("/api/orders/customer/{}", email)).await
    }

    pub async fn orders_with_status(&self, status: OrderStatus) -> Result<Vec<Order>, ClientError> {
        self.get(&format!("/api/orders/status/{}", status)).await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Payments
    // ─────────────────────────────────────────────────────────────────────────

    /// Opens a gateway checkout for an order.
    pub async fn create_payment(
        &self,
        req: &CreatePaymentRequest,
    ) -> Result<PaymentResponse, ClientError> {
        self.send(Method::POST, "/api/payments/create", Some(req))
            .await
    }

    pub async fn payment_for_order(
        &self,
        order_id: OrderId,
    ) -> Result<PaymentStatusResponse, ClientError> {
        self.get(&format!("/api/payments/order/{}", order_id)).await
    }

    /// Posts a gateway notification, as the gateway would.
    pub async fn send_notification(
        &self,
        notification: &GatewayNotification,
    ) -> Result<NotificationAck, ClientError> {
        self.send(
            Method::POST,
            "/api/payments/notification",
            Some(notification),
        )
        .await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Currencies
    // ─────────────────────────────────────────────────────────────────────────

    pub async fn currencies(&self) -> Result<Vec<CurrencyInfo>, ClientError> {
        self.get("/api/currencies").await
    }

    pub async fn currency_for_region(
        &self,
        region: &str,
    ) -> Result<RegionCurrencyResponse, ClientError> {
        self.get(&format!("/api/currencies/region/{}", region))
            .await
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        self.send::<_, ()>(Method::GET, path, None).await
    }

    async fn send<T: DeserializeOwned, B: serde::Serialize>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<T, ClientError> {
        let mut req = self
            .http
            .request(method, format!("{}{}", self.base_url, path));
        if let Some(body) = body {
            req = req.json(body);
        }
        let resp = req.send().await?;
        self.handle_response(resp).await
    }

    async fn handle_response<T: DeserializeOwned>(
        &self,
        resp: reqwest::Response,
    ) -> Result<T, ClientError> {
        let status = resp.status();
        if status.is_success() {
            let body = resp.text().await?;
            Ok(serde_json::from_str(&body)?)
        } else {
            let body = resp.text().await.unwrap_or_default();
            let message = serde_json::from_str::<serde_json::Value>(&body)
                .ok()
                .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(String::from))
                .unwrap_or(body);
            Err(ClientError::Api {
                status: status.as_u16(),
                message,
            })
        }
    }
}
