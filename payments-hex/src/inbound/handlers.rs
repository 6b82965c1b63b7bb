//! HTTP request handlers.

use std::sync::Arc;

use axum::{
    Json,
    extract::{FromRequest, Path, Query, State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};

use payments_types::{
    AppError, CommerceRepository, CreateOrderRequest, CreatePaymentRequest, CreateProductRequest,
    DomainError, ErrorResponse, GatewayNotification, NotificationAck, OrderId, OrderStatus,
    PaymentError, PaymentGateway, ProductId, ProductSearchQuery, UpdateOrderStatusRequest,
};

use crate::{CommerceService, PaymentReconciler};

/// Application state shared across handlers.
pub struct AppState<R: CommerceRepository, G: PaymentGateway> {
    pub commerce: CommerceService<R>,
    pub payments: PaymentReconciler<R, G>,
}

type SharedState<R, G> = State<Arc<AppState<R, G>>>;

/// Wrapper to implement IntoResponse for AppError (orphan rule workaround).
pub struct ApiError(pub AppError);

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        ApiError(err)
    }
}

impl From<PaymentError> for ApiError {
    fn from(err: PaymentError) -> Self {
        ApiError(err.into())
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        ApiError(err.into())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError(AppError::BadRequest(rejection.body_text()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self.0 {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            AppError::BadGateway(msg) => (StatusCode::BAD_GATEWAY, msg),
            AppError::ServiceUnavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
            AppError::Internal(msg) => {
                tracing::error!(error = %msg, "Request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };

        let body = ErrorResponse {
            error: message,
            code: status.as_u16(),
        };

        (status, Json(body)).into_response()
    }
}

/// `Json` extractor whose rejections use the API error body.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

fn parse_product_id(raw: &str) -> Result<ProductId, ApiError> {
    raw.parse()
        .map_err(|_| AppError::BadRequest("Invalid product ID".into()).into())
}

fn parse_order_id(raw: &str) -> Result<OrderId, ApiError> {
    raw.parse()
        .map_err(|_| AppError::BadRequest("Invalid order ID".into()).into())
}

/// Health check endpoint.
pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "healthy" }))
}

// ─────────────────────────────────────────────────────────────────────────────
// Catalog
// ─────────────────────────────────────────────────────────────────────────────

#[tracing::instrument(skip(state, req), fields(name = %req.name))]
pub async fn create_product<R: CommerceRepository, G: PaymentGateway>(
    State(state): SharedState<R, G>,
    ApiJson(req): ApiJson<CreateProductRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let product = state.commerce.create_product(req).await?;
    Ok((StatusCode::CREATED, Json(product)))
}

#[tracing::instrument(skip(state))]
pub async fn list_products<R: CommerceRepository, G: PaymentGateway>(
    State(state): SharedState<R, G>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.commerce.list_products().await?))
}

#[tracing::instrument(skip(state), fields(product_id = %id))]
pub async fn get_product<R: CommerceRepository, G: PaymentGateway>(
    State(state): SharedState<R, G>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let product = state.commerce.get_product(parse_product_id(&id)?).await?;
    Ok(Json(product))
}

#[tracing::instrument(skip(state, query), fields(q = %query.q))]
pub async fn search_products<R: CommerceRepository, G: PaymentGateway>(
    State(state): SharedState<R, G>,
    Query(query): Query<ProductSearchQuery>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.commerce.search_products(&query.q).await?))
}

#[tracing::instrument(skip(state))]
pub async fn products_by_category<R: CommerceRepository, G: PaymentGateway>(
    State(state): SharedState<R, G>,
    Path(category): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.commerce.products_in_category(&category).await?))
}

// ─────────────────────────────────────────────────────────────────────────────
// Orders
// ─────────────────────────────────────────────────────────────────────────────

#[tracing::instrument(skip(state, req), fields(items = req.items.len()))]
pub async fn create_order<R: CommerceRepository, G: PaymentGateway>(
    State(state): SharedState<R, G>,
    ApiJson(req): ApiJson<CreateOrderRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let order = state.commerce.create_order(req).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

#[tracing::instrument(skip(state), fields(order_id = %id))]
pub async fn get_order<R: CommerceRepository, G: PaymentGateway>(
    State(state): SharedState<R, G>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.commerce.get_order(parse_order_id(&id)?).await?))
}

#[tracing::instrument(skip(state), fields(order_id = %id))]
pub async fn cancel_order<R: CommerceRepository, G: PaymentGateway>(
    State(state): SharedState<R, G>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.commerce.cancel_order(parse_order_id(&id)?).await?))
}

#[tracing::instrument(skip(state, req), fields(order_id = %id, status = %req.status))]
pub async fn update_order_status<R: CommerceRepository, G: PaymentGateway>(
    State(state): SharedState<R, G>,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<UpdateOrderStatusRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let order = state
        .commerce
        .update_order_status(parse_order_id(&id)?, req.status)
        .await?;
    Ok(Json(order))
}

// Customer email is PII; keep it out of spans.
#[tracing::instrument(skip(state, email))]
pub async fn orders_by_customer<R: CommerceRepository, G: PaymentGateway>(
    State(state): SharedState<R, G>,
    Path(email): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.commerce.orders_for_customer(&email).await?))
}

#[tracing::instrument(skip(state))]
pub async fn orders_by_status<R: CommerceRepository, G: PaymentGateway>(
    State(state): SharedState<R, G>,
    Path(status): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let status: OrderStatus = status.parse()?;
    Ok(Json(state.commerce.orders_with_status(status).await?))
}

// ─────────────────────────────────────────────────────────────────────────────
// Payments
// ─────────────────────────────────────────────────────────────────────────────

#[tracing::instrument(skip(state, req), fields(order_id = %req.order_id))]
pub async fn create_payment<R: CommerceRepository, G: PaymentGateway>(
    State(state): SharedState<R, G>,
    ApiJson(req): ApiJson<CreatePaymentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.payments.create_payment(req).await?))
}

/// Gateway callback. Every verified notification is acknowledged with 200,
/// including stale and unrecognized ones, so the gateway stops retrying.
#[tracing::instrument(skip(state, notification))]
pub async fn payment_notification<R: CommerceRepository, G: PaymentGateway>(
    State(state): SharedState<R, G>,
    ApiJson(notification): ApiJson<GatewayNotification>,
) -> Result<impl IntoResponse, ApiError> {
    state.payments.handle_notification(&notification).await?;
    Ok(Json(NotificationAck::processed()))
}

#[tracing::instrument(skip(state), fields(order_id = %order_id))]
pub async fn payment_for_order<R: CommerceRepository, G: PaymentGateway>(
    State(state): SharedState<R, G>,
    Path(order_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let order_id = parse_order_id(&order_id)?;
    Ok(Json(state.payments.payment_for_order(order_id).await?))
}

// ─────────────────────────────────────────────────────────────────────────────
// Currencies
// ─────────────────────────────────────────────────────────────────────────────

pub async fn list_currencies<R: CommerceRepository, G: PaymentGateway>(
    State(state): SharedState<R, G>,
) -> impl IntoResponse {
    Json(state.commerce.supported_currencies())
}

pub async fn currency_for_region<R: CommerceRepository, G: PaymentGateway>(
    State(state): SharedState<R, G>,
    Path(region): Path<String>,
) -> impl IntoResponse {
    Json(state.commerce.currency_for_region(&region))
}
