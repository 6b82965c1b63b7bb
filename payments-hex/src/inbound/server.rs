//! HTTP Server configuration and startup.

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, patch, post},
};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use payments_types::{CommerceRepository, PaymentGateway};

use super::handlers::{self, AppState};
use crate::openapi::ApiDoc;
use crate::{CommerceService, PaymentReconciler};

/// HTTP Server for the storefront API.
pub struct HttpServer<R: CommerceRepository, G: PaymentGateway> {
    state: Arc<AppState<R, G>>,
}

impl<R: CommerceRepository, G: PaymentGateway> HttpServer<R, G> {
    /// Creates a new HTTP server over the catalog/order service and the
    /// payment reconciler.
    pub fn new(commerce: CommerceService<R>, payments: PaymentReconciler<R, G>) -> Self {
        Self {
            state: Arc::new(AppState { commerce, payments }),
        }
    }

    /// Builds the Axum router with all routes.
    pub fn router(&self) -> Router {
        // Build HTTP metrics layer (uses globally set MeterProvider)
        let metrics = axum_otel_metrics::HttpMetricsLayerBuilder::new().build();

        let api = Router::new()
            .route("/health", get(handlers::health))
            .route(
                "/api/products",
                get(handlers::list_products::<R, G>).post(handlers::create_product::<R, G>),
            )
            .route("/api/products/search", get(handlers::search_products::<R, G>))
            .route(
                "/api/products/category/{category}",
                get(handlers::products_by_category::<R, G>),
            )
            .route("/api/products/{id}", get(handlers::get_product::<R, G>))
            .route("/api/orders", post(handlers::create_order::<R, G>))
            .route(
                "/api/orders/{id}",
                get(handlers::get_order::<R, G>).delete(handlers::cancel_order::<R, G>),
            )
            .route(
                "/api/orders/{id}/status",
                patch(handlers::update_order_status::<R, G>),
            )
            .route(
                "/api/orders/customer/{email}",
                get(handlers::orders_by_customer::<R, G>),
            )
            .route(
                "/api/orders/status/{status}",
                get(handlers::orders_by_status::<R, G>),
            )
            .route("/api/payments/create", post(handlers::create_payment::<R, G>))
            .route(
                "/api/payments/notification",
                post(handlers::payment_notification::<R, G>),
            )
            .route(
                "/api/payments/order/{order_id}",
                get(handlers::payment_for_order::<R, G>),
            )
            .route("/api/currencies", get(handlers::list_currencies::<R, G>))
            .route(
                "/api/currencies/region/{region}",
                get(handlers::currency_for_region::<R, G>),
            )
            .with_state(self.state.clone());

        Router::new()
            .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
            .merge(api)
            .layer(metrics)
            .layer(TraceLayer::new_for_http())
    }

    /// Runs the server on the given address with graceful shutdown.
    pub async fn run(self, addr: &str) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(addr).await?;
        tracing::info!("Server listening on {}", listener.local_addr()?);

        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        Ok(())
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown...");
}
