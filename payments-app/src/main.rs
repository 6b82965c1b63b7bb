//! # Payments Application
//!
//! Binary that wires together all the components:
//! - Load configuration from environment
//! - Initialize the repository adapter and the gateway client
//! - Create the catalog service and the payment reconciler
//! - Start the HTTP server

mod config;

use std::sync::Arc;

use opentelemetry::global;
use opentelemetry_sdk::{propagation::TraceContextPropagator, trace as sdktrace};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use payments_hex::{CommerceService, PaymentReconciler, inbound::HttpServer};
use payments_repo::{GatewayClient, build_repo};
use payments_types::CurrencyConverter;

fn init_tracer() -> anyhow::Result<(sdktrace::Tracer, sdktrace::SdkTracerProvider)> {
    global::set_text_map_propagator(TraceContextPropagator::new());

    // Use gRPC exporter with batch processing (non-blocking)
    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .build()?;

    let provider = sdktrace::SdkTracerProvider::builder()
        .with_batch_exporter(exporter)
        .build();

    global::set_tracer_provider(provider.clone());

    use opentelemetry::trace::TracerProvider as _;
    Ok((provider.tracer("storefront-payments"), provider))
}

/// Scheme and host of a database URL, without credentials.
fn redact_database_url(url: &str) -> String {
    match (url.split_once("://"), url.rsplit_once('@')) {
        (Some((scheme, _)), Some((_, host))) => format!("{scheme}://***@{host}"),
        _ => url.to_string(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize OpenTelemetry tracing
    let (otel_tracer, otel_provider) = init_tracer()?;
    let telemetry = tracing_opentelemetry::layer().with_tracer(otel_tracer);

    // Initialize tracing subscriber
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "info,payments_app=debug,payments_hex=debug,payments_repo=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .with(telemetry)
        .init();

    // Load configuration
    let config = config::Config::from_env()?;

    tracing::info!("Starting payments server on port {}", config.port);
    tracing::info!("Using database: {}", redact_database_url(&config.database_url));
    tracing::info!(
        endpoint = config.gateway.endpoint(),
        production = config.gateway.is_production,
        timeout = ?config.gateway.timeout,
        client_key_configured = config.client_key.is_some(),
        "Payment gateway configured"
    );

    // Build repository (handles connection and migration)
    let repo = Arc::new(build_repo(&config.database_url).await?);
    let converter = CurrencyConverter::default();
    let server_key = config.gateway.server_key.clone();
    let gateway = GatewayClient::new(config.gateway)?;

    let commerce = CommerceService::new(repo.clone(), converter.clone());
    let payments = PaymentReconciler::new(repo, gateway, converter, server_key);

    // Create and run the HTTP server
    let server = HttpServer::new(commerce, payments);
    let addr = format!("0.0.0.0:{}", config.port);

    server.run(&addr).await?;

    // Ensure traces are flushed before exit
    let _ = otel_provider.shutdown();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redact_database_url() {
        assert_eq!(
            redact_database_url("postgres://app:hunter2@db:5432/payments"),
            "postgres://***@db:5432/payments"
        );
        assert_eq!(redact_database_url("sqlite::memory:"), "sqlite::memory:");
    }
}
