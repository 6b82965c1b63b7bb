//! Outbound adapter for the hosted-checkout payment gateway.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{info, instrument, warn};

use payments_types::{
    GatewayError, GatewaySession, PaymentGateway, ServerKey, TransactionRequest,
};

pub const SANDBOX_URL: &str = "https://app.sandbox.midtrans.com/snap/v1/transactions";
pub const PRODUCTION_URL: &str = "https://app.midtrans.com/snap/v1/transactions";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// Rejection bodies are kept in errors up to this many characters.
const MAX_ERROR_BODY_CHARS: usize = 512;

/// Connection settings for the gateway.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub server_key: ServerKey,
    /// Overrides the sandbox/production endpoint when set
    pub api_url: Option<String>,
    pub is_production: bool,
    pub timeout: Duration,
}

impl GatewayConfig {
    pub fn new(server_key: ServerKey) -> Self {
        Self {
            server_key,
            api_url: None,
            is_production: false,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// The transactions endpoint this config points at.
    pub fn endpoint(&self) -> &str {
        match self.api_url.as_deref() {
            Some(url) if !url.trim().is_empty() => url,
            _ if self.is_production => PRODUCTION_URL,
            _ => SANDBOX_URL,
        }
    }
}

#[derive(Debug, Deserialize)]
struct SessionBody {
    token: Option<String>,
    redirect_url: Option<String>,
}

/// Parses the create-transaction response body.
pub fn parse_session(body: &str) -> Result<GatewaySession, GatewayError> {
    let parsed: SessionBody = serde_json::from_str(body)
        .map_err(|e| GatewayError::Protocol(format!("invalid JSON: {}", e)))?;

    match (parsed.token, parsed.redirect_url) {
        (Some(token), Some(redirect_url)) if !token.is_empty() && !redirect_url.is_empty() => {
            Ok(GatewaySession {
                token,
                redirect_url,
            })
        }
        _ => Err(GatewayError::Protocol(
            "response is missing token or redirect_url".into(),
        )),
    }
}

/// reqwest-backed gateway client. One attempt per call, no retries.
#[derive(Debug, Clone)]
pub struct GatewayClient {
    client: reqwest::Client,
    config: GatewayConfig,
}

impl GatewayClient {
    pub fn new(config: GatewayConfig) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| GatewayError::Unavailable(e.to_string()))?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }
}

#[async_trait]
impl PaymentGateway for GatewayClient {
    #[instrument(
        skip(self, request),
        fields(gateway_order_id = %request.transaction_details.order_id)
    )]
    async fn create_transaction(
        &self,
        request: &TransactionRequest,
    ) -> Result<GatewaySession, GatewayError> {
        let response = self
            .client
            .post(self.config.endpoint())
            .basic_auth(self.config.server_key.reveal(), None::<&str>)
            .header(reqwest::header::ACCEPT, "application/json")
            .json(request)
            .send()
            .await
            .map_err(|e| {
                let reason = if e.is_timeout() {
                    format!("timed out after {:?}", self.config.timeout)
                } else {
                    e.without_url().to_string()
                };
                warn!(%reason, "Gateway call failed");
                GatewayError::Unavailable(reason)
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| GatewayError::Unavailable(e.without_url().to_string()))?;

        if !status.is_success() {
            warn!(status = status.as_u16(), "Gateway rejected transaction");
            return Err(GatewayError::Rejected {
                status: status.as_u16(),
                body: body.chars().take(MAX_ERROR_BODY_CHARS).collect(),
            });
        }

        let session = parse_session(&body)?;
        info!("Gateway transaction created");
        Ok(session)
    }
}
