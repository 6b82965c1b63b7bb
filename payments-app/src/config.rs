//! Configuration loading from environment.

use std::env;
use std::time::Duration;

use payments_repo::GatewayConfig;
use payments_types::ServerKey;

/// Application configuration.
pub struct Config {
    pub port: u16,
    pub database_url: String,
    pub gateway: GatewayConfig,
    /// Public key handed to the checkout frontend; the server never uses it.
    pub client_key: Option<String>,
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let port = var("PORT")
            .unwrap_or_else(|| "3000".to_string())
            .parse()?;

        let database_url = var("DATABASE_URL")
            .ok_or_else(|| anyhow::anyhow!("DATABASE_URL environment variable is required"))?;

        let server_key = var("GATEWAY_SERVER_KEY")
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| anyhow::anyhow!("GATEWAY_SERVER_KEY environment variable is required"))?;

        let mut gateway = GatewayConfig::new(ServerKey::new(server_key));
        gateway.api_url = var("GATEWAY_API_URL").filter(|u| !u.trim().is_empty());
        gateway.is_production = match var("GATEWAY_IS_PRODUCTION") {
            Some(flag) => flag.trim().parse().map_err(|_| {
                anyhow::anyhow!("GATEWAY_IS_PRODUCTION must be true or false, got {flag:?}")
            })?,
            None => false,
        };
        if let Some(secs) = var("GATEWAY_TIMEOUT_SECS") {
            gateway.timeout = Duration::from_secs(secs.trim().parse()?);
        }

        Ok(Self {
            port,
            database_url,
            gateway,
            client_key: var("GATEWAY_CLIENT_KEY").filter(|k| !k.trim().is_empty()),
        })
    }
}
