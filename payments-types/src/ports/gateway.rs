//! Outbound payment gateway port.

use crate::domain::{GatewaySession, TransactionRequest};
use crate::error::GatewayError;

/// Creates hosted-checkout transactions at the payment gateway.
///
/// Implementations make a single attempt bounded by a timeout; retries are
/// the caller's decision.
#[async_trait::async_trait]
pub trait PaymentGateway: Send + Sync + 'static {
    async fn create_transaction(
        &self,
        request: &TransactionRequest,
    ) -> Result<GatewaySession, GatewayError>;
}
