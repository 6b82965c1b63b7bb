//! Payment domain model and its lifecycle rules.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::order::{OrderId, OrderStatus};
use crate::error::DomainError;

/// Unique identifier for a Payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct PaymentId(Uuid);

impl PaymentId {
    /// Creates a new random PaymentId.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a PaymentId from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for PaymentId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for PaymentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for PaymentId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Lifecycle status of a payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Pending,
    Processing,
    Success,
    Failed,
    Expired,
    Cancelled,
    Refunded,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "PENDING",
            PaymentStatus::Processing => "PROCESSING",
            PaymentStatus::Success => "SUCCESS",
            PaymentStatus::Failed => "FAILED",
            PaymentStatus::Expired => "EXPIRED",
            PaymentStatus::Cancelled => "CANCELLED",
            PaymentStatus::Refunded => "REFUNDED",
        }
    }

    /// Terminal statuses are never left once reached.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PaymentStatus::Success
                | PaymentStatus::Failed
                | PaymentStatus::Expired
                | PaymentStatus::Cancelled
                | PaymentStatus::Refunded
        )
    }

    /// Whether a notification may move a payment from `self` to `next`.
    pub fn can_move_to(&self, next: PaymentStatus) -> bool {
        *self == next || !self.is_terminal()
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PaymentStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PENDING" => Ok(PaymentStatus::Pending),
            "PROCESSING" => Ok(PaymentStatus::Processing),
            "SUCCESS" => Ok(PaymentStatus::Success),
            "FAILED" => Ok(PaymentStatus::Failed),
            "EXPIRED" => Ok(PaymentStatus::Expired),
            "CANCELLED" => Ok(PaymentStatus::Cancelled),
            "REFUNDED" => Ok(PaymentStatus::Refunded),
            other => Err(DomainError::ValidationError(format!(
                "Unknown payment status: {other}"
            ))),
        }
    }
}

impl PaymentStatus {
    /// The order status that accompanies a payment entering `self`.
    pub fn order_status(&self) -> Option<OrderStatus> {
        match self {
            PaymentStatus::Pending => Some(OrderStatus::PendingPayment),
            PaymentStatus::Success => Some(OrderStatus::Processing),
            PaymentStatus::Failed | PaymentStatus::Expired | PaymentStatus::Cancelled => {
                Some(OrderStatus::Cancelled)
            }
            PaymentStatus::Processing | PaymentStatus::Refunded => None,
        }
    }
}

/// Checkout session issued by the gateway for a new transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct GatewaySession {
    pub token: String,
    pub redirect_url: String,
}

/// A payment attempt for exactly one order.
///
/// `amount` is always in the settlement currency. `version` is bumped by
/// storage on every persisted mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub id: PaymentId,
    pub order_id: OrderId,
    pub amount: Decimal,
    pub currency: String,
    pub status: PaymentStatus,
    pub payment_type: Option<String>,
    pub fraud_status: Option<String>,
    pub transaction_id: String,
    pub gateway_order_id: String,
    pub session_token: String,
    pub redirect_url: String,
    pub transaction_time: Option<DateTime<Utc>>,
    pub settlement_time: Option<DateTime<Utc>>,
    pub failure_reason: Option<String>,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Payment {
    /// Creates a freshly issued payment in `Pending`.
    pub fn pending(
        order_id: OrderId,
        amount: Decimal,
        gateway_order_id: String,
        session: GatewaySession,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: PaymentId::new(),
            order_id,
            amount,
            currency: exchange_rates::SETTLEMENT_CURRENCY.to_string(),
            status: PaymentStatus::Pending,
            payment_type: None,
            fraud_status: None,
            transaction_id: gateway_order_id.clone(),
            gateway_order_id,
            session_token: session.token,
            redirect_url: session.redirect_url,
            transaction_time: None,
            settlement_time: None,
            failure_reason: None,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether two snapshots differ in anything a notification can change.
    pub fn same_gateway_state(&self, other: &Payment) -> bool {
        self.status == other.status
            && self.payment_type == other.payment_type
            && self.fraud_status == other.fraud_status
            && self.transaction_time == other.transaction_time
            && self.settlement_time == other.settlement_time
            && self.failure_reason == other.failure_reason
    }
}

/// Mints a globally unique gateway order id for `order_id`.
///
/// Format: `ORDER-{order_id}-{unix_millis}-{16 hex}`. The random suffix keeps
/// ids distinct when two attempts land in the same millisecond.
pub fn mint_gateway_order_id(order_id: OrderId, now: DateTime<Utc>) -> String {
    let suffix: u64 = rand::random();
    format!(
        "ORDER-{}-{}-{:016x}",
        order_id,
        now.timestamp_millis(),
        suffix
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn session() -> GatewaySession {
        GatewaySession {
            token: "tok".into(),
            redirect_url: "https://pay.example/tok".into(),
        }
    }

    #[test]
    fn test_pending_payment_defaults() {
        let payment = Payment::pending(
            OrderId::new(5),
            Decimal::new(1_600_000, 0),
            "ORDER-5-1-00".into(),
            session(),
        );
        assert_eq!(payment.status, PaymentStatus::Pending);
        assert_eq!(payment.currency, "IDR");
        assert_eq!(payment.transaction_id, payment.gateway_order_id);
        assert_eq!(payment.version, 0);
    }

    #[test]
    fn test_terminal_statuses_are_sticky() {
        assert!(PaymentStatus::Pending.can_move_to(PaymentStatus::Success));
        assert!(PaymentStatus::Success.can_move_to(PaymentStatus::Success));
        assert!(!PaymentStatus::Success.can_move_to(PaymentStatus::Pending));
        assert!(!PaymentStatus::Expired.can_move_to(PaymentStatus::Success));
        assert!(!PaymentStatus::Failed.can_move_to(PaymentStatus::Expired));
    }

    #[test]
    fn test_order_status_for_payment_status() {
        assert_eq!(
            PaymentStatus::Success.order_status(),
            Some(OrderStatus::Processing)
        );
        assert_eq!(
            PaymentStatus::Expired.order_status(),
            Some(OrderStatus::Cancelled)
        );
        assert_eq!(PaymentStatus::Refunded.order_status(), None);
    }

    #[test]
    fn test_gateway_order_id_format() {
        let now = Utc::now();
        let id = mint_gateway_order_id(OrderId::new(42), now);
        let parts: Vec<&str> = id.split('-').collect();
        assert_eq!(parts.len(), 4);
        assert_eq!(parts[0], "ORDER");
        assert_eq!(parts[1], "42");
        assert_eq!(parts[2], now.timestamp_millis().to_string());
        assert_eq!(parts[3].len(), 16);
    }

    #[test]
    fn test_gateway_order_ids_unique_within_same_millisecond() {
        let now = Utc::now();
        let ids: HashSet<String> = (0..1000)
            .map(|_| mint_gateway_order_id(OrderId::new(1), now))
            .collect();
        assert_eq!(ids.len(), 1000);
    }
}
