//! Inbound gateway webhook payload and its interpretation.

use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::order::OrderStatus;
use super::payment::PaymentStatus;
use super::secret::ServerKey;
use crate::signature;

/// Timestamp layout used by the gateway in notifications.
pub const GATEWAY_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Gateway timestamps are local time in UTC+7.
const GATEWAY_UTC_OFFSET_SECS: i32 = 7 * 3600;

/// Webhook body as posted by the gateway.
///
/// Every field is optional on the wire; a notification missing the fields the
/// signature covers simply fails verification.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct GatewayNotification {
    /// Gateway order id minted at payment creation
    #[schema(example = "ORDER-12-1718000000000-9f1c2a3b4d5e6f70")]
    pub order_id: Option<String>,
    #[schema(example = "settlement")]
    pub transaction_status: Option<String>,
    #[schema(example = "bca_va")]
    pub payment_type: Option<String>,
    #[schema(example = "accept")]
    pub fraud_status: Option<String>,
    #[schema(example = "2024-06-10 14:03:11")]
    pub transaction_time: Option<String>,
    pub settlement_time: Option<String>,
    #[schema(example = "200")]
    pub status_code: Option<String>,
    #[schema(example = "1600000.00")]
    pub gross_amount: Option<String>,
    pub status_message: Option<String>,
    pub signature_key: Option<String>,
}

impl GatewayNotification {
    /// Checks `signature_key` against the digest of the signed fields.
    ///
    /// Returns false when any signed field is missing.
    pub fn verify(&self, server_key: &ServerKey) -> bool {
        match (
            self.order_id.as_deref(),
            self.status_code.as_deref(),
            self.gross_amount.as_deref(),
            self.signature_key.as_deref(),
        ) {
            (Some(order_id), Some(status_code), Some(gross_amount), Some(provided)) => {
                signature::verify_signature(
                    order_id,
                    status_code,
                    gross_amount,
                    server_key,
                    provided,
                )
            }
            _ => false,
        }
    }

    /// Fills `signature_key` with the digest for this notification.
    ///
    /// Used by operator tooling to simulate gateway callbacks.
    pub fn sign(&mut self, server_key: &ServerKey) {
        self.signature_key = Some(signature::notification_signature(
            self.order_id.as_deref().unwrap_or_default(),
            self.status_code.as_deref().unwrap_or_default(),
            self.gross_amount.as_deref().unwrap_or_default(),
            server_key,
        ));
    }

    pub fn status(&self) -> GatewayStatus {
        GatewayStatus::parse(self.transaction_status.as_deref().unwrap_or_default())
    }
}

/// Parses a gateway timestamp (`yyyy-MM-dd HH:mm:ss`, UTC+7) into UTC.
pub fn parse_gateway_time(value: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    let naive = NaiveDateTime::parse_from_str(value.trim(), GATEWAY_TIME_FORMAT)?;
    let local = FixedOffset::east_opt(GATEWAY_UTC_OFFSET_SECS)
        .and_then(|offset| offset.from_local_datetime(&naive).single());
    Ok(match local {
        Some(dt) => dt.with_timezone(&Utc),
        None => Utc.from_utc_datetime(&naive),
    })
}

/// Transaction status reported by the gateway (matched case-sensitively).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayStatus {
    Capture,
    Settlement,
    Pending,
    Deny,
    Cancel,
    Expire,
    Other(String),
}

impl GatewayStatus {
    pub fn parse(value: &str) -> Self {
        match value {
            "capture" => GatewayStatus::Capture,
            "settlement" => GatewayStatus::Settlement,
            "pending" => GatewayStatus::Pending,
            "deny" => GatewayStatus::Deny,
            "cancel" => GatewayStatus::Cancel,
            "expire" => GatewayStatus::Expire,
            other => GatewayStatus::Other(other.to_string()),
        }
    }

    /// The payment status this gateway status moves a payment into.
    pub fn payment_status(&self) -> Option<PaymentStatus> {
        match self {
            GatewayStatus::Capture | GatewayStatus::Settlement => Some(PaymentStatus::Success),
            GatewayStatus::Pending => Some(PaymentStatus::Pending),
            GatewayStatus::Deny | GatewayStatus::Cancel => Some(PaymentStatus::Failed),
            GatewayStatus::Expire => Some(PaymentStatus::Expired),
            GatewayStatus::Other(_) => None,
        }
    }

    /// Whether the gateway's status message is recorded as failure reason.
    pub fn records_failure_reason(&self) -> bool {
        matches!(self, GatewayStatus::Deny | GatewayStatus::Cancel)
    }
}

/// What processing a notification did to local state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum NotificationOutcome {
    /// Payment (and possibly order) state was written.
    Applied {
        payment_status: PaymentStatus,
        order_status: Option<OrderStatus>,
    },
    /// The notification carried nothing new; nothing was written.
    Unchanged { payment_status: PaymentStatus },
    /// The payment is terminal and the notification would move it elsewhere.
    Stale {
        current: PaymentStatus,
        requested: PaymentStatus,
    },
    /// The gateway status is not one we act on.
    Unrecognized { transaction_status: String },
}
