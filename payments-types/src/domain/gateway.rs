//! Outbound transaction payload for the payment gateway.

use exchange_rates::CurrencyConverter;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use super::order::Order;
use crate::error::DomainError;

/// Payment channels offered on the hosted checkout page.
pub const ENABLED_PAYMENTS: [&str; 7] = [
    "credit_card",
    "gopay",
    "shopeepay",
    "bca_va",
    "bni_va",
    "bri_va",
    "other_va",
];

/// Item id of the balancing line added when per-item rounding drifts.
pub const ROUNDING_ITEM_ID: &str = "ROUNDING";

/// The gateway rejects item names longer than this.
const MAX_ITEM_NAME_CHARS: usize = 50;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionDetails {
    pub order_id: String,
    /// Whole settlement units; the gateway has no minor unit for IDR
    pub gross_amount: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerDetails {
    pub first_name: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemDetail {
    pub id: String,
    pub price: i64,
    pub quantity: i32,
    pub name: String,
}

/// Body of the gateway's create-transaction call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRequest {
    pub transaction_details: TransactionDetails,
    pub customer_details: CustomerDetails,
    pub item_details: Vec<ItemDetail>,
    pub enabled_payments: Vec<String>,
}

impl TransactionRequest {
    /// Builds the payload for `order`.
    ///
    /// Item prices are converted one by one and rounded to whole settlement
    /// units. When their sum no longer equals the gross amount, a single
    /// `ROUNDING` line absorbs the difference so the gateway's
    /// items-sum-to-total check holds.
    pub fn for_order(
        order: &Order,
        gateway_order_id: &str,
        settlement_amount: Decimal,
        customer: CustomerDetails,
        converter: &CurrencyConverter,
    ) -> Result<Self, DomainError> {
        let gross_amount = whole_units(settlement_amount)?;
        if gross_amount <= 0 {
            return Err(DomainError::ValidationError(
                "Payment amount must be positive".into(),
            ));
        }

        let currency = order.display_currency();
        let mut item_details = order
            .items
            .iter()
            .map(|item| {
                let unit = converter.to_settlement(item.unit_price, Some(currency));
                Ok(ItemDetail {
                    id: item.product_id.to_string(),
                    price: whole_units(unit)?,
                    quantity: item.quantity,
                    name: item.product_name.chars().take(MAX_ITEM_NAME_CHARS).collect(),
                })
            })
            .collect::<Result<Vec<_>, DomainError>>()?;

        let items_total: i64 = item_details
            .iter()
            .map(|item| item.price.saturating_mul(i64::from(item.quantity)))
            .sum();
        if items_total != gross_amount {
            item_details.push(ItemDetail {
                id: ROUNDING_ITEM_ID.to_string(),
                price: gross_amount - items_total,
                quantity: 1,
                name: "Rounding adjustment".to_string(),
            });
        }

        Ok(Self {
            transaction_details: TransactionDetails {
                order_id: gateway_order_id.to_string(),
                gross_amount,
            },
            customer_details: customer,
            item_details,
            enabled_payments: ENABLED_PAYMENTS.iter().map(|p| p.to_string()).collect(),
        })
    }
}

/// Rounds half-up to whole units.
pub fn whole_units(amount: Decimal) -> Result<i64, DomainError> {
    amount
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
        .ok_or_else(|| DomainError::ValidationError(format!("Amount out of range: {amount}")))
}
