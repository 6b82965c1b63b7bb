//! Payment Reconciler
//!
//! Opens gateway checkouts for orders and folds gateway notifications back
//! into payment and order state.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use payments_types::domain::gateway::whole_units;
use payments_types::domain::{mint_gateway_order_id, parse_gateway_time};
use payments_types::{
    CreatePaymentRequest, CurrencyConverter, CustomerDetails, DomainError, GatewayNotification,
    NotificationOutcome, OrderId, OrderRepository, OrderStatus, Payment, PaymentError,
    PaymentGateway, PaymentRepository, PaymentResponse, PaymentStatusResponse, RepoError,
    ServerKey, TransactionRequest,
};

/// Save attempts per notification before giving up on a contended payment.
pub const MAX_ATTEMPTS: usize = 3;

/// What a notification asks of storage.
#[derive(Debug, Clone, PartialEq)]
pub enum Reconciliation {
    /// Nothing to write.
    Skip(NotificationOutcome),
    /// Persist `payment`, moving the order to `order_status` when set.
    Write {
        payment: Box<Payment>,
        order_status: Option<OrderStatus>,
        outcome: NotificationOutcome,
    },
}

/// Folds one verified notification into the current payment snapshot.
///
/// Pure: the result depends only on the inputs, so replays of the same
/// notification against the same snapshot always agree.
pub fn reconcile(
    current: &Payment,
    notification: &GatewayNotification,
    now: DateTime<Utc>,
) -> Reconciliation {
    let gateway_status = notification.status();
    let target = gateway_status.payment_status();

    if let Some(next) = target {
        if !current.status.can_move_to(next) {
            return Reconciliation::Skip(NotificationOutcome::Stale {
                current: current.status,
                requested: next,
            });
        }
    }

    let mut updated = current.clone();
    if let Some(payment_type) = &notification.payment_type {
        updated.payment_type = Some(payment_type.clone());
    }
    if let Some(fraud_status) = &notification.fraud_status {
        updated.fraud_status = Some(fraud_status.clone());
    }
    updated.transaction_time = merge_time(
        "transaction_time",
        notification.transaction_time.as_deref(),
        current.transaction_time,
        now,
    );
    updated.settlement_time = merge_time(
        "settlement_time",
        notification.settlement_time.as_deref(),
        current.settlement_time,
        now,
    );

    let outcome = match target {
        Some(next) => {
            updated.status = next;
            if gateway_status.records_failure_reason() {
                updated.failure_reason = notification.status_message.clone();
            }
            if updated.same_gateway_state(current) {
                return Reconciliation::Skip(NotificationOutcome::Unchanged {
                    payment_status: current.status,
                });
            }
            let order_status = if next != current.status {
                next.order_status()
            } else {
                None
            };
            NotificationOutcome::Applied {
                payment_status: next,
                order_status,
            }
        }
        None => {
            let outcome = NotificationOutcome::Unrecognized {
                transaction_status: notification.transaction_status.clone().unwrap_or_default(),
            };
            if updated.same_gateway_state(current) {
                return Reconciliation::Skip(outcome);
            }
            outcome
        }
    };

    let order_status = match &outcome {
        NotificationOutcome::Applied { order_status, .. } => *order_status,
        _ => None,
    };
    updated.updated_at = now;

    Reconciliation::Write {
        payment: Box::new(updated),
        order_status,
        outcome,
    }
}

/// Absent keeps `existing`; unparseable is logged and keeps `existing`, else `now`.
fn merge_time(
    field: &'static str,
    raw: Option<&str>,
    existing: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    let Some(raw) = raw else {
        return existing;
    };
    match parse_gateway_time(raw) {
        Ok(parsed) => Some(parsed),
        Err(e) => {
            tracing::warn!(field, value = raw, error = %e, "Unparseable gateway timestamp");
            existing.or(Some(now))
        }
    }
}

/// Payment workflow over the order store, the payment store and the gateway.
pub struct PaymentReconciler<R, G>
where
    R: OrderRepository + PaymentRepository,
    G: PaymentGateway,
{
    repo: Arc<R>,
    gateway: G,
    converter: CurrencyConverter,
    server_key: ServerKey,
}

impl<R, G> PaymentReconciler<R, G>
where
    R: OrderRepository + PaymentRepository,
    G: PaymentGateway,
{
    pub fn new(
        repo: Arc<R>,
        gateway: G,
        converter: CurrencyConverter,
        server_key: ServerKey,
    ) -> Self {
        Self {
            repo,
            gateway,
            converter,
            server_key,
        }
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Checkout
    // ─────────────────────────────────────────────────────────────────────────────

    /// Opens a gateway checkout for an order.
    ///
    /// The duplicate pre-check only avoids needless gateway calls; the unique
    /// index on `payments.order_id` decides races.
    #[tracing::instrument(skip(self, req), fields(order_id = %req.order_id))]
    pub async fn create_payment(
        &self,
        req: CreatePaymentRequest,
    ) -> Result<PaymentResponse, PaymentError> {
        let order = self
            .repo
            .get_order(req.order_id)
            .await?
            .ok_or(PaymentError::OrderNotFound(req.order_id))?;

        if order.status == OrderStatus::Cancelled {
            return Err(DomainError::OrderCancelled(order.id).into());
        }

        if self.repo.find_payment_by_order(order.id).await?.is_some() {
            return Err(PaymentError::DuplicatePayment(order.id));
        }

        let currency = order.display_currency().to_string();
        let settlement = self
            .converter
            .to_settlement(order.total_amount, Some(&currency));
        let gross = whole_units(settlement)?;

        let gateway_order_id = mint_gateway_order_id(order.id, Utc::now());
        let customer = CustomerDetails {
            first_name: non_blank(req.customer_name).unwrap_or_else(|| order.customer_name.clone()),
            email: non_blank(req.customer_email).unwrap_or_else(|| order.customer_email.clone()),
            phone: req
                .customer_phone
                .and_then(non_blank)
                .or_else(|| order.customer_phone.clone()),
        };
        let request = TransactionRequest::for_order(
            &order,
            &gateway_order_id,
            settlement,
            customer,
            &self.converter,
        )?;

        let session = self
            .gateway
            .create_transaction(&request)
            .await
            .map_err(PaymentError::PaymentCreationFailed)?;

        let pending = Payment::pending(
            order.id,
            Decimal::new(gross.saturating_mul(100), 2),
            gateway_order_id,
            session,
        );
        let payment = self
            .repo
            .create_payment(&pending)
            .await
            .map_err(|e| match e {
                RepoError::Conflict(_) => PaymentError::DuplicatePayment(order.id),
                other => other.into(),
            })?;

        tracing::info!(
            payment_id = %payment.id,
            gateway_order_id = %payment.gateway_order_id,
            gross,
            "Payment created"
        );

        Ok(PaymentResponse {
            payment_id: payment.id,
            order_id: payment.order_id,
            gateway_order_id: payment.gateway_order_id.clone(),
            token: payment.session_token.clone(),
            redirect_url: payment.redirect_url.clone(),
            amount: self
                .converter
                .from_settlement(payment.amount, Some(&currency)),
            currency,
            status: payment.status,
            message: "Payment created successfully".into(),
        })
    }

    pub async fn payment_for_order(
        &self,
        order_id: OrderId,
    ) -> Result<PaymentStatusResponse, PaymentError> {
        self.repo
            .find_payment_by_order(order_id)
            .await?
            .map(|p| PaymentStatusResponse::from(&p))
            .ok_or_else(|| PaymentError::PaymentNotFound(format!("order {}", order_id)))
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Notifications
    // ─────────────────────────────────────────────────────────────────────────────

    /// Applies a gateway notification.
    ///
    /// Idempotent and monotonic: replays write nothing and terminal payments
    /// keep their status. A lost version race reloads and re-applies.
    #[tracing::instrument(
        skip(self, notification),
        fields(
            gateway_order_id = notification.order_id.as_deref().unwrap_or_default(),
            transaction_status = notification.transaction_status.as_deref().unwrap_or_default(),
        )
    )]
    pub async fn handle_notification(
        &self,
        notification: &GatewayNotification,
    ) -> Result<NotificationOutcome, PaymentError> {
        if !notification.verify(&self.server_key) {
            tracing::warn!("Rejected notification with invalid signature");
            return Err(PaymentError::InvalidSignature);
        }
        // verify() fails on a missing order id
        let gateway_order_id = notification.order_id.clone().unwrap_or_default();

        let mut attempt = 0;
        loop {
            attempt += 1;
            let current = self
                .repo
                .find_payment_by_gateway_order_id(&gateway_order_id)
                .await?
                .ok_or_else(|| PaymentError::PaymentNotFound(gateway_order_id.clone()))?;

            let (payment, order_status, outcome) =
                match reconcile(&current, notification, Utc::now()) {
                    Reconciliation::Skip(outcome) => {
                        log_outcome(&outcome);
                        return Ok(outcome);
                    }
                    Reconciliation::Write {
                        payment,
                        order_status,
                        outcome,
                    } => (payment, order_status, outcome),
                };

            match self.repo.save_reconciliation(&payment, order_status).await {
                Ok(_) => {
                    log_outcome(&outcome);
                    return Ok(outcome);
                }
                Err(RepoError::VersionConflict { expected }) if attempt < MAX_ATTEMPTS => {
                    tracing::debug!(expected, attempt, "Payment changed concurrently, retrying");
                }
                Err(e) => {
                    tracing::error!(error = %e, attempt, "Failed to persist reconciliation");
                    return Err(PaymentError::PartialReconciliationFailure {
                        gateway_order_id,
                        reason: e.to_string(),
                    });
                }
            }
        }
    }
}

fn log_outcome(outcome: &NotificationOutcome) {
    match outcome {
        NotificationOutcome::Applied {
            payment_status,
            order_status,
        } => tracing::info!(
            payment_status = %payment_status,
            order_status = ?order_status,
            "Notification applied"
        ),
        NotificationOutcome::Unchanged { payment_status } => {
            tracing::debug!(payment_status = %payment_status, "Notification carried no change")
        }
        NotificationOutcome::Stale { current, requested } => tracing::warn!(
            current = %current,
            requested = %requested,
            "Ignoring notification for terminal payment"
        ),
        NotificationOutcome::Unrecognized { transaction_status } => {
            tracing::warn!(
                transaction_status = transaction_status.as_str(),
                "Unrecognized gateway status"
            )
        }
    }
}

fn non_blank(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
