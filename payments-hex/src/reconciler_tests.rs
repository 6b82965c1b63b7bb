//! PaymentReconciler unit tests.

#[cfg(test)]
mod tests {
    use std::str::FromStr;
    use std::sync::Arc;
    use std::sync::atomic::Ordering;

    use rust_decimal::Decimal;

    use payments_types::{
        CreatePaymentRequest, CurrencyConverter, GatewayError, GatewayNotification,
        NotificationOutcome, Order, OrderStatus, PaymentError, PaymentStatus, ServerKey,
    };

    use crate::PaymentReconciler;
    use crate::service_tests::tests::{MockGateway, MockRepo};

    const SERVER_KEY: &str = "SB-Mid-server-test";

    fn reconciler(
        repo: Arc<MockRepo>,
        gateway: MockGateway,
    ) -> PaymentReconciler<MockRepo, MockGateway> {
        PaymentReconciler::new(
            repo,
            gateway,
            CurrencyConverter::default(),
            ServerKey::new(SERVER_KEY),
        )
    }

    fn pay(order: &Order) -> CreatePaymentRequest {
        CreatePaymentRequest {
            order_id: order.id,
            customer_name: String::new(),
            customer_email: String::new(),
            customer_phone: None,
        }
    }

    fn signed(gateway_order_id: &str, status: &str) -> GatewayNotification {
        let mut n = GatewayNotification {
            order_id: Some(gateway_order_id.into()),
            transaction_status: Some(status.into()),
            status_code: Some("200".into()),
            gross_amount: Some("1600000.00".into()),
            payment_type: Some("bank_transfer".into()),
            ..Default::default()
        };
        n.sign(&ServerKey::new(SERVER_KEY));
        n
    }

    async fn paid_order(repo: &Arc<MockRepo>) -> (Order, String) {
        let (_, order) = repo
            .seed_order(Decimal::from_str("100.00").unwrap(), 1, Some("USD"))
            .await;
        let svc = reconciler(repo.clone(), MockGateway::default());
        let resp = svc.create_payment(pay(&order)).await.unwrap();
        (order, resp.gateway_order_id)
    }

    #[tokio::test]
    async fn test_usd_order_settles_in_idr() {
        let repo = Arc::new(MockRepo::new());
        let (_, order) = repo
            .seed_order(Decimal::from_str("100.00").unwrap(), 1, Some("USD"))
            .await;
        let gateway = MockGateway::default();
        let svc = reconciler(repo.clone(), gateway);

        let resp = svc.create_payment(pay(&order)).await.unwrap();
        assert_eq!(resp.amount, Decimal::from_str("100.00").unwrap());
        assert_eq!(resp.currency, "USD");
        assert_eq!(resp.status, PaymentStatus::Pending);
        assert_eq!(resp.message, "Payment created successfully");
        assert!(resp.gateway_order_id.starts_with(&format!("ORDER-{}-", order.id)));

        let stored = &repo.payments()[0];
        assert_eq!(stored.amount, Decimal::from_str("1600000.00").unwrap());
        assert_eq!(stored.currency, "IDR");
        assert_eq!(stored.transaction_id, stored.gateway_order_id);
        assert_eq!(repo.order(order.id).status, OrderStatus::PendingPayment);

        let requests = svc.gateway().requests.lock().unwrap().clone();
        assert_eq!(requests[0].transaction_details.gross_amount, 1_600_000);
        assert_eq!(requests[0].customer_details.first_name, "Siti");
    }

    #[tokio::test]
    async fn test_second_payment_is_duplicate() {
        let repo = Arc::new(MockRepo::new());
        let (order, _) = paid_order(&repo).await;
        let svc = reconciler(repo.clone(), MockGateway::default());

        let result = svc.create_payment(pay(&order)).await;
        assert!(matches!(result, Err(PaymentError::DuplicatePayment(id)) if id == order.id));
        assert!(svc.gateway().requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_order() {
        let repo = Arc::new(MockRepo::new());
        let svc = reconciler(repo, MockGateway::default());
        let result = svc
            .create_payment(CreatePaymentRequest {
                order_id: payments_types::OrderId::new(404),
                customer_name: String::new(),
                customer_email: String::new(),
                customer_phone: None,
            })
            .await;
        assert!(matches!(result, Err(PaymentError::OrderNotFound(_))));
    }

    #[tokio::test]
    async fn test_gateway_failure_persists_nothing() {
        let repo = Arc::new(MockRepo::new());
        let (_, order) = repo.seed_order(Decimal::new(50_000, 0), 1, None).await;
        let svc = reconciler(
            repo.clone(),
            MockGateway::failing(GatewayError::Unavailable("timed out".into())),
        );

        let result = svc.create_payment(pay(&order)).await;
        assert!(matches!(
            result,
            Err(PaymentError::PaymentCreationFailed(GatewayError::Unavailable(_)))
        ));
        assert!(repo.payments().is_empty());
        assert_eq!(repo.order(order.id).status, OrderStatus::Created);
    }

    #[tokio::test]
    async fn test_settlement_marks_order_processing() {
        let repo = Arc::new(MockRepo::new());
        let (order, gateway_order_id) = paid_order(&repo).await;
        let svc = reconciler(repo.clone(), MockGateway::default());

        let outcome = svc
            .handle_notification(&signed(&gateway_order_id, "settlement"))
            .await
            .unwrap();
        assert_eq!(
            outcome,
            NotificationOutcome::Applied {
                payment_status: PaymentStatus::Success,
                order_status: Some(OrderStatus::Processing),
            }
        );
        assert_eq!(repo.order(order.id).status, OrderStatus::Processing);
        let payment = &repo.payments()[0];
        assert_eq!(payment.status, PaymentStatus::Success);
        assert_eq!(payment.payment_type.as_deref(), Some("bank_transfer"));
    }

    #[tokio::test]
    async fn test_tampered_signature_changes_nothing() {
        let repo = Arc::new(MockRepo::new());
        let (order, gateway_order_id) = paid_order(&repo).await;
        let svc = reconciler(repo.clone(), MockGateway::default());

        let mut n = signed(&gateway_order_id, "settlement");
        n.gross_amount = Some("1.00".into());

        let result = svc.handle_notification(&n).await;
        assert!(matches!(result, Err(PaymentError::InvalidSignature)));
        assert_eq!(repo.payments()[0].status, PaymentStatus::Pending);
        assert_eq!(repo.order(order.id).status, OrderStatus::PendingPayment);
    }

    #[tokio::test]
    async fn test_unknown_gateway_order_id() {
        let repo = Arc::new(MockRepo::new());
        let svc = reconciler(repo, MockGateway::default());

        let result = svc
            .handle_notification(&signed("ORDER-9-1-0000000000000000", "settlement"))
            .await;
        assert!(matches!(result, Err(PaymentError::PaymentNotFound(_))));
    }

    #[tokio::test]
    async fn test_replayed_expiry_restores_stock_once() {
        let repo = Arc::new(MockRepo::new());
        let (product_id, order) = repo.seed_order(Decimal::new(50_000, 0), 2, None).await;
        let svc = reconciler(repo.clone(), MockGateway::default());
        let gateway_order_id = svc.create_payment(pay(&order)).await.unwrap().gateway_order_id;
        assert_eq!(repo.stock_of(product_id), 8);

        let n = signed(&gateway_order_id, "expire");
        let first = svc.handle_notification(&n).await.unwrap();
        let second = svc.handle_notification(&n).await.unwrap();

        assert!(matches!(first, NotificationOutcome::Applied { .. }));
        assert_eq!(
            second,
            NotificationOutcome::Unchanged {
                payment_status: PaymentStatus::Expired,
            }
        );
        assert_eq!(repo.stock_of(product_id), 10);
        assert_eq!(repo.saves.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_late_pending_after_success_is_stale() {
        let repo = Arc::new(MockRepo::new());
        let (order, gateway_order_id) = paid_order(&repo).await;
        let svc = reconciler(repo.clone(), MockGateway::default());

        svc.handle_notification(&signed(&gateway_order_id, "settlement"))
            .await
            .unwrap();
        let outcome = svc
            .handle_notification(&signed(&gateway_order_id, "pending"))
            .await
            .unwrap();

        assert_eq!(
            outcome,
            NotificationOutcome::Stale {
                current: PaymentStatus::Success,
                requested: PaymentStatus::Pending,
            }
        );
        assert_eq!(repo.order(order.id).status, OrderStatus::Processing);
    }

    #[tokio::test]
    async fn test_unrecognized_status_is_acknowledged() {
        let repo = Arc::new(MockRepo::new());
        let (order, gateway_order_id) = paid_order(&repo).await;
        let svc = reconciler(repo.clone(), MockGateway::default());

        let outcome = svc
            .handle_notification(&signed(&gateway_order_id, "authorize"))
            .await
            .unwrap();
        assert_eq!(
            outcome,
            NotificationOutcome::Unrecognized {
                transaction_status: "authorize".into(),
            }
        );
        assert_eq!(repo.payments()[0].status, PaymentStatus::Pending);
        assert_eq!(repo.order(order.id).status, OrderStatus::PendingPayment);
    }

    #[tokio::test]
    async fn test_version_conflict_is_retried() {
        let repo = Arc::new(MockRepo::new());
        let (_, gateway_order_id) = paid_order(&repo).await;
        let svc = reconciler(repo.clone(), MockGateway::default());

        repo.inject_conflicts(2);
        let outcome = svc
            .handle_notification(&signed(&gateway_order_id, "settlement"))
            .await
            .unwrap();
        assert!(matches!(outcome, NotificationOutcome::Applied { .. }));
    }

    #[tokio::test]
    async fn test_persistent_conflict_is_partial_failure() {
        let repo = Arc::new(MockRepo::new());
        let (order, gateway_order_id) = paid_order(&repo).await;
        let svc = reconciler(repo.clone(), MockGateway::default());

        repo.inject_conflicts(3);
        let result = svc
            .handle_notification(&signed(&gateway_order_id, "settlement"))
            .await;
        assert!(matches!(
            result,
            Err(PaymentError::PartialReconciliationFailure { .. })
        ));
        assert_eq!(repo.payments()[0].status, PaymentStatus::Pending);
        assert_eq!(repo.order(order.id).status, OrderStatus::PendingPayment);
    }

    #[tokio::test]
    async fn test_success_on_cancelled_order_keeps_order_closed() {
        let repo = Arc::new(MockRepo::new());
        let (order, gateway_order_id) = paid_order(&repo).await;
        let svc = reconciler(repo.clone(), MockGateway::default());

        crate::CommerceService::new(repo.clone(), CurrencyConverter::default())
            .cancel_order(order.id)
            .await
            .unwrap();
        svc.handle_notification(&signed(&gateway_order_id, "settlement"))
            .await
            .unwrap();

        assert_eq!(repo.payments()[0].status, PaymentStatus::Success);
        assert_eq!(repo.order(order.id).status, OrderStatus::Cancelled);
    }
}
