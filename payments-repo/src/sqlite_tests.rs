//! SQLite repository integration tests.

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use payments_types::{
        CreateOrderRequest, CreateProductRequest, DomainError, GatewaySession, Order, OrderId,
        OrderItemRequest, OrderRepository, OrderStatus, Payment, PaymentRepository,
        PaymentStatus, Product, ProductId, ProductRepository, RepoError,
    };
    use rust_decimal::Decimal;

    use crate::SqliteRepo;

    async fn setup_repo() -> SqliteRepo {
        SqliteRepo::new("sqlite::memory:").await.unwrap()
    }

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    async fn add_product(repo: &SqliteRepo, name: &str, price: &str, stock: i32) -> Product {
        repo.create_product(CreateProductRequest {
            name: name.to_string(),
            description: None,
            price: dec(price),
            category: Some("coffee".to_string()),
            image_url: None,
            stock_quantity: stock,
            is_active: true,
        })
        .await
        .unwrap()
    }

    async fn place_order(
        repo: &SqliteRepo,
        email: &str,
        items: Vec<(ProductId, i32)>,
        currency: Option<&str>,
    ) -> Result<Order, RepoError> {
        repo.create_order(CreateOrderRequest {
            customer_name: "Siti".to_string(),
            customer_email: email.to_string(),
            customer_phone: None,
            currency: currency.map(str::to_string),
            items: items
                .into_iter()
                .map(|(product_id, quantity)| OrderItemRequest {
                    product_id,
                    quantity,
                })
                .collect(),
        })
        .await
    }

    fn pending_payment(order_id: OrderId, suffix: &str) -> Payment {
        Payment::pending(
            order_id,
            dec("1600000.00"),
            format!("ORDER-{}-1700000000000-{}", order_id, suffix),
            GatewaySession {
                token: format!("token-{suffix}"),
                redirect_url: format!("https://pay.example/{suffix}"),
            },
        )
    }

    async fn stock_of(repo: &SqliteRepo, id: ProductId) -> i32 {
        repo.get_product(id).await.unwrap().unwrap().stock_quantity
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Catalog
    // ─────────────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_create_and_get_product() {
        let repo = setup_repo().await;

        let product = add_product(&repo, "Kopi Luwak", "250000.50", 10).await;
        let fetched = repo.get_product(product.id).await.unwrap().unwrap();

        assert_eq!(fetched.name, "Kopi Luwak");
        assert_eq!(fetched.price, dec("250000.50"));
        assert_eq!(fetched.stock_quantity, 10);
        assert!(fetched.is_active);
    }

    #[tokio::test]
    async fn test_get_product_not_found() {
        let repo = setup_repo().await;

        let result = repo.get_product(ProductId::new(999)).await.unwrap();

        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_invalid_product_rejected() {
        let repo = setup_repo().await;

        let result = repo
            .create_product(CreateProductRequest {
                name: "  ".to_string(),
                description: None,
                price: dec("1"),
                category: None,
                image_url: None,
                stock_quantity: 1,
                is_active: true,
            })
            .await;

        assert!(matches!(
            result,
            Err(RepoError::Domain(DomainError::ValidationError(_)))
        ));
    }

    #[tokio::test]
    async fn test_search_is_case_insensitive_and_skips_inactive() {
        let repo = setup_repo().await;
        add_product(&repo, "Kopi Luwak", "100", 1).await;
        add_product(&repo, "Teh Botol", "5", 1).await;
        repo.create_product(CreateProductRequest {
            name: "Kopi Tubruk".to_string(),
            description: None,
            price: dec("10"),
            category: Some("coffee".to_string()),
            image_url: None,
            stock_quantity: 1,
            is_active: false,
        })
        .await
        .unwrap();

        let found = repo.search_products("KOPI").await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "Kopi Luwak");

        assert_eq!(repo.list_active_products().await.unwrap().len(), 2);
        assert_eq!(repo.list_products_by_category("coffee").await.unwrap().len(), 2);
        assert!(repo.search_products("%").await.unwrap().is_empty());
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Orders & stock
    // ─────────────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_create_order_computes_total_and_takes_stock() {
        let repo = setup_repo().await;
        let kopi = add_product(&repo, "Kopi", "25.50", 10).await;
        let teh = add_product(&repo, "Teh", "4.00", 5).await;

        let order = place_order(
            &repo,
            "siti@example.com",
            vec![(kopi.id, 2), (teh.id, 1)],
            Some("usd"),
        )
        .await
        .unwrap();

        assert_eq!(order.status, OrderStatus::Created);
        assert_eq!(order.total_amount, dec("55.00"));
        assert_eq!(order.currency.as_deref(), Some("USD"));
        assert_eq!(order.items.len(), 2);
        assert_eq!(order.items[0].subtotal, dec("51.00"));
        assert_eq!(stock_of(&repo, kopi.id).await, 8);
        assert_eq!(stock_of(&repo, teh.id).await, 4);
    }

    #[tokio::test]
    async fn test_insufficient_stock_rolls_back() {
        let repo = setup_repo().await;
        let kopi = add_product(&repo, "Kopi", "10", 5).await;
        let teh = add_product(&repo, "Teh", "4", 1).await;

        let result = place_order(
            &repo,
            "siti@example.com",
            vec![(kopi.id, 2), (teh.id, 3)],
            None,
        )
        .await;

        assert!(matches!(
            result,
            Err(RepoError::Domain(DomainError::InsufficientStock {
                available: 1,
                requested: 3,
                ..
            }))
        ));
        // The first line's decrement was rolled back too.
        assert_eq!(stock_of(&repo, kopi.id).await, 5);
    }

    #[tokio::test]
    async fn test_order_with_unknown_product() {
        let repo = setup_repo().await;

        let result = place_order(&repo, "a@b.c", vec![(ProductId::new(42), 1)], None).await;

        assert!(matches!(
            result,
            Err(RepoError::Domain(DomainError::ProductNotFound(_)))
        ));
    }

    #[tokio::test]
    async fn test_empty_order_rejected() {
        let repo = setup_repo().await;

        let result = place_order(&repo, "a@b.c", vec![], None).await;

        assert!(matches!(
            result,
            Err(RepoError::Domain(DomainError::EmptyOrder))
        ));
    }

    #[tokio::test]
    async fn test_cancel_restores_stock_once() {
        let repo = setup_repo().await;
        let kopi = add_product(&repo, "Kopi", "10", 5).await;
        let order = place_order(&repo, "a@b.c", vec![(kopi.id, 3)], None)
            .await
            .unwrap();
        assert_eq!(stock_of(&repo, kopi.id).await, 2);

        let cancelled = repo
            .update_order_status(order.id, OrderStatus::Cancelled)
            .await
            .unwrap();
        assert_eq!(cancelled.status, OrderStatus::Cancelled);
        assert_eq!(stock_of(&repo, kopi.id).await, 5);

        repo.update_order_status(order.id, OrderStatus::Cancelled)
            .await
            .unwrap();
        assert_eq!(stock_of(&repo, kopi.id).await, 5);
    }

    #[tokio::test]
    async fn test_cancelled_order_cannot_be_reopened() {
        let repo = setup_repo().await;
        let kopi = add_product(&repo, "Kopi", "10", 5).await;
        let order = place_order(&repo, "a@b.c", vec![(kopi.id, 1)], None)
            .await
            .unwrap();
        repo.update_order_status(order.id, OrderStatus::Cancelled)
            .await
            .unwrap();

        let result = repo
            .update_order_status(order.id, OrderStatus::Processing)
            .await;

        assert!(matches!(
            result,
            Err(RepoError::Domain(DomainError::OrderCancelled(_)))
        ));
    }

    #[tokio::test]
    async fn test_update_status_of_missing_order() {
        let repo = setup_repo().await;

        let result = repo
            .update_order_status(OrderId::new(77), OrderStatus::Shipped)
            .await;

        assert!(matches!(result, Err(RepoError::NotFound)));
    }

    #[tokio::test]
    async fn test_list_orders_by_customer_newest_first() {
        let repo = setup_repo().await;
        let kopi = add_product(&repo, "Kopi", "10", 10).await;

        let first = place_order(&repo, "siti@example.com", vec![(kopi.id, 1)], None)
            .await
            .unwrap();
        let second = place_order(&repo, "siti@example.com", vec![(kopi.id, 1)], None)
            .await
            .unwrap();
        place_order(&repo, "budi@example.com", vec![(kopi.id, 1)], None)
            .await
            .unwrap();

        let orders = repo
            .list_orders_by_customer("siti@example.com")
            .await
            .unwrap();

        assert_eq!(orders.len(), 2);
        assert_eq!(orders[0].id, second.id);
        assert_eq!(orders[1].id, first.id);
        assert_eq!(orders[0].items.len(), 1);
    }

    #[tokio::test]
    async fn test_list_orders_by_status() {
        let repo = setup_repo().await;
        let kopi = add_product(&repo, "Kopi", "10", 10).await;
        let order = place_order(&repo, "a@b.c", vec![(kopi.id, 1)], None)
            .await
            .unwrap();
        place_order(&repo, "a@b.c", vec![(kopi.id, 1)], None)
            .await
            .unwrap();
        repo.update_order_status(order.id, OrderStatus::Shipped)
            .await
            .unwrap();

        let shipped = repo.list_orders_by_status(OrderStatus::Shipped).await.unwrap();
        let created = repo.list_orders_by_status(OrderStatus::Created).await.unwrap();

        assert_eq!(shipped.len(), 1);
        assert_eq!(shipped[0].id, order.id);
        assert_eq!(created.len(), 1);
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Payments
    // ─────────────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_create_payment_moves_order_to_pending_payment() {
        let repo = setup_repo().await;
        let kopi = add_product(&repo, "Kopi", "100", 10).await;
        let order = place_order(&repo, "a@b.c", vec![(kopi.id, 1)], Some("USD"))
            .await
            .unwrap();

        let stored = repo
            .create_payment(&pending_payment(order.id, "a1"))
            .await
            .unwrap();

        assert_eq!(stored.status, PaymentStatus::Pending);
        assert_eq!(stored.amount, dec("1600000.00"));
        assert_eq!(stored.version, 0);

        let order = repo.get_order(order.id).await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::PendingPayment);

        let by_gateway = repo
            .find_payment_by_gateway_order_id(&stored.gateway_order_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(by_gateway, stored);
        assert_eq!(
            repo.find_payment_by_order(order.id).await.unwrap().unwrap().id,
            stored.id
        );
    }

    #[tokio::test]
    async fn test_second_payment_for_order_conflicts() {
        let repo = setup_repo().await;
        let kopi = add_product(&repo, "Kopi", "100", 10).await;
        let order = place_order(&repo, "a@b.c", vec![(kopi.id, 1)], None)
            .await
            .unwrap();

        repo.create_payment(&pending_payment(order.id, "a1"))
            .await
            .unwrap();
        let result = repo.create_payment(&pending_payment(order.id, "b2")).await;

        assert!(matches!(result, Err(RepoError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_concurrent_payment_inserts_one_wins() {
        let repo = Arc::new(setup_repo().await);
        let kopi = add_product(&repo, "Kopi", "100", 10).await;
        let order = place_order(&repo, "a@b.c", vec![(kopi.id, 1)], None)
            .await
            .unwrap();

        let mut handles = Vec::new();
        for i in 0..20 {
            let repo = repo.clone();
            handles.push(tokio::spawn(async move {
                repo.create_payment(&pending_payment(order.id, &format!("{i:016x}")))
                    .await
            }));
        }

        let mut created = 0;
        let mut conflicts = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => created += 1,
                Err(RepoError::Conflict(_)) => conflicts += 1,
                Err(e) => panic!("unexpected error: {e}"),
            }
        }
        assert_eq!(created, 1);
        assert_eq!(conflicts, 19);
    }

    #[tokio::test]
    async fn test_save_reconciliation_bumps_version_and_order() {
        let repo = setup_repo().await;
        let kopi = add_product(&repo, "Kopi", "100", 10).await;
        let order = place_order(&repo, "a@b.c", vec![(kopi.id, 1)], None)
            .await
            .unwrap();
        let stored = repo
            .create_payment(&pending_payment(order.id, "a1"))
            .await
            .unwrap();

        let mut settled = stored.clone();
        settled.status = PaymentStatus::Success;
        settled.payment_type = Some("bca_va".into());
        let saved = repo
            .save_reconciliation(&settled, Some(OrderStatus::Processing))
            .await
            .unwrap();

        assert_eq!(saved.version, 1);
        assert_eq!(saved.status, PaymentStatus::Success);
        assert_eq!(saved.payment_type.as_deref(), Some("bca_va"));
        let order = repo.get_order(order.id).await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Processing);
    }

    #[tokio::test]
    async fn test_save_reconciliation_stale_version_conflicts() {
        let repo = setup_repo().await;
        let kopi = add_product(&repo, "Kopi", "100", 10).await;
        let order = place_order(&repo, "a@b.c", vec![(kopi.id, 1)], None)
            .await
            .unwrap();
        let stored = repo
            .create_payment(&pending_payment(order.id, "a1"))
            .await
            .unwrap();

        let mut first = stored.clone();
        first.status = PaymentStatus::Success;
        repo.save_reconciliation(&first, Some(OrderStatus::Processing))
            .await
            .unwrap();

        let mut second = stored.clone();
        second.status = PaymentStatus::Expired;
        let result = repo
            .save_reconciliation(&second, Some(OrderStatus::Cancelled))
            .await;

        assert!(matches!(
            result,
            Err(RepoError::VersionConflict { expected: 0 })
        ));
        // Nothing from the losing write leaked through.
        let order = repo.get_order(order.id).await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Processing);
        assert_eq!(stock_of(&repo, kopi.id).await, 9);
    }

    #[tokio::test]
    async fn test_expiry_cancels_order_and_restores_stock() {
        let repo = setup_repo().await;
        let kopi = add_product(&repo, "Kopi", "100", 10).await;
        let order = place_order(&repo, "a@b.c", vec![(kopi.id, 4)], None)
            .await
            .unwrap();
        let stored = repo
            .create_payment(&pending_payment(order.id, "a1"))
            .await
            .unwrap();
        assert_eq!(stock_of(&repo, kopi.id).await, 6);

        let mut expired = stored.clone();
        expired.status = PaymentStatus::Expired;
        repo.save_reconciliation(&expired, Some(OrderStatus::Cancelled))
            .await
            .unwrap();

        assert_eq!(stock_of(&repo, kopi.id).await, 10);
        let order = repo.get_order(order.id).await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Cancelled);
    }

    #[tokio::test]
    async fn test_payment_for_cancelled_order_leaves_order_closed() {
        let repo = setup_repo().await;
        let kopi = add_product(&repo, "Kopi", "100", 10).await;
        let order = place_order(&repo, "a@b.c", vec![(kopi.id, 1)], None)
            .await
            .unwrap();
        let stored = repo
            .create_payment(&pending_payment(order.id, "a1"))
            .await
            .unwrap();
        repo.update_order_status(order.id, OrderStatus::Cancelled)
            .await
            .unwrap();

        let mut settled = stored.clone();
        settled.status = PaymentStatus::Success;
        let saved = repo
            .save_reconciliation(&settled, Some(OrderStatus::Processing))
            .await
            .unwrap();

        assert_eq!(saved.status, PaymentStatus::Success);
        let order = repo.get_order(order.id).await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Cancelled);
    }
}
