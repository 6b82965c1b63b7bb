//! PostgreSQL repository adapter.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, PgConnection, PgPool};
use uuid::Uuid;

use payments_types::{
    CreateOrderRequest, CreateProductRequest, DomainError, Order, OrderId, OrderItem,
    OrderRepository, OrderStatus, Payment, PaymentId, PaymentRepository, Product, ProductId,
    ProductRepository, RepoError,
};

use crate::types::{
    contains_pattern, db_err, insert_err, parse_order_status, parse_payment_status, tx_err,
};

// ─────────────────────────────────────────────────────────────────────────────
// PostgreSQL Repository
// ─────────────────────────────────────────────────────────────────────────────

/// PostgreSQL repository with row-level locking.
pub struct PostgresRepo {
    pool: PgPool,
}

/// Executes SQL statements from a migration file, splitting by semicolons.
async fn execute_migration(pool: &PgPool, sql: &str, name: &str) -> Result<(), anyhow::Error> {
    for statement in sql.split(';') {
        let stmt = statement.trim();
        if !stmt.is_empty() {
            sqlx::query(stmt)
                .execute(pool)
                .await
                .map_err(|e| anyhow::anyhow!("Migration {} failed: {}", name, e))?;
        }
    }
    Ok(())
}

/// Runs all database migrations.
async fn run_migrations(pool: &PgPool) -> Result<(), anyhow::Error> {
    execute_migration(
        pool,
        include_str!("../migrations/0001_create_products_pg.sql"),
        "0001",
    )
    .await?;

    execute_migration(
        pool,
        include_str!("../migrations/0002_create_orders_pg.sql"),
        "0002",
    )
    .await?;

    execute_migration(
        pool,
        include_str!("../migrations/0003_create_payments_pg.sql"),
        "0003",
    )
    .await?;

    Ok(())
}

impl PostgresRepo {
    /// Creates a new PostgreSQL repository with automatic migration.
    pub async fn new(database_url: &str) -> anyhow::Result<Self> {
        let pool = PgPool::connect(database_url).await?;
        run_migrations(&pool).await?;
        Ok(Self { pool })
    }

    /// Returns a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Rows
// ─────────────────────────────────────────────────────────────────────────────

const PRODUCT_COLUMNS: &str =
    "id, name, description, price, category, image_url, stock_quantity, is_active, created_at";

#[derive(FromRow)]
struct ProductRow {
    id: i64,
    name: String,
    description: Option<String>,
    price: Decimal,
    category: Option<String>,
    image_url: Option<String>,
    stock_quantity: i32,
    is_active: bool,
    created_at: DateTime<Utc>,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Product {
            id: ProductId::new(row.id),
            name: row.name,
            description: row.description,
            price: row.price,
            category: row.category,
            image_url: row.image_url,
            stock_quantity: row.stock_quantity,
            is_active: row.is_active,
            created_at: row.created_at,
        }
    }
}

const ORDER_COLUMNS: &str = "id, customer_name, customer_email, customer_phone, total_amount, currency, status, created_at, updated_at";

#[derive(FromRow)]
struct OrderRow {
    id: i64,
    customer_name: String,
    customer_email: String,
    customer_phone: Option<String>,
    total_amount: Decimal,
    currency: Option<String>,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl OrderRow {
    fn into_domain(self, items: Vec<OrderItem>) -> Result<Order, RepoError> {
        Ok(Order {
            id: OrderId::new(self.id),
            customer_name: self.customer_name,
            customer_email: self.customer_email,
            customer_phone: self.customer_phone,
            items,
            total_amount: self.total_amount,
            currency: self.currency,
            status: parse_order_status(&self.status)?,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(FromRow)]
struct OrderItemRow {
    product_id: i64,
    product_name: String,
    quantity: i32,
    unit_price: Decimal,
    subtotal: Decimal,
}

impl From<OrderItemRow> for OrderItem {
    fn from(row: OrderItemRow) -> Self {
        OrderItem {
            product_id: ProductId::new(row.product_id),
            product_name: row.product_name,
            quantity: row.quantity,
            unit_price: row.unit_price,
            subtotal: row.subtotal,
        }
    }
}

const PAYMENT_COLUMNS: &str = "id, order_id, amount, currency, status, payment_type, fraud_status, transaction_id, gateway_order_id, session_token, redirect_url, transaction_time, settlement_time, failure_reason, version, created_at, updated_at";

#[derive(FromRow)]
struct PaymentRow {
    id: Uuid,
    order_id: i64,
    amount: Decimal,
    currency: String,
    status: String,
    payment_type: Option<String>,
    fraud_status: Option<String>,
    transaction_id: String,
    gateway_order_id: String,
    session_token: String,
    redirect_url: String,
    transaction_time: Option<DateTime<Utc>>,
    settlement_time: Option<DateTime<Utc>>,
    failure_reason: Option<String>,
    version: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl PaymentRow {
    fn into_domain(self) -> Result<Payment, RepoError> {
        Ok(Payment {
            id: PaymentId::from_uuid(self.id),
            order_id: OrderId::new(self.order_id),
            amount: self.amount,
            currency: self.currency,
            status: parse_payment_status(&self.status)?,
            payment_type: self.payment_type,
            fraud_status: self.fraud_status,
            transaction_id: self.transaction_id,
            gateway_order_id: self.gateway_order_id,
            session_token: self.session_token,
            redirect_url: self.redirect_url,
            transaction_time: self.transaction_time,
            settlement_time: self.settlement_time,
            failure_reason: self.failure_reason,
            version: self.version,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Connection-level helpers (usable inside a transaction)
// ─────────────────────────────────────────────────────────────────────────────

async fn load_items(conn: &mut PgConnection, order_id: i64) -> Result<Vec<OrderItem>, RepoError> {
    let rows: Vec<OrderItemRow> = sqlx::query_as(
        r#"SELECT product_id, product_name, quantity, unit_price, subtotal
           FROM order_items WHERE order_id = $1 ORDER BY id"#,
    )
    .bind(order_id)
    .fetch_all(&mut *conn)
    .await
    .map_err(db_err)?;

    Ok(rows.into_iter().map(OrderItem::from).collect())
}

async fn load_order(conn: &mut PgConnection, id: i64) -> Result<Option<Order>, RepoError> {
    let row: Option<OrderRow> =
        sqlx::query_as(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"))
            .bind(id)
            .fetch_optional(&mut *conn)
            .await
            .map_err(db_err)?;

    match row {
        Some(row) => {
            let items = load_items(conn, row.id).await?;
            Ok(Some(row.into_domain(items)?))
        }
        None => Ok(None),
    }
}

async fn load_orders(conn: &mut PgConnection, rows: Vec<OrderRow>) -> Result<Vec<Order>, RepoError> {
    let mut orders = Vec::with_capacity(rows.len());
    for row in rows {
        let items = load_items(conn, row.id).await?;
        orders.push(row.into_domain(items)?);
    }
    Ok(orders)
}

async fn load_payment_by_id(conn: &mut PgConnection, id: Uuid) -> Result<Option<Payment>, RepoError> {
    let row: Option<PaymentRow> =
        sqlx::query_as(&format!("SELECT {PAYMENT_COLUMNS} FROM payments WHERE id = $1"))
            .bind(id)
            .fetch_optional(&mut *conn)
            .await
            .map_err(db_err)?;

    row.map(PaymentRow::into_domain).transpose()
}

/// Moves an order to `status`, locking the order row for the transaction.
///
/// Cancelled orders are never reopened. Entering `Cancelled` returns the
/// order's items to stock exactly once.
async fn apply_order_status(
    conn: &mut PgConnection,
    id: OrderId,
    status: OrderStatus,
) -> Result<(), RepoError> {
    let current: Option<String> =
        sqlx::query_scalar("SELECT status FROM orders WHERE id = $1 FOR UPDATE")
            .bind(id.as_i64())
            .fetch_optional(&mut *conn)
            .await
            .map_err(db_err)?;

    let current = parse_order_status(&current.ok_or(RepoError::NotFound)?)?;
    if current == OrderStatus::Cancelled {
        if status == OrderStatus::Cancelled {
            return Ok(());
        }
        return Err(DomainError::OrderCancelled(id).into());
    }

    sqlx::query(r#"UPDATE orders SET status = $1, updated_at = NOW() WHERE id = $2"#)
        .bind(status.as_str())
        .bind(id.as_i64())
        .execute(&mut *conn)
        .await
        .map_err(db_err)?;

    if status == OrderStatus::Cancelled {
        sqlx::query(
            r#"UPDATE products p
               SET stock_quantity = p.stock_quantity + oi.quantity
               FROM (
                   SELECT product_id, SUM(quantity)::INTEGER AS quantity
                   FROM order_items WHERE order_id = $1 GROUP BY product_id
               ) oi
               WHERE p.id = oi.product_id"#,
        )
        .bind(id.as_i64())
        .execute(&mut *conn)
        .await
        .map_err(db_err)?;
    }

    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Catalog
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait]
impl ProductRepository for PostgresRepo {
    async fn create_product(&self, req: CreateProductRequest) -> Result<Product, RepoError> {
        req.validate()?;

        let row: ProductRow = sqlx::query_as(&format!(
            r#"INSERT INTO products (name, description, price, category, image_url, stock_quantity, is_active, created_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7, NOW())
               RETURNING {PRODUCT_COLUMNS}"#
        ))
        .bind(req.name.trim())
        .bind(&req.description)
        .bind(req.price)
        .bind(&req.category)
        .bind(&req.image_url)
        .bind(req.stock_quantity)
        .bind(req.is_active)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(row.into())
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>, RepoError> {
        let row: Option<ProductRow> =
            sqlx::query_as(&format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1"))
                .bind(id.as_i64())
                .fetch_optional(&self.pool)
                .await
                .map_err(db_err)?;

        Ok(row.map(Product::from))
    }

    async fn list_active_products(&self) -> Result<Vec<Product>, RepoError> {
        let rows: Vec<ProductRow> = sqlx::query_as(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE is_active ORDER BY name"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(rows.into_iter().map(Product::from).collect())
    }

    async fn search_products(&self, name: &str) -> Result<Vec<Product>, RepoError> {
        let rows: Vec<ProductRow> = sqlx::query_as(&format!(
            r#"SELECT {PRODUCT_COLUMNS} FROM products
               WHERE is_active AND LOWER(name) LIKE $1 ESCAPE '\'
               ORDER BY name"#
        ))
        .bind(contains_pattern(name))
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(rows.into_iter().map(Product::from).collect())
    }

    async fn list_products_by_category(&self, category: &str) -> Result<Vec<Product>, RepoError> {
        let rows: Vec<ProductRow> = sqlx::query_as(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE is_active AND category = $1 ORDER BY name"
        ))
        .bind(category)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(rows.into_iter().map(Product::from).collect())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Orders
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait]
impl OrderRepository for PostgresRepo {
    async fn create_order(&self, req: CreateOrderRequest) -> Result<Order, RepoError> {
        req.validate()?;

        let mut db_tx = self.pool.begin().await.map_err(tx_err)?;

        let mut items = Vec::with_capacity(req.items.len());
        for line in &req.items {
            // Lock the product row with FOR UPDATE
            let row: Option<ProductRow> = sqlx::query_as(&format!(
                "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1 FOR UPDATE"
            ))
            .bind(line.product_id.as_i64())
            .fetch_optional(&mut *db_tx)
            .await
            .map_err(db_err)?;

            let product = Product::from(row.ok_or(DomainError::ProductNotFound(line.product_id))?);
            let item = OrderItem::from_product(&product, line.quantity)?;

            sqlx::query(r#"UPDATE products SET stock_quantity = stock_quantity - $1 WHERE id = $2"#)
                .bind(line.quantity)
                .bind(line.product_id.as_i64())
                .execute(&mut *db_tx)
                .await
                .map_err(db_err)?;

            items.push(item);
        }

        let currency = req
            .currency
            .as_deref()
            .map(|c| c.trim().to_uppercase())
            .filter(|c| !c.is_empty());

        let order_id: i64 = sqlx::query_scalar(
            r#"INSERT INTO orders (customer_name, customer_email, customer_phone, total_amount, currency, status, created_at, updated_at)
               VALUES ($1, $2, $3, $4, $5, $6, NOW(), NOW())
               RETURNING id"#,
        )
        .bind(req.customer_name.trim())
        .bind(req.customer_email.trim())
        .bind(&req.customer_phone)
        .bind(Order::total_of(&items))
        .bind(&currency)
        .bind(OrderStatus::Created.as_str())
        .fetch_one(&mut *db_tx)
        .await
        .map_err(db_err)?;

        for item in &items {
            sqlx::query(
                r#"INSERT INTO order_items (order_id, product_id, product_name, quantity, unit_price, subtotal)
                   VALUES ($1, $2, $3, $4, $5, $6)"#,
            )
            .bind(order_id)
            .bind(item.product_id.as_i64())
            .bind(&item.product_name)
            .bind(item.quantity)
            .bind(item.unit_price)
            .bind(item.subtotal)
            .execute(&mut *db_tx)
            .await
            .map_err(db_err)?;
        }

        let order = load_order(&mut db_tx, order_id)
            .await?
            .ok_or(RepoError::NotFound)?;

        db_tx.commit().await.map_err(tx_err)?;

        Ok(order)
    }

    async fn update_order_status(
        &self,
        id: OrderId,
        status: OrderStatus,
    ) -> Result<Order, RepoError> {
        let mut db_tx = self.pool.begin().await.map_err(tx_err)?;

        apply_order_status(&mut db_tx, id, status).await?;
        let order = load_order(&mut db_tx, id.as_i64())
            .await?
            .ok_or(RepoError::NotFound)?;

        db_tx.commit().await.map_err(tx_err)?;

        Ok(order)
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>, RepoError> {
        let mut conn = self.pool.acquire().await.map_err(db_err)?;
        load_order(&mut conn, id.as_i64()).await
    }

    async fn list_orders_by_customer(&self, email: &str) -> Result<Vec<Order>, RepoError> {
        let mut conn = self.pool.acquire().await.map_err(db_err)?;
        let rows: Vec<OrderRow> = sqlx::query_as(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE customer_email = $1 ORDER BY created_at DESC, id DESC"
        ))
        .bind(email.trim())
        .fetch_all(&mut *conn)
        .await
        .map_err(db_err)?;

        load_orders(&mut conn, rows).await
    }

    async fn list_orders_by_status(&self, status: OrderStatus) -> Result<Vec<Order>, RepoError> {
        let mut conn = self.pool.acquire().await.map_err(db_err)?;
        let rows: Vec<OrderRow> = sqlx::query_as(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE status = $1 ORDER BY created_at DESC, id DESC"
        ))
        .bind(status.as_str())
        .fetch_all(&mut *conn)
        .await
        .map_err(db_err)?;

        load_orders(&mut conn, rows).await
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Payments (MUST be atomic with the order status)
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait]
impl PaymentRepository for PostgresRepo {
    async fn create_payment(&self, payment: &Payment) -> Result<Payment, RepoError> {
        let mut db_tx = self.pool.begin().await.map_err(tx_err)?;

        sqlx::query(
            r#"INSERT INTO payments (id, order_id, amount, currency, status, payment_type, fraud_status,
                   transaction_id, gateway_order_id, session_token, redirect_url, transaction_time,
                   settlement_time, failure_reason, version, created_at, updated_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, 0, $15, $16)"#,
        )
        .bind(payment.id.as_uuid())
        .bind(payment.order_id.as_i64())
        .bind(payment.amount)
        .bind(&payment.currency)
        .bind(payment.status.as_str())
        .bind(&payment.payment_type)
        .bind(&payment.fraud_status)
        .bind(&payment.transaction_id)
        .bind(&payment.gateway_order_id)
        .bind(&payment.session_token)
        .bind(&payment.redirect_url)
        .bind(payment.transaction_time)
        .bind(payment.settlement_time)
        .bind(&payment.failure_reason)
        .bind(payment.created_at)
        .bind(payment.updated_at)
        .execute(&mut *db_tx)
        .await
        .map_err(|e| {
            insert_err(e, || {
                format!("Payment already exists for order {}", payment.order_id)
            })
        })?;

        apply_order_status(&mut db_tx, payment.order_id, OrderStatus::PendingPayment).await?;

        let stored = load_payment_by_id(&mut db_tx, *payment.id.as_uuid())
            .await?
            .ok_or(RepoError::NotFound)?;

        db_tx.commit().await.map_err(tx_err)?;

        Ok(stored)
    }

    async fn save_reconciliation(
        &self,
        payment: &Payment,
        order_status: Option<OrderStatus>,
    ) -> Result<Payment, RepoError> {
        let id = *payment.id.as_uuid();
        let mut db_tx = self.pool.begin().await.map_err(tx_err)?;

        let result = sqlx::query(
            r#"UPDATE payments
               SET status = $1, payment_type = $2, fraud_status = $3, transaction_time = $4,
                   settlement_time = $5, failure_reason = $6, version = version + 1, updated_at = NOW()
               WHERE id = $7 AND version = $8"#,
        )
        .bind(payment.status.as_str())
        .bind(&payment.payment_type)
        .bind(&payment.fraud_status)
        .bind(payment.transaction_time)
        .bind(payment.settlement_time)
        .bind(&payment.failure_reason)
        .bind(id)
        .bind(payment.version)
        .execute(&mut *db_tx)
        .await
        .map_err(db_err)?;

        if result.rows_affected() == 0 {
            let exists: Option<i64> = sqlx::query_scalar("SELECT version FROM payments WHERE id = $1")
                .bind(id)
                .fetch_optional(&mut *db_tx)
                .await
                .map_err(db_err)?;
            return Err(match exists {
                Some(_) => RepoError::VersionConflict {
                    expected: payment.version,
                },
                None => RepoError::NotFound,
            });
        }

        if let Some(status) = order_status {
            match apply_order_status(&mut db_tx, payment.order_id, status).await {
                Ok(()) => {}
                Err(RepoError::Domain(DomainError::OrderCancelled(order_id))) => {
                    tracing::warn!(
                        order_id = %order_id,
                        payment_status = %payment.status,
                        "Order already cancelled, leaving it closed"
                    );
                }
                Err(e) => return Err(e),
            }
        }

        let stored = load_payment_by_id(&mut db_tx, id)
            .await?
            .ok_or(RepoError::NotFound)?;

        db_tx.commit().await.map_err(tx_err)?;

        Ok(stored)
    }

    async fn find_payment_by_order(&self, order_id: OrderId) -> Result<Option<Payment>, RepoError> {
        let row: Option<PaymentRow> = sqlx::query_as(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE order_id = $1"
        ))
        .bind(order_id.as_i64())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        row.map(PaymentRow::into_domain).transpose()
    }

    async fn find_payment_by_gateway_order_id(
        &self,
        gateway_order_id: &str,
    ) -> Result<Option<Payment>, RepoError> {
        let row: Option<PaymentRow> = sqlx::query_as(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE gateway_order_id = $1"
        ))
        .bind(gateway_order_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        row.map(PaymentRow::into_domain).transpose()
    }
}
