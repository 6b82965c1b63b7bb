//! SQLite repository adapter.
#![allow(clippy::collapsible_if)]

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rust_decimal::Decimal;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{FromRow, SqliteConnection, SqlitePool};
use std::str::FromStr;
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
// SQLite Repository
// ─────────────────────────────────────────────────────────────────────────────

/// SQLite repository implementation.
///
/// Amounts are stored as decimal TEXT and timestamps as RFC 3339 TEXT.
pub struct SqliteRepo {
    pool: SqlitePool,
}

const MIGRATIONS: [(&str, &str); 3] = [
    ("0001", include_str!("../migrations/0001_create_products.sql")),
    ("0002", include_str!("../migrations/0002_create_orders.sql")),
    ("0003", include_str!("../migrations/0003_create_payments.sql")),
];

async fn run_migrations(pool: &SqlitePool) -> Result<(), anyhow::Error> {
    for (name, sql) in MIGRATIONS {
        sqlx::raw_sql(sql)
            .execute(pool)
            .await
            .map_err(|e| anyhow::anyhow!("Migration {} failed: {}", name, e))?;
    }
    Ok(())
}

impl SqliteRepo {
    /// Creates a new SQLite repository with automatic migration.
    ///
    /// In-memory databases are held on a single long-lived connection, since
    /// every SQLite connection to `:memory:` opens a separate database.
    pub async fn new(database_url: &str) -> anyhow::Result<Self> {
        // Ensure on-disk SQLite target directory exists (no-op for in-memory).
        if let Some(path) = database_url.strip_prefix("sqlite://") {
            let path = path.split('?').next().unwrap_or(path);
            if path != ":memory:" {
                let p = std::path::Path::new(path);
                if let Some(parent) = p.parent() {
                    if !parent.as_os_str().is_empty() {
                        tokio::fs::create_dir_all(parent).await?;
                    }
                }
            }
        }

        let in_memory = database_url.contains(":memory:") || database_url.contains("mode=memory");
        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect_with(options)
                .await?
        } else {
            SqlitePoolOptions::new()
                .max_connections(5)
                .connect_with(options)
                .await?
        };

        run_migrations(&pool).await?;
        Ok(Self { pool })
    }

    /// Returns a reference to the connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Rows
// ─────────────────────────────────────────────────────────────────────────────

fn ts(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_ts(s: &str) -> Result<DateTime<Utc>, RepoError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepoError::Database(format!("Bad timestamp {}: {}", s, e)))
}

fn parse_opt_ts(s: Option<String>) -> Result<Option<DateTime<Utc>>, RepoError> {
    s.as_deref().map(parse_ts).transpose()
}

fn parse_decimal(s: &str) -> Result<Decimal, RepoError> {
    Decimal::from_str(s).map_err(|e| RepoError::Database(format!("Bad amount {}: {}", s, e)))
}

const PRODUCT_COLUMNS: &str =
    "id, name, description, price, category, image_url, stock_quantity, is_active, created_at";

#[derive(FromRow)]
struct ProductRow {
    id: i64,
    name: String,
    description: Option<String>,
    price: String,
    category: Option<String>,
    image_url: Option<String>,
    stock_quantity: i32,
    is_active: bool,
    created_at: String,
}

impl ProductRow {
    fn into_domain(self) -> Result<Product, RepoError> {
        Ok(Product {
            id: ProductId::new(self.id),
            name: self.name,
            description: self.description,
            price: parse_decimal(&self.price)?,
            category: self.category,
            image_url: self.image_url,
            stock_quantity: self.stock_quantity,
            is_active: self.is_active,
            created_at: parse_ts(&self.created_at)?,
        })
    }
}

const ORDER_COLUMNS: &str = "id, customer_name, customer_email, customer_phone, total_amount, currency, status, created_at, updated_at";

#[derive(FromRow)]
struct OrderRow {
    id: i64,
    customer_name: String,
    customer_email: String,
    customer_phone: Option<String>,
    total_amount: String,
    currency: Option<String>,
    status: String,
    created_at: String,
    updated_at: String,
}

#[derive(FromRow)]
struct OrderItemRow {
    product_id: i64,
    product_name: String,
    quantity: i32,
    unit_price: String,
    subtotal: String,
}

impl OrderItemRow {
    fn into_domain(self) -> Result<OrderItem, RepoError> {
        Ok(OrderItem {
            product_id: ProductId::new(self.product_id),
            product_name: self.product_name,
            quantity: self.quantity,
            unit_price: parse_decimal(&self.unit_price)?,
            subtotal: parse_decimal(&self.subtotal)?,
        })
    }
}

impl OrderRow {
    fn into_domain(self, items: Vec<OrderItem>) -> Result<Order, RepoError> {
        Ok(Order {
            id: OrderId::new(self.id),
            customer_name: self.customer_name,
            customer_email: self.customer_email,
            customer_phone: self.customer_phone,
            items,
            total_amount: parse_decimal(&self.total_amount)?,
            currency: self.currency,
            status: parse_order_status(&self.status)?,
            created_at: parse_ts(&self.created_at)?,
            updated_at: parse_ts(&self.updated_at)?,
        })
    }
}

const PAYMENT_COLUMNS: &str = "id, order_id, amount, currency, status, payment_type, fraud_status, transaction_id, gateway_order_id, session_token, redirect_url, transaction_time, settlement_time, failure_reason, version, created_at, updated_at";

#[derive(FromRow)]
struct PaymentRow {
    id: String,
    order_id: i64,
    amount: String,
    currency: String,
    status: String,
    payment_type: Option<String>,
    fraud_status: Option<String>,
    transaction_id: String,
    gateway_order_id: String,
    session_token: String,
    redirect_url: String,
    transaction_time: Option<String>,
    settlement_time: Option<String>,
    failure_reason: Option<String>,
    version: i64,
    created_at: String,
    updated_at: String,
}

impl PaymentRow {
    fn into_domain(self) -> Result<Payment, RepoError> {
        let id = Uuid::parse_str(&self.id).map_err(|e| RepoError::Database(e.to_string()))?;
        Ok(Payment {
            id: PaymentId::from_uuid(id),
            order_id: OrderId::new(self.order_id),
            amount: parse_decimal(&self.amount)?,
            currency: self.currency,
            status: parse_payment_status(&self.status)?,
            payment_type: self.payment_type,
            fraud_status: self.fraud_status,
            transaction_id: self.transaction_id,
            gateway_order_id: self.gateway_order_id,
            session_token: self.session_token,
            redirect_url: self.redirect_url,
            transaction_time: parse_opt_ts(self.transaction_time)?,
            settlement_time: parse_opt_ts(self.settlement_time)?,
            failure_reason: self.failure_reason,
            version: self.version,
            created_at: parse_ts(&self.created_at)?,
            updated_at: parse_ts(&self.updated_at)?,
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Connection-level helpers (usable inside a transaction)
// ─────────────────────────────────────────────────────────────────────────────

async fn load_product(
    conn: &mut SqliteConnection,
    id: ProductId,
) -> Result<Option<Product>, RepoError> {
    let row: Option<ProductRow> =
        sqlx::query_as(&format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?"))
            .bind(id.as_i64())
            .fetch_optional(&mut *conn)
            .await
            .map_err(db_err)?;

    row.map(ProductRow::into_domain).transpose()
}

async fn load_order(conn: &mut SqliteConnection, id: i64) -> Result<Option<Order>, RepoError> {
    let row: Option<OrderRow> =
        sqlx::query_as(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = ?"))
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

async fn load_items(conn: &mut SqliteConnection, order_id: i64) -> Result<Vec<OrderItem>, RepoError> {
    let rows: Vec<OrderItemRow> = sqlx::query_as(
        r#"SELECT product_id, product_name, quantity, unit_price, subtotal
           FROM order_items WHERE order_id = ? ORDER BY id"#,
    )
    .bind(order_id)
    .fetch_all(&mut *conn)
    .await
    .map_err(db_err)?;

    rows.into_iter().map(OrderItemRow::into_domain).collect()
}

async fn load_orders(conn: &mut SqliteConnection, rows: Vec<OrderRow>) -> Result<Vec<Order>, RepoError> {
    let mut orders = Vec::with_capacity(rows.len());
    for row in rows {
        let items = load_items(conn, row.id).await?;
        orders.push(row.into_domain(items)?);
    }
    Ok(orders)
}

async fn load_payment(
    conn: &mut SqliteConnection,
    column: &str,
    value: &str,
) -> Result<Option<Payment>, RepoError> {
    let row: Option<PaymentRow> = sqlx::query_as(&format!(
        "SELECT {PAYMENT_COLUMNS} FROM payments WHERE {column} = ?"
    ))
    .bind(value)
    .fetch_optional(&mut *conn)
    .await
    .map_err(db_err)?;

    row.map(PaymentRow::into_domain).transpose()
}

/// Moves an order to `status`.
///
/// Cancelled orders are never reopened. Entering `Cancelled` returns the
/// order's items to stock; the conditional update makes that happen once even
/// under concurrent cancellation.
async fn apply_order_status(
    conn: &mut SqliteConnection,
    id: OrderId,
    status: OrderStatus,
    now: &str,
) -> Result<(), RepoError> {
    let current: Option<String> = sqlx::query_scalar("SELECT status FROM orders WHERE id = ?")
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

    let result = sqlx::query(
        r#"UPDATE orders SET status = ?, updated_at = ? WHERE id = ? AND status <> 'CANCELLED'"#,
    )
    .bind(status.as_str())
    .bind(now)
    .bind(id.as_i64())
    .execute(&mut *conn)
    .await
    .map_err(db_err)?;

    if result.rows_affected() == 0 {
        // Cancelled between the read and the write.
        if status == OrderStatus::Cancelled {
            return Ok(());
        }
        return Err(DomainError::OrderCancelled(id).into());
    }

    if status == OrderStatus::Cancelled {
        sqlx::query(
            r#"UPDATE products
               SET stock_quantity = stock_quantity + (
                   SELECT COALESCE(SUM(oi.quantity), 0) FROM order_items oi
                   WHERE oi.order_id = ? AND oi.product_id = products.id
               )
               WHERE id IN (SELECT product_id FROM order_items WHERE order_id = ?)"#,
        )
        .bind(id.as_i64())
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
impl ProductRepository for SqliteRepo {
    async fn create_product(&self, req: CreateProductRequest) -> Result<Product, RepoError> {
        req.validate()?;

        let row: ProductRow = sqlx::query_as(&format!(
            r#"INSERT INTO products (name, description, price, category, image_url, stock_quantity, is_active, created_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?)
               RETURNING {PRODUCT_COLUMNS}"#
        ))
        .bind(req.name.trim())
        .bind(&req.description)
        .bind(req.price.to_string())
        .bind(&req.category)
        .bind(&req.image_url)
        .bind(req.stock_quantity)
        .bind(req.is_active)
        .bind(ts(Utc::now()))
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)?;

        row.into_domain()
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>, RepoError> {
        let mut conn = self.pool.acquire().await.map_err(db_err)?;
        load_product(&mut conn, id).await
    }

    async fn list_active_products(&self) -> Result<Vec<Product>, RepoError> {
        let rows: Vec<ProductRow> = sqlx::query_as(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE is_active = 1 ORDER BY name"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.into_iter().map(ProductRow::into_domain).collect()
    }

    async fn search_products(&self, name: &str) -> Result<Vec<Product>, RepoError> {
        let rows: Vec<ProductRow> = sqlx::query_as(&format!(
            r#"SELECT {PRODUCT_COLUMNS} FROM products
               WHERE is_active = 1 AND LOWER(name) LIKE ? ESCAPE '\'
               ORDER BY name"#
        ))
        .bind(contains_pattern(name))
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.into_iter().map(ProductRow::into_domain).collect()
    }

    async fn list_products_by_category(&self, category: &str) -> Result<Vec<Product>, RepoError> {
        let rows: Vec<ProductRow> = sqlx::query_as(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE is_active = 1 AND category = ? ORDER BY name"
        ))
        .bind(category)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.into_iter().map(ProductRow::into_domain).collect()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Orders
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait]
impl OrderRepository for SqliteRepo {
    async fn create_order(&self, req: CreateOrderRequest) -> Result<Order, RepoError> {
        req.validate()?;

        let mut db_tx = self.pool.begin().await.map_err(tx_err)?;

        let mut items = Vec::with_capacity(req.items.len());
        for line in &req.items {
            let product = load_product(&mut db_tx, line.product_id)
                .await?
                .ok_or(DomainError::ProductNotFound(line.product_id))?;
            let item = OrderItem::from_product(&product, line.quantity)?;

            let taken = sqlx::query(
                r#"UPDATE products SET stock_quantity = stock_quantity - ?
                   WHERE id = ? AND stock_quantity >= ?"#,
            )
            .bind(line.quantity)
            .bind(line.product_id.as_i64())
            .bind(line.quantity)
            .execute(&mut *db_tx)
            .await
            .map_err(db_err)?;

            if taken.rows_affected() == 0 {
                return Err(DomainError::InsufficientStock {
                    product_id: product.id,
                    available: product.stock_quantity,
                    requested: line.quantity,
                }
                .into());
            }
            items.push(item);
        }

        let now = ts(Utc::now());
        let currency = req
            .currency
            .as_deref()
            .map(|c| c.trim().to_uppercase())
            .filter(|c| !c.is_empty());

        let order_id: i64 = sqlx::query_scalar(
            r#"INSERT INTO orders (customer_name, customer_email, customer_phone, total_amount, currency, status, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?)
               RETURNING id"#,
        )
        .bind(req.customer_name.trim())
        .bind(req.customer_email.trim())
        .bind(&req.customer_phone)
        .bind(Order::total_of(&items).to_string())
        .bind(&currency)
        .bind(OrderStatus::Created.as_str())
        .bind(&now)
        .bind(&now)
        .fetch_one(&mut *db_tx)
        .await
        .map_err(db_err)?;

        for item in &items {
            sqlx::query(
                r#"INSERT INTO order_items (order_id, product_id, product_name, quantity, unit_price, subtotal)
                   VALUES (?, ?, ?, ?, ?, ?)"#,
            )
            .bind(order_id)
            .bind(item.product_id.as_i64())
            .bind(&item.product_name)
            .bind(item.quantity)
            .bind(item.unit_price.to_string())
            .bind(item.subtotal.to_string())
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

        apply_order_status(&mut db_tx, id, status, &ts(Utc::now())).await?;
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
            "SELECT {ORDER_COLUMNS} FROM orders WHERE customer_email = ? ORDER BY created_at DESC, id DESC"
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
            "SELECT {ORDER_COLUMNS} FROM orders WHERE status = ? ORDER BY created_at DESC, id DESC"
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
impl PaymentRepository for SqliteRepo {
    async fn create_payment(&self, payment: &Payment) -> Result<Payment, RepoError> {
        let mut db_tx = self.pool.begin().await.map_err(tx_err)?;
        let id = payment.id.to_string();

        sqlx::query(
            r#"INSERT INTO payments (id, order_id, amount, currency, status, payment_type, fraud_status,
                   transaction_id, gateway_order_id, session_token, redirect_url, transaction_time,
                   settlement_time, failure_reason, version, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 0, ?, ?)"#,
        )
        .bind(&id)
        .bind(payment.order_id.as_i64())
        .bind(payment.amount.to_string())
        .bind(&payment.currency)
        .bind(payment.status.as_str())
        .bind(&payment.payment_type)
        .bind(&payment.fraud_status)
        .bind(&payment.transaction_id)
        .bind(&payment.gateway_order_id)
        .bind(&payment.session_token)
        .bind(&payment.redirect_url)
        .bind(payment.transaction_time.map(ts))
        .bind(payment.settlement_time.map(ts))
        .bind(&payment.failure_reason)
        .bind(ts(payment.created_at))
        .bind(ts(payment.updated_at))
        .execute(&mut *db_tx)
        .await
        .map_err(|e| {
            insert_err(e, || {
                format!("Payment already exists for order {}", payment.order_id)
            })
        })?;

        apply_order_status(
            &mut db_tx,
            payment.order_id,
            OrderStatus::PendingPayment,
            &ts(Utc::now()),
        )
        .await?;

        let stored = load_payment(&mut db_tx, "id", &id)
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
        let now = ts(Utc::now());
        let id = payment.id.to_string();
        let mut db_tx = self.pool.begin().await.map_err(tx_err)?;

        let result = sqlx::query(
            r#"UPDATE payments
               SET status = ?, payment_type = ?, fraud_status = ?, transaction_time = ?,
                   settlement_time = ?, failure_reason = ?, version = version + 1, updated_at = ?
               WHERE id = ? AND version = ?"#,
        )
        .bind(payment.status.as_str())
        .bind(&payment.payment_type)
        .bind(&payment.fraud_status)
        .bind(payment.transaction_time.map(ts))
        .bind(payment.settlement_time.map(ts))
        .bind(&payment.failure_reason)
        .bind(&now)
        .bind(&id)
        .bind(payment.version)
        .execute(&mut *db_tx)
        .await
        .map_err(db_err)?;

        if result.rows_affected() == 0 {
            let exists: Option<i64> = sqlx::query_scalar("SELECT version FROM payments WHERE id = ?")
                .bind(&id)
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
            match apply_order_status(&mut db_tx, payment.order_id, status, &now).await {
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

        let stored = load_payment(&mut db_tx, "id", &id)
            .await?
            .ok_or(RepoError::NotFound)?;

        db_tx.commit().await.map_err(tx_err)?;

        Ok(stored)
    }

    async fn find_payment_by_order(&self, order_id: OrderId) -> Result<Option<Payment>, RepoError> {
        let row: Option<PaymentRow> = sqlx::query_as(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE order_id = ?"
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
        let mut conn = self.pool.acquire().await.map_err(db_err)?;
        load_payment(&mut conn, "gateway_order_id", gateway_order_id).await
    }
}
