use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{
    CategoryId, CustomerId, Money, OrderId, OrderStatus, PaymentMethod, ProductId, PromotionId,
};
use sqlx::{PgPool, Postgres, Row, Transaction, postgres::PgRow};
use uuid::Uuid;

use crate::{
    Category, CatalogStore, NewOrder, Order, OrderLine, OrderPricing, OrderQuery, OrderStore,
    Payment, PaymentStore, Product, ProductDraft, ProductFilter, Promotion, PromotionDraft,
    PromotionStore, Result, StatusChange, StoreError,
};

const PRODUCT_COLUMNS: &str =
    "id, name, category_id, price_cents, description, active, stock";
const PROMOTION_COLUMNS: &str = "id, name, description, discount_percent, minimum_amount_cents, active, starts_on, ends_on";
const ORDER_COLUMNS: &str =
    "id, customer_id, created_at, status, subtotal_cents, discount_cents, total_cents, promotion_id";

/// PostgreSQL-backed store implementation.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a new PostgreSQL store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Opens a connection pool to `url`.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self> {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await?;
        Ok(Self::new(pool))
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await
    }

    fn row_to_category(row: PgRow) -> Result<Category> {
        Ok(Category {
            id: CategoryId::new(row.try_get("id")?),
            name: row.try_get("name")?,
        })
    }

    fn row_to_product(row: PgRow) -> Result<Product> {
        Ok(Product {
            id: ProductId::new(row.try_get("id")?),
            name: row.try_get("name")?,
            category_id: row
                .try_get::<Option<i64>, _>("category_id")?
                .map(CategoryId::new),
            price: Money::from_cents(row.try_get("price_cents")?),
            description: row.try_get("description")?,
            active: row.try_get("active")?,
            stock: to_u32("stock", row.try_get("stock")?)?,
        })
    }

    fn row_to_promotion(row: PgRow) -> Result<Promotion> {
        Ok(Promotion {
            id: PromotionId::new(row.try_get("id")?),
            name: row.try_get("name")?,
            description: row.try_get("description")?,
            discount_percent: row.try_get("discount_percent")?,
            minimum_amount: row
                .try_get::<Option<i64>, _>("minimum_amount_cents")?
                .map(Money::from_cents),
            active: row.try_get("active")?,
            starts_on: row.try_get("starts_on")?,
            ends_on: row.try_get("ends_on")?,
        })
    }

    /// Maps an order row; lines are attached by the caller.
    fn row_to_order(row: PgRow) -> Result<Order> {
        Ok(Order {
            id: OrderId::new(row.try_get("id")?),
            customer_id: CustomerId::from_uuid(row.try_get::<Uuid, _>("customer_id")?),
            created_at: row.try_get("created_at")?,
            status: parse_status(row.try_get("status")?)?,
            pricing: OrderPricing {
                subtotal: Money::from_cents(row.try_get("subtotal_cents")?),
                discount: Money::from_cents(row.try_get("discount_cents")?),
                total: Money::from_cents(row.try_get("total_cents")?),
                promotion_id: row
                    .try_get::<Option<i64>, _>("promotion_id")?
                    .map(PromotionId::new),
            },
            lines: Vec::new(),
        })
    }

    fn row_to_payment(row: PgRow) -> Result<Payment> {
        let method: String = row.try_get("method")?;
        Ok(Payment {
            order_id: OrderId::new(row.try_get("order_id")?),
            method: method
                .parse::<PaymentMethod>()
                .map_err(|e| StoreError::InvalidRecord(e.to_string()))?,
            reference: row.try_get("reference")?,
            paid: row.try_get("paid")?,
            paid_at: row.try_get("paid_at")?,
        })
    }

    /// Loads the lines of the given orders and attaches them in insertion order.
    async fn attach_lines(&self, mut orders: Vec<Order>) -> Result<Vec<Order>> {
        if orders.is_empty() {
            return Ok(orders);
        }

        let ids: Vec<i64> = orders.iter().map(|o| o.id.as_i64()).collect();
        let rows = sqlx::query(
            r#"
            SELECT order_id, product_id, product_name, quantity, unit_price_cents
            FROM order_lines
            WHERE order_id = ANY($1)
            ORDER BY id ASC
            "#,
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;

        let mut lines: HashMap<i64, Vec<OrderLine>> = HashMap::new();
        for row in rows {
            let order_id: i64 = row.try_get("order_id")?;
            lines.entry(order_id).or_default().push(OrderLine {
                product_id: ProductId::new(row.try_get("product_id")?),
                product_name: row.try_get("product_name")?,
                quantity: to_u32("quantity", row.try_get("quantity")?)?,
                unit_price: Money::from_cents(row.try_get("unit_price_cents")?),
            });
        }

        for order in &mut orders {
            order.lines = lines.remove(&order.id.as_i64()).unwrap_or_default();
        }
        Ok(orders)
    }

    async fn load_order(&self, id: OrderId) -> Result<Order> {
        self.get_order(id)
            .await?
            .ok_or_else(|| StoreError::not_found("Order", id))
    }

    /// Compare-and-set on the order status plus the history append, inside
    /// the caller's transaction.
    async fn change_status_in(
        tx: &mut Transaction<'_, Postgres>,
        id: OrderId,
        expected: OrderStatus,
        next: OrderStatus,
        at: DateTime<Utc>,
    ) -> Result<()> {
        let updated = sqlx::query("UPDATE orders SET status = $1 WHERE id = $2 AND status = $3")
            .bind(next.as_str())
            .bind(id.as_i64())
            .bind(expected.as_str())
            .execute(&mut **tx)
            .await?;

        if updated.rows_affected() == 0 {
            let actual: Option<String> =
                sqlx::query_scalar("SELECT status FROM orders WHERE id = $1")
                    .bind(id.as_i64())
                    .fetch_optional(&mut **tx)
                    .await?;
            return match actual {
                Some(actual) => Err(StoreError::StatusConflict {
                    order_id: id,
                    expected,
                    actual: parse_status(actual)?,
                }),
                None => Err(StoreError::not_found("Order", id)),
            };
        }

        sqlx::query(
            "INSERT INTO order_status_history (order_id, status, changed_at) VALUES ($1, $2, $3)",
        )
        .bind(id.as_i64())
        .bind(next.as_str())
        .bind(at)
        .execute(&mut **tx)
        .await?;

        Ok(())
    }
}

fn parse_status(label: String) -> Result<OrderStatus> {
    label
        .parse::<OrderStatus>()
        .map_err(|e| StoreError::InvalidRecord(e.to_string()))
}

fn to_u32(column: &str, value: i32) -> Result<u32> {
    u32::try_from(value)
        .map_err(|_| StoreError::InvalidRecord(format!("negative {column}: {value}")))
}

fn to_i32(column: &str, value: u32) -> Result<i32> {
    i32::try_from(value)
        .map_err(|_| StoreError::InvalidRecord(format!("{column} out of range: {value}")))
}

#[async_trait]
impl CatalogStore for PostgresStore {
    async fn create_category(&self, name: &str) -> Result<Category> {
        let row = sqlx::query("INSERT INTO categories (name) VALUES ($1) RETURNING id, name")
            .bind(name)
            .fetch_one(&self.pool)
            .await?;
        Self::row_to_category(row)
    }

    async fn list_categories(&self) -> Result<Vec<Category>> {
        let rows = sqlx::query("SELECT id, name FROM categories ORDER BY id ASC")
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(Self::row_to_category).collect()
    }

    async fn create_product(&self, draft: ProductDraft) -> Result<Product> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO products (name, category_id, price_cents, description, active, stock)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {PRODUCT_COLUMNS}
            "#
        ))
        .bind(&draft.name)
        .bind(draft.category_id.map(|id| id.as_i64()))
        .bind(draft.price.cents())
        .bind(&draft.description)
        .bind(draft.active)
        .bind(to_i32("stock", draft.stock)?)
        .fetch_one(&self.pool)
        .await?;
        Self::row_to_product(row)
    }

    async fn update_product(&self, id: ProductId, draft: ProductDraft) -> Result<Product> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE products
            SET name = $2, category_id = $3, price_cents = $4, description = $5, active = $6, stock = $7
            WHERE id = $1
            RETURNING {PRODUCT_COLUMNS}
            "#
        ))
        .bind(id.as_i64())
        .bind(&draft.name)
        .bind(draft.category_id.map(|id| id.as_i64()))
        .bind(draft.price.cents())
        .bind(&draft.description)
        .bind(draft.active)
        .bind(to_i32("stock", draft.stock)?)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Self::row_to_product(row),
            None => Err(StoreError::not_found("Product", id)),
        }
    }

    async fn delete_product(&self, id: ProductId) -> Result<()> {
        let deleted = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id.as_i64())
            .execute(&self.pool)
            .await?;
        if deleted.rows_affected() == 0 {
            return Err(StoreError::not_found("Product", id));
        }
        Ok(())
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>> {
        let row = sqlx::query(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1"
        ))
        .bind(id.as_i64())
        .fetch_optional(&self.pool)
        .await?;
        row.map(Self::row_to_product).transpose()
    }

    async fn get_products(&self, ids: &[ProductId]) -> Result<Vec<Product>> {
        let ids: Vec<i64> = ids.iter().map(|id| id.as_i64()).collect();
        let rows = sqlx::query(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ANY($1) ORDER BY id ASC"
        ))
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Self::row_to_product).collect()
    }

    async fn list_products(&self, filter: ProductFilter) -> Result<Vec<Product>> {
        let condition = if filter.orderable_only {
            "WHERE active AND stock > 0"
        } else {
            ""
        };
        let rows = sqlx::query(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products {condition} ORDER BY name ASC, id ASC"
        ))
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Self::row_to_product).collect()
    }
}

#[async_trait]
impl PromotionStore for PostgresStore {
    async fn create_promotion(&self, draft: PromotionDraft) -> Result<Promotion> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO promotions (name, description, discount_percent, minimum_amount_cents, active, starts_on, ends_on)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {PROMOTION_COLUMNS}
            "#
        ))
        .bind(&draft.name)
        .bind(&draft.description)
        .bind(draft.discount_percent)
        .bind(draft.minimum_amount.map(|m| m.cents()))
        .bind(draft.active)
        .bind(draft.starts_on)
        .bind(draft.ends_on)
        .fetch_one(&self.pool)
        .await?;
        Self::row_to_promotion(row)
    }

    async fn update_promotion(
        &self,
        id: PromotionId,
        draft: PromotionDraft,
    ) -> Result<Promotion> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE promotions
            SET name = $2, description = $3, discount_percent = $4, minimum_amount_cents = $5,
                active = $6, starts_on = $7, ends_on = $8
            WHERE id = $1
            RETURNING {PROMOTION_COLUMNS}
            "#
        ))
        .bind(id.as_i64())
        .bind(&draft.name)
        .bind(&draft.description)
        .bind(draft.discount_percent)
        .bind(draft.minimum_amount.map(|m| m.cents()))
        .bind(draft.active)
        .bind(draft.starts_on)
        .bind(draft.ends_on)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Self::row_to_promotion(row),
            None => Err(StoreError::not_found("Promotion", id)),
        }
    }

    async fn get_promotion(&self, id: PromotionId) -> Result<Option<Promotion>> {
        let row = sqlx::query(&format!(
            "SELECT {PROMOTION_COLUMNS} FROM promotions WHERE id = $1"
        ))
        .bind(id.as_i64())
        .fetch_optional(&self.pool)
        .await?;
        row.map(Self::row_to_promotion).transpose()
    }

    async fn list_promotions(&self, active_only: bool) -> Result<Vec<Promotion>> {
        let condition = if active_only { "WHERE active" } else { "" };
        let rows = sqlx::query(&format!(
            "SELECT {PROMOTION_COLUMNS} FROM promotions {condition} ORDER BY id ASC"
        ))
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Self::row_to_promotion).collect()
    }
}

#[async_trait]
impl OrderStore for PostgresStore {
    async fn place_order(&self, new_order: NewOrder) -> Result<Order> {
        let mut tx = self.pool.begin().await?;

        // Conditional decrement: the row only changes if enough stock is left
        for line in &new_order.lines {
            let quantity = to_i32("quantity", line.quantity)?;
            let updated =
                sqlx::query("UPDATE products SET stock = stock - $1 WHERE id = $2 AND stock >= $1")
                    .bind(quantity)
                    .bind(line.product_id.as_i64())
                    .execute(&mut *tx)
                    .await?;

            if updated.rows_affected() == 0 {
                let available: Option<i32> =
                    sqlx::query_scalar("SELECT stock FROM products WHERE id = $1")
                        .bind(line.product_id.as_i64())
                        .fetch_optional(&mut *tx)
                        .await?;
                tracing::debug!(
                    product_id = %line.product_id,
                    requested = line.quantity,
                    ?available,
                    "stock shortfall, rolling back order placement"
                );
                return match available {
                    Some(available) => Err(StoreError::InsufficientStock {
                        product_id: line.product_id,
                        requested: line.quantity,
                        available: to_u32("stock", available)?,
                    }),
                    None => Err(StoreError::not_found("Product", line.product_id)),
                };
            }
        }

        let pricing = new_order.pricing;
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO orders (customer_id, created_at, status, subtotal_cents, discount_cents, total_cents, promotion_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {ORDER_COLUMNS}
            "#
        ))
        .bind(new_order.customer_id.as_uuid())
        .bind(new_order.created_at)
        .bind(OrderStatus::Pending.as_str())
        .bind(pricing.subtotal.cents())
        .bind(pricing.discount.cents())
        .bind(pricing.total.cents())
        .bind(pricing.promotion_id.map(|id| id.as_i64()))
        .fetch_one(&mut *tx)
        .await?;
        let mut order = Self::row_to_order(row)?;

        for line in &new_order.lines {
            sqlx::query(
                r#"
                INSERT INTO order_lines (order_id, product_id, product_name, quantity, unit_price_cents)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(order.id.as_i64())
            .bind(line.product_id.as_i64())
            .bind(&line.product_name)
            .bind(to_i32("quantity", line.quantity)?)
            .bind(line.unit_price.cents())
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query(
            "INSERT INTO order_status_history (order_id, status, changed_at) VALUES ($1, $2, $3)",
        )
        .bind(order.id.as_i64())
        .bind(OrderStatus::Pending.as_str())
        .bind(new_order.created_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        tracing::debug!(order_id = %order.id, lines = new_order.lines.len(), "order persisted");

        order.lines = new_order.lines;
        Ok(order)
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>> {
        let row = sqlx::query(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"))
            .bind(id.as_i64())
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => {
                let order = Self::row_to_order(row)?;
                Ok(self.attach_lines(vec![order]).await?.pop())
            }
            None => Ok(None),
        }
    }

    async fn query_orders(&self, query: OrderQuery) -> Result<Vec<Order>> {
        let mut sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE 1=1");
        let mut param_count = 0;

        // Build dynamic query
        if query.customer_id.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND customer_id = ${param_count}"));
        }
        if query.statuses.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND status = ANY(${param_count})"));
        }
        if !query.excluded_statuses.is_empty() {
            param_count += 1;
            sql.push_str(&format!(" AND NOT (status = ANY(${param_count}))"));
        }

        if query.newest_first {
            sql.push_str(" ORDER BY created_at DESC, id DESC");
        } else {
            sql.push_str(" ORDER BY created_at ASC, id ASC");
        }

        if query.limit.is_some() {
            param_count += 1;
            sql.push_str(&format!(" LIMIT ${param_count}"));
        }
        if query.offset.is_some() {
            param_count += 1;
            sql.push_str(&format!(" OFFSET ${param_count}"));
        }

        let labels = |statuses: &[OrderStatus]| -> Vec<String> {
            statuses.iter().map(|s| s.as_str().to_string()).collect()
        };

        let mut sqlx_query = sqlx::query(&sql);
        if let Some(customer_id) = query.customer_id {
            sqlx_query = sqlx_query.bind(customer_id.as_uuid());
        }
        if let Some(ref statuses) = query.statuses {
            sqlx_query = sqlx_query.bind(labels(statuses));
        }
        if !query.excluded_statuses.is_empty() {
            sqlx_query = sqlx_query.bind(labels(&query.excluded_statuses));
        }
        if let Some(limit) = query.limit {
            sqlx_query = sqlx_query.bind(limit as i64);
        }
        if let Some(offset) = query.offset {
            sqlx_query = sqlx_query.bind(offset as i64);
        }

        let rows = sqlx_query.fetch_all(&self.pool).await?;
        let orders = rows
            .into_iter()
            .map(Self::row_to_order)
            .collect::<Result<Vec<_>>>()?;
        self.attach_lines(orders).await
    }

    async fn update_pricing(&self, id: OrderId, pricing: OrderPricing) -> Result<Order> {
        let updated = sqlx::query(
            r#"
            UPDATE orders
            SET subtotal_cents = $2, discount_cents = $3, total_cents = $4, promotion_id = $5
            WHERE id = $1
            "#,
        )
        .bind(id.as_i64())
        .bind(pricing.subtotal.cents())
        .bind(pricing.discount.cents())
        .bind(pricing.total.cents())
        .bind(pricing.promotion_id.map(|id| id.as_i64()))
        .execute(&self.pool)
        .await?;

        if updated.rows_affected() == 0 {
            return Err(StoreError::not_found("Order", id));
        }
        self.load_order(id).await
    }

    async fn change_status(
        &self,
        id: OrderId,
        expected: OrderStatus,
        next: OrderStatus,
    ) -> Result<Order> {
        let mut tx = self.pool.begin().await?;
        Self::change_status_in(&mut tx, id, expected, next, Utc::now()).await?;
        tx.commit().await?;
        self.load_order(id).await
    }

    async fn status_history(&self, id: OrderId) -> Result<Vec<StatusChange>> {
        self.load_order(id).await?;

        let rows = sqlx::query(
            r#"
            SELECT order_id, status, changed_at
            FROM order_status_history
            WHERE order_id = $1
            ORDER BY id ASC
            "#,
        )
        .bind(id.as_i64())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                Ok(StatusChange {
                    order_id: OrderId::new(row.try_get("order_id")?),
                    status: parse_status(row.try_get("status")?)?,
                    changed_at: row.try_get("changed_at")?,
                })
            })
            .collect()
    }
}

#[async_trait]
impl PaymentStore for PostgresStore {
    async fn get_payment(&self, order_id: OrderId) -> Result<Option<Payment>> {
        let row = sqlx::query(
            "SELECT order_id, method, reference, paid, paid_at FROM payments WHERE order_id = $1",
        )
        .bind(order_id.as_i64())
        .fetch_optional(&self.pool)
        .await?;
        row.map(Self::row_to_payment).transpose()
    }

    async fn select_payment_method(
        &self,
        order_id: OrderId,
        method: PaymentMethod,
    ) -> Result<Payment> {
        let row = sqlx::query(
            r#"
            INSERT INTO payments (order_id, method, paid, paid_at)
            VALUES ($1, $2, FALSE, NULL)
            ON CONFLICT (order_id) DO UPDATE SET
                method = EXCLUDED.method,
                paid = FALSE,
                paid_at = NULL
            RETURNING order_id, method, reference, paid, paid_at
            "#,
        )
        .bind(order_id.as_i64())
        .bind(method.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.is_foreign_key_violation()
            {
                return StoreError::not_found("Order", order_id);
            }
            StoreError::Database(e)
        })?;
        Self::row_to_payment(row)
    }

    async fn confirm_payment(
        &self,
        order_id: OrderId,
        reference: Option<String>,
        paid_at: DateTime<Utc>,
    ) -> Result<(Payment, Order)> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(
            r#"
            UPDATE payments
            SET paid = TRUE, paid_at = $2, reference = $3
            WHERE order_id = $1 AND paid = FALSE
            RETURNING order_id, method, reference, paid, paid_at
            "#,
        )
        .bind(order_id.as_i64())
        .bind(paid_at)
        .bind(&reference)
        .fetch_optional(&mut *tx)
        .await?;

        let payment = match row {
            Some(row) => Self::row_to_payment(row)?,
            None => {
                let exists: Option<bool> =
                    sqlx::query_scalar("SELECT paid FROM payments WHERE order_id = $1")
                        .bind(order_id.as_i64())
                        .fetch_optional(&mut *tx)
                        .await?;
                return match exists {
                    Some(_) => Err(StoreError::AlreadyPaid(order_id)),
                    None => Err(StoreError::not_found("Payment", order_id)),
                };
            }
        };

        Self::change_status_in(
            &mut tx,
            order_id,
            OrderStatus::Pending,
            OrderStatus::Pending,
            paid_at,
        )
        .await?;

        tx.commit().await?;

        let order = self.load_order(order_id).await?;
        Ok((payment, order))
    }
}
