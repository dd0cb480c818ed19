//! Orders and their item snapshots.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, PgConnection, PgExecutor, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::domain::aggregates::{Order, OrderStatus, PaymentStatus, Pricing};
use crate::domain::value_objects::Money;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct OrderRow {
    pub id: Uuid,
    pub order_number: String,
    pub user_id: Option<Uuid>,
    pub cart_id: Option<Uuid>,
    pub email: String,
    pub status: String,
    pub payment_status: String,
    pub payment_provider: String,
    pub payment_reference: Option<String>,
    pub currency: String,
    pub subtotal: i64,
    pub discount: i64,
    pub shipping: i64,
    pub total: i64,
    pub coupon_code: Option<String>,
    pub locale: String,
    pub shipping_address: serde_json::Value,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OrderRow {
    pub fn pricing(&self) -> Pricing {
        let m = |minor| Money::from_minor(minor, &self.currency);
        Pricing { subtotal: m(self.subtotal), discount: m(self.discount), shipping: m(self.shipping), total: m(self.total) }
    }

    /// Status state of the stored order; unknown status strings read as pending.
    pub fn to_domain(&self) -> Order {
        Order::restore(
            self.id,
            self.order_number.clone(),
            OrderStatus::parse(&self.status).unwrap_or_default(),
            PaymentStatus::parse(&self.payment_status).unwrap_or_default(),
            self.pricing(),
        )
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct OrderItemRow {
    pub id: Uuid,
    pub product_id: Uuid,
    pub variant_id: Uuid,
    pub sku: String,
    pub name: String,
    pub quantity: i32,
    pub unit_price: i64,
    pub total: i64,
}

/// Attributes of an order that live outside the aggregate.
pub struct NewOrder<'a> {
    pub user_id: Option<Uuid>,
    pub cart_id: Uuid,
    pub email: &'a str,
    pub provider: &'a str,
    pub coupon_code: Option<&'a str>,
    pub locale: &'a str,
    pub shipping_address: &'a serde_json::Value,
}

const COLUMNS: &str = "id, order_number, user_id, cart_id, email, status, payment_status, payment_provider, \
     payment_reference, currency, subtotal, discount, shipping, total, coupon_code, locale, shipping_address, \
     paid_at, created_at, updated_at";

pub async fn insert(conn: &mut PgConnection, order: &Order, meta: NewOrder<'_>) -> Result<(), sqlx::Error> {
    let pricing = order.pricing();
    sqlx::query(
        "INSERT INTO orders (id, order_number, user_id, cart_id, email, status, payment_status, payment_provider, \
         currency, subtotal, discount, shipping, total, coupon_code, locale, shipping_address, created_at, updated_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, NOW(), NOW())",
    )
    .bind(order.id())
    .bind(order.order_number())
    .bind(meta.user_id)
    .bind(meta.cart_id)
    .bind(meta.email)
    .bind(order.status().as_str())
    .bind(order.payment_status().as_str())
    .bind(meta.provider)
    .bind(pricing.total.currency())
    .bind(pricing.subtotal.to_minor())
    .bind(pricing.discount.to_minor())
    .bind(pricing.shipping.to_minor())
    .bind(pricing.total.to_minor())
    .bind(meta.coupon_code)
    .bind(meta.locale)
    .bind(meta.shipping_address)
    .execute(&mut *conn)
    .await?;

    for item in order.items() {
        sqlx::query(
            "INSERT INTO order_items (id, order_id, product_id, variant_id, sku, name, quantity, unit_price, total) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(Uuid::now_v7())
        .bind(order.id())
        .bind(item.product_id)
        .bind(item.variant_id)
        .bind(&item.sku)
        .bind(&item.name)
        .bind(i32::try_from(item.quantity).unwrap_or(i32::MAX))
        .bind(item.unit_price.to_minor())
        .bind(item.total.to_minor())
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

/// Next value of `order_number_seq`. Sequence values are never handed out
/// twice, even when the surrounding transaction rolls back.
pub async fn next_number_sequence<'e>(db: impl PgExecutor<'e>) -> Result<i64, sqlx::Error> {
    let (value,): (i64,) = sqlx::query_as("SELECT nextval('order_number_seq')").fetch_one(db).await?;
    Ok(value)
}

pub async fn set_payment_reference<'e>(db: impl PgExecutor<'e>, id: Uuid, reference: &str) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE orders SET payment_reference = $2, updated_at = NOW() WHERE id = $1")
        .bind(id)
        .bind(reference)
        .execute(db)
        .await?;
    Ok(())
}

pub async fn find<'e>(db: impl PgExecutor<'e>, id: Uuid) -> Result<Option<OrderRow>, sqlx::Error> {
    sqlx::query_as::<_, OrderRow>(&format!("SELECT {COLUMNS} FROM orders WHERE id = $1"))
        .bind(id)
        .fetch_optional(db)
        .await
}

/// Locks the order row for the rest of the transaction.
pub async fn find_for_update<'e>(db: impl PgExecutor<'e>, id: Uuid) -> Result<Option<OrderRow>, sqlx::Error> {
    sqlx::query_as::<_, OrderRow>(&format!("SELECT {COLUMNS} FROM orders WHERE id = $1 FOR UPDATE"))
        .bind(id)
        .fetch_optional(db)
        .await
}

pub async fn items<'e>(db: impl PgExecutor<'e>, order_id: Uuid) -> Result<Vec<OrderItemRow>, sqlx::Error> {
    sqlx::query_as::<_, OrderItemRow>(
        "SELECT id, product_id, variant_id, sku, name, quantity, unit_price, total FROM order_items WHERE order_id = $1 ORDER BY sku",
    )
    .bind(order_id)
    .fetch_all(db)
    .await
}

/// One page of orders, newest first, with the total match count.
pub async fn list<'e>(
    db: impl PgExecutor<'e>,
    user_id: Option<Uuid>,
    status: Option<OrderStatus>,
    limit: i64,
    offset: i64,
) -> Result<(Vec<OrderRow>, i64), sqlx::Error> {
    let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(format!("SELECT {COLUMNS}, COUNT(*) OVER() AS total_count FROM orders WHERE TRUE"));
    if let Some(user_id) = user_id {
        qb.push(" AND user_id = ").push_bind(user_id);
    }
    if let Some(status) = status {
        qb.push(" AND status = ").push_bind(status.as_str());
    }
    qb.push(" ORDER BY created_at DESC, id LIMIT ").push_bind(limit);
    qb.push(" OFFSET ").push_bind(offset);

    let rows: Vec<CountedOrderRow> = qb.build_query_as().fetch_all(db).await?;
    let total = rows.first().map(|r| r.total_count).unwrap_or(0);
    Ok((rows.into_iter().map(|r| r.order).collect(), total))
}

#[derive(FromRow)]
struct CountedOrderRow {
    #[sqlx(flatten)]
    order: OrderRow,
    total_count: i64,
}

/// Writes back the status state of `order`. `paid_at` is stamped the first
/// time the payment status becomes paid.
pub async fn save_status<'e>(db: impl PgExecutor<'e>, order: &Order) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE orders SET status = $2, payment_status = $3, \
         paid_at = CASE WHEN $3::TEXT = 'paid' AND paid_at IS NULL THEN NOW() ELSE paid_at END, \
         updated_at = NOW() WHERE id = $1",
    )
    .bind(order.id())
    .bind(order.status().as_str())
    .bind(order.payment_status().as_str())
    .execute(db)
    .await?;
    Ok(())
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct RecentOrderRow {
    pub id: Uuid,
    pub order_number: String,
    pub email: String,
    pub status: String,
    pub total: i64,
    pub currency: String,
    pub created_at: DateTime<Utc>,
}

pub async fn recent<'e>(db: impl PgExecutor<'e>, limit: i64) -> Result<Vec<RecentOrderRow>, sqlx::Error> {
    sqlx::query_as::<_, RecentOrderRow>(
        "SELECT id, order_number, email, status, total, currency, created_at FROM orders ORDER BY created_at DESC LIMIT $1",
    )
    .bind(limit)
    .fetch_all(db)
    .await
}
