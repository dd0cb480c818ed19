//! Aggregates for the admin dashboard.

use serde::Serialize;
use sqlx::{FromRow, PgExecutor};

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct StatusCount {
    pub status: String,
    pub count: i64,
}

pub async fn orders_by_status<'e>(db: impl PgExecutor<'e>) -> Result<Vec<StatusCount>, sqlx::Error> {
    sqlx::query_as::<_, StatusCount>("SELECT status, COUNT(*) AS count FROM orders GROUP BY status ORDER BY status")
        .fetch_all(db)
        .await
}

/// Sum of totals over orders whose payment went through and that were
/// neither cancelled nor refunded.
pub async fn paid_revenue<'e>(db: impl PgExecutor<'e>) -> Result<i64, sqlx::Error> {
    let (revenue,): (i64,) = sqlx::query_as(
        "SELECT COALESCE(SUM(total), 0)::BIGINT FROM orders \
         WHERE payment_status = 'paid' AND status NOT IN ('cancelled', 'refunded')",
    )
    .fetch_one(db)
    .await?;
    Ok(revenue)
}

#[derive(Debug, Clone, Default, Serialize, FromRow)]
pub struct ProductCounts {
    pub total: i64,
    pub active: i64,
    pub draft: i64,
    pub archived: i64,
}

pub async fn product_counts<'e>(db: impl PgExecutor<'e>) -> Result<ProductCounts, sqlx::Error> {
    sqlx::query_as::<_, ProductCounts>(
        "SELECT COUNT(*) AS total, \
         COUNT(*) FILTER (WHERE status = 'active') AS active, \
         COUNT(*) FILTER (WHERE status = 'draft') AS draft, \
         COUNT(*) FILTER (WHERE status = 'archived') AS archived \
         FROM products",
    )
    .fetch_one(db)
    .await
}
