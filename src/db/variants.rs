//! Product variants: the purchasable, stocked unit.

use serde::Serialize;
use sqlx::{FromRow, PgConnection, PgExecutor};
use uuid::Uuid;

use crate::domain::aggregates::Variant;
use crate::domain::value_objects::{Money, Quantity, Sku, SkuError};

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct VariantRow {
    pub id: Uuid,
    pub product_id: Uuid,
    pub sku: String,
    pub title: String,
    pub price: i64,
    pub compare_at_price: Option<i64>,
    pub stock: i32,
    pub options: serde_json::Value,
    pub position: i32,
}

impl VariantRow {
    pub fn to_domain(&self, currency: &str) -> Result<Variant, SkuError> {
        Ok(Variant {
            id: self.id,
            sku: Sku::new(self.sku.as_str())?,
            title: self.title.clone(),
            price: Money::from_minor(self.price, currency),
            compare_at_price: self.compare_at_price.map(|c| Money::from_minor(c, currency)),
            stock: Quantity::new(self.stock.max(0) as u32),
        })
    }
}

const COLUMNS: &str = "id, product_id, sku, title, price, compare_at_price, stock, options, position";

pub async fn list_for_product<'e>(db: impl PgExecutor<'e>, product_id: Uuid) -> Result<Vec<VariantRow>, sqlx::Error> {
    sqlx::query_as::<_, VariantRow>(&format!("SELECT {COLUMNS} FROM product_variants WHERE product_id = $1 ORDER BY position, sku"))
        .bind(product_id)
        .fetch_all(db)
        .await
}

pub async fn find<'e>(db: impl PgExecutor<'e>, id: Uuid) -> Result<Option<VariantRow>, sqlx::Error> {
    sqlx::query_as::<_, VariantRow>(&format!("SELECT {COLUMNS} FROM product_variants WHERE id = $1"))
        .bind(id)
        .fetch_optional(db)
        .await
}

pub struct VariantWrite<'a> {
    pub sku: &'a str,
    pub title: &'a str,
    pub price: i64,
    pub compare_at_price: Option<i64>,
    pub stock: i32,
    pub options: &'a serde_json::Value,
    pub position: i32,
}

pub async fn insert<'e>(db: impl PgExecutor<'e>, id: Uuid, product_id: Uuid, v: VariantWrite<'_>) -> Result<VariantRow, sqlx::Error> {
    sqlx::query_as::<_, VariantRow>(&format!(
        "INSERT INTO product_variants (id, product_id, sku, title, price, compare_at_price, stock, options, position, created_at, updated_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, NOW(), NOW()) RETURNING {COLUMNS}"
    ))
    .bind(id)
    .bind(product_id)
    .bind(v.sku)
    .bind(v.title)
    .bind(v.price)
    .bind(v.compare_at_price)
    .bind(v.stock)
    .bind(v.options)
    .bind(v.position)
    .fetch_one(db)
    .await
}

pub async fn update<'e>(db: impl PgExecutor<'e>, id: Uuid, v: VariantWrite<'_>) -> Result<Option<VariantRow>, sqlx::Error> {
    sqlx::query_as::<_, VariantRow>(&format!(
        "UPDATE product_variants SET sku = $2, title = $3, price = $4, compare_at_price = $5, stock = $6, \
         options = $7, position = $8, updated_at = NOW() WHERE id = $1 RETURNING {COLUMNS}"
    ))
    .bind(id)
    .bind(v.sku)
    .bind(v.title)
    .bind(v.price)
    .bind(v.compare_at_price)
    .bind(v.stock)
    .bind(v.options)
    .bind(v.position)
    .fetch_optional(db)
    .await
}

pub async fn delete<'e>(db: impl PgExecutor<'e>, id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM product_variants WHERE id = $1").bind(id).execute(db).await?;
    Ok(result.rows_affected() == 1)
}

/// Variants of one product, locked for the rest of the transaction.
pub async fn list_for_product_for_update(conn: &mut PgConnection, product_id: Uuid) -> Result<Vec<VariantRow>, sqlx::Error> {
    sqlx::query_as::<_, VariantRow>(&format!(
        "SELECT {COLUMNS} FROM product_variants WHERE product_id = $1 ORDER BY position, sku FOR UPDATE"
    ))
    .bind(product_id)
    .fetch_all(&mut *conn)
    .await
}

pub async fn set_stock<'e>(db: impl PgExecutor<'e>, id: Uuid, stock: i32) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE product_variants SET stock = $2, updated_at = NOW() WHERE id = $1")
        .bind(id)
        .bind(stock)
        .execute(db)
        .await?;
    Ok(())
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct LowStockRow {
    pub variant_id: Uuid,
    pub product_id: Uuid,
    pub sku: String,
    pub title: String,
    pub stock: i32,
}

pub async fn low_stock<'e>(db: impl PgExecutor<'e>, threshold: i32, limit: i64) -> Result<Vec<LowStockRow>, sqlx::Error> {
    sqlx::query_as::<_, LowStockRow>(
        "SELECT v.id AS variant_id, v.product_id, v.sku, v.title, v.stock FROM product_variants v \
         JOIN products p ON p.id = v.product_id WHERE p.status = 'active' AND v.stock <= $1 \
         ORDER BY v.stock, v.sku LIMIT $2",
    )
    .bind(threshold)
    .bind(limit)
    .fetch_all(db)
    .await
}
