//! Products and their translations.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, PgConnection, PgExecutor, PgPool};
use uuid::Uuid;

use super::{upsert_translations, Translation, TranslationTable};
use crate::catalog::ProductFilter;
use crate::domain::aggregates::{Product, ProductStatus, Variant};
use crate::domain::value_objects::{Slug, SlugError};
use crate::locale::Locale;

/// One row of a catalog listing.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ProductSummaryRow {
    pub id: Uuid,
    pub slug: String,
    pub category_id: Option<Uuid>,
    pub status: String,
    pub images: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub name: String,
    pub description: Option<String>,
    pub price_from: Option<i64>,
    pub compare_at_from: Option<i64>,
    pub total_stock: i64,
    #[serde(skip)]
    pub total_count: i64,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ProductRow {
    pub id: Uuid,
    pub slug: String,
    pub category_id: Option<Uuid>,
    pub status: String,
    pub featured: bool,
    pub images: Vec<String>,
    pub tags: Vec<String>,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProductRow {
    /// Aggregate view of this product over `variants`. Unknown status
    /// strings read as draft.
    pub fn to_domain(&self, variants: Vec<Variant>) -> Result<Product, SlugError> {
        let status = ProductStatus::parse(&self.status).unwrap_or_default();
        Ok(Product::restore(self.id, Slug::new(self.slug.as_str())?, self.name.clone(), status, variants))
    }
}

const LOCALIZED_SELECT: &str = "SELECT p.id, p.slug, p.category_id, p.status, p.featured, p.images, p.tags, \
     p.created_at, p.updated_at, COALESCE(t.name, d.name, p.slug) AS name, COALESCE(t.description, d.description) AS description \
     FROM products p \
     LEFT JOIN product_translations t ON t.product_id = p.id AND t.locale = $1 \
     LEFT JOIN product_translations d ON d.product_id = p.id AND d.locale = $2";

/// Runs a catalog search. Returns the page and the total match count.
pub async fn search(
    pool: &PgPool,
    filter: &ProductFilter,
    locale: Locale,
    fallback: Locale,
) -> Result<(Vec<ProductSummaryRow>, i64), sqlx::Error> {
    let mut qb = filter.build_query(locale, fallback);
    let rows = qb.build_query_as::<ProductSummaryRow>().fetch_all(pool).await?;
    let total = rows.first().map(|r| r.total_count).unwrap_or(0);
    Ok((rows, total))
}

pub async fn find_by_slug<'e>(
    db: impl PgExecutor<'e>,
    slug: &str,
    locale: Locale,
    fallback: Locale,
) -> Result<Option<ProductRow>, sqlx::Error> {
    sqlx::query_as::<_, ProductRow>(&format!("{LOCALIZED_SELECT} WHERE p.slug = $3"))
        .bind(locale.code())
        .bind(fallback.code())
        .bind(slug)
        .fetch_optional(db)
        .await
}

pub async fn find_by_id<'e>(
    db: impl PgExecutor<'e>,
    id: Uuid,
    locale: Locale,
    fallback: Locale,
) -> Result<Option<ProductRow>, sqlx::Error> {
    sqlx::query_as::<_, ProductRow>(&format!("{LOCALIZED_SELECT} WHERE p.id = $3"))
        .bind(locale.code())
        .bind(fallback.code())
        .bind(id)
        .fetch_optional(db)
        .await
}

pub async fn translations<'e>(db: impl PgExecutor<'e>, product_id: Uuid) -> Result<Vec<(String, String, Option<String>)>, sqlx::Error> {
    sqlx::query_as("SELECT locale, name, description FROM product_translations WHERE product_id = $1 ORDER BY locale")
        .bind(product_id)
        .fetch_all(db)
        .await
}

pub struct ProductWrite<'a> {
    pub slug: &'a str,
    pub category_id: Option<Uuid>,
    pub featured: bool,
    pub images: &'a [String],
    pub tags: &'a [String],
    pub translations: &'a [Translation],
}

pub async fn insert(conn: &mut PgConnection, id: Uuid, status: &str, input: ProductWrite<'_>) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO products (id, slug, category_id, status, featured, images, tags, created_at, updated_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, NOW(), NOW())",
    )
    .bind(id)
    .bind(input.slug)
    .bind(input.category_id)
    .bind(status)
    .bind(input.featured)
    .bind(input.images)
    .bind(input.tags)
    .execute(&mut *conn)
    .await?;
    upsert_translations(conn, TranslationTable::Product, id, input.translations).await
}

pub async fn update(conn: &mut PgConnection, id: Uuid, input: ProductWrite<'_>) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE products SET slug = $2, category_id = $3, featured = $4, images = $5, tags = $6, updated_at = NOW() WHERE id = $1",
    )
    .bind(id)
    .bind(input.slug)
    .bind(input.category_id)
    .bind(input.featured)
    .bind(input.images)
    .bind(input.tags)
    .execute(&mut *conn)
    .await?;
    if result.rows_affected() == 0 {
        return Ok(false);
    }
    upsert_translations(conn, TranslationTable::Product, id, input.translations).await?;
    Ok(true)
}

pub async fn set_status<'e>(db: impl PgExecutor<'e>, id: Uuid, status: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("UPDATE products SET status = $2, updated_at = NOW() WHERE id = $1")
        .bind(id)
        .bind(status)
        .execute(db)
        .await?;
    Ok(result.rows_affected() == 1)
}

pub async fn delete<'e>(db: impl PgExecutor<'e>, id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM products WHERE id = $1").bind(id).execute(db).await?;
    Ok(result.rows_affected() == 1)
}
