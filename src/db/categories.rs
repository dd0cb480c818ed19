//! Category tree with per-locale names.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, PgConnection, PgExecutor};
use uuid::Uuid;

use super::{upsert_translations, Translation, TranslationTable};
use crate::locale::Locale;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct CategoryRow {
    pub id: Uuid,
    pub slug: String,
    pub parent_id: Option<Uuid>,
    pub image_url: Option<String>,
    pub position: i32,
    pub name: String,
    pub description: Option<String>,
    pub updated_at: DateTime<Utc>,
}

const LOCALIZED_SELECT: &str = "SELECT c.id, c.slug, c.parent_id, c.image_url, c.position, c.updated_at, \
     COALESCE(t.name, d.name, c.slug) AS name, COALESCE(t.description, d.description) AS description \
     FROM categories c \
     LEFT JOIN category_translations t ON t.category_id = c.id AND t.locale = $1 \
     LEFT JOIN category_translations d ON d.category_id = c.id AND d.locale = $2";

pub async fn list<'e>(db: impl PgExecutor<'e>, locale: Locale, fallback: Locale) -> Result<Vec<CategoryRow>, sqlx::Error> {
    sqlx::query_as::<_, CategoryRow>(&format!("{LOCALIZED_SELECT} ORDER BY c.parent_id NULLS FIRST, c.position, name"))
        .bind(locale.code())
        .bind(fallback.code())
        .fetch_all(db)
        .await
}

pub async fn find_by_slug<'e>(
    db: impl PgExecutor<'e>,
    slug: &str,
    locale: Locale,
    fallback: Locale,
) -> Result<Option<CategoryRow>, sqlx::Error> {
    sqlx::query_as::<_, CategoryRow>(&format!("{LOCALIZED_SELECT} WHERE c.slug = $3"))
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
) -> Result<Option<CategoryRow>, sqlx::Error> {
    sqlx::query_as::<_, CategoryRow>(&format!("{LOCALIZED_SELECT} WHERE c.id = $3"))
        .bind(locale.code())
        .bind(fallback.code())
        .bind(id)
        .fetch_optional(db)
        .await
}

/// Direct children of `id` (or root categories for `None`).
pub async fn children<'e>(
    db: impl PgExecutor<'e>,
    id: Uuid,
    locale: Locale,
    fallback: Locale,
) -> Result<Vec<CategoryRow>, sqlx::Error> {
    sqlx::query_as::<_, CategoryRow>(&format!("{LOCALIZED_SELECT} WHERE c.parent_id = $3 ORDER BY c.position, name"))
        .bind(locale.code())
        .bind(fallback.code())
        .bind(id)
        .fetch_all(db)
        .await
}

/// True when `candidate` is `id` itself or one of its descendants.
pub async fn is_self_or_descendant<'e>(db: impl PgExecutor<'e>, id: Uuid, candidate: Uuid) -> Result<bool, sqlx::Error> {
    let (found,): (bool,) = sqlx::query_as(
        "WITH RECURSIVE tree AS (SELECT id FROM categories WHERE id = $1 \
         UNION ALL SELECT c.id FROM categories c JOIN tree ON c.parent_id = tree.id) \
         SELECT EXISTS (SELECT 1 FROM tree WHERE id = $2)",
    )
    .bind(id)
    .bind(candidate)
    .fetch_one(db)
    .await?;
    Ok(found)
}

pub struct CategoryWrite<'a> {
    pub slug: &'a str,
    pub parent_id: Option<Uuid>,
    pub image_url: Option<&'a str>,
    pub position: i32,
    pub translations: &'a [Translation],
}

pub async fn create(conn: &mut PgConnection, input: CategoryWrite<'_>) -> Result<Uuid, sqlx::Error> {
    let id = Uuid::now_v7();
    sqlx::query(
        "INSERT INTO categories (id, slug, parent_id, image_url, position, created_at, updated_at) \
         VALUES ($1, $2, $3, $4, $5, NOW(), NOW())",
    )
    .bind(id)
    .bind(input.slug)
    .bind(input.parent_id)
    .bind(input.image_url)
    .bind(input.position)
    .execute(&mut *conn)
    .await?;
    upsert_translations(conn, TranslationTable::Category, id, input.translations).await?;
    Ok(id)
}

/// Returns `false` when no category has that id.
pub async fn update(conn: &mut PgConnection, id: Uuid, input: CategoryWrite<'_>) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE categories SET slug = $2, parent_id = $3, image_url = $4, position = $5, updated_at = NOW() WHERE id = $1",
    )
    .bind(id)
    .bind(input.slug)
    .bind(input.parent_id)
    .bind(input.image_url)
    .bind(input.position)
    .execute(&mut *conn)
    .await?;
    if result.rows_affected() == 0 {
        return Ok(false);
    }
    upsert_translations(conn, TranslationTable::Category, id, input.translations).await?;
    Ok(true)
}

/// Deletes a category, moving its children up to its parent.
pub async fn delete(conn: &mut PgConnection, id: Uuid) -> Result<bool, sqlx::Error> {
    sqlx::query("UPDATE categories SET parent_id = (SELECT parent_id FROM categories WHERE id = $1), updated_at = NOW() WHERE parent_id = $1")
        .bind(id)
        .execute(&mut *conn)
        .await?;
    let result = sqlx::query("DELETE FROM categories WHERE id = $1").bind(id).execute(&mut *conn).await?;
    Ok(result.rows_affected() == 1)
}
