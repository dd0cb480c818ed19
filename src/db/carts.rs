//! Carts, keyed by user or by guest token.

use serde::Serialize;
use sqlx::{FromRow, PgConnection, PgExecutor};
use uuid::Uuid;

use crate::locale::Locale;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct CartRow {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub guest_token: Option<String>,
    pub coupon_code: Option<String>,
}

/// A stored cart line joined with the variant's current price and stock.
#[derive(Debug, Clone, FromRow)]
pub struct CartLineRow {
    pub variant_id: Uuid,
    pub product_id: Uuid,
    pub name: String,
    pub variant_title: String,
    pub sku: String,
    pub quantity: i32,
    pub price: i64,
    pub stock: i32,
    pub product_status: String,
}

const COLUMNS: &str = "id, user_id, guest_token, coupon_code";

pub async fn find_by_user<'e>(db: impl PgExecutor<'e>, user_id: Uuid) -> Result<Option<CartRow>, sqlx::Error> {
    sqlx::query_as::<_, CartRow>(&format!("SELECT {COLUMNS} FROM carts WHERE user_id = $1"))
        .bind(user_id)
        .fetch_optional(db)
        .await
}

pub async fn find_by_token<'e>(db: impl PgExecutor<'e>, token: &str) -> Result<Option<CartRow>, sqlx::Error> {
    sqlx::query_as::<_, CartRow>(&format!("SELECT {COLUMNS} FROM carts WHERE guest_token = $1 AND user_id IS NULL"))
        .bind(token)
        .fetch_optional(db)
        .await
}

/// Locks the cart row for the rest of the transaction.
pub async fn find_for_update<'e>(db: impl PgExecutor<'e>, id: Uuid) -> Result<Option<CartRow>, sqlx::Error> {
    sqlx::query_as::<_, CartRow>(&format!("SELECT {COLUMNS} FROM carts WHERE id = $1 FOR UPDATE"))
        .bind(id)
        .fetch_optional(db)
        .await
}

/// Returns the user's cart, creating it on first use.
pub async fn get_or_create_for_user<'e>(db: impl PgExecutor<'e>, user_id: Uuid) -> Result<CartRow, sqlx::Error> {
    sqlx::query_as::<_, CartRow>(&format!(
        "INSERT INTO carts (id, user_id, created_at, updated_at) VALUES ($1, $2, NOW(), NOW()) \
         ON CONFLICT (user_id) DO UPDATE SET updated_at = NOW() RETURNING {COLUMNS}"
    ))
    .bind(Uuid::now_v7())
    .bind(user_id)
    .fetch_one(db)
    .await
}

pub async fn create_guest<'e>(db: impl PgExecutor<'e>, token: &str) -> Result<CartRow, sqlx::Error> {
    sqlx::query_as::<_, CartRow>(&format!(
        "INSERT INTO carts (id, guest_token, created_at, updated_at) VALUES ($1, $2, NOW(), NOW()) RETURNING {COLUMNS}"
    ))
    .bind(Uuid::now_v7())
    .bind(token)
    .fetch_one(db)
    .await
}

pub async fn lines<'e>(
    db: impl PgExecutor<'e>,
    cart_id: Uuid,
    locale: Locale,
    fallback: Locale,
) -> Result<Vec<CartLineRow>, sqlx::Error> {
    sqlx::query_as::<_, CartLineRow>(
        "SELECT ci.variant_id, v.product_id, COALESCE(t.name, d.name, p.slug) AS name, v.title AS variant_title, \
         v.sku, ci.quantity, v.price, v.stock, p.status AS product_status \
         FROM cart_items ci \
         JOIN product_variants v ON v.id = ci.variant_id \
         JOIN products p ON p.id = v.product_id \
         LEFT JOIN product_translations t ON t.product_id = p.id AND t.locale = $2 \
         LEFT JOIN product_translations d ON d.product_id = p.id AND d.locale = $3 \
         WHERE ci.cart_id = $1 ORDER BY ci.created_at, ci.id",
    )
    .bind(cart_id)
    .bind(locale.code())
    .bind(fallback.code())
    .fetch_all(db)
    .await
}

/// A variant shaped like a cart line with zero quantity, for adding to a cart.
pub async fn variant_line<'e>(
    db: impl PgExecutor<'e>,
    variant_id: Uuid,
    locale: Locale,
    fallback: Locale,
) -> Result<Option<CartLineRow>, sqlx::Error> {
    sqlx::query_as::<_, CartLineRow>(
        "SELECT v.id AS variant_id, v.product_id, COALESCE(t.name, d.name, p.slug) AS name, v.title AS variant_title, \
         v.sku, 0 AS quantity, v.price, v.stock, p.status AS product_status \
         FROM product_variants v \
         JOIN products p ON p.id = v.product_id \
         LEFT JOIN product_translations t ON t.product_id = p.id AND t.locale = $2 \
         LEFT JOIN product_translations d ON d.product_id = p.id AND d.locale = $3 \
         WHERE v.id = $1",
    )
    .bind(variant_id)
    .bind(locale.code())
    .bind(fallback.code())
    .fetch_optional(db)
    .await
}

/// Sets the quantity of a line, inserting it when missing.
pub async fn set_item<'e>(db: impl PgExecutor<'e>, cart_id: Uuid, variant_id: Uuid, quantity: i32) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO cart_items (id, cart_id, variant_id, quantity, created_at) VALUES ($1, $2, $3, $4, NOW()) \
         ON CONFLICT (cart_id, variant_id) DO UPDATE SET quantity = EXCLUDED.quantity",
    )
    .bind(Uuid::now_v7())
    .bind(cart_id)
    .bind(variant_id)
    .bind(quantity)
    .execute(db)
    .await?;
    Ok(())
}

pub async fn remove_item<'e>(db: impl PgExecutor<'e>, cart_id: Uuid, variant_id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM cart_items WHERE cart_id = $1 AND variant_id = $2")
        .bind(cart_id)
        .bind(variant_id)
        .execute(db)
        .await?;
    Ok(result.rows_affected() == 1)
}

pub async fn set_coupon<'e>(db: impl PgExecutor<'e>, cart_id: Uuid, code: Option<&str>) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE carts SET coupon_code = $2, updated_at = NOW() WHERE id = $1")
        .bind(cart_id)
        .bind(code)
        .execute(db)
        .await?;
    Ok(())
}

pub async fn delete<'e>(db: impl PgExecutor<'e>, cart_id: Uuid) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM carts WHERE id = $1").bind(cart_id).execute(db).await?;
    Ok(())
}

/// Replaces every line of the cart with `items` (`variant_id`, quantity).
pub async fn replace_items(conn: &mut PgConnection, cart_id: Uuid, items: &[(Uuid, i32)]) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM cart_items WHERE cart_id = $1").bind(cart_id).execute(&mut *conn).await?;
    for (variant_id, quantity) in items {
        set_item(&mut *conn, cart_id, *variant_id, *quantity).await?;
    }
    Ok(())
}
