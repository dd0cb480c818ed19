//! PostgreSQL access
//!
//! Free functions per table. Single-statement helpers take any
//! `PgExecutor` so they run on the pool or inside a transaction; helpers that
//! issue several statements take `&mut PgConnection`.

pub mod carts;
pub mod categories;
pub mod coupons;
pub mod orders;
pub mod products;
pub mod stats;
pub mod users;
pub mod variants;
pub mod webhooks;

use serde::{Deserialize, Serialize};
use sqlx::PgConnection;
use uuid::Uuid;
use validator::Validate;

use crate::locale::Locale;

/// Localized name and description of a product or category.
#[derive(Clone, Debug, Serialize, Deserialize, Validate)]
pub struct Translation {
    pub locale: Locale,
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(length(max = 10000))]
    pub description: Option<String>,
}

#[derive(Clone, Copy)]
pub(crate) enum TranslationTable { Product, Category }

impl TranslationTable {
    fn upsert_sql(&self) -> &'static str {
        match self {
            Self::Product => "INSERT INTO product_translations (product_id, locale, name, description) VALUES ($1, $2, $3, $4) \
                              ON CONFLICT (product_id, locale) DO UPDATE SET name = EXCLUDED.name, description = EXCLUDED.description",
            Self::Category => "INSERT INTO category_translations (category_id, locale, name, description) VALUES ($1, $2, $3, $4) \
                               ON CONFLICT (category_id, locale) DO UPDATE SET name = EXCLUDED.name, description = EXCLUDED.description",
        }
    }
}

pub(crate) async fn upsert_translations(
    conn: &mut PgConnection,
    table: TranslationTable,
    owner_id: Uuid,
    translations: &[Translation],
) -> Result<(), sqlx::Error> {
    for t in translations {
        sqlx::query(table.upsert_sql())
            .bind(owner_id)
            .bind(t.locale.code())
            .bind(&t.name)
            .bind(&t.description)
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}
