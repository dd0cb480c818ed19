//! Discount coupons.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, PgExecutor};
use uuid::Uuid;

use crate::domain::aggregates::{Coupon, DiscountKind};
use crate::domain::value_objects::Money;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct CouponRow {
    pub id: Uuid,
    pub code: String,
    pub kind: String,
    pub value: i64,
    pub min_subtotal: i64,
    pub max_uses: Option<i32>,
    pub used_count: i32,
    pub starts_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl CouponRow {
    /// `None` when the stored kind/value pair is not a valid discount.
    pub fn to_domain(&self, currency: &str) -> Option<Coupon> {
        let kind = match self.kind.as_str() {
            "percentage" => DiscountKind::Percentage(u8::try_from(self.value).ok()?),
            "fixed" => DiscountKind::Fixed(self.value),
            _ => return None,
        };
        Some(Coupon {
            code: self.code.clone(),
            kind,
            min_subtotal: Money::from_minor(self.min_subtotal, currency),
            max_uses: self.max_uses.map(|m| m.max(0) as u32),
            used_count: self.used_count.max(0) as u32,
            starts_at: self.starts_at,
            expires_at: self.expires_at,
            active: self.active,
        })
    }
}

const COLUMNS: &str = "id, code, kind, value, min_subtotal, max_uses, used_count, starts_at, expires_at, active, created_at";

/// Looks up a normalized (upper-case) code.
pub async fn find_by_code<'e>(db: impl PgExecutor<'e>, code: &str) -> Result<Option<CouponRow>, sqlx::Error> {
    sqlx::query_as::<_, CouponRow>(&format!("SELECT {COLUMNS} FROM coupons WHERE code = $1"))
        .bind(code)
        .fetch_optional(db)
        .await
}

pub async fn list<'e>(db: impl PgExecutor<'e>) -> Result<Vec<CouponRow>, sqlx::Error> {
    sqlx::query_as::<_, CouponRow>(&format!("SELECT {COLUMNS} FROM coupons ORDER BY created_at DESC"))
        .fetch_all(db)
        .await
}

pub struct CouponWrite<'a> {
    pub code: &'a str,
    pub kind: &'a DiscountKind,
    pub min_subtotal: i64,
    pub max_uses: Option<i32>,
    pub starts_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
}

pub async fn create<'e>(db: impl PgExecutor<'e>, input: CouponWrite<'_>) -> Result<CouponRow, sqlx::Error> {
    let (kind, value) = match input.kind {
        DiscountKind::Percentage(p) => ("percentage", i64::from(*p)),
        DiscountKind::Fixed(v) => ("fixed", *v),
    };
    sqlx::query_as::<_, CouponRow>(&format!(
        "INSERT INTO coupons (id, code, kind, value, min_subtotal, max_uses, used_count, starts_at, expires_at, active, created_at) \
         VALUES ($1, $2, $3, $4, $5, $6, 0, $7, $8, TRUE, NOW()) RETURNING {COLUMNS}"
    ))
    .bind(Uuid::now_v7())
    .bind(input.code)
    .bind(kind)
    .bind(value)
    .bind(input.min_subtotal)
    .bind(input.max_uses)
    .bind(input.starts_at)
    .bind(input.expires_at)
    .fetch_one(db)
    .await
}

pub async fn deactivate<'e>(db: impl PgExecutor<'e>, id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("UPDATE coupons SET active = FALSE WHERE id = $1").bind(id).execute(db).await?;
    Ok(result.rows_affected() == 1)
}

pub async fn increment_usage<'e>(db: impl PgExecutor<'e>, code: &str) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE coupons SET used_count = used_count + 1 WHERE code = $1")
        .bind(code)
        .execute(db)
        .await?;
    Ok(())
}
