//! Coupon administration

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::auth::AdminUser;
use crate::db::coupons::{self, CouponRow, CouponWrite};
use crate::domain::aggregates::{normalize_code, Coupon, DiscountKind};
use crate::error::{AppError, AppResult};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/coupons", get(list).post(create))
        .route("/coupons/:id/deactivate", post(deactivate))
}

/// `{"code": "EID10", "kind": "percentage", "value": 10, ...}`
#[derive(Debug, Deserialize, Validate)]
pub struct CreateCouponRequest {
    #[validate(length(min = 3, max = 50))]
    pub code: String,
    #[serde(flatten)]
    pub discount: DiscountKind,
    #[serde(default)]
    #[validate(range(min = 0))]
    pub min_subtotal: i64,
    #[validate(range(min = 1))]
    pub max_uses: Option<i32>,
    pub starts_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl CreateCouponRequest {
    fn check(&self) -> AppResult<String> {
        self.validate()?;
        Coupon::validate_kind(&self.discount)?;
        if let (Some(starts), Some(expires)) = (self.starts_at, self.expires_at) {
            if expires <= starts {
                return Err(AppError::validation("expires_at must be after starts_at"));
            }
        }
        let code = normalize_code(&self.code);
        if !code.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
            return Err(AppError::validation("Coupon codes may only contain letters, digits, '-' and '_'"));
        }
        Ok(code)
    }
}

/// GET /api/v1/admin/coupons
async fn list(State(state): State<AppState>, _admin: AdminUser) -> AppResult<Json<Vec<CouponRow>>> {
    Ok(Json(coupons::list(&state.db).await?))
}

/// POST /api/v1/admin/coupons
async fn create(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Json(req): Json<CreateCouponRequest>,
) -> AppResult<(StatusCode, Json<CouponRow>)> {
    let code = req.check()?;
    let row = coupons::create(
        &state.db,
        CouponWrite {
            code: &code,
            kind: &req.discount,
            min_subtotal: req.min_subtotal,
            max_uses: req.max_uses,
            starts_at: req.starts_at,
            expires_at: req.expires_at,
        },
    )
    .await?;
    tracing::info!(coupon = %row.code, admin_id = %admin.id, "coupon created");
    Ok((StatusCode::CREATED, Json(row)))
}

/// POST /api/v1/admin/coupons/:id/deactivate
async fn deactivate(State(state): State<AppState>, AdminUser(admin): AdminUser, Path(id): Path<Uuid>) -> AppResult<StatusCode> {
    if !coupons::deactivate(&state.db, id).await? {
        return Err(AppError::not_found(format!("Coupon {id} not found")));
    }
    tracing::info!(coupon_id = %id, admin_id = %admin.id, "coupon deactivated");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(body: serde_json::Value) -> CreateCouponRequest {
        serde_json::from_value(body).unwrap()
    }

    #[test]
    fn test_parses_discount_kind() {
        let req = request(json!({ "code": " eid10 ", "kind": "percentage", "value": 10 }));
        assert_eq!(req.discount, DiscountKind::Percentage(10));
        assert_eq!(req.check().unwrap(), "EID10");
        let req = request(json!({ "code": "FLAT50", "kind": "fixed", "value": 5000, "min_subtotal": 20000 }));
        assert_eq!(req.discount, DiscountKind::Fixed(5000));
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(request(json!({ "code": "ZERO", "kind": "percentage", "value": 0 })).check().is_err());
        assert!(request(json!({ "code": "NEG", "kind": "fixed", "value": -1 })).check().is_err());
        assert!(request(json!({ "code": "HAS SPACE", "kind": "fixed", "value": 100 })).check().is_err());
        assert!(request(json!({
            "code": "WINDOW", "kind": "fixed", "value": 100,
            "starts_at": "2024-06-01T00:00:00Z", "expires_at": "2024-05-01T00:00:00Z"
        }))
        .check()
        .is_err());
    }
}
