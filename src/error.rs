//! Unified error handling
//!
//! Every handler returns [`AppResult`]. Business errors pass their message to
//! the client; infrastructure errors are logged and replaced with a generic
//! message.
//!
//! | Code  | Status | Meaning                  |
//! |-------|--------|--------------------------|
//! | E1001 | 401    | not signed in            |
//! | E1002 | 401    | invalid token            |
//! | E1003 | 401    | token expired            |
//! | E2001 | 403    | forbidden                |
//! | E0002 | 400    | validation failed        |
//! | E0003 | 404    | not found                |
//! | E0004 | 409    | conflict                 |
//! | E0005 | 422    | business rule violated   |
//! | E9003 | 502    | payment provider failure |
//! | E9002 | 500    | database error           |
//! | E9001 | 500    | internal error           |

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::error;

use crate::domain::aggregates::{CartError, CouponError, OrderError, ProductError};
use crate::domain::value_objects::{MoneyError, SkuError, SlugError};
use crate::payments::PaymentError;

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Authentication required")]
    Unauthorized,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Token expired")]
    TokenExpired,

    #[error("Permission denied: {0}")]
    Forbidden(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Resource already exists: {0}")]
    Conflict(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Business rule violation: {0}")]
    BusinessRule(String),

    #[error("Payment provider error: {0}")]
    Payment(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn not_found(what: impl Into<String>) -> Self { Self::NotFound(what.into()) }
    pub fn validation(msg: impl Into<String>) -> Self { Self::Validation(msg.into()) }
    pub fn business(msg: impl Into<String>) -> Self { Self::BusinessRule(msg.into()) }

    pub fn invalid_credentials() -> Self {
        Self::Validation("Invalid email or password".to_string())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Unauthorized | Self::InvalidToken | Self::TokenExpired => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::BusinessRule(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Payment(_) => StatusCode::BAD_GATEWAY,
            Self::Database(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let (code, message) = match self {
            Self::Unauthorized => ("E1001", "Please sign in first".to_string()),
            Self::InvalidToken => ("E1002", "Invalid token".to_string()),
            Self::TokenExpired => ("E1003", "Token expired".to_string()),
            Self::Forbidden(msg) => ("E2001", msg),
            Self::Validation(msg) => ("E0002", msg),
            Self::NotFound(msg) => ("E0003", msg),
            Self::Conflict(msg) => ("E0004", msg),
            Self::BusinessRule(msg) => ("E0005", msg),
            Self::Payment(msg) => {
                error!(target: "payments", error = %msg, "Payment provider error");
                ("E9003", "Payment provider unavailable".to_string())
            }
            Self::Database(msg) => {
                error!(target: "database", error = %msg, "Database error occurred");
                ("E9002", "Database error".to_string())
            }
            Self::Internal(msg) => {
                error!(target: "internal", error = %msg, "Internal error occurred");
                ("E9001", "Internal server error".to_string())
            }
        };
        (status, Json(ErrorBody { code, message })).into_response()
    }
}

impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        match &e {
            sqlx::Error::RowNotFound => AppError::NotFound("Record not found".into()),
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                AppError::Conflict(db.constraint().unwrap_or("unique constraint").to_string())
            }
            sqlx::Error::Database(db) if db.is_foreign_key_violation() => {
                AppError::Validation(format!("Referenced record does not exist ({})", db.constraint().unwrap_or("foreign key")))
            }
            _ => AppError::Database(e.to_string()),
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(e: validator::ValidationErrors) -> Self {
        AppError::Validation(e.to_string())
    }
}

impl From<CartError> for AppError {
    fn from(e: CartError) -> Self {
        match e {
            CartError::ItemNotFound => AppError::NotFound(e.to_string()),
            CartError::InvalidQuantity | CartError::QuantityLimit(_) => AppError::Validation(e.to_string()),
            _ => AppError::BusinessRule(e.to_string()),
        }
    }
}

impl From<CouponError> for AppError {
    fn from(e: CouponError) -> Self {
        match e {
            CouponError::NotFound => AppError::NotFound(e.to_string()),
            CouponError::InvalidValue => AppError::Validation(e.to_string()),
            _ => AppError::BusinessRule(e.to_string()),
        }
    }
}

impl From<OrderError> for AppError {
    fn from(e: OrderError) -> Self { AppError::BusinessRule(e.to_string()) }
}

impl From<ProductError> for AppError {
    fn from(e: ProductError) -> Self {
        match e {
            ProductError::DuplicateSku(_) => AppError::Conflict(e.to_string()),
            ProductError::VariantNotFound(_) => AppError::NotFound(e.to_string()),
            _ => AppError::BusinessRule(e.to_string()),
        }
    }
}

impl From<MoneyError> for AppError {
    fn from(e: MoneyError) -> Self { AppError::Internal(e.to_string()) }
}

impl From<SkuError> for AppError {
    fn from(e: SkuError) -> Self { AppError::Validation(e.to_string()) }
}

impl From<SlugError> for AppError {
    fn from(e: SlugError) -> Self { AppError::Validation(e.to_string()) }
}

impl From<PaymentError> for AppError {
    fn from(e: PaymentError) -> Self {
        match e {
            PaymentError::InvalidSignature | PaymentError::StaleTimestamp => AppError::Unauthorized,
            PaymentError::MalformedPayload(msg) => AppError::Validation(msg),
            PaymentError::Http(_) | PaymentError::Provider(_) => AppError::Payment(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(AppError::Unauthorized.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(AppError::business("x").status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(AppError::from(CartError::ItemNotFound).status(), StatusCode::NOT_FOUND);
        assert_eq!(AppError::from(CouponError::Expired).status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(AppError::from(PaymentError::InvalidSignature).status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_row_not_found_maps_to_404() {
        assert_eq!(AppError::from(sqlx::Error::RowNotFound).status(), StatusCode::NOT_FOUND);
    }
}
