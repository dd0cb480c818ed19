//! JWT extractors
//!
//! `CurrentUser` requires a valid bearer token, `MaybeUser` accepts anonymous
//! callers, `AdminUser` additionally requires the admin role.

use axum::extract::FromRequestParts;
use axum::http::{header, request::Parts};

use super::jwt::{CurrentUser, JwtError, JwtService};
use crate::error::AppError;
use crate::state::AppState;

/// Header carrying a guest cart token.
pub const CART_TOKEN_HEADER: &str = "x-cart-token";

fn authenticate(parts: &mut Parts, state: &AppState) -> Result<Option<CurrentUser>, AppError> {
    if let Some(user) = parts.extensions.get::<CurrentUser>() {
        return Ok(Some(user.clone()));
    }

    let Some(header) = parts.headers.get(header::AUTHORIZATION) else {
        return Ok(None);
    };
    let token = header
        .to_str()
        .ok()
        .and_then(JwtService::extract_from_header)
        .ok_or(AppError::InvalidToken)?;

    match state.jwt.validate_token(token) {
        Ok(claims) => {
            let user = CurrentUser::from(claims);
            tracing::debug!(user_id = %user.id, role = user.role.as_str(), "request authenticated");
            parts.extensions.insert(user.clone());
            Ok(Some(user))
        }
        Err(JwtError::ExpiredToken) => Err(AppError::TokenExpired),
        Err(e) => {
            tracing::warn!(error = %e, uri = %parts.uri, "rejected bearer token");
            Err(AppError::InvalidToken)
        }
    }
}

#[axum::async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        authenticate(parts, state)?.ok_or(AppError::Unauthorized)
    }
}

/// Optional authentication. A present but invalid token is still rejected.
#[derive(Debug, Clone)]
pub struct MaybeUser(pub Option<CurrentUser>);

#[axum::async_trait]
impl FromRequestParts<AppState> for MaybeUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        Ok(Self(authenticate(parts, state)?))
    }
}

#[derive(Debug, Clone)]
pub struct AdminUser(pub CurrentUser);

#[axum::async_trait]
impl FromRequestParts<AppState> for AdminUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let user = authenticate(parts, state)?.ok_or(AppError::Unauthorized)?;
        if !user.is_admin() {
            tracing::warn!(user_id = %user.id, uri = %parts.uri, "non-admin on admin route");
            return Err(AppError::Forbidden("Admin access required".into()));
        }
        Ok(Self(user))
    }
}
