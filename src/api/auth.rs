//! Registration, login and the current account.

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::auth::{hash_password, verify_password, CurrentUser, Role};
use crate::db::users::{self, UserRow};
use crate::domain::aggregates::MergeReport;
use crate::error::{AppError, AppResult};
use crate::locale::{Locale, RequestLocale};
use crate::services::cart::{guest_token, merge_guest_cart};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/me", get(me))
}

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 8, max = 128))]
    pub password: String,
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    pub locale: Option<Locale>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1))]
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub token_type: &'static str,
    pub expires_in: i64,
    pub user: UserRow,
    /// Present when a guest cart was folded into the account's cart.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cart_merge: Option<MergeReport>,
}

/// Issues a token and, when the request carries a guest cart token, merges
/// that cart into the user's cart.
async fn sign_in(state: &AppState, user: UserRow, headers: &HeaderMap, locale: Locale) -> AppResult<AuthResponse> {
    let cart_merge = match guest_token(headers) {
        Some(token) => {
            let mut tx = state.db.begin().await?;
            let report = merge_guest_cart(&mut tx, user.id, token, state.currency(), locale).await?;
            tx.commit().await?;
            report
        }
        None => None,
    };

    let token = state
        .jwt
        .generate_token(user.id, &user.email, Role::parse(&user.role))
        .map_err(|e| AppError::Internal(e.to_string()))?;
    Ok(AuthResponse { token, token_type: "Bearer", expires_in: state.jwt.expiration_seconds(), user, cart_merge })
}

/// POST /api/v1/auth/register
async fn register(
    State(state): State<AppState>,
    RequestLocale(locale): RequestLocale,
    headers: HeaderMap,
    Json(req): Json<RegisterRequest>,
) -> AppResult<(StatusCode, Json<AuthResponse>)> {
    req.validate()?;
    let email = req.email.trim().to_lowercase();
    if users::find_by_email(&state.db, &email).await?.is_some() {
        return Err(AppError::Conflict("Email is already registered".into()));
    }

    let hash = hash_password(&req.password)?;
    let locale = req.locale.unwrap_or(locale);
    let user = users::create(&state.db, &email, &hash, req.name.trim(), locale.code()).await?;
    tracing::info!(user_id = %user.id, "customer registered");

    let response = sign_in(&state, user, &headers, locale).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// POST /api/v1/auth/login
async fn login(
    State(state): State<AppState>,
    RequestLocale(locale): RequestLocale,
    headers: HeaderMap,
    Json(req): Json<LoginRequest>,
) -> AppResult<Json<AuthResponse>> {
    req.validate()?;
    let email = req.email.trim().to_lowercase();
    let Some(user) = users::find_by_email(&state.db, &email).await? else {
        tracing::warn!(email = %email, "login for unknown email");
        return Err(AppError::invalid_credentials());
    };
    if !verify_password(&req.password, &user.password_hash) {
        tracing::warn!(user_id = %user.id, "login with wrong password");
        return Err(AppError::invalid_credentials());
    }

    tracing::info!(user_id = %user.id, "user logged in");
    Ok(Json(sign_in(&state, user, &headers, locale).await?))
}

/// GET /api/v1/auth/me
async fn me(State(state): State<AppState>, user: CurrentUser) -> AppResult<Json<UserRow>> {
    let row = users::find_by_id(&state.db, user.id).await?.ok_or_else(|| AppError::not_found("User not found"))?;
    Ok(Json(row))
}
