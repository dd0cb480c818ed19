//! Checkout endpoint

use axum::{extract::State, http::HeaderMap, routing::post, Json, Router};

use crate::auth::MaybeUser;
use crate::error::AppResult;
use crate::locale::RequestLocale;
use crate::services::cart::CartOwner;
use crate::services::checkout::{self, CheckoutRequest, CheckoutResponse};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/checkout", post(create_checkout))
}

/// POST /api/v1/checkout
///
/// Places a pending order for the caller's cart and returns the provider's
/// hosted payment page.
async fn create_checkout(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    RequestLocale(locale): RequestLocale,
    headers: HeaderMap,
    Json(req): Json<CheckoutRequest>,
) -> AppResult<Json<CheckoutResponse>> {
    let owner = CartOwner::resolve(user.as_ref(), &headers);
    let response = checkout::checkout(&state, user.as_ref(), owner, locale, req).await?;
    Ok(Json(response))
}
