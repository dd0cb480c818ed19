//! Shopping cart for signed-in customers and guests.
//!
//! Guests are identified by the `X-Cart-Token` header. The first item a guest
//! adds creates the cart and returns a new token in both the response header
//! and the body.

use axum::{
    extract::{Path, State},
    http::{HeaderMap, HeaderValue},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::auth::{MaybeUser, CART_TOKEN_HEADER};
use crate::db::carts::{self, CartRow};
use crate::error::{AppError, AppResult};
use crate::locale::RequestLocale;
use crate::services::cart::{self as cart_service, CartOwner, CartView};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/cart", get(get_cart).delete(clear_cart))
        .route("/cart/items", post(add_item))
        .route("/cart/items/:variant_id", put(update_item).delete(remove_item))
        .route("/cart/coupon", post(apply_coupon).delete(remove_coupon))
}

#[derive(Debug, Deserialize, Validate)]
pub struct AddItemRequest {
    pub variant_id: Uuid,
    #[serde(default = "one")]
    #[validate(range(min = 1, max = 99))]
    pub quantity: u32,
}

fn one() -> u32 { 1 }

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateItemRequest {
    #[validate(range(max = 99))]
    pub quantity: u32,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CouponRequest {
    #[validate(length(min = 1, max = 50))]
    pub code: String,
}

async fn existing_cart(state: &AppState, user: &MaybeUser, headers: &HeaderMap) -> AppResult<CartRow> {
    let owner = CartOwner::resolve(user.0.as_ref(), headers).ok_or_else(|| AppError::not_found("Cart not found"))?;
    cart_service::find(&state.db, &owner).await?.ok_or_else(|| AppError::not_found("Cart not found"))
}

/// Adds the issued guest token as a response header.
fn with_token(view: CartView) -> Response {
    let header = view.guest_token.as_deref().and_then(|t| HeaderValue::from_str(t).ok());
    let mut response = Json(view).into_response();
    if let Some(value) = header {
        response.headers_mut().insert(CART_TOKEN_HEADER, value);
    }
    response
}

/// GET /api/v1/cart
async fn get_cart(
    State(state): State<AppState>,
    user: MaybeUser,
    RequestLocale(locale): RequestLocale,
    headers: HeaderMap,
) -> AppResult<Json<CartView>> {
    let owner = CartOwner::resolve(user.0.as_ref(), &headers);
    let row = match &owner {
        Some(owner) => cart_service::find(&state.db, owner).await?,
        None => None,
    };
    match row {
        Some(row) => Ok(Json(cart_service::view(&state, &row, locale, None).await?)),
        None => Ok(Json(CartView::empty(state.currency()))),
    }
}

/// POST /api/v1/cart/items
async fn add_item(
    State(state): State<AppState>,
    user: MaybeUser,
    RequestLocale(locale): RequestLocale,
    headers: HeaderMap,
    Json(req): Json<AddItemRequest>,
) -> AppResult<Response> {
    req.validate()?;
    let owner = CartOwner::resolve(user.0.as_ref(), &headers);
    let view = cart_service::add_item(&state, owner, req.variant_id, req.quantity, locale).await?;
    Ok(with_token(view))
}

/// PUT /api/v1/cart/items/:variant_id
async fn update_item(
    State(state): State<AppState>,
    user: MaybeUser,
    RequestLocale(locale): RequestLocale,
    headers: HeaderMap,
    Path(variant_id): Path<Uuid>,
    Json(req): Json<UpdateItemRequest>,
) -> AppResult<Json<CartView>> {
    req.validate()?;
    let row = existing_cart(&state, &user, &headers).await?;
    Ok(Json(cart_service::update_item(&state, &row, variant_id, req.quantity, locale).await?))
}

/// DELETE /api/v1/cart/items/:variant_id
async fn remove_item(
    State(state): State<AppState>,
    user: MaybeUser,
    RequestLocale(locale): RequestLocale,
    headers: HeaderMap,
    Path(variant_id): Path<Uuid>,
) -> AppResult<Json<CartView>> {
    let row = existing_cart(&state, &user, &headers).await?;
    Ok(Json(cart_service::remove_item(&state, &row, variant_id, locale).await?))
}

/// DELETE /api/v1/cart
async fn clear_cart(
    State(state): State<AppState>,
    user: MaybeUser,
    RequestLocale(locale): RequestLocale,
    headers: HeaderMap,
) -> AppResult<Json<CartView>> {
    let row = existing_cart(&state, &user, &headers).await?;
    let mut conn = state.db.acquire().await?;
    cart_service::clear(&mut conn, row.id, state.currency(), locale).await?;
    drop(conn);
    tracing::info!(cart_id = %row.id, "cart cleared");
    let row = CartRow { coupon_code: None, ..row };
    Ok(Json(cart_service::view(&state, &row, locale, None).await?))
}

/// POST /api/v1/cart/coupon
async fn apply_coupon(
    State(state): State<AppState>,
    user: MaybeUser,
    RequestLocale(locale): RequestLocale,
    headers: HeaderMap,
    Json(req): Json<CouponRequest>,
) -> AppResult<Json<CartView>> {
    req.validate()?;
    let row = existing_cart(&state, &user, &headers).await?;
    Ok(Json(cart_service::apply_coupon(&state, &row, &req.code, locale).await?))
}

/// DELETE /api/v1/cart/coupon
async fn remove_coupon(
    State(state): State<AppState>,
    user: MaybeUser,
    RequestLocale(locale): RequestLocale,
    headers: HeaderMap,
) -> AppResult<Json<CartView>> {
    let row = existing_cart(&state, &user, &headers).await?;
    carts::set_coupon(&state.db, row.id, None).await?;
    let row = CartRow { coupon_code: None, ..row };
    Ok(Json(cart_service::view(&state, &row, locale, None).await?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_item_defaults_quantity() {
        let req: AddItemRequest = serde_json::from_value(serde_json::json!({ "variant_id": Uuid::nil() })).unwrap();
        assert_eq!(req.quantity, 1);
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_quantity_bounds() {
        let req = AddItemRequest { variant_id: Uuid::nil(), quantity: 0 };
        assert!(req.validate().is_err());
        assert!(UpdateItemRequest { quantity: 0 }.validate().is_ok());
        assert!(UpdateItemRequest { quantity: 100 }.validate().is_err());
    }

    #[test]
    fn test_issued_token_is_echoed_in_header() {
        let mut view = CartView::empty("EGP");
        view.guest_token = Some("abc123".into());
        let response = with_token(view);
        assert_eq!(response.headers().get(CART_TOKEN_HEADER).unwrap(), "abc123");
        assert!(with_token(CartView::empty("EGP")).headers().get(CART_TOKEN_HEADER).is_none());
    }
}
