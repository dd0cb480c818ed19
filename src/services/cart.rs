//! Cart ownership, loading, pricing and the guest-to-customer merge.

use axum::http::HeaderMap;
use chrono::Utc;
use serde::Serialize;
use sqlx::{PgConnection, PgExecutor};
use uuid::Uuid;

use crate::auth::{CurrentUser, CART_TOKEN_HEADER};
use crate::db::carts::{self, CartLineRow, CartRow};
use crate::db::coupons;
use crate::domain::aggregates::{normalize_code, Cart, CartLine, CouponError, MergeReport, Pricing, StockIssue};
use crate::domain::value_objects::Money;
use crate::error::{AppError, AppResult};
use crate::locale::Locale;
use crate::state::AppState;

use super::new_guest_token;

/// Who a cart belongs to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CartOwner {
    User(Uuid),
    Guest(String),
}

/// Guest token from the request headers, if it looks like one.
pub fn guest_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(CART_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|t| !t.is_empty() && t.len() <= 128)
}

impl CartOwner {
    /// A signed-in user always owns their own cart; the guest token only
    /// matters for anonymous callers.
    pub fn resolve(user: Option<&CurrentUser>, headers: &HeaderMap) -> Option<Self> {
        match user {
            Some(user) => Some(Self::User(user.id)),
            None => guest_token(headers).map(|t| Self::Guest(t.to_string())),
        }
    }
}

pub async fn find<'e>(db: impl PgExecutor<'e>, owner: &CartOwner) -> Result<Option<CartRow>, sqlx::Error> {
    match owner {
        CartOwner::User(id) => carts::find_by_user(db, *id).await,
        CartOwner::Guest(token) => carts::find_by_token(db, token).await,
    }
}

/// Returns the owner's cart, creating one when needed. The second value is
/// a freshly issued guest token.
pub async fn find_or_create(state: &AppState, owner: Option<CartOwner>) -> Result<(CartRow, Option<String>), sqlx::Error> {
    match owner {
        Some(CartOwner::User(id)) => Ok((carts::get_or_create_for_user(&state.db, id).await?, None)),
        Some(CartOwner::Guest(token)) => match carts::find_by_token(&state.db, &token).await? {
            Some(row) => Ok((row, None)),
            None => create_guest(state).await,
        },
        None => create_guest(state).await,
    }
}

async fn create_guest(state: &AppState) -> Result<(CartRow, Option<String>), sqlx::Error> {
    let token = new_guest_token();
    let row = carts::create_guest(&state.db, &token).await?;
    tracing::debug!(cart_id = %row.id, "guest cart created");
    Ok((row, Some(token)))
}

/// Lines of inactive products carry zero stock so they surface as stock issues.
pub fn to_line(row: &CartLineRow, currency: &str) -> CartLine {
    let name = if row.variant_title.trim().is_empty() || row.variant_title == "Default" {
        row.name.clone()
    } else {
        format!("{} - {}", row.name, row.variant_title)
    };
    let stock = if row.product_status == "active" { row.stock.max(0) as u32 } else { 0 };
    CartLine {
        variant_id: row.variant_id,
        product_id: row.product_id,
        name,
        sku: row.sku.clone(),
        quantity: row.quantity.max(0) as u32,
        unit_price: Money::from_minor(row.price, currency),
        stock,
    }
}

pub async fn load(conn: &mut PgConnection, cart_id: Uuid, currency: &str, locale: Locale, fallback: Locale) -> Result<Cart, sqlx::Error> {
    let rows = carts::lines(&mut *conn, cart_id, locale, fallback).await?;
    Ok(Cart::restore(cart_id, currency, rows.iter().map(|r| to_line(r, currency)).collect()))
}

/// Writes the lines of `cart` back, replacing whatever is stored.
pub async fn save(conn: &mut PgConnection, cart: &Cart) -> Result<(), sqlx::Error> {
    let items: Vec<(Uuid, i32)> = cart.items().iter().map(|l| (l.variant_id, l.quantity as i32)).collect();
    carts::replace_items(conn, cart.id(), &items).await
}

/// Empties a cart and drops its coupon.
pub async fn clear(conn: &mut PgConnection, cart_id: Uuid, currency: &str, locale: Locale) -> Result<(), sqlx::Error> {
    let mut cart = load(&mut *conn, cart_id, currency, locale, locale).await?;
    cart.clear();
    save(&mut *conn, &cart).await?;
    carts::set_coupon(&mut *conn, cart_id, None).await
}

/// Discount granted by `code` on `subtotal`. The inner error explains why a
/// coupon does not apply.
pub async fn coupon_discount<'e>(
    db: impl PgExecutor<'e>,
    code: &str,
    subtotal: &Money,
) -> Result<Result<Money, CouponError>, sqlx::Error> {
    let coupon = coupons::find_by_code(db, code).await?.and_then(|row| row.to_domain(subtotal.currency()));
    Ok(match coupon {
        Some(coupon) => coupon.discount_for(subtotal, Utc::now()),
        None => Err(CouponError::NotFound),
    })
}

#[derive(Debug, Serialize)]
pub struct CartLineView {
    pub variant_id: Uuid,
    pub product_id: Uuid,
    pub name: String,
    pub sku: String,
    pub quantity: u32,
    pub unit_price: i64,
    pub line_total: i64,
    pub available: u32,
}

#[derive(Debug, Serialize)]
pub struct CartView {
    pub id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guest_token: Option<String>,
    pub currency: String,
    pub items: Vec<CartLineView>,
    pub item_count: u32,
    pub coupon_code: Option<String>,
    /// Why the stored coupon currently gives no discount.
    pub coupon_error: Option<String>,
    pub subtotal: i64,
    pub discount: i64,
    pub shipping: i64,
    pub total: i64,
    pub stock_issues: Vec<StockIssue>,
}

impl CartView {
    pub fn empty(currency: &str) -> Self {
        Self {
            id: Uuid::nil(),
            guest_token: None,
            currency: currency.to_string(),
            items: vec![],
            item_count: 0,
            coupon_code: None,
            coupon_error: None,
            subtotal: 0,
            discount: 0,
            shipping: 0,
            total: 0,
            stock_issues: vec![],
        }
    }
}

/// Prices `cart` with the stored coupon. A coupon that no longer applies
/// contributes nothing and is reported instead.
pub async fn price(state: &AppState, cart: &Cart, coupon_code: Option<&str>) -> AppResult<(Pricing, Option<String>)> {
    let subtotal = cart.subtotal();
    let (discount, coupon_error) = match coupon_code {
        Some(code) => match coupon_discount(&state.db, code, &subtotal).await? {
            Ok(discount) => (discount, None),
            Err(e) => (Money::zero(cart.currency()), Some(e.to_string())),
        },
        None => (Money::zero(cart.currency()), None),
    };
    let pricing = Pricing::compute(subtotal, discount, &state.shipping_policy())?;
    Ok((pricing, coupon_error))
}

pub async fn view(state: &AppState, row: &CartRow, locale: Locale, issued_token: Option<String>) -> AppResult<CartView> {
    let mut conn = state.db.acquire().await?;
    let cart = load(&mut conn, row.id, state.currency(), locale, state.config.default_locale).await?;
    drop(conn);
    let (pricing, coupon_error) = price(state, &cart, row.coupon_code.as_deref()).await?;
    let items = cart
        .items()
        .iter()
        .map(|l| CartLineView {
            variant_id: l.variant_id,
            product_id: l.product_id,
            name: l.name.clone(),
            sku: l.sku.clone(),
            quantity: l.quantity,
            unit_price: l.unit_price.to_minor(),
            line_total: l.line_total().to_minor(),
            available: l.stock,
        })
        .collect();
    Ok(CartView {
        id: row.id,
        guest_token: issued_token,
        currency: cart.currency().to_string(),
        items,
        item_count: cart.item_count(),
        coupon_code: row.coupon_code.clone(),
        coupon_error,
        subtotal: pricing.subtotal.to_minor(),
        discount: pricing.discount.to_minor(),
        shipping: pricing.shipping.to_minor(),
        total: pricing.total.to_minor(),
        stock_issues: cart.validate_stock().err().unwrap_or_default(),
    })
}

/// Adds `quantity` of a variant, creating the cart on first use.
pub async fn add_item(
    state: &AppState,
    owner: Option<CartOwner>,
    variant_id: Uuid,
    quantity: u32,
    locale: Locale,
) -> AppResult<CartView> {
    let fallback = state.config.default_locale;
    let variant = carts::variant_line(&state.db, variant_id, locale, fallback)
        .await?
        .filter(|v| v.product_status == "active")
        .ok_or_else(|| AppError::not_found("Product variant not available"))?;

    let (row, issued) = find_or_create(state, owner).await?;
    let mut conn = state.db.acquire().await?;
    let mut cart = load(&mut conn, row.id, state.currency(), locale, fallback).await?;
    cart.add_item(CartLine { quantity, ..to_line(&variant, state.currency()) })?;
    let new_quantity = cart.line(variant_id).map(|l| l.quantity).unwrap_or(quantity);
    carts::set_item(&mut *conn, row.id, variant_id, new_quantity as i32).await?;
    drop(conn);

    tracing::info!(cart_id = %row.id, %variant_id, quantity = new_quantity, "cart item added");
    view(state, &row, locale, issued).await
}

/// Sets a line's quantity; zero removes the line.
pub async fn update_item(state: &AppState, row: &CartRow, variant_id: Uuid, quantity: u32, locale: Locale) -> AppResult<CartView> {
    let mut conn = state.db.acquire().await?;
    let mut cart = load(&mut conn, row.id, state.currency(), locale, state.config.default_locale).await?;
    cart.update_quantity(variant_id, quantity)?;
    if quantity == 0 {
        carts::remove_item(&mut *conn, row.id, variant_id).await?;
    } else {
        carts::set_item(&mut *conn, row.id, variant_id, quantity as i32).await?;
    }
    drop(conn);
    view(state, row, locale, None).await
}

pub async fn remove_item(state: &AppState, row: &CartRow, variant_id: Uuid, locale: Locale) -> AppResult<CartView> {
    let mut conn = state.db.acquire().await?;
    let mut cart = load(&mut conn, row.id, state.currency(), locale, state.config.default_locale).await?;
    cart.remove_item(variant_id)?;
    carts::remove_item(&mut *conn, row.id, variant_id).await?;
    drop(conn);
    view(state, row, locale, None).await
}

/// Stores a coupon on the cart after checking that it applies now.
pub async fn apply_coupon(state: &AppState, row: &CartRow, code: &str, locale: Locale) -> AppResult<CartView> {
    let code = normalize_code(code);
    if code.is_empty() {
        return Err(AppError::validation("Coupon code is required"));
    }
    let mut conn = state.db.acquire().await?;
    let cart = load(&mut conn, row.id, state.currency(), locale, state.config.default_locale).await?;
    if cart.is_empty() {
        return Err(AppError::business("Cart is empty"));
    }
    coupon_discount(&mut *conn, &code, &cart.subtotal()).await??;
    carts::set_coupon(&mut *conn, row.id, Some(&code)).await?;
    drop(conn);

    tracing::info!(cart_id = %row.id, coupon = %code, "coupon applied");
    let row = CartRow { coupon_code: Some(code), ..row.clone() };
    view(state, &row, locale, None).await
}

/// Folds the guest cart identified by `token` into the user's cart and
/// deletes it. Returns `None` when no such guest cart exists.
pub async fn merge_guest_cart(
    conn: &mut PgConnection,
    user_id: Uuid,
    token: &str,
    currency: &str,
    locale: Locale,
) -> AppResult<Option<MergeReport>> {
    let Some(guest_row) = carts::find_by_token(&mut *conn, token).await? else {
        return Ok(None);
    };
    let user_row = carts::get_or_create_for_user(&mut *conn, user_id).await?;

    let guest = load(conn, guest_row.id, currency, locale, locale).await?;
    let mut cart = load(conn, user_row.id, currency, locale, locale).await?;
    let report = cart.merge_from(&guest);

    save(conn, &cart).await?;
    if user_row.coupon_code.is_none() {
        if let Some(code) = guest_row.coupon_code.as_deref() {
            carts::set_coupon(&mut *conn, user_row.id, Some(code)).await?;
        }
    }
    carts::delete(&mut *conn, guest_row.id).await?;

    tracing::info!(
        %user_id,
        guest_cart = %guest_row.id,
        merged = report.merged.len(),
        clamped = report.clamped.len(),
        dropped = report.dropped.len(),
        "guest cart merged"
    );
    Ok(Some(report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Role;
    use axum::http::HeaderValue;

    fn row(status: &str, title: &str) -> CartLineRow {
        CartLineRow {
            variant_id: Uuid::new_v4(), product_id: Uuid::new_v4(), name: "Linen Shirt".into(),
            variant_title: title.into(), sku: "LS-M".into(), quantity: 2, price: 45_000, stock: 7,
            product_status: status.into(),
        }
    }

    #[test]
    fn test_line_from_row() {
        let line = to_line(&row("active", "Medium"), "EGP");
        assert_eq!(line.name, "Linen Shirt - Medium");
        assert_eq!((line.quantity, line.stock), (2, 7));
        assert_eq!(line.line_total().to_minor(), 90_000);
        assert_eq!(to_line(&row("active", "Default"), "EGP").name, "Linen Shirt");
    }

    #[test]
    fn test_inactive_product_has_no_stock() {
        assert_eq!(to_line(&row("archived", ""), "EGP").stock, 0);
    }

    #[test]
    fn test_owner_resolution() {
        let mut headers = HeaderMap::new();
        assert_eq!(CartOwner::resolve(None, &headers), None);

        headers.insert(CART_TOKEN_HEADER, HeaderValue::from_static(" abc123 "));
        assert_eq!(CartOwner::resolve(None, &headers), Some(CartOwner::Guest("abc123".into())));

        let user = CurrentUser { id: Uuid::new_v4(), email: "a@b.co".into(), role: Role::Customer };
        assert_eq!(CartOwner::resolve(Some(&user), &headers), Some(CartOwner::User(user.id)));
    }
}
