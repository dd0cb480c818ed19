//! Database fixtures for tests that need PostgreSQL.
//!
//! Set `DATABASE_URL` to a scratch database to run them; without it the
//! tests return early. Every fixture uses fresh ids, so tests can share one
//! database and run in parallel.

#![allow(dead_code)]

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use uuid::Uuid;

use storefront::publisher::EventPublisher;
use storefront::{AppState, Config};

pub async fn state() -> Option<AppState> {
    let Ok(url) = std::env::var("DATABASE_URL") else {
        eprintln!("DATABASE_URL not set, skipping database test");
        return None;
    };
    let db = PgPoolOptions::new().max_connections(5).connect(&url).await.unwrap();
    sqlx::migrate!("./migrations").run(&db).await.unwrap();
    let config = Config { database_url: url, ..Config::for_tests() };
    Some(AppState::new(db, config, EventPublisher::disabled()))
}

pub struct Variant {
    pub product_id: Uuid,
    pub variant_id: Uuid,
    pub sku: String,
}

/// Active product with one variant priced at `price` minor units.
pub async fn variant(db: &PgPool, price: i64, stock: i32) -> Variant {
    let product_id = Uuid::new_v4();
    let variant_id = Uuid::new_v4();
    let sku = format!("SKU-{}", &product_id.simple().to_string()[..12]).to_uppercase();
    sqlx::query("INSERT INTO products (id, slug, status) VALUES ($1, $2, 'active')")
        .bind(product_id)
        .bind(format!("p-{}", product_id.simple()))
        .execute(db)
        .await
        .unwrap();
    sqlx::query("INSERT INTO product_translations (product_id, locale, name) VALUES ($1, 'en', 'Linen Shirt')")
        .bind(product_id)
        .execute(db)
        .await
        .unwrap();
    sqlx::query("INSERT INTO product_variants (id, product_id, sku, title, price, stock) VALUES ($1, $2, $3, 'Default', $4, $5)")
        .bind(variant_id)
        .bind(product_id)
        .bind(&sku)
        .bind(price)
        .bind(stock)
        .execute(db)
        .await
        .unwrap();
    Variant { product_id, variant_id, sku }
}

pub async fn stock(db: &PgPool, variant_id: Uuid) -> i32 {
    let (stock,): (i32,) = sqlx::query_as("SELECT stock FROM product_variants WHERE id = $1")
        .bind(variant_id)
        .fetch_one(db)
        .await
        .unwrap();
    stock
}

/// Guest cart holding `lines` (variant, quantity). Returns the cart id and token.
pub async fn guest_cart(db: &PgPool, lines: &[(Uuid, i32)], coupon: Option<&str>) -> (Uuid, String) {
    let cart_id = Uuid::new_v4();
    let token = format!("guest-{}", cart_id.simple());
    sqlx::query("INSERT INTO carts (id, guest_token, coupon_code) VALUES ($1, $2, $3)")
        .bind(cart_id)
        .bind(&token)
        .bind(coupon)
        .execute(db)
        .await
        .unwrap();
    for (variant_id, quantity) in lines {
        sqlx::query("INSERT INTO cart_items (id, cart_id, variant_id, quantity) VALUES ($1, $2, $3, $4)")
            .bind(Uuid::new_v4())
            .bind(cart_id)
            .bind(variant_id)
            .bind(quantity)
            .execute(db)
            .await
            .unwrap();
    }
    (cart_id, token)
}

pub async fn cart_quantity(db: &PgPool, cart_id: Uuid) -> i64 {
    let (total,): (i64,) = sqlx::query_as("SELECT COALESCE(SUM(quantity), 0)::BIGINT FROM cart_items WHERE cart_id = $1")
        .bind(cart_id)
        .fetch_one(db)
        .await
        .unwrap();
    total
}

/// Fixed-amount coupon, returning its code.
pub async fn coupon(db: &PgPool, value: i64) -> String {
    let id = Uuid::new_v4();
    let code = format!("SAVE{}", &id.simple().to_string()[..10]).to_uppercase();
    sqlx::query("INSERT INTO coupons (id, code, kind, value) VALUES ($1, $2, 'fixed', $3)")
        .bind(id)
        .bind(&code)
        .bind(value)
        .execute(db)
        .await
        .unwrap();
    code
}

pub async fn coupon_uses(db: &PgPool, code: &str) -> i32 {
    let (used,): (i32,) = sqlx::query_as("SELECT used_count FROM coupons WHERE code = $1")
        .bind(code)
        .fetch_one(db)
        .await
        .unwrap();
    used
}

pub struct OrderFixture<'a> {
    pub provider: &'a str,
    pub status: &'a str,
    pub payment_status: &'a str,
    pub cart_id: Option<Uuid>,
    pub coupon_code: Option<&'a str>,
    pub items: &'a [(&'a Variant, i32)],
}

/// Order row as checkout would have written it, bypassing the provider.
pub async fn order(db: &PgPool, fixture: OrderFixture<'_>) -> Uuid {
    let id = Uuid::new_v4();
    let subtotal: i64 = fixture.items.iter().map(|(_, q)| i64::from(*q) * 10_000).sum();
    sqlx::query(
        "INSERT INTO orders (id, order_number, cart_id, email, status, payment_status, payment_provider, \
         currency, subtotal, total, coupon_code) VALUES ($1, $2, $3, 'mona@example.com', $4, $5, $6, 'EGP', $7, $7, $8)",
    )
    .bind(id)
    .bind(format!("ORD-T-{}", id.simple()))
    .bind(fixture.cart_id)
    .bind(fixture.status)
    .bind(fixture.payment_status)
    .bind(fixture.provider)
    .bind(subtotal)
    .bind(fixture.coupon_code)
    .execute(db)
    .await
    .unwrap();
    for (variant, quantity) in fixture.items {
        sqlx::query(
            "INSERT INTO order_items (id, order_id, product_id, variant_id, sku, name, quantity, unit_price, total) \
             VALUES ($1, $2, $3, $4, $5, 'Linen Shirt', $6, 10000, $7)",
        )
        .bind(Uuid::new_v4())
        .bind(id)
        .bind(variant.product_id)
        .bind(variant.variant_id)
        .bind(&variant.sku)
        .bind(quantity)
        .bind(i64::from(*quantity) * 10_000)
        .execute(db)
        .await
        .unwrap();
    }
    id
}

/// `(status, payment_status)` of an order.
pub async fn order_state(db: &PgPool, id: Uuid) -> (String, String) {
    sqlx::query_as("SELECT status, payment_status FROM orders WHERE id = $1")
        .bind(id)
        .fetch_one(db)
        .await
        .unwrap()
}
