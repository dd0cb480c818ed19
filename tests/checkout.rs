//! Checkout against a real database. The test Paymob endpoint refuses
//! connections, so every placed order ends at the session step.

mod common;

use serde_json::json;
use uuid::Uuid;

use storefront::locale::Locale;
use storefront::services::cart::CartOwner;
use storefront::services::checkout::{self, CheckoutRequest};
use storefront::AppError;

fn request() -> CheckoutRequest {
    serde_json::from_value(json!({
        "provider": "paymob",
        "email": "Mona@Example.com",
        "shipping_address": {
            "first_name": "Mona", "last_name": "Adel", "phone": "+201001234567",
            "street": "12 Tahrir St", "city": "Cairo", "country": "eg"
        }
    }))
    .unwrap()
}

async fn orders_for_cart(db: &sqlx::PgPool, cart_id: Uuid) -> Vec<(String, String, String, i64, i64, i64, String)> {
    sqlx::query_as(
        "SELECT order_number, status, payment_status, subtotal, discount, total, email FROM orders WHERE cart_id = $1",
    )
    .bind(cart_id)
    .fetch_all(db)
    .await
    .unwrap()
}

#[tokio::test]
async fn order_is_snapshotted_then_cancelled_when_session_fails() {
    let Some(state) = common::state().await else { return };
    let db = &state.db;
    let shirt = common::variant(db, 10_000, 5).await;
    let code = common::coupon(db, 1_000).await;
    let (cart_id, token) = common::guest_cart(db, &[(shirt.variant_id, 2)], Some(&code)).await;

    let result = checkout::checkout(&state, None, Some(CartOwner::Guest(token)), Locale::En, request()).await;

    assert!(matches!(result, Err(AppError::Payment(_))));
    let placed = orders_for_cart(db, cart_id).await;
    assert_eq!(placed.len(), 1);
    let (number, status, payment, subtotal, discount, total, email) = &placed[0];
    assert!(number.starts_with("ORD-"));
    assert_eq!((status.as_str(), payment.as_str()), ("cancelled", "failed"));
    // 2 x 100.00, less 10.00, plus 50.00 flat shipping.
    assert_eq!((*subtotal, *discount, *total), (20_000, 1_000, 24_000));
    assert_eq!(email, "mona@example.com");

    let (items,): (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM order_items i JOIN orders o ON o.id = i.order_id WHERE o.cart_id = $1 AND i.sku = $2 AND i.quantity = 2",
    )
    .bind(cart_id)
    .bind(&shirt.sku)
    .fetch_one(db)
    .await
    .unwrap();
    assert_eq!(items, 1);
    assert_eq!(common::cart_quantity(db, cart_id).await, 2);
    assert_eq!(common::stock(db, shirt.variant_id).await, 5);
    assert_eq!(common::coupon_uses(db, &code).await, 0);
}

#[tokio::test]
async fn consecutive_checkouts_get_distinct_order_numbers() {
    let Some(state) = common::state().await else { return };
    let db = &state.db;
    let shirt = common::variant(db, 10_000, 50).await;
    let mut numbers = Vec::new();
    for _ in 0..3 {
        let (cart_id, token) = common::guest_cart(db, &[(shirt.variant_id, 1)], None).await;
        let _ = checkout::checkout(&state, None, Some(CartOwner::Guest(token)), Locale::En, request()).await;
        numbers.push(orders_for_cart(db, cart_id).await.remove(0).0);
    }
    numbers.sort();
    numbers.dedup();
    assert_eq!(numbers.len(), 3);
}

#[tokio::test]
async fn insufficient_stock_places_no_order() {
    let Some(state) = common::state().await else { return };
    let db = &state.db;
    let shirt = common::variant(db, 10_000, 2).await;
    let (cart_id, token) = common::guest_cart(db, &[(shirt.variant_id, 3)], None).await;

    let result = checkout::checkout(&state, None, Some(CartOwner::Guest(token)), Locale::En, request()).await;

    match result {
        Err(AppError::BusinessRule(msg)) => assert!(msg.contains(&shirt.sku), "{msg}"),
        other => panic!("expected a stock error, got {other:?}"),
    }
    assert!(orders_for_cart(db, cart_id).await.is_empty());
}

#[tokio::test]
async fn empty_cart_cannot_check_out() {
    let Some(state) = common::state().await else { return };
    let (cart_id, token) = common::guest_cart(&state.db, &[], None).await;

    let result = checkout::checkout(&state, None, Some(CartOwner::Guest(token)), Locale::En, request()).await;

    assert!(matches!(result, Err(AppError::BusinessRule(_))));
    assert!(orders_for_cart(&state.db, cart_id).await.is_empty());
}
