//! Payment reconciliation against a real database.

mod common;

use uuid::Uuid;

use common::OrderFixture;
use storefront::payments::{PaymentOutcome, PaymentProvider, PaymobTransaction, WebhookEvent};
use storefront::services::reconcile::{self, Reconciliation};

fn settled(order_id: Uuid, event_id: &str) -> WebhookEvent {
    WebhookEvent {
        event_id: event_id.to_string(),
        event_type: "checkout.session.completed".into(),
        order_id: Some(order_id),
        outcome: PaymentOutcome::Succeeded { reference: "cs_test_1".into() },
    }
}

fn declined(order_id: Uuid, event_id: &str) -> WebhookEvent {
    WebhookEvent {
        event_id: event_id.to_string(),
        event_type: "checkout.session.async_payment_failed".into(),
        order_id: Some(order_id),
        outcome: PaymentOutcome::Failed { reason: "card declined".into() },
    }
}

fn event_id() -> String { format!("evt_{}", Uuid::new_v4().simple()) }

#[tokio::test]
async fn paid_order_takes_stock_counts_coupon_and_clears_cart() {
    let Some(state) = common::state().await else { return };
    let db = &state.db;
    let shirt = common::variant(db, 10_000, 5).await;
    let code = common::coupon(db, 1_000).await;
    let (cart_id, _) = common::guest_cart(db, &[(shirt.variant_id, 2)], Some(&code)).await;
    let order_id = common::order(db, OrderFixture {
        provider: "stripe", status: "pending", payment_status: "pending",
        cart_id: Some(cart_id), coupon_code: Some(&code), items: &[(&shirt, 2)],
    })
    .await;

    let result = reconcile::apply(&state, PaymentProvider::Stripe, settled(order_id, &event_id())).await.unwrap();

    assert_eq!(result, Reconciliation::Paid { order_id });
    assert_eq!(common::order_state(db, order_id).await, ("paid".into(), "paid".into()));
    assert_eq!(common::stock(db, shirt.variant_id).await, 3);
    assert_eq!(common::coupon_uses(db, &code).await, 1);
    assert_eq!(common::cart_quantity(db, cart_id).await, 0);
    let (coupon,): (Option<String>,) = sqlx::query_as("SELECT coupon_code FROM carts WHERE id = $1")
        .bind(cart_id)
        .fetch_one(db)
        .await
        .unwrap();
    assert_eq!(coupon, None);
}

#[tokio::test]
async fn redelivered_event_changes_nothing() {
    let Some(state) = common::state().await else { return };
    let db = &state.db;
    let shirt = common::variant(db, 10_000, 5).await;
    let code = common::coupon(db, 1_000).await;
    let order_id = common::order(db, OrderFixture {
        provider: "stripe", status: "pending", payment_status: "pending",
        cart_id: None, coupon_code: Some(&code), items: &[(&shirt, 1)],
    })
    .await;
    let id = event_id();

    reconcile::apply(&state, PaymentProvider::Stripe, settled(order_id, &id)).await.unwrap();
    let again = reconcile::apply(&state, PaymentProvider::Stripe, settled(order_id, &id)).await.unwrap();

    assert_eq!(again, Reconciliation::Duplicate);
    assert_eq!(common::stock(db, shirt.variant_id).await, 4);
    assert_eq!(common::coupon_uses(db, &code).await, 1);
}

#[tokio::test]
async fn oversold_stock_floors_at_zero() {
    let Some(state) = common::state().await else { return };
    let db = &state.db;
    let scarf = common::variant(db, 10_000, 1).await;
    let order_id = common::order(db, OrderFixture {
        provider: "stripe", status: "pending", payment_status: "pending",
        cart_id: None, coupon_code: None, items: &[(&scarf, 3)],
    })
    .await;

    let result = reconcile::apply(&state, PaymentProvider::Stripe, settled(order_id, &event_id())).await.unwrap();

    assert_eq!(result, Reconciliation::Paid { order_id });
    assert_eq!(common::stock(db, scarf.variant_id).await, 0);
}

#[tokio::test]
async fn failed_payment_cancels_order_and_keeps_cart() {
    let Some(state) = common::state().await else { return };
    let db = &state.db;
    let shirt = common::variant(db, 10_000, 5).await;
    let (cart_id, _) = common::guest_cart(db, &[(shirt.variant_id, 2)], None).await;
    let order_id = common::order(db, OrderFixture {
        provider: "stripe", status: "pending", payment_status: "pending",
        cart_id: Some(cart_id), coupon_code: None, items: &[(&shirt, 2)],
    })
    .await;

    let result = reconcile::apply(&state, PaymentProvider::Stripe, declined(order_id, &event_id())).await.unwrap();

    assert_eq!(result, Reconciliation::PaymentFailed { order_id });
    assert_eq!(common::order_state(db, order_id).await, ("cancelled".into(), "failed".into()));
    assert_eq!(common::cart_quantity(db, cart_id).await, 2);
    assert_eq!(common::stock(db, shirt.variant_id).await, 5);
}

#[tokio::test]
async fn final_orders_are_left_alone() {
    let Some(state) = common::state().await else { return };
    let db = &state.db;
    let shirt = common::variant(db, 10_000, 5).await;
    let order_id = common::order(db, OrderFixture {
        provider: "stripe", status: "shipped", payment_status: "paid",
        cart_id: None, coupon_code: None, items: &[(&shirt, 1)],
    })
    .await;

    let paid = reconcile::apply(&state, PaymentProvider::Stripe, settled(order_id, &event_id())).await.unwrap();
    let failed = reconcile::apply(&state, PaymentProvider::Stripe, declined(order_id, &event_id())).await.unwrap();

    assert_eq!(paid, Reconciliation::Unchanged { order_id });
    assert_eq!(failed, Reconciliation::Unchanged { order_id });
    assert_eq!(common::order_state(db, order_id).await, ("shipped".into(), "paid".into()));
    assert_eq!(common::stock(db, shirt.variant_id).await, 5);
}

#[tokio::test]
async fn event_from_other_provider_is_ignored() {
    let Some(state) = common::state().await else { return };
    let db = &state.db;
    let shirt = common::variant(db, 10_000, 5).await;
    let order_id = common::order(db, OrderFixture {
        provider: "paymob", status: "pending", payment_status: "pending",
        cart_id: None, coupon_code: None, items: &[(&shirt, 1)],
    })
    .await;

    let result = reconcile::apply(&state, PaymentProvider::Stripe, settled(order_id, &event_id())).await.unwrap();

    assert_eq!(result, Reconciliation::Unchanged { order_id });
    assert_eq!(common::order_state(db, order_id).await, ("pending".into(), "pending".into()));
}

#[tokio::test]
async fn paymob_settlement_after_pending_notice_pays_order() {
    let Some(state) = common::state().await else { return };
    let db = &state.db;
    let shirt = common::variant(db, 10_000, 5).await;
    let order_id = common::order(db, OrderFixture {
        provider: "paymob", status: "pending", payment_status: "pending",
        cart_id: None, coupon_code: None, items: &[(&shirt, 1)],
    })
    .await;
    let pending = PaymobTransaction {
        transaction_id: Uuid::new_v4().simple().to_string(),
        merchant_order_id: Some(order_id),
        success: false,
        pending: true,
        message: None,
    };
    let success = PaymobTransaction { success: true, pending: false, ..pending.clone() };

    let first = reconcile::apply(&state, PaymentProvider::Paymob, pending.to_event()).await.unwrap();
    let second = reconcile::apply(&state, PaymentProvider::Paymob, success.to_event()).await.unwrap();
    let browser_return = reconcile::apply(&state, PaymentProvider::Paymob, success.to_event()).await.unwrap();

    assert_eq!(first, Reconciliation::Ignored);
    assert_eq!(second, Reconciliation::Paid { order_id });
    assert_eq!(browser_return, Reconciliation::Duplicate);
    assert_eq!(common::stock(db, shirt.variant_id).await, 4);
}
