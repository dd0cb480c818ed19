//! Applies verified payment provider events to orders.
//!
//! Every event is recorded in `processed_webhook_events` inside the same
//! transaction that changes the order, so a redelivered event is a no-op and
//! a failed one can be retried by the provider.

use serde::Serialize;
use uuid::Uuid;

use crate::db::{coupons, orders, webhooks};
use crate::domain::aggregates::OrderError;
use crate::domain::events::DomainEvent;
use crate::error::AppResult;
use crate::payments::{PaymentOutcome, PaymentProvider, WebhookEvent};
use crate::state::AppState;

use super::cart as cart_service;
use super::inventory;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "result")]
pub enum Reconciliation {
    Duplicate,
    Ignored,
    UnknownOrder,
    Paid { order_id: Uuid },
    PaymentFailed { order_id: Uuid },
    /// The order already reached a state this event cannot change.
    Unchanged { order_id: Uuid },
}

pub async fn apply(state: &AppState, provider: PaymentProvider, event: WebhookEvent) -> AppResult<Reconciliation> {
    let mut tx = state.db.begin().await?;
    if !webhooks::record_event(&mut *tx, &event.event_id, provider.as_str(), &event.event_type).await? {
        tracing::info!(event_id = %event.event_id, %provider, "duplicate payment event, skipping");
        return Ok(Reconciliation::Duplicate);
    }

    if event.outcome == PaymentOutcome::Ignored {
        tx.commit().await?;
        tracing::debug!(event_id = %event.event_id, event_type = %event.event_type, "payment event carries no order change");
        return Ok(Reconciliation::Ignored);
    }

    let row = match event.order_id {
        Some(id) => orders::find_for_update(&mut *tx, id).await?,
        None => None,
    };
    let Some(row) = row else {
        tx.commit().await?;
        tracing::warn!(event_id = %event.event_id, order_id = ?event.order_id, %provider, "payment event for unknown order");
        return Ok(Reconciliation::UnknownOrder);
    };
    if row.payment_provider != provider.as_str() {
        tx.commit().await?;
        tracing::warn!(order_id = %row.id, expected = %row.payment_provider, %provider, "payment event from another provider");
        return Ok(Reconciliation::Unchanged { order_id: row.id });
    }

    let mut order = row.to_domain();
    let mut events: Vec<DomainEvent> = Vec::new();

    let result = match &event.outcome {
        PaymentOutcome::Succeeded { reference } => match order.mark_paid(provider.as_str(), reference) {
            Ok(true) => {
                orders::save_status(&mut *tx, &order).await?;
                orders::set_payment_reference(&mut *tx, order.id(), reference).await?;
                let items = orders::items(&mut *tx, order.id()).await?;
                let fallback = state.config.default_locale;
                events.extend(inventory::take_for_order(&mut tx, order.id(), &items, &row.currency, fallback).await?);
                if let Some(code) = row.coupon_code.as_deref() {
                    coupons::increment_usage(&mut *tx, code).await?;
                }
                if let Some(cart_id) = row.cart_id {
                    cart_service::clear(&mut tx, cart_id, &row.currency, fallback).await?;
                }
                tracing::info!(order_id = %order.id(), %provider, %reference, "order paid");
                Reconciliation::Paid { order_id: order.id() }
            }
            Ok(false) => Reconciliation::Unchanged { order_id: order.id() },
            Err(OrderError::InvalidTransition { from, .. }) => {
                tracing::warn!(order_id = %order.id(), status = %from, "payment succeeded for an order that is no longer pending");
                Reconciliation::Unchanged { order_id: order.id() }
            }
            Err(e) => return Err(e.into()),
        },
        PaymentOutcome::Failed { reason } => {
            if order.mark_payment_failed(reason) {
                orders::save_status(&mut *tx, &order).await?;
                tracing::info!(order_id = %order.id(), %provider, reason = %reason, "payment failed, order cancelled");
                Reconciliation::PaymentFailed { order_id: order.id() }
            } else {
                Reconciliation::Unchanged { order_id: order.id() }
            }
        }
        PaymentOutcome::Ignored => Reconciliation::Ignored,
    };

    tx.commit().await?;
    events.splice(0..0, order.take_events());
    state.events.publish_all(events).await;
    Ok(result)
}
