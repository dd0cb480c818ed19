//! Payment provider callbacks.
//!
//! Handlers take the raw body so signatures are checked against exactly the
//! bytes the provider signed. A bad signature answers 401; everything the
//! provider sends after verification answers 200, including duplicates, so
//! it stops retrying.

use axum::{
    body::Bytes,
    extract::{RawQuery, State},
    http::HeaderMap,
    response::Redirect,
    routing::{get, post},
    Json, Router,
};

use crate::error::{AppError, AppResult};
use crate::payments::{PaymentOutcome, PaymentProvider, PaymobTransaction, WebhookRequest};
use crate::services::reconcile::{self, Reconciliation};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/webhooks/paymob", post(paymob_webhook))
        .route("/webhooks/stripe", post(stripe_webhook))
        .route("/payments/paymob/return", get(paymob_return))
}

async fn handle(
    state: &AppState,
    provider: PaymentProvider,
    headers: &HeaderMap,
    query: Option<&str>,
    body: &[u8],
) -> AppResult<Json<Reconciliation>> {
    let gateway = state
        .gateways
        .get(provider)
        .ok_or_else(|| AppError::not_found(format!("Payment provider {provider} is not enabled")))?;

    let event = gateway
        .parse_webhook(&WebhookRequest { headers, query, body })
        .map_err(|e| {
            tracing::warn!(%provider, error = %e, "rejected payment webhook");
            AppError::from(e)
        })?;
    tracing::info!(%provider, event_id = %event.event_id, event_type = %event.event_type, order_id = ?event.order_id, "payment webhook received");

    Ok(Json(reconcile::apply(state, provider, event).await?))
}

/// POST /api/v1/webhooks/paymob
async fn paymob_webhook(
    State(state): State<AppState>,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<Json<Reconciliation>> {
    handle(&state, PaymentProvider::Paymob, &headers, query.as_deref(), &body).await
}

/// POST /api/v1/webhooks/stripe
async fn stripe_webhook(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> AppResult<Json<Reconciliation>> {
    handle(&state, PaymentProvider::Stripe, &headers, None, &body).await
}

/// Storefront page the shopper lands on after a Paymob payment.
fn return_target(base: &str, tx: &PaymobTransaction) -> String {
    let page = match tx.outcome() {
        PaymentOutcome::Succeeded { .. } => "success",
        PaymentOutcome::Failed { .. } => "failed",
        PaymentOutcome::Ignored => "pending",
    };
    let order = tx.merchant_order_id.map(|id| id.to_string()).unwrap_or_default();
    format!("{}/checkout/{page}?order={order}", base.trim_end_matches('/'))
}

/// GET /api/v1/payments/paymob/return
///
/// The browser redirect carries the same signed transaction fields as the
/// server callback. Whichever arrives first updates the order.
async fn paymob_return(State(state): State<AppState>, RawQuery(query): RawQuery) -> AppResult<Redirect> {
    let client = state
        .gateways
        .paymob
        .clone()
        .ok_or_else(|| AppError::not_found("Payment provider paymob is not enabled"))?;
    let tx = client.parse_return(query.as_deref().unwrap_or_default()).map_err(|e| {
        tracing::warn!(error = %e, "rejected paymob return");
        AppError::from(e)
    })?;

    let result = reconcile::apply(&state, PaymentProvider::Paymob, tx.to_event()).await?;
    tracing::debug!(transaction_id = %tx.transaction_id, ?result, "paymob return handled");
    Ok(Redirect::to(&return_target(&state.config.public_base_url, &tx)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn tx(success: bool, pending: bool) -> PaymobTransaction {
        PaymobTransaction {
            transaction_id: "991".into(),
            merchant_order_id: Some(Uuid::nil()),
            success,
            pending,
            message: None,
        }
    }

    #[test]
    fn test_return_target_by_outcome() {
        let base = "https://shop.example/";
        assert_eq!(
            return_target(base, &tx(true, false)),
            format!("https://shop.example/checkout/success?order={}", Uuid::nil())
        );
        assert!(return_target(base, &tx(false, false)).contains("/checkout/failed?"));
        assert!(return_target(base, &tx(false, true)).contains("/checkout/pending?"));
    }
}
