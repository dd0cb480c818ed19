//! Order administration: listing and status transitions.

use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::api::{ListParams, PaginatedResponse};
use crate::auth::AdminUser;
use crate::db::orders::{self, OrderRow};
use crate::domain::aggregates::{OrderStatus, PaymentStatus};
use crate::error::{AppError, AppResult};
use crate::services::inventory;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/orders", get(list))
        .route("/orders/:id/status", post(change_status))
}

#[derive(Debug, Deserialize)]
pub struct OrderFilter {
    pub status: Option<String>,
}

fn parse_status(value: &str) -> AppResult<OrderStatus> {
    OrderStatus::parse(value.trim()).ok_or_else(|| AppError::validation(format!("Unknown order status: {value}")))
}

/// GET /api/v1/admin/orders
async fn list(
    State(state): State<AppState>,
    _admin: AdminUser,
    Query(params): Query<ListParams>,
    Query(filter): Query<OrderFilter>,
) -> AppResult<Json<PaginatedResponse<OrderRow>>> {
    let status = filter.status.as_deref().filter(|s| !s.is_empty()).map(parse_status).transpose()?;
    let (data, total) = orders::list(&state.db, None, status, params.limit(), params.offset()).await?;
    Ok(Json(PaginatedResponse { data, total, page: params.page(), per_page: params.per_page() }))
}

#[derive(Debug, Deserialize)]
pub struct StatusChange {
    pub status: String,
}

/// POST /api/v1/admin/orders/:id/status
///
/// `paid` cannot be set by hand; it only follows a verified payment.
/// Cancelling a paid order refunds it and returns its units to stock.
async fn change_status(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<Uuid>,
    Json(req): Json<StatusChange>,
) -> AppResult<Json<OrderRow>> {
    let next = parse_status(&req.status)?;

    let mut tx = state.db.begin().await?;
    let row = orders::find_for_update(&mut *tx, id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Order {id} not found")))?;
    let mut order = row.to_domain();
    let stock_taken = order.payment_status() == PaymentStatus::Paid;
    order.transition_to(next)?;
    orders::save_status(&mut *tx, &order).await?;
    if stock_taken && next == OrderStatus::Cancelled {
        let items = orders::items(&mut *tx, id).await?;
        inventory::restock_order(&mut tx, id, &items, &row.currency, state.config.default_locale).await?;
    }
    tx.commit().await?;

    tracing::info!(order_id = %id, from = %row.status, to = %next, admin_id = %admin.id, "order status changed");
    state.events.publish_all(order.take_events()).await;
    let updated = orders::find(&state.db, id).await?.ok_or_else(|| AppError::not_found(format!("Order {id} not found")))?;
    Ok(Json(updated))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_status() {
        assert_eq!(parse_status("shipped").unwrap(), OrderStatus::Shipped);
        assert_eq!(parse_status(" refunded ").unwrap(), OrderStatus::Refunded);
        assert!(matches!(parse_status("lost"), Err(AppError::Validation(_))));
    }
}
