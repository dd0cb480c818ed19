//! Order history for the signed-in customer.

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use uuid::Uuid;

use super::{ListParams, PaginatedResponse};
use crate::auth::CurrentUser;
use crate::db::orders::{self, OrderItemRow, OrderRow};
use crate::error::{AppError, AppResult};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/orders", get(list_orders))
        .route("/orders/:id", get(get_order))
}

#[derive(Debug, Serialize)]
pub struct OrderDetail {
    #[serde(flatten)]
    pub order: OrderRow,
    pub items: Vec<OrderItemRow>,
}

/// GET /api/v1/orders
async fn list_orders(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(params): Query<ListParams>,
) -> AppResult<Json<PaginatedResponse<OrderRow>>> {
    let (data, total) = orders::list(&state.db, Some(user.id), None, params.limit(), params.offset()).await?;
    Ok(Json(PaginatedResponse { data, total, page: params.page(), per_page: params.per_page() }))
}

/// GET /api/v1/orders/:id
///
/// Someone else's order answers 404 rather than 403.
async fn get_order(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<OrderDetail>> {
    let order = orders::find(&state.db, id)
        .await?
        .filter(|o| user.is_admin() || o.user_id == Some(user.id))
        .ok_or_else(|| AppError::not_found(format!("Order {id} not found")))?;
    let items = orders::items(&state.db, id).await?;
    Ok(Json(OrderDetail { order, items }))
}
