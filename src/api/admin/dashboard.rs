//! Store overview for the back office.

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use crate::auth::AdminUser;
use crate::db::orders::{self, RecentOrderRow};
use crate::db::stats::{self, ProductCounts, StatusCount};
use crate::db::variants::{self, LowStockRow};
use crate::error::AppResult;
use crate::state::AppState;

const LOW_STOCK_LIMIT: i64 = 20;
const RECENT_ORDERS: i64 = 5;

pub fn router() -> Router<AppState> {
    Router::new().route("/dashboard", get(dashboard))
}

#[derive(Debug, Serialize)]
pub struct Dashboard {
    pub currency: String,
    pub orders_by_status: Vec<StatusCount>,
    /// Sum of paid order totals, in minor units.
    pub revenue: i64,
    pub products: ProductCounts,
    pub low_stock_threshold: i32,
    pub low_stock: Vec<LowStockRow>,
    pub recent_orders: Vec<RecentOrderRow>,
}

/// GET /api/v1/admin/dashboard
async fn dashboard(State(state): State<AppState>, _admin: AdminUser) -> AppResult<Json<Dashboard>> {
    let threshold = state.config.store.low_stock_threshold;
    let (orders_by_status, revenue, products, low_stock, recent_orders) = tokio::try_join!(
        stats::orders_by_status(&state.db),
        stats::paid_revenue(&state.db),
        stats::product_counts(&state.db),
        variants::low_stock(&state.db, threshold, LOW_STOCK_LIMIT),
        orders::recent(&state.db, RECENT_ORDERS),
    )?;
    Ok(Json(Dashboard {
        currency: state.currency().to_string(),
        orders_by_status,
        revenue,
        products,
        low_stock_threshold: threshold,
        low_stock,
        recent_orders,
    }))
}
