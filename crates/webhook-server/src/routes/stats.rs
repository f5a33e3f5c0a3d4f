//! Statistics and recent-order listing.

use axum::extract::{Path, State};
use axum::Json;
use database::{webhook_order, OrderSummary, WebhookStats};

use crate::error::Result;
use crate::routes::ApiResponse;
use crate::state::AppState;

/// Default number of orders in the recent listing.
pub const DEFAULT_RECENT_LIMIT: i64 = 10;
/// Largest accepted recent-listing limit.
pub const MAX_RECENT_LIMIT: i64 = 100;

/// Aggregate webhook statistics.
pub async fn stats(State(state): State<AppState>) -> Result<Json<ApiResponse<WebhookStats>>> {
    let stats = webhook_order::stats(state.db.pool()).await?;
    Ok(ApiResponse::ok(stats))
}

/// Most recent orders, default limit.
pub async fn recent(State(state): State<AppState>) -> Result<Json<ApiResponse<Vec<OrderSummary>>>> {
    list(&state, DEFAULT_RECENT_LIMIT).await
}

/// Most recent orders, limit clamped to `1..=100`.
pub async fn recent_with_limit(
    State(state): State<AppState>,
    Path(limit): Path<i64>,
) -> Result<Json<ApiResponse<Vec<OrderSummary>>>> {
    list(&state, limit.clamp(1, MAX_RECENT_LIMIT)).await
}

async fn list(state: &AppState, limit: i64) -> Result<Json<ApiResponse<Vec<OrderSummary>>>> {
    let orders = webhook_order::list_recent(state.db.pool(), limit).await?;
    Ok(ApiResponse::ok(orders))
}
