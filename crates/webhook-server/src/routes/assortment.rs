//! Order and assortment reads, user modifications and load metrics.

use axum::extract::{Path, State};
use axum::Json;
use database::{
    individual_assortment, user_modifications, webhook_order, AssortmentLookup, WebhookOrder,
};
use pcf_core::transform::AssortmentRecord;
use pcf_core::wire::{AssortmentResponse, LoadSample, ModificationsUpdate};
use pcf_core::{DataSource, UserModifications};

use crate::error::{ApiError, Result};
use crate::routes::ApiResponse;
use crate::state::AppState;

/// Full stored order.
pub async fn order_data(
    State(state): State<AppState>,
    Path(order_name): Path<String>,
) -> Result<Json<ApiResponse<WebhookOrder>>> {
    let order = webhook_order::get_order(state.db.pool(), &order_name).await?;
    Ok(ApiResponse::ok(order))
}

/// An assortment from the individual store, else from the newest order
/// containing it.
pub async fn assortment(
    State(state): State<AppState>,
    Path(assortment_id): Path<String>,
) -> Result<Json<AssortmentResponse>> {
    let (source, data) = fetch_record(&state, &assortment_id).await?;
    Ok(Json(AssortmentResponse {
        success: true,
        source,
        data,
    }))
}

/// Merge labels, custom fields and form data into the user modifications.
pub async fn update_modifications(
    State(state): State<AppState>,
    Path(assortment_id): Path<String>,
    Json(update): Json<ModificationsUpdate>,
) -> Result<Json<ApiResponse<UserModifications>>> {
    let modifications =
        user_modifications::update_user_modifications(state.db.pool(), &assortment_id, &update)
            .await?;
    Ok(ApiResponse::ok(modifications))
}

/// Record one client load measurement.
pub async fn record_load(
    State(state): State<AppState>,
    Path(assortment_id): Path<String>,
    Json(sample): Json<LoadSample>,
) -> Result<Json<ApiResponse<LoadSample>>> {
    individual_assortment::record_load(
        state.db.pool(),
        &assortment_id,
        sample.load_time_ms,
        sample.cache_hit,
    )
    .await?;
    Ok(ApiResponse::ok(sample))
}

/// Resolve an assortment id to its canonical record and source.
pub(crate) async fn fetch_record(
    state: &AppState,
    assortment_id: &str,
) -> Result<(DataSource, AssortmentRecord)> {
    let pool = state.db.pool();

    if let Some(individual) =
        individual_assortment::get_individual_assortment(pool, assortment_id).await?
    {
        return Ok((DataSource::Individual, individual.to_record()));
    }

    let lookup = AssortmentLookup::parse(assortment_id);
    match webhook_order::find_assortment_in_order(pool, &lookup).await? {
        Some(found) => Ok((DataSource::SalesOrder, found.into_record())),
        None => Err(ApiError::NotFound(format!(
            "Assortment {} not found",
            assortment_id
        ))),
    }
}
