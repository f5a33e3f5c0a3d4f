//! Webhook ingestion routes.

use axum::extract::{Path, State};
use axum::response::{IntoResponse, Redirect, Response};
use axum::Json;
use database::{individual_assortment, webhook_order, AssortmentLookup, AssortmentOrigin};
use pcf_core::wire::{IndividualWebhookPayload, OrderWebhookPayload};
use pcf_core::{hash, now_rfc3339, OrderStatus, INDIVIDUAL_PREFIX};
use serde::Serialize;
use tracing::info;

use crate::error::{ApiError, Result};
use crate::routes::ApiResponse;
use crate::state::AppState;

/// Summary returned after storing an order webhook.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderReceipt {
    pub order_name: String,
    pub status: OrderStatus,
    pub assortment_count: i64,
    pub total_images: i64,
}

/// Summary returned after storing an individual assortment.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndividualReceipt {
    pub assortment_id: String,
    pub version: i64,
    pub total_images: i64,
    pub access_count: i64,
    pub image_collection_hash: String,
}

impl From<database::IndividualAssortment> for IndividualReceipt {
    fn from(saved: database::IndividualAssortment) -> Self {
        Self {
            assortment_id: saved.assortment_id,
            version: saved.current_version,
            total_images: saved.metadata.total_images,
            access_count: saved.access_count,
            image_collection_hash: saved.metadata.image_collection_hash,
        }
    }
}

/// Receive a sales-order webhook.
///
/// `INDIVIDUAL-` orders carrying exactly one assortment are redirected to the
/// individual-assortment endpoint instead of being stored as orders.
pub async fn receive_order(
    State(state): State<AppState>,
    Path(order_name): Path<String>,
    Json(mut payload): Json<OrderWebhookPayload>,
) -> Result<Response> {
    if order_name.starts_with(INDIVIDUAL_PREFIX) && payload.assortments.len() == 1 {
        let item_no = payload.assortments[0].item_no.trim();
        if !item_no.is_empty() {
            info!(order_name = %order_name, item_no = %item_no, "Redirecting individual delivery");
            let target = format!(
                "/webhook/individual-assortment/{}",
                urlencoding::encode(item_no)
            );
            return Ok(Redirect::temporary(&target).into_response());
        }
    }

    let now = now_rfc3339();
    for assortment in &mut payload.assortments {
        hash::annotate_images(&mut assortment.pcf_images, &now);
    }

    let order = webhook_order::save_order_webhook(state.db.pool(), &order_name, &payload).await?;
    let status = if webhook_order::mark_processed(state.db.pool(), &order_name).await {
        OrderStatus::Processed
    } else {
        OrderStatus::Received
    };

    let receipt = OrderReceipt {
        order_name: order.order_name,
        status,
        assortment_count: order.metadata.assortment_count,
        total_images: order.metadata.total_images,
    };
    Ok(ApiResponse::with_message("Order webhook stored", receipt).into_response())
}

/// Receive a single assortment and store it as an individual assortment.
///
/// The body's `itemNo` defaults to the path id and must match it when given.
pub async fn receive_individual(
    State(state): State<AppState>,
    Path(assortment_id): Path<String>,
    Json(payload): Json<IndividualWebhookPayload>,
) -> Result<Json<ApiResponse<IndividualReceipt>>> {
    let source = payload
        .source
        .clone()
        .unwrap_or_else(|| webhook_order::DEFAULT_SOURCE.to_string());
    let mut assortment = payload
        .into_assortment()
        .ok_or_else(|| ApiError::BadRequest("Missing assortment".to_string()))?;

    if assortment.item_no.trim().is_empty() {
        assortment.item_no = assortment_id.clone();
    } else if assortment.item_no.trim() != assortment_id {
        return Err(ApiError::BadRequest(format!(
            "itemNo '{}' does not match path '{}'",
            assortment.item_no, assortment_id
        )));
    }

    hash::annotate_images(&mut assortment.pcf_images, &now_rfc3339());

    let saved = individual_assortment::save_individual_assortment(
        state.db.pool(),
        &assortment,
        &AssortmentOrigin::webhook(source),
    )
    .await?;

    Ok(ApiResponse::with_message(
        "Individual assortment stored",
        saved.into(),
    ))
}

/// Copy an assortment out of the newest order containing it into the
/// individual store.
pub async fn save_individual_from_order(
    State(state): State<AppState>,
    Path(assortment_id): Path<String>,
) -> Result<Json<ApiResponse<IndividualReceipt>>> {
    let lookup = AssortmentLookup::parse(&assortment_id);
    let found = webhook_order::find_assortment_in_order(state.db.pool(), &lookup)
        .await?
        .ok_or_else(|| {
            ApiError::NotFound(format!("Assortment {} not found in any order", assortment_id))
        })?;

    let saved = individual_assortment::save_individual_assortment(
        state.db.pool(),
        &found.assortment,
        &AssortmentOrigin::order(found.order_name),
    )
    .await?;

    Ok(ApiResponse::with_message(
        "Individual assortment saved from order",
        saved.into(),
    ))
}
