//! Route handlers for the webhook server.

pub mod assortment;
pub mod health;
pub mod images;
pub mod preview;
pub mod stats;
pub mod webhook;

use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde::Serialize;

use crate::state::AppState;

/// Success envelope shared by the JSON endpoints.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            message: None,
            data,
        })
    }

    pub fn with_message(message: impl Into<String>, data: T) -> Json<Self> {
        Json(Self {
            success: true,
            message: Some(message.into()),
            data,
        })
    }
}

/// Build the router with all routes.
pub fn router() -> Router<AppState> {
    Router::new()
        // Webhook ingestion
        .route(
            "/webhook/packing-instruction/:order_name",
            post(webhook::receive_order),
        )
        .route(
            "/webhook/individual-assortment/:assortment_id",
            post(webhook::receive_individual),
        )
        .route(
            "/webhook/assortment/:assortment_id/save-individual",
            post(webhook::save_individual_from_order),
        )
        // Reads
        .route("/webhook/data/:order_name", get(assortment::order_data))
        .route("/webhook/assortment/:assortment_id", get(assortment::assortment))
        .route("/webhook/stats", get(stats::stats))
        .route("/webhook/recent", get(stats::recent))
        .route("/webhook/recent/:limit", get(stats::recent_with_limit))
        // User modifications
        .route(
            "/webhook/assortment/:assortment_id/modifications",
            put(assortment::update_modifications),
        )
        .route(
            "/webhook/assortment/:assortment_id/load",
            post(assortment::record_load),
        )
        .route(
            "/webhook/assortment/:assortment_id/images",
            post(images::upload),
        )
        .route(
            "/webhook/assortment/:assortment_id/images/delete",
            post(images::delete),
        )
        .route(
            "/webhook/assortment/:assortment_id/images/replace",
            post(images::replace),
        )
        // HTML preview
        .route("/preview/:assortment_id", get(preview::preview_page))
        // Health check
        .route("/health", get(health::health))
}
