//! HTTP service for packing-instruction webhooks.
//!
//! Receives sales-order and single-assortment deliveries, stores them in
//! SQLite and serves assortments, user modifications, uploaded images and an
//! HTML preview.

pub mod config;
pub mod error;
pub mod routes;
pub mod state;
pub mod uploads;

use axum::extract::DefaultBodyLimit;
use axum::Router;
use database::Database;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::state::AppState;
use crate::uploads::{UploadStore, UPLOADS_ROUTE};

/// Build the application router for the given state.
pub fn app(state: AppState, max_body_bytes: usize) -> Router {
    let uploads = ServeDir::new(state.uploads.root());

    routes::router()
        .nest_service(UPLOADS_ROUTE, uploads)
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Connect the database, run migrations, open the upload store and build
/// the router.
pub async fn build(config: &Config) -> Result<Router, Box<dyn std::error::Error + Send + Sync>> {
    let db = Database::connect_with_pool_size(&config.database_url, config.pool_size).await?;
    db.migrate().await?;

    let uploads = UploadStore::open(&config.upload_dir, config.max_upload_bytes).await?;
    let state = AppState::new(db, uploads);

    Ok(app(state, config.max_body_bytes))
}
