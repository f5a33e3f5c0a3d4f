//! SQLite persistence for packing-instruction webhooks.
//!
//! Stores sales-order webhook deliveries, standalone (individual) assortments
//! and the user modifications attached to them, using SQLx with SQLite.
//!
//! # Example
//!
//! ```no_run
//! use database::{webhook_order, Database};
//! use pcf_core::wire::OrderWebhookPayload;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::connect("sqlite:pcf.db?mode=rwc").await?;
//!     db.migrate().await?;
//!
//!     let payload = OrderWebhookPayload::default();
//!     webhook_order::save_order_webhook(db.pool(), "SOP1", &payload).await?;
//!     webhook_order::mark_processed(db.pool(), "SOP1").await;
//!
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod individual_assortment;
pub mod models;
pub mod user_modifications;
pub mod webhook_order;

pub use error::{DatabaseError, Result};
pub use models::{
    AssortmentLookup, AssortmentOrigin, AssortmentPayload, IndividualAssortment,
    IndividualMetadata, OrderAssortment, OrderMetadata, OrderSummary, PerformanceMetrics,
    VersionEntry, WebhookOrder, WebhookStats,
};

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;
use std::time::Duration;

/// Database connection wrapper.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Default pool size for database connections.
    const DEFAULT_POOL_SIZE: u32 = 20;

    /// How long a writer waits on a locked database before failing.
    const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

    /// Connect to a SQLite database.
    ///
    /// The URL should be in the format `sqlite:path/to/db.sqlite?mode=rwc`.
    /// Use `?mode=rwc` to create the database file if it doesn't exist.
    ///
    /// `sqlite::memory:` gives a private in-memory database, used by tests.
    pub async fn connect(url: &str) -> Result<Self> {
        Self::connect_with_pool_size(url, Self::DEFAULT_POOL_SIZE).await
    }

    /// Connect to a SQLite database with a custom pool size.
    pub async fn connect_with_pool_size(url: &str, pool_size: u32) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .busy_timeout(Self::BUSY_TIMEOUT);

        let pool = SqlitePoolOptions::new()
            .max_connections(pool_size)
            .acquire_timeout(Duration::from_secs(30))
            .connect_with(options)
            .await?;

        tracing::info!(url = %url, pool_size, "Connected to database");

        Ok(Self { pool })
    }

    /// Apply the embedded migrations. Idempotent.
    pub async fn migrate(&self) -> Result<()> {
        let migrator = sqlx::migrate!("./migrations");
        migrator.run(&self.pool).await?;
        tracing::info!(migrations = migrator.iter().count(), "Schema up to date");
        Ok(())
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}
