//! Packing-instruction webhook client library.
//!
//! This crate provides a Rust client for the packing-instruction webhook
//! server. It supports:
//!
//! - Reading assortments through a memory and durable cache
//! - Staging image deletions, replacements and uploads, then saving them
//!   concurrently with per-operation results
//! - Updating user modifications and reporting load metrics
//!
//! # Example
//!
//! ```no_run
//! use pcf_client::{
//!     AssortmentCache, AssortmentClient, ClientConfig, FileStore, ImageStaging, ResourceKind,
//! };
//!
//! # async fn example() -> Result<(), pcf_client::ClientError> {
//! let client = AssortmentClient::new(ClientConfig::default())?;
//! let cache = AssortmentCache::open(FileStore::open("./cache").await?).await?;
//!
//! if let Some(loaded) = cache
//!     .load(&client, ResourceKind::IndividualAssortment, "A01")
//!     .await?
//! {
//!     println!("{} from {:?}", loaded.data.item_no(), loaded.origin);
//! }
//!
//! let mut staging = ImageStaging::new("A01");
//! staging.mark_for_deletion("3f2a.png");
//! let report = staging.save(&client, &cache).await;
//! for failure in report.failures() {
//!     eprintln!("{:?}: {:?}", failure.kind, failure.error);
//! }
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod staging;
pub mod store;

pub use api::{AssortmentSource, ImageMutations, PendingUpload, ResourceKind};
pub use cache::{AssortmentCache, CacheOrigin, Loaded, CACHE_SCHEMA_VERSION};
pub use client::AssortmentClient;
pub use config::{ClientConfig, RetryConfig};
pub use error::{ClientError, Result};
pub use staging::{ImageStaging, OperationKind, OperationOutcome, SaveReport, StagedItem};
pub use store::{DurableStore, FileStore, MemoryStore};

/// Crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
