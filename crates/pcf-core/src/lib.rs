//! Core types for packing-instruction assortments.
//!
//! This crate holds everything that both the webhook server and its clients
//! need to agree on:
//!
//! - [`Assortment`] and its five image buckets ([`ImageBuckets`])
//! - [`UserModifications`] layered on top of webhook-sourced data
//! - [`hash`] - content hashing for images and whole image collections
//! - [`transform`] - the merged [`AssortmentData`] view built on every read
//! - [`wire`] - request and response bodies of the HTTP API
//!
//! # Example
//!
//! ```rust
//! use pcf_core::{hash, Assortment, DataSource};
//! use pcf_core::transform::{transform_raw_to_assortment_data, AssortmentRecord};
//!
//! let assortment: Assortment = serde_json::from_str(r#"{"itemNo": "A01", "_id": "7"}"#).unwrap();
//! assert_eq!(assortment.id, 7);
//!
//! let digest = hash::hash_collection(&assortment.pcf_images, None);
//! assert_eq!(digest.total_images, 0);
//!
//! let data = transform_raw_to_assortment_data(
//!     AssortmentRecord::from_assortment(assortment),
//!     DataSource::SalesOrder,
//! );
//! assert_eq!(data.merged_data.combined_image_count, 0);
//! ```

mod error;
pub mod hash;
pub mod lenient;
mod models;
pub mod transform;
pub mod wire;

pub use error::CoreError;
pub use models::{
    Assortment, DataSource, Dimensions, FormData, ImageBucket, ImageBuckets, ImageEntry,
    OrderStatus, PcfImages, SalesOrder, UploadedImage, UploadedImages, UserModifications,
};
pub use transform::AssortmentData;

use chrono::{SecondsFormat, Utc};

/// Order-name prefix reserved for synthetic single-assortment deliveries.
///
/// Orders carrying this prefix are routed to the individual assortment store
/// and excluded from order listings and statistics.
pub const INDIVIDUAL_PREFIX: &str = "INDIVIDUAL-";

/// Key under which an assortment is cached, both server- and client-side.
pub fn cache_key(assortment_id: &str) -> String {
    format!("assortment-cache-{}", assortment_id)
}

/// Current UTC time as an RFC 3339 string with millisecond precision.
///
/// All stored timestamps use this format so they sort lexicographically.
pub fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
