//! Database models.

use pcf_core::transform::AssortmentRecord;
use pcf_core::{Assortment, OrderStatus, SalesOrder, UserModifications};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Metadata derived from an order webhook delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderMetadata {
    /// Images across all assortments (standard counting rule).
    pub total_images: i64,
    pub assortment_count: i64,
    /// Upstream system name (e.g., "odoo").
    pub source: String,
    pub odoo_version: Option<String>,
}

/// A stored sales-order webhook delivery, keyed by order name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookOrder {
    pub order_name: String,
    pub sales_order: SalesOrder,
    pub assortments: Vec<Assortment>,
    pub status: OrderStatus,
    pub received_at: String,
    pub processed_at: Option<String>,
    pub error_message: Option<String>,
    pub metadata: OrderMetadata,
}

/// Order listing row without the assortment bodies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct OrderSummary {
    pub order_name: String,
    pub customer: String,
    pub status: String,
    pub received_at: String,
    pub processed_at: Option<String>,
    pub error_message: Option<String>,
    pub total_images: i64,
    pub assortment_count: i64,
}

/// Aggregate webhook statistics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookStats {
    pub total_orders: i64,
    /// Orders received in the last 24 hours.
    pub recent_orders: i64,
    pub error_orders: i64,
    pub total_images: i64,
    pub individual_assortments: i64,
    /// Percentage of orders not in error, e.g. `"87.5%"`.
    pub success_rate: String,
}

/// One entry of an individual assortment's image version history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionEntry {
    pub version: i64,
    pub collection_hash: String,
    pub total_images: i64,
    pub recorded_at: String,
}

/// Assortment body plus user edits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssortmentPayload {
    pub assortment: Assortment,
    pub user_modifications: Option<UserModifications>,
}

/// Derived metadata of an individual assortment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndividualMetadata {
    pub total_images: i64,
    pub source: String,
    pub image_collection_hash: String,
    pub has_user_modifications: bool,
    /// Order the assortment was copied from, if any.
    pub order_name: Option<String>,
}

/// Load-time bookkeeping of an individual assortment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceMetrics {
    /// Running average in milliseconds.
    pub average_load_time: f64,
    /// Hits as a percentage of all recorded loads.
    pub cache_hit_rate: f64,
    pub total_cache_hits: i64,
    pub total_cache_misses: i64,
}

/// A standalone, directly addressable assortment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndividualAssortment {
    pub assortment_id: String,
    pub assortment_data: AssortmentPayload,
    pub status: OrderStatus,
    pub access_count: i64,
    pub last_accessed_at: String,
    pub current_version: i64,
    pub version_history: Vec<VersionEntry>,
    pub cache_key: String,
    pub metadata: IndividualMetadata,
    pub performance_metrics: PerformanceMetrics,
    pub created_at: String,
    pub updated_at: String,
}

impl IndividualAssortment {
    /// Canonical read record annotated with access bookkeeping.
    pub fn to_record(&self) -> AssortmentRecord {
        AssortmentRecord {
            assortment: self.assortment_data.assortment.clone(),
            user_modifications: self.assortment_data.user_modifications.clone(),
            sales_order: None,
            order_name: self.metadata.order_name.clone(),
            access_count: Some(self.access_count),
            last_accessed: Some(self.last_accessed_at.clone()),
            version: Some(self.current_version),
        }
    }
}

/// How to find an assortment inside stored orders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssortmentLookup {
    /// Match on `itemNo`.
    ItemNo(String),
    /// Match on the numeric `_id`.
    Id(i64),
}

impl AssortmentLookup {
    /// Ids starting with a letter are item numbers; numeric ids match `_id`.
    pub fn parse(id: &str) -> Self {
        let id = id.trim();
        if id.starts_with(|c: char| c.is_ascii_alphabetic()) {
            return AssortmentLookup::ItemNo(id.to_string());
        }
        match id.parse::<i64>() {
            Ok(numeric) => AssortmentLookup::Id(numeric),
            Err(_) => AssortmentLookup::ItemNo(id.to_string()),
        }
    }

    /// Whether the assortment satisfies this lookup.
    pub fn matches(&self, assortment: &Assortment) -> bool {
        match self {
            AssortmentLookup::ItemNo(item_no) => assortment.item_no == *item_no,
            AssortmentLookup::Id(id) => assortment.id == *id,
        }
    }
}

/// An assortment found inside an order, with its parent context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderAssortment {
    pub assortment: Assortment,
    pub sales_order: SalesOrder,
    pub order_name: String,
}

impl OrderAssortment {
    /// Canonical read record with the parent order merged in.
    pub fn into_record(self) -> AssortmentRecord {
        AssortmentRecord {
            assortment: self.assortment,
            sales_order: Some(self.sales_order),
            order_name: Some(self.order_name),
            ..AssortmentRecord::default()
        }
    }
}

/// Provenance recorded when saving an individual assortment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssortmentOrigin {
    pub source: String,
    pub order_name: Option<String>,
}

impl AssortmentOrigin {
    /// Delivered directly by the upstream webhook.
    pub fn webhook(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            order_name: None,
        }
    }

    /// Copied out of a stored order.
    pub fn order(order_name: impl Into<String>) -> Self {
        Self {
            source: "sales_order".to_string(),
            order_name: Some(order_name.into()),
        }
    }
}

impl Default for AssortmentOrigin {
    fn default() -> Self {
        Self::webhook("odoo")
    }
}
