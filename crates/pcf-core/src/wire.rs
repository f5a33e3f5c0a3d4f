//! Request and response bodies shared by the webhook server and its clients.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::lenient;
use crate::models::{Assortment, DataSource, FormData, SalesOrder};
use crate::transform::AssortmentRecord;

/// Body of `POST /webhook/packing-instruction/{orderName}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderWebhookPayload {
    #[serde(default, deserialize_with = "lenient::null_as_default")]
    pub sales_order: SalesOrder,
    #[serde(default, deserialize_with = "lenient::null_as_default")]
    pub assortments: Vec<Assortment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub odoo_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

/// Body of `POST /webhook/individual-assortment/{assortmentId}`.
///
/// Also accepts the order shape with a single-element `assortments` array,
/// which is what a redirected `INDIVIDUAL-` order delivery carries.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndividualWebhookPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assortment: Option<Assortment>,
    #[serde(
        default,
        deserialize_with = "lenient::null_as_default",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub assortments: Vec<Assortment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl IndividualWebhookPayload {
    /// The delivered assortment, whichever shape carried it.
    pub fn into_assortment(self) -> Option<Assortment> {
        self.assortment.or_else(|| self.assortments.into_iter().next())
    }
}

/// Response of `GET /webhook/assortment/{assortmentId}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssortmentResponse {
    pub success: bool,
    pub source: DataSource,
    pub data: AssortmentRecord,
}

/// Body of the batch image delete call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteImagesRequest {
    pub filenames: Vec<String>,
}

/// Result of the batch image delete call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteImagesResponse {
    /// Filenames that were removed.
    pub deleted: Vec<String>,
    /// Filenames that were not attached to the assortment.
    pub missing: Vec<String>,
}

/// One client-side load measurement of an assortment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadSample {
    #[serde(default, deserialize_with = "lenient::number")]
    pub load_time_ms: f64,
    #[serde(default)]
    pub cache_hit: bool,
}

/// Partial update of user modifications.
///
/// Labels and custom fields are merged key by key (an empty label removes
/// it); form data replaces the stored form when present.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModificationsUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_labels: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_fields: Option<BTreeMap<String, serde_json::Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub form_data: Option<FormData>,
}
