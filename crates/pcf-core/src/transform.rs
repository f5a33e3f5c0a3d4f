//! Merge of webhook-sourced assortment data with user modifications.
//!
//! Every read produces a fresh [`AssortmentData`]; the merged view is never
//! stored. Records arrive in a single canonical shape, [`AssortmentRecord`],
//! whichever store served them.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::models::{
    Assortment, DataSource, Dimensions, ImageBuckets, ImageEntry, PcfImages, SalesOrder,
    UploadedImage, UploadedImages, UserModifications,
};
use crate::now_rfc3339;

/// Canonical wire shape of an assortment read.
///
/// The assortment fields sit at the top level; everything else is optional
/// context added by the store that served the read.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssortmentRecord {
    #[serde(flatten)]
    pub assortment: Assortment,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_modifications: Option<UserModifications>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sales_order: Option<SalesOrder>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_name: Option<String>,
    #[serde(rename = "_accessCount", default, skip_serializing_if = "Option::is_none")]
    pub access_count: Option<i64>,
    #[serde(rename = "_lastAccessed", default, skip_serializing_if = "Option::is_none")]
    pub last_accessed: Option<String>,
    #[serde(rename = "_version", default, skip_serializing_if = "Option::is_none")]
    pub version: Option<i64>,
}

impl AssortmentRecord {
    /// Wrap a bare assortment without any store context.
    pub fn from_assortment(assortment: Assortment) -> Self {
        Self {
            assortment,
            ..Self::default()
        }
    }
}

/// Whether the data originated from a webhook or was built by hand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewSource {
    Webhook,
    Traditional,
}

/// An image in the merged view, tagged with where it came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "origin", rename_all = "lowercase")]
pub enum MergedImage {
    Webhook(ImageEntry),
    Uploaded(UploadedImage),
}

/// Flattened webhook fields of an assortment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BaseAssortment {
    pub id: i64,
    pub item_no: String,
    pub customer_item_no: String,
    pub name: String,
    pub order_id: i64,
    pub product_id: i64,
    pub customer: String,
    pub customer_po: String,
    pub order_name: String,
    pub item_dimensions: Dimensions,
    pub inner_carton_dimensions: Dimensions,
    pub master_carton_dimensions: Dimensions,
    pub webhook_images: PcfImages,
}

/// Assortment record in the shape list and card views consume.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssortmentView {
    #[serde(rename = "_id")]
    pub id: i64,
    pub item_no: String,
    pub customer_item_no: String,
    pub name: String,
    pub order_id: i64,
    pub product_id: i64,
    pub customer: String,
    pub customer_po: String,
    pub order_name: String,
    pub item_dimensions: Dimensions,
    pub inner_carton_dimensions: Dimensions,
    pub master_carton_dimensions: Dimensions,
    pub pcf_images: PcfImages,
    pub image_count: usize,
}

/// Merged portion of [`AssortmentData`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergedData {
    pub assortment: AssortmentView,
    pub all_images: ImageBuckets<MergedImage>,
    pub webhook_images: PcfImages,
    pub image_labels: BTreeMap<String, String>,
    pub combined_image_count: usize,
}

/// Provenance of an [`AssortmentData`] view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewMetadata {
    pub source: ViewSource,
    pub data_source: DataSource,
    pub last_modified: String,
    pub version: i64,
    pub synced_at: String,
    pub is_webhook_data: bool,
}

/// Merged view of webhook data and user modifications.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssortmentData {
    pub base_assortment: BaseAssortment,
    pub user_modifications: Option<UserModifications>,
    pub merged_data: MergedData,
    pub metadata: ViewMetadata,
}

impl AssortmentData {
    /// Item number of the underlying assortment.
    pub fn item_no(&self) -> &str {
        &self.base_assortment.item_no
    }

    /// Uploaded images, if the view carries user modifications.
    pub fn uploaded_images(&self) -> Option<&UploadedImages> {
        self.user_modifications
            .as_ref()
            .map(|modifications| &modifications.uploaded_images)
    }
}

/// Build the merged view of a stored record, ignoring user modifications.
pub fn transform_raw_to_assortment_data(
    record: AssortmentRecord,
    source: DataSource,
) -> AssortmentData {
    build(record, source, None)
}

/// Build the merged view of an individual-assortment read, including user
/// modifications.
///
/// The uploaded-image buckets are rebuilt from entries that still name a
/// stored file, so a deleted upload can never reappear. Records annotated
/// with access bookkeeping are attributed to the individual store.
pub fn transform_individual_assortment_response(record: AssortmentRecord) -> AssortmentData {
    let source = if record.access_count.is_some() {
        DataSource::Individual
    } else {
        DataSource::SalesOrder
    };
    let modifications = record.user_modifications.clone().map(sanitize_modifications);
    build(record, source, modifications)
}

fn sanitize_modifications(modifications: UserModifications) -> UserModifications {
    let mut uploaded_images = UploadedImages::default();
    modifications
        .uploaded_images
        .for_each(|bucket, pack, _, image| {
            if !image.filename.trim().is_empty() {
                uploaded_images.push(bucket, pack, image.clone());
            }
        });
    // Packs emptied above still occupy their slot.
    let packs = modifications.uploaded_images.item_pack_images.len();
    if uploaded_images.item_pack_images.len() < packs {
        uploaded_images.item_pack_images.resize_with(packs, Vec::new);
    }

    UserModifications {
        uploaded_images,
        ..modifications
    }
}

fn build(
    record: AssortmentRecord,
    data_source: DataSource,
    modifications: Option<UserModifications>,
) -> AssortmentData {
    let synced_at = now_rfc3339();
    let AssortmentRecord {
        assortment,
        sales_order,
        order_name,
        last_accessed,
        version,
        ..
    } = record;
    let sales_order = sales_order.unwrap_or_default();
    let order_name = order_name.unwrap_or_default();

    let webhook_images = assortment.pcf_images;
    let mut all_images = webhook_images.map(|image| MergedImage::Webhook(image.clone()));
    if let Some(modifications) = &modifications {
        all_images.extend(
            modifications
                .uploaded_images
                .map(|image| MergedImage::Uploaded(image.clone())),
        );
    }
    let combined_image_count = all_images.image_count();

    let base_assortment = BaseAssortment {
        id: assortment.id,
        item_no: assortment.item_no,
        customer_item_no: assortment.customer_item_no,
        name: assortment.name,
        order_id: assortment.order_id,
        product_id: assortment.product_id,
        customer: sales_order.customer,
        customer_po: sales_order.customer_po,
        order_name,
        item_dimensions: assortment.item_dimensions,
        inner_carton_dimensions: assortment.inner_carton_dimensions,
        master_carton_dimensions: assortment.master_carton_dimensions,
        webhook_images,
    };

    let view = AssortmentView {
        id: base_assortment.id,
        item_no: base_assortment.item_no.clone(),
        customer_item_no: base_assortment.customer_item_no.clone(),
        name: base_assortment.name.clone(),
        order_id: base_assortment.order_id,
        product_id: base_assortment.product_id,
        customer: base_assortment.customer.clone(),
        customer_po: base_assortment.customer_po.clone(),
        order_name: base_assortment.order_name.clone(),
        item_dimensions: base_assortment.item_dimensions,
        inner_carton_dimensions: base_assortment.inner_carton_dimensions,
        master_carton_dimensions: base_assortment.master_carton_dimensions,
        pcf_images: base_assortment.webhook_images.clone(),
        image_count: base_assortment.webhook_images.image_count(),
    };

    let source = if base_assortment.webhook_images.is_empty() && modifications.is_some() {
        ViewSource::Traditional
    } else {
        ViewSource::Webhook
    };

    let last_modified = modifications
        .as_ref()
        .and_then(|modifications| modifications.last_modified.clone())
        .or(last_accessed)
        .unwrap_or_else(|| synced_at.clone());

    let image_labels = modifications
        .as_ref()
        .map(|modifications| modifications.image_labels.clone())
        .unwrap_or_default();

    AssortmentData {
        merged_data: MergedData {
            assortment: view,
            all_images,
            webhook_images: base_assortment.webhook_images.clone(),
            image_labels,
            combined_image_count,
        },
        base_assortment,
        user_modifications: modifications,
        metadata: ViewMetadata {
            source,
            data_source,
            last_modified,
            version: version.unwrap_or(1),
            synced_at,
            is_webhook_data: source == ViewSource::Webhook,
        },
    }
}
