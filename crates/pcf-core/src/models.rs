//! Assortment data model.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::lenient;

/// Sales order header carried by an order webhook.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SalesOrder {
    #[serde(default, deserialize_with = "lenient::integer")]
    pub id: i64,
    #[serde(default, deserialize_with = "lenient::string")]
    pub customer: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub customer_po: String,
}

/// Processing status of a stored webhook document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    #[default]
    Received,
    Processed,
    Error,
}

impl OrderStatus {
    /// Stored representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Received => "received",
            OrderStatus::Processed => "processed",
            OrderStatus::Error => "error",
        }
    }
}

impl FromStr for OrderStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "received" => Ok(OrderStatus::Received),
            "processed" => Ok(OrderStatus::Processed),
            "error" => Ok(OrderStatus::Error),
            other => Err(CoreError::UnknownStatus(other.to_string())),
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where an assortment read was served from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSource {
    /// The standalone individual assortment store.
    Individual,
    /// Embedded inside a sales-order webhook document.
    SalesOrder,
}

/// Physical dimensions in centimetres.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Dimensions {
    #[serde(default, deserialize_with = "lenient::number")]
    pub length: f64,
    #[serde(default, deserialize_with = "lenient::number")]
    pub width: f64,
    #[serde(default, deserialize_with = "lenient::number")]
    pub height: f64,
}

/// One webhook-sourced image.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageEntry {
    #[serde(default, deserialize_with = "lenient::string")]
    pub id: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub component_name: String,
    /// Base64 pixel data, optionally as a `data:` URL.
    #[serde(default, deserialize_with = "lenient::string")]
    pub image: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub filename: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_mime_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<String>,
}

impl ImageEntry {
    /// Whether the entry carries any pixel data.
    pub fn has_image(&self) -> bool {
        !self.image.trim().is_empty()
    }
}

/// A user-uploaded image file stored by the server.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedImage {
    /// Stored (server-generated) filename; the identity of the upload.
    #[serde(default, deserialize_with = "lenient::string")]
    pub filename: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub original_name: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub mime_type: String,
    #[serde(default, deserialize_with = "lenient::count")]
    pub size: u64,
    #[serde(default, deserialize_with = "lenient::string")]
    pub uploaded_at: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub url: String,
}

/// The five named image buckets of a packaging configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ImageBucket {
    ItemPack,
    ItemBarcode,
    Display,
    InnerCarton,
    MasterCarton,
}

impl ImageBucket {
    /// All buckets in display order.
    pub const ALL: [ImageBucket; 5] = [
        ImageBucket::ItemPack,
        ImageBucket::ItemBarcode,
        ImageBucket::Display,
        ImageBucket::InnerCarton,
        ImageBucket::MasterCarton,
    ];

    /// Short name used in hash keys and form fields.
    pub fn key(&self) -> &'static str {
        match self {
            ImageBucket::ItemPack => "itemPack",
            ImageBucket::ItemBarcode => "itemBarcode",
            ImageBucket::Display => "display",
            ImageBucket::InnerCarton => "innerCarton",
            ImageBucket::MasterCarton => "masterCarton",
        }
    }

    /// Human-readable section title.
    pub fn title(&self) -> &'static str {
        match self {
            ImageBucket::ItemPack => "Item Pack",
            ImageBucket::ItemBarcode => "Item Barcode",
            ImageBucket::Display => "Display",
            ImageBucket::InnerCarton => "Inner Carton",
            ImageBucket::MasterCarton => "Master Carton",
        }
    }
}

impl FromStr for ImageBucket {
    type Err = CoreError;

    /// Accepts both the short key (`display`) and the field name (`displayImages`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let short = trimmed.strip_suffix("Images").unwrap_or(trimmed);
        ImageBucket::ALL
            .into_iter()
            .find(|bucket| bucket.key().eq_ignore_ascii_case(short))
            .ok_or_else(|| CoreError::UnknownBucket(s.to_string()))
    }
}

impl fmt::Display for ImageBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Image collections grouped by bucket.
///
/// `item_pack_images` holds one sub-array per pack grouping; the other four
/// buckets are flat.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    rename_all = "camelCase",
    bound(serialize = "T: Serialize", deserialize = "T: Deserialize<'de>")
)]
pub struct ImageBuckets<T> {
    #[serde(default, deserialize_with = "lenient::null_as_default")]
    pub item_pack_images: Vec<Vec<T>>,
    #[serde(default, deserialize_with = "lenient::null_as_default")]
    pub item_barcode_images: Vec<T>,
    #[serde(default, deserialize_with = "lenient::null_as_default")]
    pub display_images: Vec<T>,
    #[serde(default, deserialize_with = "lenient::null_as_default")]
    pub inner_carton_images: Vec<T>,
    #[serde(default, deserialize_with = "lenient::null_as_default")]
    pub master_carton_images: Vec<T>,
}

/// Webhook-sourced images of an assortment.
pub type PcfImages = ImageBuckets<ImageEntry>;

/// User-uploaded images of an assortment.
pub type UploadedImages = ImageBuckets<UploadedImage>;

impl<T> Default for ImageBuckets<T> {
    fn default() -> Self {
        Self {
            item_pack_images: Vec::new(),
            item_barcode_images: Vec::new(),
            display_images: Vec::new(),
            inner_carton_images: Vec::new(),
            master_carton_images: Vec::new(),
        }
    }
}

impl<T> ImageBuckets<T> {
    /// Total number of images.
    ///
    /// Sum of every item-pack sub-array plus the four flat buckets. Every
    /// image count surfaced anywhere goes through this method.
    pub fn image_count(&self) -> usize {
        self.item_pack_images.iter().map(Vec::len).sum::<usize>()
            + self.item_barcode_images.len()
            + self.display_images.len()
            + self.inner_carton_images.len()
            + self.master_carton_images.len()
    }

    /// Whether no bucket holds an image.
    pub fn is_empty(&self) -> bool {
        self.image_count() == 0
    }

    /// Flat bucket storage, or `None` for the nested item-pack bucket.
    pub fn flat(&self, bucket: ImageBucket) -> Option<&Vec<T>> {
        match bucket {
            ImageBucket::ItemPack => None,
            ImageBucket::ItemBarcode => Some(&self.item_barcode_images),
            ImageBucket::Display => Some(&self.display_images),
            ImageBucket::InnerCarton => Some(&self.inner_carton_images),
            ImageBucket::MasterCarton => Some(&self.master_carton_images),
        }
    }

    fn flat_mut(&mut self, bucket: ImageBucket) -> Option<&mut Vec<T>> {
        match bucket {
            ImageBucket::ItemPack => None,
            ImageBucket::ItemBarcode => Some(&mut self.item_barcode_images),
            ImageBucket::Display => Some(&mut self.display_images),
            ImageBucket::InnerCarton => Some(&mut self.inner_carton_images),
            ImageBucket::MasterCarton => Some(&mut self.master_carton_images),
        }
    }

    /// Append an image to a bucket.
    ///
    /// For the item-pack bucket, `pack_index` selects the pack (default 0);
    /// missing packs are created empty.
    pub fn push(&mut self, bucket: ImageBucket, pack_index: Option<usize>, item: T) {
        match self.flat_mut(bucket) {
            Some(images) => images.push(item),
            None => {
                let pack = pack_index.unwrap_or(0);
                if self.item_pack_images.len() <= pack {
                    self.item_pack_images.resize_with(pack + 1, Vec::new);
                }
                self.item_pack_images[pack].push(item);
            }
        }
    }

    /// Keep only the images matching `keep`. Empty packs are preserved.
    pub fn retain<F>(&mut self, mut keep: F)
    where
        F: FnMut(&T) -> bool,
    {
        for pack in &mut self.item_pack_images {
            pack.retain(|item| keep(item));
        }
        for bucket in &ImageBucket::ALL[1..] {
            if let Some(images) = self.flat_mut(*bucket) {
                images.retain(|item| keep(item));
            }
        }
    }

    /// Visit every image with its bucket, pack index (item-pack only) and
    /// position inside its array.
    pub fn for_each<F>(&self, mut visit: F)
    where
        F: FnMut(ImageBucket, Option<usize>, usize, &T),
    {
        for (pack, images) in self.item_pack_images.iter().enumerate() {
            for (index, item) in images.iter().enumerate() {
                visit(ImageBucket::ItemPack, Some(pack), index, item);
            }
        }
        for bucket in &ImageBucket::ALL[1..] {
            if let Some(images) = self.flat(*bucket) {
                for (index, item) in images.iter().enumerate() {
                    visit(*bucket, None, index, item);
                }
            }
        }
    }

    /// Mutable counterpart of [`ImageBuckets::for_each`].
    pub fn for_each_mut<F>(&mut self, mut visit: F)
    where
        F: FnMut(ImageBucket, Option<usize>, usize, &mut T),
    {
        for (pack, images) in self.item_pack_images.iter_mut().enumerate() {
            for (index, item) in images.iter_mut().enumerate() {
                visit(ImageBucket::ItemPack, Some(pack), index, item);
            }
        }
        for bucket in &ImageBucket::ALL[1..] {
            if let Some(images) = self.flat_mut(*bucket) {
                for (index, item) in images.iter_mut().enumerate() {
                    visit(*bucket, None, index, item);
                }
            }
        }
    }

    /// Convert every image, keeping bucket and pack structure.
    pub fn map<U, F>(&self, mut f: F) -> ImageBuckets<U>
    where
        F: FnMut(&T) -> U,
    {
        ImageBuckets {
            item_pack_images: self
                .item_pack_images
                .iter()
                .map(|pack| pack.iter().map(&mut f).collect())
                .collect(),
            item_barcode_images: self.item_barcode_images.iter().map(&mut f).collect(),
            display_images: self.display_images.iter().map(&mut f).collect(),
            inner_carton_images: self.inner_carton_images.iter().map(&mut f).collect(),
            master_carton_images: self.master_carton_images.iter().map(&mut f).collect(),
        }
    }

    /// Append all images of `other`, pack by pack.
    pub fn extend(&mut self, other: ImageBuckets<T>) {
        for (pack, images) in other.item_pack_images.into_iter().enumerate() {
            if self.item_pack_images.len() <= pack {
                self.item_pack_images.resize_with(pack + 1, Vec::new);
            }
            self.item_pack_images[pack].extend(images);
        }
        self.item_barcode_images.extend(other.item_barcode_images);
        self.display_images.extend(other.display_images);
        self.inner_carton_images.extend(other.inner_carton_images);
        self.master_carton_images.extend(other.master_carton_images);
    }
}

/// One packaging configuration ("assortment") of a sales order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assortment {
    #[serde(rename = "_id", default, deserialize_with = "lenient::integer")]
    pub id: i64,
    #[serde(default, deserialize_with = "lenient::string")]
    pub item_no: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub customer_item_no: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub name: String,
    #[serde(default, deserialize_with = "lenient::integer")]
    pub order_id: i64,
    #[serde(default, deserialize_with = "lenient::integer")]
    pub product_id: i64,
    #[serde(default, deserialize_with = "lenient::null_as_default")]
    pub item_dimensions: Dimensions,
    #[serde(default, deserialize_with = "lenient::null_as_default")]
    pub inner_carton_dimensions: Dimensions,
    #[serde(default, deserialize_with = "lenient::null_as_default")]
    pub master_carton_dimensions: Dimensions,
    #[serde(default, deserialize_with = "lenient::null_as_default")]
    pub pcf_images: PcfImages,
}

/// Packing form values entered by users.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormData {
    #[serde(default, deserialize_with = "lenient::number")]
    pub product_in_carton: f64,
    #[serde(default, deserialize_with = "lenient::number")]
    pub product_per_unit: f64,
    #[serde(rename = "masterCUFT", default, deserialize_with = "lenient::number")]
    pub master_cuft: f64,
    #[serde(default, deserialize_with = "lenient::number")]
    pub master_gross_weight: f64,
    #[serde(default, deserialize_with = "lenient::string")]
    pub unit: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub cubic_unit: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub wt_unit: String,
}

/// User edits layered on top of webhook data. Never replaces `pcf_images`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserModifications {
    #[serde(default, deserialize_with = "lenient::null_as_default")]
    pub uploaded_images: UploadedImages,
    #[serde(default, deserialize_with = "lenient::null_as_default")]
    pub image_labels: BTreeMap<String, String>,
    #[serde(default, deserialize_with = "lenient::null_as_default")]
    pub custom_fields: BTreeMap<String, serde_json::Value>,
    #[serde(default, deserialize_with = "lenient::null_as_default")]
    pub form_data: FormData,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<String>,
}
