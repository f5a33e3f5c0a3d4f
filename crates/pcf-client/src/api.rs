//! Seams between the cache/staging layer and the server.

use std::path::Path;

use async_trait::async_trait;
use pcf_core::wire::{AssortmentResponse, DeleteImagesResponse};
use pcf_core::{ImageBucket, UploadedImage};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Which view of an assortment a caller asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    /// Webhook data only.
    Assortment,
    /// Webhook data merged with user modifications.
    IndividualAssortment,
}

/// A file waiting to be uploaded into a bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingUpload {
    pub bucket: ImageBucket,
    pub pack_index: Option<usize>,
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl PendingUpload {
    /// Create an upload from in-memory bytes.
    pub fn new(
        bucket: ImageBucket,
        pack_index: Option<usize>,
        file_name: impl Into<String>,
        mime_type: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Self {
        Self {
            bucket,
            pack_index,
            file_name: file_name.into(),
            mime_type: mime_type.into(),
            bytes,
        }
    }

    /// Read an upload from disk, guessing the content type from the extension.
    pub async fn from_path(
        path: impl AsRef<Path>,
        bucket: ImageBucket,
        pack_index: Option<usize>,
    ) -> Result<Self> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("upload")
            .to_string();
        let mime_type = mime_for(&file_name).to_string();
        Ok(Self::new(bucket, pack_index, file_name, mime_type, bytes))
    }
}

fn mime_for(file_name: &str) -> &'static str {
    let extension = Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);
    match extension.as_deref() {
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("svg") => "image/svg+xml",
        _ => "image/jpeg",
    }
}

/// Source of assortment reads.
#[async_trait]
pub trait AssortmentSource: Send + Sync {
    /// Fetch an assortment; `None` when the server does not know it.
    async fn fetch_assortment(
        &self,
        kind: ResourceKind,
        assortment_id: &str,
    ) -> Result<Option<AssortmentResponse>>;
}

/// Server-side image mutations used when saving staged edits.
#[async_trait]
pub trait ImageMutations: Send + Sync {
    /// Detach and delete uploaded images in one call.
    async fn delete_images(
        &self,
        assortment_id: &str,
        filenames: &[String],
    ) -> Result<DeleteImagesResponse>;

    /// Upload one image into its bucket.
    async fn upload_image(
        &self,
        assortment_id: &str,
        upload: &PendingUpload,
    ) -> Result<UploadedImage>;
}
