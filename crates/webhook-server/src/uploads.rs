//! Uploaded image files on disk.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use pcf_core::{now_rfc3339, UploadedImage};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{ApiError, Result};

/// URL prefix under which stored files are served.
pub const UPLOADS_ROUTE: &str = "/uploads";

/// An uploaded file as read from a multipart request.
#[derive(Debug, Clone)]
pub struct FilePart {
    pub original_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

/// Directory of uploaded images, named by random UUID.
#[derive(Debug, Clone)]
pub struct UploadStore {
    root: PathBuf,
    max_bytes: usize,
}

impl UploadStore {
    /// Open the store, creating the directory if needed.
    pub async fn open(root: impl Into<PathBuf>, max_bytes: usize) -> std::io::Result<Self> {
        let root = root.into();
        tokio::fs::create_dir_all(&root).await?;
        info!(root = %root.display(), max_bytes, "Upload directory ready");
        Ok(Self { root, max_bytes })
    }

    /// Directory holding the files.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Largest accepted file.
    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    /// Validate and write a file, returning its stored description.
    pub async fn store(&self, file: &FilePart) -> Result<UploadedImage> {
        if file.bytes.is_empty() {
            return Err(ApiError::BadRequest("Empty file provided".to_string()));
        }
        if file.bytes.len() > self.max_bytes {
            return Err(ApiError::BadRequest(format!(
                "File too large. Maximum size is {} bytes",
                self.max_bytes
            )));
        }
        if !file.mime_type.starts_with("image/") {
            return Err(ApiError::BadRequest(format!(
                "Unsupported content type '{}'",
                file.mime_type
            )));
        }

        let extension = extension_for(&file.original_name, &file.mime_type);
        let filename = format!("{}.{}", Uuid::new_v4(), extension);
        tokio::fs::write(self.root.join(&filename), &file.bytes).await?;

        debug!(filename = %filename, size = file.bytes.len(), "Stored upload");
        Ok(UploadedImage {
            url: format!("{}/{}", UPLOADS_ROUTE, filename),
            filename,
            original_name: file.original_name.clone(),
            mime_type: file.mime_type.clone(),
            size: file.bytes.len() as u64,
            uploaded_at: now_rfc3339(),
        })
    }

    /// Delete a stored file. Returns `false` when it did not exist.
    pub async fn remove(&self, filename: &str) -> std::io::Result<bool> {
        let Some(path) = self.resolve(filename) else {
            return Ok(false);
        };
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                debug!(filename = %filename, "Removed upload");
                Ok(true)
            }
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// Path of a stored file; `None` for names that could escape the root.
    fn resolve(&self, filename: &str) -> Option<PathBuf> {
        let plain = !filename.is_empty()
            && !filename.starts_with('.')
            && !filename.contains(['/', '\\'])
            && !filename.contains("..");
        plain.then(|| self.root.join(filename))
    }
}

fn extension_for(original_name: &str, mime_type: &str) -> String {
    let from_name = Path::new(original_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty() && ext.len() <= 5 && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(str::to_ascii_lowercase);

    from_name.unwrap_or_else(|| {
        match mime_type {
            "image/png" => "png",
            "image/gif" => "gif",
            "image/webp" => "webp",
            "image/svg+xml" => "svg",
            _ => "jpg",
        }
        .to_string()
    })
}
