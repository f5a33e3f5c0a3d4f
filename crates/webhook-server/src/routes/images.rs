//! Uploaded image management for individual assortments.

use axum::extract::{Multipart, Path, State};
use axum::Json;
use database::{individual_assortment, user_modifications};
use pcf_core::wire::{DeleteImagesRequest, DeleteImagesResponse};
use pcf_core::{ImageBucket, UploadedImage};
use tracing::{info, warn};

use crate::error::{ApiError, Result};
use crate::routes::ApiResponse;
use crate::state::AppState;
use crate::uploads::FilePart;

/// Fields of an image upload form.
#[derive(Debug, Default)]
struct UploadForm {
    bucket: Option<ImageBucket>,
    pack_index: Option<usize>,
    old_filename: Option<String>,
    file: Option<FilePart>,
}

async fn read_form(mut multipart: Multipart) -> Result<UploadForm> {
    let mut form = UploadForm::default();

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "bucket" => form.bucket = Some(field.text().await?.trim().parse()?),
            "packIndex" => {
                let text = field.text().await?;
                let text = text.trim();
                if !text.is_empty() {
                    let index = text.parse().map_err(|_| {
                        ApiError::BadRequest(format!("Invalid packIndex '{}'", text))
                    })?;
                    form.pack_index = Some(index);
                }
            }
            "oldFilename" => form.old_filename = Some(field.text().await?.trim().to_string()),
            "file" => {
                let original_name = field.file_name().unwrap_or("upload").to_string();
                let mime_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let bytes = field.bytes().await?.to_vec();
                form.file = Some(FilePart {
                    original_name,
                    mime_type,
                    bytes,
                });
            }
            _ => {}
        }
    }

    Ok(form)
}

async fn ensure_individual(state: &AppState, assortment_id: &str) -> Result<()> {
    if individual_assortment::individual_assortment_exists(state.db.pool(), assortment_id).await? {
        Ok(())
    } else {
        Err(ApiError::NotFound(format!(
            "Individual assortment {} not found",
            assortment_id
        )))
    }
}

/// Store a file and attach it; the file is removed again if attaching fails.
async fn attach(
    state: &AppState,
    assortment_id: &str,
    bucket: ImageBucket,
    pack_index: Option<usize>,
    file: &FilePart,
) -> Result<UploadedImage> {
    let image = state.uploads.store(file).await?;

    let attached = user_modifications::add_uploaded_image(
        state.db.pool(),
        assortment_id,
        bucket,
        pack_index,
        image.clone(),
    )
    .await;

    if let Err(err) = attached {
        discard_file(state, &image.filename).await;
        return Err(err.into());
    }
    Ok(image)
}

async fn discard_file(state: &AppState, filename: &str) {
    if let Err(err) = state.uploads.remove(filename).await {
        warn!(filename = %filename, error = %err, "Failed to remove upload file");
    }
}

/// Upload an image into a bucket.
///
/// Multipart fields: `bucket`, optional `packIndex`, `file`.
pub async fn upload(
    State(state): State<AppState>,
    Path(assortment_id): Path<String>,
    multipart: Multipart,
) -> Result<Json<ApiResponse<UploadedImage>>> {
    ensure_individual(&state, &assortment_id).await?;
    let form = read_form(multipart).await?;

    let bucket = form
        .bucket
        .ok_or_else(|| ApiError::BadRequest("Missing 'bucket' field".to_string()))?;
    let file = form
        .file
        .ok_or_else(|| ApiError::BadRequest("Missing 'file' field".to_string()))?;

    let image = attach(&state, &assortment_id, bucket, form.pack_index, &file).await?;
    info!(assortment_id = %assortment_id, filename = %image.filename, "Image uploaded");
    Ok(ApiResponse::ok(image))
}

/// Detach uploaded images and delete their files.
pub async fn delete(
    State(state): State<AppState>,
    Path(assortment_id): Path<String>,
    Json(request): Json<DeleteImagesRequest>,
) -> Result<Json<ApiResponse<DeleteImagesResponse>>> {
    if request.filenames.is_empty() {
        return Err(ApiError::BadRequest("No filenames given".to_string()));
    }

    let result =
        user_modifications::remove_uploaded_images(state.db.pool(), &assortment_id, &request.filenames)
            .await?;

    for filename in &result.deleted {
        discard_file(&state, filename).await;
    }

    Ok(ApiResponse::ok(result))
}

/// Replace one uploaded image with a new file.
///
/// Multipart fields: `oldFilename`, `bucket`, optional `packIndex`, `file`.
pub async fn replace(
    State(state): State<AppState>,
    Path(assortment_id): Path<String>,
    multipart: Multipart,
) -> Result<Json<ApiResponse<UploadedImage>>> {
    ensure_individual(&state, &assortment_id).await?;
    let form = read_form(multipart).await?;

    let old_filename = form
        .old_filename
        .filter(|name| !name.is_empty())
        .ok_or_else(|| ApiError::BadRequest("Missing 'oldFilename' field".to_string()))?;
    let bucket = form
        .bucket
        .ok_or_else(|| ApiError::BadRequest("Missing 'bucket' field".to_string()))?;
    let file = form
        .file
        .ok_or_else(|| ApiError::BadRequest("Missing 'file' field".to_string()))?;

    let image = state.uploads.store(&file).await?;
    let swapped = user_modifications::replace_uploaded_image(
        state.db.pool(),
        &assortment_id,
        &old_filename,
        bucket,
        form.pack_index,
        image.clone(),
    )
    .await;
    if let Err(err) = swapped {
        discard_file(&state, &image.filename).await;
        return Err(err.into());
    }
    discard_file(&state, &old_filename).await;

    info!(
        assortment_id = %assortment_id,
        old = %old_filename,
        new = %image.filename,
        "Image replaced"
    );
    Ok(ApiResponse::ok(image))
}
