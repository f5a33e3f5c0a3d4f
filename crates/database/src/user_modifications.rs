//! User edits attached to individual assortments.
//!
//! Every operation is a transactional read-modify-write of one row and stamps
//! `lastModified`.

use std::collections::BTreeSet;

use pcf_core::wire::{DeleteImagesResponse, ModificationsUpdate};
use pcf_core::{now_rfc3339, ImageBucket, UploadedImage, UserModifications};
use sqlx::types::Json;
use sqlx::SqlitePool;
use tracing::info;

use crate::error::{DatabaseError, Result};

/// Highest item-pack index accepted for uploads.
pub const MAX_PACK_INDEX: usize = 99;

async fn modify<F, R>(pool: &SqlitePool, assortment_id: &str, apply: F) -> Result<(UserModifications, R)>
where
    F: FnOnce(&mut UserModifications) -> Result<R>,
{
    // Writers must hold the lock before the read.
    let mut tx = pool.begin_with("BEGIN IMMEDIATE").await?;

    let stored: Option<Json<UserModifications>> = sqlx::query_scalar(
        "SELECT user_modifications FROM individual_assortments WHERE assortment_id = ?",
    )
    .bind(assortment_id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(|| DatabaseError::NotFound {
        entity: "IndividualAssortment",
        id: assortment_id.to_string(),
    })?;

    let mut modifications = stored.map(|json| json.0).unwrap_or_default();
    let outcome = apply(&mut modifications)?;

    let now = now_rfc3339();
    modifications.last_modified = Some(now.clone());

    sqlx::query(
        r#"
        UPDATE individual_assortments
        SET user_modifications = ?, updated_at = ?
        WHERE assortment_id = ?
        "#,
    )
    .bind(Json(&modifications))
    .bind(&now)
    .bind(assortment_id)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok((modifications, outcome))
}

/// Current user modifications, `None` when the assortment has none yet.
pub async fn get_user_modifications(
    pool: &SqlitePool,
    assortment_id: &str,
) -> Result<Option<UserModifications>> {
    let stored: Option<Json<UserModifications>> = sqlx::query_scalar(
        "SELECT user_modifications FROM individual_assortments WHERE assortment_id = ?",
    )
    .bind(assortment_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| DatabaseError::NotFound {
        entity: "IndividualAssortment",
        id: assortment_id.to_string(),
    })?;

    Ok(stored.map(|json| json.0))
}

/// Merge labels and custom fields, replace form data.
///
/// A blank label or a `null` custom field removes the key.
pub async fn update_user_modifications(
    pool: &SqlitePool,
    assortment_id: &str,
    update: &ModificationsUpdate,
) -> Result<UserModifications> {
    let (modifications, ()) = modify(pool, assortment_id, |modifications| {
        if let Some(labels) = &update.image_labels {
            for (key, label) in labels {
                if label.trim().is_empty() {
                    modifications.image_labels.remove(key);
                } else {
                    modifications.image_labels.insert(key.clone(), label.clone());
                }
            }
        }
        if let Some(fields) = &update.custom_fields {
            for (key, value) in fields {
                if value.is_null() {
                    modifications.custom_fields.remove(key);
                } else {
                    modifications.custom_fields.insert(key.clone(), value.clone());
                }
            }
        }
        if let Some(form_data) = &update.form_data {
            modifications.form_data = form_data.clone();
        }
        Ok(())
    })
    .await?;

    info!(assortment_id = %assortment_id, "Updated user modifications");
    Ok(modifications)
}

fn check_pack_index(pack_index: Option<usize>) -> Result<()> {
    match pack_index.filter(|index| *index > MAX_PACK_INDEX) {
        Some(index) => Err(DatabaseError::Invalid {
            field: "packIndex",
            reason: format!("{} exceeds {}", index, MAX_PACK_INDEX),
        }),
        None => Ok(()),
    }
}

/// Attach an uploaded image to a bucket.
pub async fn add_uploaded_image(
    pool: &SqlitePool,
    assortment_id: &str,
    bucket: ImageBucket,
    pack_index: Option<usize>,
    image: UploadedImage,
) -> Result<UserModifications> {
    check_pack_index(pack_index)?;

    let filename = image.filename.clone();
    let (modifications, ()) = modify(pool, assortment_id, |modifications| {
        modifications.uploaded_images.push(bucket, pack_index, image);
        Ok(())
    })
    .await?;

    info!(
        assortment_id = %assortment_id,
        bucket = %bucket,
        filename = %filename,
        "Attached uploaded image"
    );
    Ok(modifications)
}

/// Detach uploaded images by filename.
///
/// Labels keyed by a removed filename are dropped with it. Filenames that
/// were not attached are reported as missing.
pub async fn remove_uploaded_images(
    pool: &SqlitePool,
    assortment_id: &str,
    filenames: &[String],
) -> Result<DeleteImagesResponse> {
    let requested: BTreeSet<&str> = filenames.iter().map(String::as_str).collect();

    let (_, removed) = modify(pool, assortment_id, |modifications| {
        let mut removed = BTreeSet::new();
        modifications.uploaded_images.retain(|image| {
            if requested.contains(image.filename.as_str()) {
                removed.insert(image.filename.clone());
                false
            } else {
                true
            }
        });
        for filename in &removed {
            modifications.image_labels.remove(filename);
        }
        Ok(removed)
    })
    .await?;

    let missing = requested
        .iter()
        .filter(|filename| !removed.contains(**filename))
        .map(|filename| filename.to_string())
        .collect();

    info!(
        assortment_id = %assortment_id,
        removed = removed.len(),
        "Detached uploaded images"
    );
    Ok(DeleteImagesResponse {
        deleted: removed.into_iter().collect(),
        missing,
    })
}

/// Swap one attached image for another in a single transaction.
///
/// Fails with `NotFound` and leaves the row untouched when `old_filename` is
/// not attached. The old filename's label is dropped.
pub async fn replace_uploaded_image(
    pool: &SqlitePool,
    assortment_id: &str,
    old_filename: &str,
    bucket: ImageBucket,
    pack_index: Option<usize>,
    image: UploadedImage,
) -> Result<UserModifications> {
    check_pack_index(pack_index)?;

    let filename = image.filename.clone();
    let (modifications, ()) = modify(pool, assortment_id, |modifications| {
        let mut found = false;
        modifications.uploaded_images.retain(|existing| {
            let matches = existing.filename == old_filename;
            found |= matches;
            !matches
        });
        if !found {
            return Err(DatabaseError::NotFound {
                entity: "UploadedImage",
                id: old_filename.to_string(),
            });
        }
        modifications.image_labels.remove(old_filename);
        modifications.uploaded_images.push(bucket, pack_index, image);
        Ok(())
    })
    .await?;

    info!(
        assortment_id = %assortment_id,
        old = %old_filename,
        new = %filename,
        "Replaced uploaded image"
    );
    Ok(modifications)
}
