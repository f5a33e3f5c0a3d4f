//! Staged image edits.
//!
//! Deletions, replacements and new uploads are collected locally and only
//! sent to the server on [`ImageStaging::save`]. Marking and then unmarking
//! an image leaves nothing to send.

use std::collections::{BTreeMap, BTreeSet};

use futures::future::join_all;
use pcf_core::{ImageBucket, UploadedImage, UploadedImages};
use tracing::{info, warn};

use crate::api::{ImageMutations, PendingUpload};
use crate::cache::AssortmentCache;
use crate::store::DurableStore;

/// What a staged operation did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationKind {
    Delete { filenames: Vec<String> },
    Replace { old_filename: String },
    Upload { bucket: ImageBucket, original_name: String },
}

/// Result of one server operation issued by [`ImageStaging::save`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationOutcome {
    pub kind: OperationKind,
    pub error: Option<String>,
    pub uploaded: Option<UploadedImage>,
}

impl OperationOutcome {
    fn ok(kind: OperationKind, uploaded: Option<UploadedImage>) -> Self {
        Self {
            kind,
            error: None,
            uploaded,
        }
    }

    fn failed(kind: OperationKind, error: impl ToString) -> Self {
        Self {
            kind,
            error: Some(error.to_string()),
            uploaded: None,
        }
    }

    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// Outcomes of a save, one per server operation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SaveReport {
    pub outcomes: Vec<OperationOutcome>,
}

impl SaveReport {
    /// Whether every operation succeeded. True for an empty save.
    pub fn all_succeeded(&self) -> bool {
        self.outcomes.iter().all(OperationOutcome::succeeded)
    }

    pub fn failures(&self) -> impl Iterator<Item = &OperationOutcome> {
        self.outcomes.iter().filter(|outcome| !outcome.succeeded())
    }
}

/// An uploaded image as the editor should render it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedItem {
    pub bucket: ImageBucket,
    pub pack_index: Option<usize>,
    pub image: UploadedImage,
    pub marked_for_deletion: bool,
    pub replacement: Option<String>,
}

/// Pending image edits for one assortment.
#[derive(Debug, Clone, Default)]
pub struct ImageStaging {
    assortment_id: String,
    deletions: BTreeSet<String>,
    replacements: BTreeMap<String, PendingUpload>,
    uploads: Vec<PendingUpload>,
}

impl ImageStaging {
    pub fn new(assortment_id: impl Into<String>) -> Self {
        Self {
            assortment_id: assortment_id.into(),
            ..Self::default()
        }
    }

    pub fn assortment_id(&self) -> &str {
        &self.assortment_id
    }

    /// Stage a stored image for deletion. Cancels a staged replacement.
    pub fn mark_for_deletion(&mut self, filename: impl Into<String>) {
        let filename = filename.into();
        self.replacements.remove(&filename);
        self.deletions.insert(filename);
    }

    pub fn unmark_deletion(&mut self, filename: &str) {
        self.deletions.remove(filename);
    }

    pub fn is_marked_for_deletion(&self, filename: &str) -> bool {
        self.deletions.contains(filename)
    }

    /// Stage a replacement file for a stored image. Cancels a staged deletion.
    pub fn stage_replacement(&mut self, old_filename: impl Into<String>, upload: PendingUpload) {
        let old_filename = old_filename.into();
        self.deletions.remove(&old_filename);
        self.replacements.insert(old_filename, upload);
    }

    pub fn cancel_replacement(&mut self, old_filename: &str) -> Option<PendingUpload> {
        self.replacements.remove(old_filename)
    }

    pub fn stage_upload(&mut self, upload: PendingUpload) {
        self.uploads.push(upload);
    }

    /// Remove a staged upload by position.
    pub fn remove_upload(&mut self, index: usize) -> Option<PendingUpload> {
        (index < self.uploads.len()).then(|| self.uploads.remove(index))
    }

    pub fn uploads(&self) -> &[PendingUpload] {
        &self.uploads
    }

    pub fn is_empty(&self) -> bool {
        self.deletions.is_empty() && self.replacements.is_empty() && self.uploads.is_empty()
    }

    /// Stored uploads annotated with their staged state.
    pub fn view(&self, images: &UploadedImages) -> Vec<StagedItem> {
        let mut items = Vec::new();
        images.for_each(|bucket, pack_index, _, image| {
            items.push(StagedItem {
                bucket,
                pack_index,
                image: image.clone(),
                marked_for_deletion: self.deletions.contains(&image.filename),
                replacement: self
                    .replacements
                    .get(&image.filename)
                    .map(|upload| upload.file_name.clone()),
            });
        });
        items
    }

    /// Send every staged edit.
    ///
    /// Deletions go out as one batch; each replacement deletes the old file
    /// then uploads the new one; uploads run independently. All three groups
    /// run concurrently. Failures are reported per operation and do not stop
    /// the others. Afterwards the staging is cleared and the assortment's
    /// cache entries are invalidated.
    pub async fn save<M, S>(&mut self, mutations: &M, cache: &AssortmentCache<S>) -> SaveReport
    where
        M: ImageMutations + ?Sized,
        S: DurableStore,
    {
        if self.is_empty() {
            return SaveReport::default();
        }

        let assortment_id = self.assortment_id.clone();
        let deletions: Vec<String> = std::mem::take(&mut self.deletions).into_iter().collect();
        let replacements = std::mem::take(&mut self.replacements);
        let uploads = std::mem::take(&mut self.uploads);

        let delete_batch = async {
            if deletions.is_empty() {
                return None;
            }
            let kind = OperationKind::Delete {
                filenames: deletions.clone(),
            };
            Some(match mutations.delete_images(&assortment_id, &deletions).await {
                Ok(response) if response.missing.is_empty() => OperationOutcome::ok(kind, None),
                Ok(response) => OperationOutcome::failed(
                    kind,
                    format!("Not found: {}", response.missing.join(", ")),
                ),
                Err(err) => OperationOutcome::failed(kind, err),
            })
        };

        let replace_all = join_all(replacements.iter().map(|(old_filename, upload)| {
            let assortment_id = &assortment_id;
            async move {
                let kind = OperationKind::Replace {
                    old_filename: old_filename.clone(),
                };
                let old = std::slice::from_ref(old_filename);
                if let Err(err) = mutations.delete_images(assortment_id, old).await {
                    return OperationOutcome::failed(kind, err);
                }
                match mutations.upload_image(assortment_id, upload).await {
                    Ok(image) => OperationOutcome::ok(kind, Some(image)),
                    Err(err) => OperationOutcome::failed(kind, err),
                }
            }
        }));

        let upload_all = join_all(uploads.iter().map(|upload| {
            let assortment_id = &assortment_id;
            async move {
                let kind = OperationKind::Upload {
                    bucket: upload.bucket,
                    original_name: upload.file_name.clone(),
                };
                match mutations.upload_image(assortment_id, upload).await {
                    Ok(image) => OperationOutcome::ok(kind, Some(image)),
                    Err(err) => OperationOutcome::failed(kind, err),
                }
            }
        }));

        let (deleted, replaced, uploaded) = futures::join!(delete_batch, replace_all, upload_all);

        let mut report = SaveReport::default();
        report.outcomes.extend(deleted);
        report.outcomes.extend(replaced);
        report.outcomes.extend(uploaded);

        if let Err(err) = cache.invalidate(&assortment_id).await {
            warn!(assortment_id = %assortment_id, error = %err, "Failed to invalidate cache");
        }

        let failed = report.failures().count();
        info!(
            assortment_id = %assortment_id,
            operations = report.outcomes.len(),
            failed,
            "Staged image edits saved"
        );
        report
    }
}
