//! Content hashing for assortment images.
//!
//! Hashes are SHA-256 over the decoded image bytes, hex encoded. A collection
//! hash combines every per-image hash under a stable key so the result does
//! not depend on the order in which images were visited.

use std::collections::BTreeMap;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::models::{ImageBucket, PcfImages};

/// Mime type assumed when an image carries no data-URL prefix.
pub const DEFAULT_MIME_TYPE: &str = "image/jpeg";

/// Digest of a single image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageDigest {
    pub hash: String,
    /// Decoded size in bytes.
    pub size: u64,
    pub mime_type: String,
}

/// Digest of a whole image collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionDigest {
    pub collection_hash: String,
    pub total_images: usize,
    /// Per-image hashes keyed by bucket, position and component name.
    pub individual_hashes: BTreeMap<String, String>,
    /// Keys present in both collections whose hashes differ. Only set when a
    /// previous collection was supplied.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub changed_images: Option<Vec<String>>,
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Split an optional `data:<mime>;base64,` prefix from the payload.
fn split_data_url(data: &str) -> (Option<&str>, &str) {
    let trimmed = data.trim();
    if let Some(rest) = trimmed.strip_prefix("data:") {
        if let Some((header, body)) = rest.split_once(',') {
            let mime = header.split(';').next().filter(|m| !m.is_empty());
            return (mime, body);
        }
    }
    (None, trimmed)
}

/// Decode base64, tolerating embedded whitespace. Undecodable input is
/// hashed as its raw text.
fn decode_body(body: &str) -> Vec<u8> {
    let compact: String = body.chars().filter(|c| !c.is_whitespace()).collect();
    match STANDARD.decode(compact.as_bytes()) {
        Ok(bytes) => bytes,
        Err(err) => {
            debug!(error = %err, len = compact.len(), "Image body is not base64, hashing raw text");
            compact.into_bytes()
        }
    }
}

/// Hash a single base64 image.
pub fn hash_image(data: &str) -> ImageDigest {
    let (mime, body) = split_data_url(data);
    let bytes = decode_body(body);
    ImageDigest {
        hash: sha256_hex(&bytes),
        size: bytes.len() as u64,
        mime_type: mime.unwrap_or(DEFAULT_MIME_TYPE).to_string(),
    }
}

/// Stable key of an image inside its collection.
pub fn image_key(
    bucket: ImageBucket,
    pack_index: Option<usize>,
    index: usize,
    component_name: &str,
) -> String {
    match pack_index {
        Some(pack) => format!("{}_{}_{}_{}", bucket.key(), pack, index, component_name),
        None => format!("{}_{}_{}", bucket.key(), index, component_name),
    }
}

fn individual_hashes(images: &PcfImages) -> BTreeMap<String, String> {
    let mut hashes = BTreeMap::new();
    images.for_each(|bucket, pack, index, entry| {
        if !entry.has_image() {
            return;
        }
        let key = image_key(bucket, pack, index, &entry.component_name);
        hashes.insert(key, hash_image(&entry.image).hash);
    });
    hashes
}

/// Hash every image of a collection and roll the results into one hash.
///
/// When `previous` is given, `changed_images` lists the keys present in both
/// collections whose hashes differ; keys unique to either side are ignored.
pub fn hash_collection(images: &PcfImages, previous: Option<&PcfImages>) -> CollectionDigest {
    let hashes = individual_hashes(images);

    let combined = hashes
        .iter()
        .map(|(key, hash)| format!("{}:{}", key, hash))
        .collect::<Vec<_>>()
        .join("|");

    let changed_images = previous.map(|previous| {
        let before = individual_hashes(previous);
        hashes
            .iter()
            .filter(|(key, hash)| before.get(*key).is_some_and(|old| old != *hash))
            .map(|(key, _)| key.clone())
            .collect()
    });

    CollectionDigest {
        collection_hash: sha256_hex(combined.as_bytes()),
        total_images: hashes.len(),
        individual_hashes: hashes,
        changed_images,
    }
}

/// Fill hash, size, mime type and timestamp on every image with pixel data.
///
/// `last_updated` is only replaced when the content hash changed, so
/// re-delivering identical images keeps their original timestamp.
pub fn annotate_images(images: &mut PcfImages, now: &str) {
    images.for_each_mut(|_, _, _, entry| {
        if !entry.has_image() {
            return;
        }
        let digest = hash_image(&entry.image);
        if entry.image_hash.as_deref() != Some(digest.hash.as_str()) || entry.last_updated.is_none()
        {
            entry.last_updated = Some(now.to_string());
        }
        entry.image_hash = Some(digest.hash);
        entry.image_size = Some(digest.size);
        entry.image_mime_type = Some(digest.mime_type);
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ImageEntry;

    fn entry(name: &str, image: &str) -> ImageEntry {
        ImageEntry {
            component_name: name.to_string(),
            image: image.to_string(),
            ..ImageEntry::default()
        }
    }

    #[test]
    fn test_hash_image_stable() {
        let first = hash_image("aGVsbG8=");
        let second = hash_image("aGVsbG8=");
        assert_eq!(first, second);
        assert_eq!(first.size, 5);
        assert_eq!(first.mime_type, DEFAULT_MIME_TYPE);
        // sha256("hello")
        assert_eq!(
            first.hash,
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
    }

    #[test]
    fn test_hash_image_raw_text_fallback() {
        let raw = hash_image("not base64!");
        assert_eq!(raw.size, 10);
        assert_eq!(raw.hash, hash_image("not\nbase64!").hash);
        assert_ne!(raw.hash, hash_image("aGVsbG8=").hash);
    }

    #[test]
    fn test_hash_image_data_url() {
        let plain = hash_image("aGVsbG8=");
        let url = hash_image("data:image/png;base64,aGVsbG8=");
        assert_eq!(url.mime_type, "image/png");
        assert_eq!(url.hash, plain.hash);
        assert_eq!(url.size, plain.size);
    }

    #[test]
    fn test_collection_hash_ignores_visit_order() {
        let a = PcfImages {
            display_images: vec![entry("front", "YQ=="), entry("back", "Yg==")],
            master_carton_images: vec![entry("side", "Yw==")],
            ..PcfImages::default()
        };
        let mut b = PcfImages {
            master_carton_images: vec![entry("side", "Yw==")],
            ..PcfImages::default()
        };
        b.display_images = vec![entry("front", "YQ=="), entry("back", "Yg==")];

        assert_eq!(
            hash_collection(&a, None).collection_hash,
            hash_collection(&b, None).collection_hash
        );
    }

    #[test]
    fn test_item_pack_keys_include_pack_index() {
        let images = PcfImages {
            item_pack_images: vec![vec![entry("front", "YQ==")], vec![entry("front", "YQ==")]],
            ..PcfImages::default()
        };
        let digest = hash_collection(&images, None);
        let keys: Vec<_> = digest.individual_hashes.keys().cloned().collect();
        assert_eq!(keys, vec!["itemPack_0_0_front", "itemPack_1_0_front"]);
        assert_eq!(digest.total_images, 2);
    }

    #[test]
    fn test_empty_images_are_skipped() {
        let images = PcfImages {
            display_images: vec![entry("front", ""), entry("back", "Yg==")],
            ..PcfImages::default()
        };
        let digest = hash_collection(&images, None);
        assert_eq!(digest.total_images, 1);
        assert!(digest.individual_hashes.contains_key("display_1_back"));
    }

    #[test]
    fn test_changed_images_only_common_keys() {
        let previous = PcfImages {
            display_images: vec![entry("front", "YQ=="), entry("back", "Yg==")],
            ..PcfImages::default()
        };
        let current = PcfImages {
            display_images: vec![entry("front", "YQ=="), entry("back", "ZA==")],
            inner_carton_images: vec![entry("new", "ZQ==")],
            ..PcfImages::default()
        };
        let digest = hash_collection(&current, Some(&previous));
        assert_eq!(digest.changed_images, Some(vec!["display_1_back".to_string()]));

        let unchanged = hash_collection(&previous, Some(&previous));
        assert_eq!(unchanged.changed_images, Some(vec![]));
        assert!(hash_collection(&current, None).changed_images.is_none());
    }

    #[test]
    fn test_annotate_images_keeps_timestamp_for_same_content() {
        let mut images = PcfImages {
            display_images: vec![entry("front", "data:image/png;base64,YQ=="), entry("blank", "")],
            ..PcfImages::default()
        };
        annotate_images(&mut images, "2026-01-01T00:00:00.000Z");
        annotate_images(&mut images, "2026-02-01T00:00:00.000Z");

        let front = &images.display_images[0];
        assert_eq!(front.image_mime_type.as_deref(), Some("image/png"));
        assert_eq!(front.image_size, Some(1));
        assert_eq!(front.last_updated.as_deref(), Some("2026-01-01T00:00:00.000Z"));
        assert!(images.display_images[1].image_hash.is_none());
    }
}
